//! soma_camera - HTTP still-capture gateway for the SOMA platform
//!
//! Triggers a capture on the attached camera module by shelling out to
//! `libcamera-jpeg` (no linking against libcamera) and hands the JPEG back
//! over HTTP. One capture runs at a time; every artifact is removed after
//! delivery.

pub mod artifact;
pub mod command;
pub mod config;
pub mod device;
pub mod error;
pub mod http;
pub mod invoker;
pub mod metrics;
pub mod params;
pub mod service;
pub mod status;

pub use artifact::{ArtifactStore, CaptureArtifact, CleanupWorker};
pub use command::CaptureCommand;
pub use config::GatewayConfig;
pub use device::{DeviceLease, DeviceLock};
pub use error::CaptureError;
pub use invoker::{CaptureRunner, ProcessRunner};
pub use params::{normalize, CaptureParameters, CaptureRequest};
pub use service::{CaptureService, CapturedImage};
pub use status::StatusReport;

pub type Result<T> = std::result::Result<T, CaptureError>;
