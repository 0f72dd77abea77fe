//! Gateway configuration

use crate::artifact::DEFAULT_CLEANUP_GRACE;
use crate::command::{DEFAULT_QUALITY, DEFAULT_UTILITY};
use crate::invoker::DEFAULT_TIMEOUT;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_PORT: u16 = 5001;

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Capture utility, looked up on `PATH` unless it contains a slash.
    pub utility: String,
    /// JPEG quality passed as `--quality`.
    pub quality: u8,
    /// Hard limit on one utility run.
    pub timeout: Duration,
    /// Directory holding in-flight artifacts.
    pub artifact_dir: PathBuf,
    /// Delay between response assembly and artifact removal.
    pub cleanup_grace: Duration,
}

impl GatewayConfig {
    pub fn default_artifact_dir() -> PathBuf {
        std::env::temp_dir().join("soma_camera")
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            utility: DEFAULT_UTILITY.to_string(),
            quality: DEFAULT_QUALITY,
            timeout: DEFAULT_TIMEOUT,
            artifact_dir: Self::default_artifact_dir(),
            cleanup_grace: DEFAULT_CLEANUP_GRACE,
        }
    }
}
