//! Capture pipeline
//!
//! request → normalize → availability → device lease → artifact →
//! utility run → lease release → artifact read → cleanup (on drop)

use crate::artifact::{ArtifactStore, CleanupWorker};
use crate::command::{locate_utility, CaptureCommand};
use crate::config::GatewayConfig;
use crate::device::DeviceLock;
use crate::error::{CaptureError, Result};
use crate::invoker::{CaptureRunner, ProcessRunner};
use crate::metrics::{Metrics, MetricsSnapshot, Timer};
use crate::params::{normalize, CaptureParameters, CaptureRequest};
use crate::status::StatusReport;
use std::path::PathBuf;
use std::sync::Arc;

/// A finished capture, already read off disk.
#[derive(Debug, Clone)]
pub struct CapturedImage {
    pub bytes: Vec<u8>,
    pub params: CaptureParameters,
}

pub struct CaptureService {
    config: GatewayConfig,
    /// Resolved utility path; `None` when it was missing at startup.
    program: Option<PathBuf>,
    device: DeviceLock,
    store: ArtifactStore,
    runner: Arc<dyn CaptureRunner>,
    metrics: Arc<Metrics>,
}

impl CaptureService {
    /// Build the service around the real capture utility.
    pub fn from_config(config: GatewayConfig) -> Result<(Self, CleanupWorker)> {
        let program = locate_utility(&config.utility);
        let runner = Arc::new(ProcessRunner::new(config.timeout));
        Self::new(config, program, runner)
    }

    pub fn new(
        config: GatewayConfig,
        program: Option<PathBuf>,
        runner: Arc<dyn CaptureRunner>,
    ) -> Result<(Self, CleanupWorker)> {
        let (store, worker) = ArtifactStore::new(&config.artifact_dir, config.cleanup_grace)?;
        store.sweep_stale()?;

        tracing::info!(
            utility = %config.utility,
            available = program.is_some(),
            artifact_dir = %store.dir().display(),
            "Capture service initialized"
        );

        let service = Self {
            config,
            program,
            device: DeviceLock::new(),
            store,
            runner,
            metrics: Metrics::new(),
        };
        Ok((service, worker))
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    pub fn is_available(&self) -> bool {
        self.program.is_some()
    }

    pub fn device(&self) -> &DeviceLock {
        &self.device
    }

    pub fn store(&self) -> &ArtifactStore {
        &self.store
    }

    pub fn status(&self) -> StatusReport {
        StatusReport::new(&self.config.utility, self.is_available())
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics
            .snapshot(self.device.grants(), self.store.cleanup_stats())
    }

    /// Run one capture end to end.
    pub async fn capture(&self, request: &CaptureRequest) -> Result<CapturedImage> {
        let timer = Timer::new();
        let result = self.run_capture(request).await;
        let latency_ms = timer.elapsed_ms();
        self.metrics
            .record_capture(result.as_ref().map(|_| ()), latency_ms);

        match &result {
            Ok(image) => tracing::info!(
                size = image.bytes.len(),
                latency_ms = latency_ms,
                "Capture complete"
            ),
            Err(e) => tracing::warn!(
                kind = e.kind(),
                error = %e,
                latency_ms = latency_ms,
                "Capture rejected"
            ),
        }
        result
    }

    async fn run_capture(&self, request: &CaptureRequest) -> Result<CapturedImage> {
        let params = normalize(request)?;

        let program = self
            .program
            .as_ref()
            .ok_or_else(|| CaptureError::Unavailable(self.config.utility.clone()))?;

        let lease = self.device.acquire().await;
        let artifact = self.store.allocate()?;
        let command = CaptureCommand::build(program, self.config.quality, artifact.path(), &params);

        tracing::info!(
            lease = lease.seq(),
            waited_ms = lease.waited().as_millis() as u64,
            command = %command.display_line(),
            "Starting capture"
        );

        let outcome = self.runner.run(&command).await;
        drop(lease);
        outcome?;

        if artifact.size().await == 0 {
            return Err(CaptureError::execution(
                "capture failed",
                "capture utility exited successfully but produced no output",
            ));
        }

        let bytes = artifact.read().await?;
        if !infer::image::is_jpeg(&bytes) {
            tracing::warn!(
                mime = infer::get(&bytes).map(|t| t.mime_type()).unwrap_or("unknown"),
                "Capture output is not a JPEG"
            );
        }

        Ok(CapturedImage { bytes, params })
    }
}
