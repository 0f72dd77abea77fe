//! Capture utility execution
//!
//! [`CaptureRunner`] is the seam between the pipeline and the outside world;
//! [`ProcessRunner`] spawns the real utility, tests substitute their own.

use crate::command::CaptureCommand;
use crate::error::{CaptureError, Result};
use async_trait::async_trait;
use std::process::Stdio;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::time::Instant;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Runs one capture command to completion.
///
/// `Ok(())` means the utility reported success. Checking that the output
/// file actually materialized is left to the caller.
#[async_trait]
pub trait CaptureRunner: Send + Sync {
    async fn run(&self, command: &CaptureCommand) -> Result<()>;
}

/// Spawns the capture utility as a child process with a hard deadline.
pub struct ProcessRunner {
    timeout: Duration,
}

impl ProcessRunner {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

impl Default for ProcessRunner {
    fn default() -> Self {
        Self::new(DEFAULT_TIMEOUT)
    }
}

#[async_trait]
impl CaptureRunner for ProcessRunner {
    async fn run(&self, command: &CaptureCommand) -> Result<()> {
        // kill_on_drop covers the paths where this future is dropped early
        let mut child = command
            .to_tokio()
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                CaptureError::execution(
                    "capture failed",
                    format!("failed to spawn {}: {}", command.program().display(), e),
                )
            })?;

        tracing::debug!(pid = ?child.id(), command = %command.display_line(), "Capture utility started");

        // Drain stderr concurrently so a chatty utility never blocks on a full pipe.
        // Bytes land in a shared buffer so a cut-off drain still reports them.
        let collected = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&collected);
        let stderr_pipe = child.stderr.take();
        let mut stderr_task = tokio::spawn(async move {
            let Some(mut pipe) = stderr_pipe else { return };
            let mut chunk = [0u8; 4096];
            loop {
                match pipe.read(&mut chunk).await {
                    Ok(0) | Err(_) => break,
                    Ok(n) => {
                        if let Ok(mut buf) = sink.lock() {
                            buf.extend_from_slice(&chunk[..n]);
                        }
                    }
                }
            }
        });

        // One deadline bounds both the wait and the stderr drain
        let deadline = Instant::now() + self.timeout;

        let status = match tokio::time::timeout_at(deadline, child.wait()).await {
            Ok(Ok(status)) => status,
            Ok(Err(e)) => {
                stderr_task.abort();
                return Err(CaptureError::execution("capture failed", e.to_string()));
            }
            Err(_) => {
                if let Err(e) = child.kill().await {
                    tracing::warn!(error = %e, "Failed to kill capture utility after timeout");
                }
                stderr_task.abort();
                tracing::warn!(
                    timeout_sec = self.timeout.as_secs_f64(),
                    command = %command.display_line(),
                    "Capture utility timed out, process killed"
                );
                return Err(CaptureError::Timeout(self.timeout));
            }
        };

        // A background process that inherited stderr can keep the pipe open
        // after the utility exited
        if tokio::time::timeout_at(deadline, &mut stderr_task).await.is_err() {
            stderr_task.abort();
            tracing::warn!(
                command = %command.display_line(),
                "Stderr of capture utility still open at deadline, using partial output"
            );
        }
        let stderr = collected
            .lock()
            .map(|mut buf| std::mem::take(&mut *buf))
            .unwrap_or_default();

        if !status.success() {
            let details = String::from_utf8_lossy(&stderr).trim().to_string();
            tracing::warn!(status = %status, details = %details, "Capture utility failed");
            return Err(CaptureError::execution("capture failed", details));
        }

        Ok(())
    }
}
