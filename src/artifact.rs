//! Temporary capture artifacts
//!
//! Each capture writes into its own freshly created file. The file is owned
//! by a [`CaptureArtifact`] handle; dropping the handle queues the file for
//! removal on the [`CleanupWorker`] after a short grace period. Every exit
//! path of a request therefore ends in cleanup without any explicit call.

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;

pub const ARTIFACT_PREFIX: &str = "capture-";
pub const ARTIFACT_SUFFIX: &str = ".jpg";
pub const DEFAULT_CLEANUP_GRACE: Duration = Duration::from_millis(500);

const REMOVE_ATTEMPTS: u32 = 3;
const RETRY_DELAY: Duration = Duration::from_millis(100);

#[derive(Debug)]
struct CleanupJob {
    path: PathBuf,
    due: Instant,
}

#[derive(Debug, Default)]
pub struct CleanupStats {
    queued: AtomicU64,
    removed: AtomicU64,
    already_gone: AtomicU64,
    failed: AtomicU64,
}

impl CleanupStats {
    pub fn snapshot(&self) -> CleanupSnapshot {
        let queued = self.queued.load(Ordering::Relaxed);
        let removed = self.removed.load(Ordering::Relaxed);
        let already_gone = self.already_gone.load(Ordering::Relaxed);
        let failed = self.failed.load(Ordering::Relaxed);

        CleanupSnapshot {
            removed,
            already_gone,
            failed,
            pending: queued.saturating_sub(removed + already_gone + failed),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleanupSnapshot {
    pub removed: u64,
    pub already_gone: u64,
    pub failed: u64,
    pub pending: u64,
}

/// Allocates per-request artifact files inside one directory.
pub struct ArtifactStore {
    dir: PathBuf,
    grace: Duration,
    cleanup: mpsc::UnboundedSender<CleanupJob>,
    stats: Arc<CleanupStats>,
}

impl ArtifactStore {
    /// Create the store and its cleanup worker. The worker must be spawned
    /// by the caller (`tokio::spawn(worker.run(shutdown))`).
    pub fn new(dir: impl Into<PathBuf>, grace: Duration) -> Result<(Self, CleanupWorker)> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;

        let (tx, rx) = mpsc::unbounded_channel();
        let stats = Arc::new(CleanupStats::default());

        let store = Self {
            dir,
            grace,
            cleanup: tx,
            stats: Arc::clone(&stats),
        };
        let worker = CleanupWorker { rx, stats };

        Ok((store, worker))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Create a new, uniquely named, empty artifact file.
    ///
    /// The file is created with exclusive-create semantics, so two requests
    /// can never be handed the same path.
    pub fn allocate(&self) -> Result<CaptureArtifact> {
        let file = tempfile::Builder::new()
            .prefix(ARTIFACT_PREFIX)
            .suffix(ARTIFACT_SUFFIX)
            .rand_bytes(12)
            .tempfile_in(&self.dir)?;
        let path = file
            .into_temp_path()
            .keep()
            .map_err(|e| e.error)?;

        self.stats.queued.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(path = %path.display(), "Artifact allocated");

        Ok(CaptureArtifact {
            path,
            grace: self.grace,
            cleanup: self.cleanup.clone(),
            stats: Arc::clone(&self.stats),
        })
    }

    /// Remove leftovers from an earlier run that never got cleaned up.
    pub fn sweep_stale(&self) -> Result<usize> {
        let mut removed = 0;
        for entry in std::fs::read_dir(&self.dir)? {
            let entry = entry?;
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if !(name.starts_with(ARTIFACT_PREFIX) && name.ends_with(ARTIFACT_SUFFIX)) {
                continue;
            }
            match std::fs::remove_file(entry.path()) {
                Ok(()) => removed += 1,
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => {
                    tracing::warn!(path = %entry.path().display(), error = %e, "Failed to remove stale artifact");
                }
            }
        }
        if removed > 0 {
            tracing::info!(count = removed, dir = %self.dir.display(), "Removed stale artifacts");
        }
        Ok(removed)
    }

    pub fn cleanup_stats(&self) -> CleanupSnapshot {
        self.stats.snapshot()
    }
}

/// One request's temp file. Dropping it schedules removal.
#[derive(Debug)]
pub struct CaptureArtifact {
    path: PathBuf,
    grace: Duration,
    cleanup: mpsc::UnboundedSender<CleanupJob>,
    stats: Arc<CleanupStats>,
}

impl CaptureArtifact {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Size of the artifact on disk; a missing file reads as zero.
    pub async fn size(&self) -> u64 {
        tokio::fs::metadata(&self.path)
            .await
            .map(|m| m.len())
            .unwrap_or(0)
    }

    pub async fn read(&self) -> Result<Vec<u8>> {
        Ok(tokio::fs::read(&self.path).await?)
    }
}

impl Drop for CaptureArtifact {
    fn drop(&mut self) {
        let job = CleanupJob {
            path: std::mem::take(&mut self.path),
            due: Instant::now() + self.grace,
        };
        if let Err(mpsc::error::SendError(job)) = self.cleanup.send(job) {
            // Worker is gone (shutdown), remove inline
            record(&self.stats, &job.path, std::fs::remove_file(&job.path));
        }
    }
}

/// Background task that removes artifacts once their grace period elapsed.
pub struct CleanupWorker {
    rx: mpsc::UnboundedReceiver<CleanupJob>,
    stats: Arc<CleanupStats>,
}

impl CleanupWorker {
    /// Process cleanup jobs until every sender is gone or `shutdown`
    /// resolves.
    ///
    /// Jobs arrive in due order, so they are handled one after another. Once
    /// every sender is gone, jobs still queued are removed at their due time
    /// before the worker exits. On shutdown the queue is closed and whatever
    /// is left is removed right away, without waiting for the grace period.
    pub async fn run(mut self, shutdown: impl Future<Output = ()>) {
        tokio::pin!(shutdown);
        loop {
            let job = tokio::select! {
                job = self.rx.recv() => match job {
                    Some(job) => job,
                    None => break,
                },
                _ = &mut shutdown => {
                    self.drain().await;
                    break;
                }
            };

            tokio::select! {
                _ = tokio::time::sleep_until(job.due) => {}
                _ = &mut shutdown => {
                    self.remove(&job.path).await;
                    self.drain().await;
                    break;
                }
            }
            self.remove(&job.path).await;
        }
        tracing::debug!("Cleanup worker stopped");
    }

    async fn drain(&mut self) {
        self.rx.close();
        while let Ok(job) = self.rx.try_recv() {
            self.remove(&job.path).await;
        }
    }

    async fn remove(&self, path: &Path) {
        let mut attempt = 1;
        loop {
            let result = tokio::fs::remove_file(path).await;
            let retry = matches!(&result, Err(e) if e.kind() != ErrorKind::NotFound);
            if !retry || attempt >= REMOVE_ATTEMPTS {
                record(&self.stats, path, result);
                return;
            }
            attempt += 1;
            tokio::time::sleep(RETRY_DELAY).await;
        }
    }
}

fn record(stats: &CleanupStats, path: &Path, result: std::io::Result<()>) {
    match result {
        Ok(()) => {
            stats.removed.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(path = %path.display(), "Artifact removed");
        }
        Err(e) if e.kind() == ErrorKind::NotFound => {
            stats.already_gone.fetch_add(1, Ordering::Relaxed);
        }
        Err(e) => {
            stats.failed.fetch_add(1, Ordering::Relaxed);
            tracing::error!(path = %path.display(), error = %e, "Failed to remove artifact");
        }
    }
}
