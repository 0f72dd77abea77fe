//! Exclusive access to the camera
//!
//! The sensor handles one capture at a time. Every capture takes a
//! [`DeviceLease`] first; waiters are queued in arrival order (tokio's mutex
//! is FIFO-fair) and the lease is released when it is dropped, which covers
//! failures, timeouts and cancelled requests alike.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, OwnedMutexGuard};

#[derive(Debug, Default)]
pub struct DeviceLock {
    inner: Arc<Mutex<()>>,
    grants: AtomicU64,
}

impl DeviceLock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for the camera to become free.
    pub async fn acquire(&self) -> DeviceLease {
        let requested = Instant::now();
        let guard = Arc::clone(&self.inner).lock_owned().await;
        let seq = self.grants.fetch_add(1, Ordering::Relaxed) + 1;
        let waited = requested.elapsed();

        tracing::debug!(lease = seq, waited_ms = waited.as_millis() as u64, "Device lease acquired");

        DeviceLease {
            seq,
            acquired: Instant::now(),
            waited,
            _guard: guard,
        }
    }

    /// Total number of leases granted since startup.
    pub fn grants(&self) -> u64 {
        self.grants.load(Ordering::Relaxed)
    }

    pub fn is_held(&self) -> bool {
        self.inner.try_lock().is_err()
    }
}

/// Sole access to the camera until dropped.
#[derive(Debug)]
pub struct DeviceLease {
    seq: u64,
    acquired: Instant,
    waited: Duration,
    _guard: OwnedMutexGuard<()>,
}

impl DeviceLease {
    pub fn seq(&self) -> u64 {
        self.seq
    }

    /// Time spent queued behind other captures.
    pub fn waited(&self) -> Duration {
        self.waited
    }
}

impl Drop for DeviceLease {
    fn drop(&mut self) {
        tracing::debug!(
            lease = self.seq,
            held_ms = self.acquired.elapsed().as_millis() as u64,
            "Device lease released"
        );
    }
}
