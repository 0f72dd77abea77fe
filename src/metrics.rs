//! Metrics and observability for soma_camera

use crate::artifact::CleanupSnapshot;
use crate::error::CaptureError;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Capture outcome counters
#[derive(Debug, Default)]
pub struct Metrics {
    pub total_captures: AtomicU64,
    pub successful_captures: AtomicU64,
    pub total_latency_ms: AtomicU64,

    // Per-failure counters
    pub validation_failures: AtomicU64,
    pub unavailable_failures: AtomicU64,
    pub execution_failures: AtomicU64,
    pub timeouts: AtomicU64,
    pub io_failures: AtomicU64,
}

impl Metrics {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn record_capture(&self, outcome: Result<(), &CaptureError>, latency_ms: u64) {
        self.total_captures.fetch_add(1, Ordering::Relaxed);
        self.total_latency_ms.fetch_add(latency_ms, Ordering::Relaxed);

        let counter = match outcome {
            Ok(()) => &self.successful_captures,
            Err(CaptureError::Validation(_)) => &self.validation_failures,
            Err(CaptureError::Unavailable(_)) => &self.unavailable_failures,
            Err(CaptureError::Execution { .. }) => &self.execution_failures,
            Err(CaptureError::Timeout(_)) => &self.timeouts,
            Err(CaptureError::Io(_)) => &self.io_failures,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self, lease_grants: u64, cleanup: CleanupSnapshot) -> MetricsSnapshot {
        let total = self.total_captures.load(Ordering::Relaxed);
        let successful = self.successful_captures.load(Ordering::Relaxed);
        let total_latency = self.total_latency_ms.load(Ordering::Relaxed);
        let failed = total.saturating_sub(successful);

        MetricsSnapshot {
            total_captures: total,
            successful_captures: successful,
            failed_captures: failed,
            error_rate: if total > 0 { failed as f64 / total as f64 } else { 0.0 },
            avg_latency_ms: if total > 0 { total_latency / total } else { 0 },
            failures: FailureMetrics {
                validation: self.validation_failures.load(Ordering::Relaxed),
                unavailable: self.unavailable_failures.load(Ordering::Relaxed),
                execution: self.execution_failures.load(Ordering::Relaxed),
                timeout: self.timeouts.load(Ordering::Relaxed),
                io: self.io_failures.load(Ordering::Relaxed),
            },
            lease_grants,
            cleanup,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub total_captures: u64,
    pub successful_captures: u64,
    pub failed_captures: u64,
    pub error_rate: f64,
    pub avg_latency_ms: u64,
    pub failures: FailureMetrics,
    pub lease_grants: u64,
    pub cleanup: CleanupSnapshot,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailureMetrics {
    pub validation: u64,
    pub unavailable: u64,
    pub execution: u64,
    pub timeout: u64,
    pub io: u64,
}

/// Timer for tracking operation latency
pub struct Timer {
    start: Instant,
}

impl Timer {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn no_cleanup() -> CleanupSnapshot {
        CleanupSnapshot {
            removed: 0,
            already_gone: 0,
            failed: 0,
            pending: 0,
        }
    }

    #[test]
    fn test_record_outcomes() {
        let metrics = Metrics::new();
        metrics.record_capture(Ok(()), 100);
        metrics.record_capture(Err(&CaptureError::validation("invalid gain value")), 0);
        metrics.record_capture(Err(&CaptureError::Timeout(Duration::from_secs(30))), 200);

        let snap = metrics.snapshot(2, no_cleanup());
        assert_eq!(snap.total_captures, 3);
        assert_eq!(snap.successful_captures, 1);
        assert_eq!(snap.failed_captures, 2);
        assert_eq!(snap.failures.validation, 1);
        assert_eq!(snap.failures.timeout, 1);
        assert_eq!(snap.avg_latency_ms, 100);
        assert_eq!(snap.lease_grants, 2);
    }

    #[test]
    fn test_empty_snapshot() {
        let snap = Metrics::default().snapshot(0, no_cleanup());
        assert_eq!(snap.error_rate, 0.0);
        assert_eq!(snap.avg_latency_ms, 0);
    }
}
