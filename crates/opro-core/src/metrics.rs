//! Process-wide model-call usage counters.
//!
//! A side-channel observability sink, deliberately decoupled from the
//! optimization state machine: nothing in the loop depends on these
//! values for correctness.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Point-in-time view of the usage counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UsageSnapshot {
    /// Total model-call requests issued (including retried attempts)
    pub requests: u64,
    /// Requests that ended in an error
    pub request_failures: u64,
}

/// Shared request/failure counters for model calls.
#[derive(Debug, Default)]
pub struct UsageMetrics {
    requests: AtomicU64,
    request_failures: AtomicU64,
}

impl UsageMetrics {
    /// Creates a fresh shared handle.
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn record_request(&self) {
        self.requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failure(&self) {
        self.request_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn read(&self) -> UsageSnapshot {
        UsageSnapshot {
            requests: self.requests.load(Ordering::Relaxed),
            request_failures: self.request_failures.load(Ordering::Relaxed),
        }
    }

    pub fn reset(&self) {
        self.requests.store(0, Ordering::Relaxed);
        self.request_failures.store(0, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_and_read() {
        let metrics = UsageMetrics::default();
        metrics.record_request();
        metrics.record_request();
        metrics.record_failure();

        let snap = metrics.read();
        assert_eq!(snap.requests, 2);
        assert_eq!(snap.request_failures, 1);
    }

    #[test]
    fn test_reset() {
        let metrics = UsageMetrics::default();
        metrics.record_request();
        metrics.reset();
        assert_eq!(metrics.read(), UsageSnapshot { requests: 0, request_failures: 0 });
    }
}
