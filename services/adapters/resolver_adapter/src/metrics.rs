//! Resolution counters

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Counters shared by every processor of one adapter
#[derive(Debug, Default)]
pub struct ResolverMetrics {
    resolved: AtomicU64,
    unavailable: AtomicU64,
    rejected: AtomicU64,
    fatal_failures: AtomicU64,
    exhausted_retries: AtomicU64,
    cancelled: AtomicU64,
}

/// Point-in-time copy of [`ResolverMetrics`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub resolved: u64,
    pub unavailable: u64,
    pub rejected: u64,
    pub fatal_failures: u64,
    pub exhausted_retries: u64,
    pub cancelled: u64,
    /// Admission entries removed by deadline rather than release
    pub evicted: u64,
}

impl ResolverMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_resolved(&self) {
        self.resolved.fetch_add(1, Ordering::Relaxed);
    }

    /// Resolution ended without a record (nothing found, or degraded failure)
    pub fn record_unavailable(&self) {
        self.unavailable.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rejected(&self) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_fatal(&self) {
        self.fatal_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_exhausted(&self) {
        self.exhausted_retries.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cancelled(&self) {
        self.cancelled.fetch_add(1, Ordering::Relaxed);
    }

    /// Copy the counters; `evicted` is left at zero for the queue owner to fill
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            resolved: self.resolved.load(Ordering::Relaxed),
            unavailable: self.unavailable.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            fatal_failures: self.fatal_failures.load(Ordering::Relaxed),
            exhausted_retries: self.exhausted_retries.load(Ordering::Relaxed),
            cancelled: self.cancelled.load(Ordering::Relaxed),
            evicted: 0,
        }
    }
}
