/// Read-through cache counters
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct CacheMetrics {
    fresh_hits: AtomicU64,
    gated_hits: AtomicU64,
    fetches: AtomicU64,
    fetch_failures: AtomicU64,
    stale_served: AtomicU64,
    unavailable: AtomicU64,
}

impl CacheMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_fresh_hit(&self) {
        self.fresh_hits.fetch_add(1, Ordering::Relaxed);
    }

    /// Hit on the re-check after waiting for the gate
    pub(crate) fn record_gated_hit(&self) {
        self.gated_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_fetch(&self) {
        self.fetches.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_fetch_failure(&self) {
        self.fetch_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_stale_served(&self) {
        self.stale_served.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_unavailable(&self) {
        self.unavailable.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> CacheStats {
        CacheStats {
            fresh_hits: self.fresh_hits.load(Ordering::Relaxed),
            gated_hits: self.gated_hits.load(Ordering::Relaxed),
            fetches: self.fetches.load(Ordering::Relaxed),
            fetch_failures: self.fetch_failures.load(Ordering::Relaxed),
            stale_served: self.stale_served.load(Ordering::Relaxed),
            unavailable: self.unavailable.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of the counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct CacheStats {
    pub fresh_hits: u64,
    pub gated_hits: u64,
    pub fetches: u64,
    pub fetch_failures: u64,
    pub stale_served: u64,
    pub unavailable: u64,
}

impl CacheStats {
    /// Share of reads answered without an upstream call
    pub fn hit_rate(&self) -> f64 {
        let hits = self.fresh_hits + self.gated_hits;
        let total = hits + self.fetches;
        if total == 0 {
            0.0
        } else {
            hits as f64 / total as f64
        }
    }
}
