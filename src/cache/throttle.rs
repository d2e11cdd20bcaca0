/// Fixed pacing for providers with a strict shared quota
///
/// `pace()` is awaited after every completed upstream call while the caller
/// still holds the provider's gate slot. Combined with a global gate scope
/// this keeps the aggregate call rate under `1 / interval`.
use crate::logger::{self, LogTag};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Throttle {
    provider: String,
    interval: Duration,
    paced_calls: Arc<AtomicU64>,
}

impl Throttle {
    pub fn new(provider: &str, interval: Duration) -> Self {
        Self {
            provider: provider.to_string(),
            interval,
            paced_calls: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Pacing derived from a calls-per-minute quota
    pub fn per_minute(provider: &str, max_per_minute: u32) -> Self {
        let interval = if max_per_minute > 0 {
            Duration::from_secs_f64(60.0 / max_per_minute as f64)
        } else {
            Duration::ZERO
        };
        Self::new(provider, interval)
    }

    /// `None` when pacing is disabled
    pub fn from_millis(provider: &str, pacing_ms: u64) -> Option<Self> {
        (pacing_ms > 0).then(|| Self::new(provider, Duration::from_millis(pacing_ms)))
    }

    pub async fn pace(&self) {
        if self.interval.is_zero() {
            return;
        }
        self.paced_calls.fetch_add(1, Ordering::Relaxed);
        logger::verbose(
            LogTag::Throttle,
            &format!("Pacing {} for {}ms", self.provider, self.interval.as_millis()),
        );
        tokio::time::sleep(self.interval).await;
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn paced_calls(&self) -> u64 {
        self.paced_calls.load(Ordering::Relaxed)
    }
}
