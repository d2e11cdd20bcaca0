//! Resilient read-through cache
//!
//! Building blocks, bottom-up:
//! - [`key`]: canonical cache keys
//! - [`policy`]: TTL classes resolved from config
//! - [`store`]: dual-tier (fresh/stale) type-erased store
//! - [`gate`]: single-flight mutual exclusion per key or per provider
//! - [`throttle`]: fixed pacing for quota-bound providers
//! - [`retry`]: failure-classified retries with exponential backoff
//! - [`read_through`]: the orchestrator tying it all together

pub mod gate;
pub mod key;
pub mod metrics;
pub mod policy;
pub mod read_through;
pub mod retry;
pub mod store;
pub mod throttle;

pub use gate::{GateGuard, GateScope, SingleFlightGate};
pub use key::{normalize_list, CacheKey};
pub use metrics::{CacheMetrics, CacheStats};
pub use policy::{TtlPolicy, TtlSettings};
pub use read_through::{CacheRead, Freshness, ReadThroughCache, Upstream};
pub use retry::{FetchAttempt, RetryExecutor, RetryPolicy};
pub use store::{CacheEntry, DualTierStore, TierStore};
pub use throttle::Throttle;
