//! Read-through orchestrator
//!
//! `get` serves the fresh tier when it can, otherwise takes the key's gate
//! slot, re-checks the fresh tier and only then calls upstream through the
//! retry executor. Terminal failures fall back to the stale tier regardless
//! of its expiry.
//!
//! The gated section runs in its own task and hands its result back over a
//! oneshot channel before pacing the provider. The caller gets the value at
//! once while the slot stays held for the pacing interval, so the next caller
//! of that provider waits instead. Dropping a caller's future only detaches it
//! from the result; the fetch still completes and populates both tiers for
//! whoever asks next.

use super::gate::{GateScope, SingleFlightGate};
use super::metrics::{CacheMetrics, CacheStats};
use super::retry::{RetryExecutor, RetryPolicy};
use super::store::DualTierStore;
use super::throttle::Throttle;
use crate::errors::{CacheError, CacheResult, FailureKind, FetchError, FetchResult};
use crate::logger::{self, LogTag};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;

// =============================================================================
// READ RESULT
// =============================================================================

/// Where a returned value came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Freshness {
    /// Unexpired fresh-tier entry
    Fresh,
    /// Fetched from upstream by this call
    Fetched,
    /// Stale-tier fallback after the upstream failed
    Stale,
}

impl Freshness {
    pub fn as_str(&self) -> &'static str {
        match self {
            Freshness::Fresh => "fresh",
            Freshness::Fetched => "fetched",
            Freshness::Stale => "stale",
        }
    }
}

#[derive(Debug)]
pub struct CacheRead<T> {
    pub value: Arc<T>,
    pub freshness: Freshness,
}

impl<T> CacheRead<T> {
    pub fn new(value: Arc<T>, freshness: Freshness) -> Self {
        Self { value, freshness }
    }

    pub fn is_stale(&self) -> bool {
        self.freshness == Freshness::Stale
    }

    /// Derive a new value while keeping the freshness tag
    pub fn map<U>(self, f: impl FnOnce(&T) -> U) -> CacheRead<U> {
        CacheRead {
            value: Arc::new(f(&self.value)),
            freshness: self.freshness,
        }
    }
}

impl<T> Clone for CacheRead<T> {
    fn clone(&self) -> Self {
        Self {
            value: Arc::clone(&self.value),
            freshness: self.freshness,
        }
    }
}

impl<T> std::ops::Deref for CacheRead<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.value
    }
}

// =============================================================================
// UPSTREAM PROFILE
// =============================================================================

/// Per-provider gate granularity, retry tuning and pacing
#[derive(Debug, Clone)]
pub struct Upstream {
    pub name: String,
    pub scope: GateScope,
    pub retry: RetryPolicy,
    pub throttle: Option<Throttle>,
}

impl Upstream {
    pub fn new(name: &str, retry: RetryPolicy) -> Self {
        Self {
            name: name.to_string(),
            scope: GateScope::PerKey,
            retry,
            throttle: None,
        }
    }

    /// Serialize every key of this provider through one gate slot
    pub fn globally_serialized(mut self) -> Self {
        self.scope = GateScope::Global(format!("upstream:{}", self.name));
        self
    }

    pub fn with_throttle(mut self, throttle: Option<Throttle>) -> Self {
        self.throttle = throttle;
        self
    }

    fn executor(&self) -> RetryExecutor {
        RetryExecutor::new(&self.name, self.retry.clone()).with_throttle(self.throttle.clone())
    }
}

// =============================================================================
// ORCHESTRATOR
// =============================================================================

#[derive(Clone)]
pub struct ReadThroughCache {
    store: Arc<DualTierStore>,
    gate: SingleFlightGate,
    metrics: Arc<CacheMetrics>,
    stale_on_fatal: bool,
}

impl ReadThroughCache {
    pub fn new(stale_on_fatal: bool) -> Self {
        Self::with_store(Arc::new(DualTierStore::new()), stale_on_fatal)
    }

    pub fn with_store(store: Arc<DualTierStore>, stale_on_fatal: bool) -> Self {
        Self {
            store,
            gate: SingleFlightGate::new(),
            metrics: Arc::new(CacheMetrics::new()),
            stale_on_fatal,
        }
    }

    pub fn store(&self) -> &Arc<DualTierStore> {
        &self.store
    }

    pub fn gate(&self) -> &SingleFlightGate {
        &self.gate
    }

    pub fn stats(&self) -> CacheStats {
        self.metrics.snapshot()
    }

    /// Read `key` through the cache, fetching from `upstream` on a miss
    pub async fn get<T, F, Fut>(
        &self,
        key: &str,
        fresh_ttl: Duration,
        stale_ttl: Duration,
        upstream: &Arc<Upstream>,
        fetch: F,
    ) -> CacheResult<CacheRead<T>>
    where
        T: Send + Sync + 'static,
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = FetchResult<T>> + Send + 'static,
    {
        if let Some(entry) = self.store.fresh().get::<T>(key) {
            self.metrics.record_fresh_hit();
            logger::verbose(LogTag::Cache, &format!("Fresh hit for {}", key));
            return Ok(CacheRead::new(entry.value, Freshness::Fresh));
        }

        let (reply, result) = oneshot::channel();
        tokio::spawn(Self::fetch_gated(
            Arc::clone(&self.store),
            self.gate.clone(),
            Arc::clone(&self.metrics),
            Arc::clone(upstream),
            key.to_string(),
            fresh_ttl,
            stale_ttl,
            fetch,
            reply,
        ));

        let error = match result.await {
            Ok(Ok(read)) => return Ok(read),
            Ok(Err(error)) => error,
            // Sender dropped without a reply: the fetch panicked
            Err(_) => FetchError::transient(format!("fetch task for {} aborted", key)),
        };

        self.metrics.record_fetch_failure();
        self.fall_back(key, &upstream.name, error)
    }

    #[allow(clippy::too_many_arguments)]
    async fn fetch_gated<T, F, Fut>(
        store: Arc<DualTierStore>,
        gate: SingleFlightGate,
        metrics: Arc<CacheMetrics>,
        upstream: Arc<Upstream>,
        key: String,
        fresh_ttl: Duration,
        stale_ttl: Duration,
        fetch: F,
        reply: oneshot::Sender<FetchResult<CacheRead<T>>>,
    ) where
        T: Send + Sync + 'static,
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = FetchResult<T>> + Send + 'static,
    {
        let _slot = gate.acquire(upstream.scope.slot_for(&key)).await;

        // Whoever held the slot before us may have filled this key already
        if let Some(entry) = store.fresh().get::<T>(&key) {
            metrics.record_gated_hit();
            logger::debug(
                LogTag::Gate,
                &format!("{} populated while waiting for the gate", key),
            );
            let _ = reply.send(Ok(CacheRead::new(entry.value, Freshness::Fresh)));
            return;
        }

        metrics.record_fetch();
        logger::debug(
            LogTag::Cache,
            &format!("Miss for {}, fetching from {}", key, upstream.name),
        );

        let result = upstream.executor().run(fetch).await.map(|value| {
            let value = Arc::new(value);
            store.record(&key, Arc::clone(&value), fresh_ttl, stale_ttl);
            CacheRead::new(value, Freshness::Fetched)
        });

        // A detached caller is fine, the store already holds the value
        let _ = reply.send(result);

        if let Some(throttle) = &upstream.throttle {
            throttle.pace().await;
        }
    }

    fn fall_back<T>(&self, key: &str, provider: &str, error: FetchError) -> CacheResult<CacheRead<T>>
    where
        T: Send + Sync + 'static,
    {
        if error.kind() == FailureKind::Fatal && !self.stale_on_fatal {
            logger::error(
                LogTag::Cache,
                &format!("{} rejected by {}: {}", key, provider, error),
            );
            return Err(CacheError::Rejected {
                key: key.to_string(),
                cause: error,
            });
        }

        if let Some(entry) = self.store.stale().get_any_age::<T>(key) {
            self.metrics.record_stale_served();
            logger::info(
                LogTag::Cache,
                &format!(
                    "Serving stale {} (age {}s) after {} failure: {}",
                    key,
                    entry.age().as_secs(),
                    error.kind(),
                    error
                ),
            );
            return Ok(CacheRead::new(entry.value, Freshness::Stale));
        }

        self.metrics.record_unavailable();
        logger::error(
            LogTag::Cache,
            &format!("No data available for {}: {}", key, error),
        );
        Err(CacheError::Unavailable {
            key: key.to_string(),
            cause: error,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const FRESH: Duration = Duration::from_secs(120);
    const STALE: Duration = Duration::from_secs(3600);

    fn upstream(max_retries: u32) -> Arc<Upstream> {
        Arc::new(Upstream::new(
            "test",
            RetryPolicy {
                max_retries,
                base_delay: Duration::from_millis(500),
                rate_limit_base_delay: Duration::from_secs(2),
                max_rate_limit_retries: 1,
                max_delay: Duration::from_secs(30),
                jitter: 0.0,
                call_timeout: Some(Duration::from_secs(10)),
            },
        ))
    }

    /// Counts calls, answers with `value` once `failures` transient errors were returned
    fn counting_fetch(
        calls: Arc<AtomicUsize>,
        failures: usize,
        value: &'static str,
    ) -> impl FnMut() -> std::pin::Pin<Box<dyn Future<Output = FetchResult<String>> + Send>>
           + Send
           + 'static {
        move || {
            let calls = Arc::clone(&calls);
            Box::pin(async move {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                if n < failures {
                    Err(FetchError::transient("connection reset"))
                } else {
                    Ok(value.to_string())
                }
            })
        }
    }

    fn always_failing(
        calls: Arc<AtomicUsize>,
        error: FetchError,
    ) -> impl FnMut() -> std::pin::Pin<Box<dyn Future<Output = FetchResult<String>> + Send>>
           + Send
           + 'static {
        move || {
            calls.fetch_add(1, Ordering::SeqCst);
            let error = error.clone();
            Box::pin(async move { Err(error) })
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_fresh_hit_skips_fetch() {
        let cache = ReadThroughCache::new(true);
        cache
            .store()
            .record("trending", Arc::new("cached".to_string()), FRESH, STALE);

        let calls = Arc::new(AtomicUsize::new(0));
        let read = cache
            .get("trending", FRESH, STALE, &upstream(3), counting_fetch(calls.clone(), 0, "new"))
            .await
            .unwrap();

        assert_eq!(read.value.as_str(), "cached");
        assert_eq!(read.freshness, Freshness::Fresh);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(cache.stats().fresh_hits, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_misses_fetch_once() {
        let cache = ReadThroughCache::new(true);
        let up = upstream(3);
        let calls = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..10 {
            let cache = cache.clone();
            let up = Arc::clone(&up);
            let calls = Arc::clone(&calls);
            handles.push(tokio::spawn(async move {
                cache
                    .get("coins_list?page=1", FRESH, STALE, &up, move || {
                        let calls = Arc::clone(&calls);
                        async move {
                            calls.fetch_add(1, Ordering::SeqCst);
                            tokio::time::sleep(Duration::from_millis(200)).await;
                            Ok::<_, FetchError>("V".to_string())
                        }
                    })
                    .await
            }));
        }

        for result in futures::future::join_all(handles).await {
            let read = result.unwrap().unwrap();
            assert_eq!(read.value.as_str(), "V");
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let stats = cache.stats();
        assert_eq!(stats.fetches, 1);
        assert_eq!(stats.fresh_hits + stats.gated_hits, 9);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_fallback_after_failure() {
        let cache = ReadThroughCache::new(true);
        let up = upstream(2);
        let calls = Arc::new(AtomicUsize::new(0));

        cache
            .get("market_overview", FRESH, STALE, &up, counting_fetch(calls.clone(), 0, "old"))
            .await
            .unwrap();

        tokio::time::advance(FRESH + Duration::from_secs(1)).await;

        let read = cache
            .get(
                "market_overview",
                FRESH,
                STALE,
                &up,
                always_failing(calls.clone(), FetchError::transient("timeout")),
            )
            .await
            .unwrap();

        assert_eq!(read.value.as_str(), "old");
        assert!(read.is_stale());
        // 1 success + 3 failed attempts
        assert_eq!(calls.load(Ordering::SeqCst), 4);
        assert_eq!(cache.stats().stale_served, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_fallback_when_rate_limited() {
        let cache = ReadThroughCache::new(true);
        cache
            .store()
            .stale()
            .set("top_movers?direction=gainers&limit=10", Arc::new("old".to_string()), STALE);

        let calls = Arc::new(AtomicUsize::new(0));
        let read = cache
            .get(
                "top_movers?direction=gainers&limit=10",
                FRESH,
                STALE,
                &upstream(3),
                always_failing(calls.clone(), FetchError::rate_limited("test")),
            )
            .await
            .unwrap();

        assert_eq!(read.value.as_str(), "old");
        assert_eq!(read.freshness, Freshness::Stale);
        // max_rate_limit_retries = 1, transient budget untouched
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(cache.stats().stale_served, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_served_past_its_own_expiry() {
        let cache = ReadThroughCache::new(true);
        cache
            .store()
            .record("search?query=btc", Arc::new("old".to_string()), FRESH, STALE);

        tokio::time::advance(STALE * 2).await;

        let calls = Arc::new(AtomicUsize::new(0));
        let read = cache
            .get(
                "search?query=btc",
                FRESH,
                STALE,
                &upstream(0),
                always_failing(calls, FetchError::transient("reset")),
            )
            .await
            .unwrap();

        assert_eq!(read.value.as_str(), "old");
        assert_eq!(read.freshness, Freshness::Stale);
    }

    #[tokio::test(start_paused = true)]
    async fn test_total_failure_is_unavailable() {
        let cache = ReadThroughCache::new(true);
        let calls = Arc::new(AtomicUsize::new(0));

        let err = cache
            .get(
                "trending",
                FRESH,
                STALE,
                &upstream(1),
                always_failing(calls.clone(), FetchError::transient("reset")),
            )
            .await
            .unwrap_err();

        assert!(err.is_unavailable());
        assert_eq!(err.key(), "trending");
        assert_eq!(err.cause().kind(), FailureKind::Transient);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(cache.store().stale().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_entry_triggers_refetch() {
        let cache = ReadThroughCache::new(true);
        let up = upstream(0);
        let calls = Arc::new(AtomicUsize::new(0));

        let first = cache
            .get("coin_basic?id=bitcoin", FRESH, STALE, &up, counting_fetch(calls.clone(), 0, "v1"))
            .await
            .unwrap();
        assert_eq!(first.freshness, Freshness::Fetched);

        tokio::time::advance(FRESH).await;
        assert!(!cache.store().fresh().contains_fresh("coin_basic?id=bitcoin"));

        let second = cache
            .get("coin_basic?id=bitcoin", FRESH, STALE, &up, counting_fetch(calls.clone(), 0, "v2"))
            .await
            .unwrap();

        assert_eq!(second.value.as_str(), "v2");
        assert_eq!(second.freshness, Freshness::Fetched);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_two_failures_then_success_populates_both_tiers() {
        let cache = ReadThroughCache::new(true);
        let calls = Arc::new(AtomicUsize::new(0));

        let read = cache
            .get(
                "price_history?days=7&id=bitcoin",
                Duration::from_secs(120),
                Duration::from_secs(3600),
                &upstream(3),
                counting_fetch(calls.clone(), 2, "V"),
            )
            .await
            .unwrap();

        assert_eq!(read.value.as_str(), "V");
        assert_eq!(calls.load(Ordering::SeqCst), 3);

        let fresh = cache
            .store()
            .fresh()
            .get::<String>("price_history?days=7&id=bitcoin")
            .unwrap();
        let stale = cache
            .store()
            .stale()
            .get::<String>("price_history?days=7&id=bitcoin")
            .unwrap();
        assert_eq!(fresh.value.as_str(), "V");
        assert_eq!(stale.value.as_str(), "V");
        assert!(stale.expires_at > fresh.expires_at);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fatal_rejected_when_stale_on_fatal_disabled() {
        let cache = ReadThroughCache::new(false);
        cache
            .store()
            .stale()
            .set("coin_details?id=nope", Arc::new("old".to_string()), STALE);

        let calls = Arc::new(AtomicUsize::new(0));
        let err = cache
            .get(
                "coin_details?id=nope",
                FRESH,
                STALE,
                &upstream(3),
                always_failing(calls.clone(), FetchError::fatal("HTTP 404")),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, CacheError::Rejected { .. }));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fatal_still_serves_stale_by_default() {
        let cache = ReadThroughCache::new(true);
        cache
            .store()
            .stale()
            .set("coin_details?id=nope", Arc::new("old".to_string()), STALE);

        let calls = Arc::new(AtomicUsize::new(0));
        let read = cache
            .get(
                "coin_details?id=nope",
                FRESH,
                STALE,
                &upstream(3),
                always_failing(calls, FetchError::fatal("HTTP 404")),
            )
            .await
            .unwrap();

        assert!(read.is_stale());
    }

    #[tokio::test(start_paused = true)]
    async fn test_type_mismatch_reads_as_miss() {
        let cache = ReadThroughCache::new(true);
        cache
            .store()
            .record("trending", Arc::new(42u32), FRESH, STALE);

        let calls = Arc::new(AtomicUsize::new(0));
        let read = cache
            .get("trending", FRESH, STALE, &upstream(0), counting_fetch(calls.clone(), 0, "text"))
            .await
            .unwrap();

        assert_eq!(read.value.as_str(), "text");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_caller_does_not_cancel_fetch() {
        let cache = ReadThroughCache::new(true);
        let up = upstream(0);

        let caller = {
            let cache = cache.clone();
            let up = Arc::clone(&up);
            tokio::spawn(async move {
                cache
                    .get("news?limit=20&page=1", FRESH, STALE, &up, || async {
                        tokio::time::sleep(Duration::from_secs(1)).await;
                        Ok::<_, FetchError>("headline".to_string())
                    })
                    .await
            })
        };

        tokio::time::sleep(Duration::from_millis(100)).await;
        caller.abort();
        assert!(caller.await.unwrap_err().is_cancelled());

        tokio::time::sleep(Duration::from_secs(2)).await;

        let entry = cache
            .store()
            .fresh()
            .get::<String>("news?limit=20&page=1")
            .unwrap();
        assert_eq!(entry.value.as_str(), "headline");
    }

    #[tokio::test(start_paused = true)]
    async fn test_global_scope_serializes_distinct_keys() {
        let cache = ReadThroughCache::new(true);
        let up = Arc::new(
            Upstream::new("coingecko", RetryPolicy::none()).globally_serialized(),
        );
        let active = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for key in ["coins_list?page=1", "trending", "market_overview"] {
            let cache = cache.clone();
            let up = Arc::clone(&up);
            let active = Arc::clone(&active);
            let peak = Arc::clone(&peak);
            handles.push(tokio::spawn(async move {
                cache
                    .get(key, FRESH, STALE, &up, move || {
                        let active = Arc::clone(&active);
                        let peak = Arc::clone(&peak);
                        async move {
                            let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                            peak.fetch_max(now, Ordering::SeqCst);
                            tokio::time::sleep(Duration::from_millis(50)).await;
                            active.fetch_sub(1, Ordering::SeqCst);
                            Ok::<_, FetchError>(key.to_string())
                        }
                    })
                    .await
            }));
        }

        for result in futures::future::join_all(handles).await {
            assert!(result.unwrap().is_ok());
        }
        assert_eq!(peak.load(Ordering::SeqCst), 1);
        assert_eq!(cache.gate().in_flight(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_global_throttle_spaces_calls_across_keys() {
        let cache = ReadThroughCache::new(true);
        let throttle = Throttle::new("coingecko", Duration::from_millis(1200));
        let up = Arc::new(
            Upstream::new("coingecko", RetryPolicy::none())
                .globally_serialized()
                .with_throttle(Some(throttle.clone())),
        );
        let calls = Arc::new(std::sync::Mutex::new(Vec::new()));
        let start = tokio::time::Instant::now();

        let mut handles = Vec::new();
        for key in ["coins_list?page=1", "trending", "market_overview"] {
            let cache = cache.clone();
            let up = Arc::clone(&up);
            let calls = Arc::clone(&calls);
            handles.push(tokio::spawn(async move {
                cache
                    .get(key, FRESH, STALE, &up, move || {
                        let calls = Arc::clone(&calls);
                        async move {
                            calls.lock().unwrap().push(tokio::time::Instant::now());
                            Ok::<_, FetchError>(key.to_string())
                        }
                    })
                    .await
                    .unwrap();
                start.elapsed()
            }));
        }

        let mut finished = Vec::new();
        for result in futures::future::join_all(handles).await {
            finished.push(result.unwrap());
        }
        finished.sort();

        let mut stamps = calls.lock().unwrap().clone();
        stamps.sort();
        assert_eq!(stamps.len(), 3);
        for pair in stamps.windows(2) {
            assert!(pair[1] - pair[0] >= Duration::from_millis(1200));
        }
        assert_eq!(throttle.paced_calls(), 3);

        // each value is handed over before its pacing interval starts
        assert!(finished[0] < Duration::from_millis(5));
        assert!(finished[1] >= Duration::from_millis(1200));
        assert!(finished[1] < Duration::from_millis(1205));
        assert!(finished[2] >= Duration::from_millis(2400));
        assert!(finished[2] < Duration::from_millis(2405));
    }
}
