/// Dual-tier in-memory store
///
/// Two physically separate namespaces share one entry layout:
/// - fresh tier: short TTL, authoritative while unexpired
/// - stale tier: long retention, only ever read as a fallback
///
/// Values are type-erased (`Arc<dyn Any + Send + Sync>`) so one store serves
/// every operation. Reads downcast to the requested type; a mismatch reads as
/// a miss. Expiry is evaluated lazily at read time.
use crate::logger::{self, LogTag};
use dashmap::DashMap;
use std::any::Any;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// Shortest TTL accepted, keeps `expires_at > stored_at`
const MIN_TTL: Duration = Duration::from_millis(1);

type ErasedValue = Arc<dyn Any + Send + Sync>;

/// Cached value with its lifetime
///
/// Entries are created once and never renewed in place; a newer fetch
/// replaces the whole entry.
#[derive(Debug, Clone)]
pub struct CacheEntry<T> {
    pub value: T,
    pub stored_at: Instant,
    pub expires_at: Instant,
}

impl<T> CacheEntry<T> {
    fn new(value: T, ttl: Duration) -> Self {
        let stored_at = Instant::now();
        Self {
            value,
            stored_at,
            expires_at: stored_at + ttl.max(MIN_TTL),
        }
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Instant::now())
    }

    pub fn is_expired_at(&self, now: Instant) -> bool {
        now >= self.expires_at
    }

    pub fn age(&self) -> Duration {
        Instant::now().saturating_duration_since(self.stored_at)
    }
}

/// One namespace of the store
#[derive(Default)]
pub struct TierStore {
    entries: DashMap<String, CacheEntry<ErasedValue>>,
}

impl TierStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Unexpired entry for `key`, if it holds a `T`
    pub fn get<T>(&self, key: &str) -> Option<CacheEntry<Arc<T>>>
    where
        T: Any + Send + Sync,
    {
        self.get_any_age(key).filter(|entry| !entry.is_expired())
    }

    /// Entry for `key` regardless of expiry
    pub fn get_any_age<T>(&self, key: &str) -> Option<CacheEntry<Arc<T>>>
    where
        T: Any + Send + Sync,
    {
        let entry = self.entries.get(key)?.value().clone();
        let value = entry.value.downcast::<T>().ok()?;
        Some(CacheEntry {
            value,
            stored_at: entry.stored_at,
            expires_at: entry.expires_at,
        })
    }

    /// Store a value, replacing any previous entry atomically
    pub fn set<T>(&self, key: &str, value: Arc<T>, ttl: Duration)
    where
        T: Any + Send + Sync,
    {
        let erased: ErasedValue = value;
        self.entries
            .insert(key.to_string(), CacheEntry::new(erased, ttl));
    }

    pub fn contains_fresh(&self, key: &str) -> bool {
        self.entries
            .get(key)
            .map(|entry| !entry.is_expired())
            .unwrap_or(false)
    }

    /// Drop expired entries, returns how many were removed
    pub fn sweep_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired_at(now));
        before.saturating_sub(self.entries.len())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Fresh + stale namespaces behind one handle
pub struct DualTierStore {
    fresh: TierStore,
    stale: TierStore,
}

impl DualTierStore {
    pub fn new() -> Self {
        Self {
            fresh: TierStore::new(),
            stale: TierStore::new(),
        }
    }

    pub fn fresh(&self) -> &TierStore {
        &self.fresh
    }

    pub fn stale(&self) -> &TierStore {
        &self.stale
    }

    /// Terminal step of a successful fetch: populate both tiers
    pub fn record<T>(&self, key: &str, value: Arc<T>, fresh_ttl: Duration, stale_ttl: Duration)
    where
        T: Any + Send + Sync,
    {
        self.fresh.set(key, Arc::clone(&value), fresh_ttl);
        self.stale.set(key, value, stale_ttl);
    }

    /// Remove expired entries from both tiers
    ///
    /// Only bounds memory; correctness never depends on it.
    pub fn sweep(&self) -> (usize, usize) {
        (self.fresh.sweep_expired(), self.stale.sweep_expired())
    }

    /// Periodically sweep until the store is dropped
    pub fn spawn_sweeper(self: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let store: Weak<DualTierStore> = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(store) = store.upgrade() else {
                    break;
                };
                let (fresh, stale) = store.sweep();
                if fresh + stale > 0 {
                    logger::debug(
                        LogTag::Cache,
                        &format!("Swept {} fresh and {} stale expired entries", fresh, stale),
                    );
                }
            }
        })
    }
}

impl Default for DualTierStore {
    fn default() -> Self {
        Self::new()
    }
}
