/// Single-flight gate: mutual exclusion per serialization slot
///
/// The gate only guarantees that one holder runs at a time per slot. It does
/// not broadcast results; callers queued behind a fetch re-read the fresh
/// tier once they get the slot, which is where deduplication happens.
///
/// A slot is the cache key itself (`GateScope::PerKey`) or one shared name for
/// every key of a provider with a global quota (`GateScope::Global`).
use dashmap::DashMap;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Serialization granularity, selected per upstream provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateScope {
    /// One slot per cache key
    PerKey,
    /// Every key of the provider shares this slot
    Global(String),
}

impl GateScope {
    pub fn slot_for<'a>(&'a self, key: &'a str) -> &'a str {
        match self {
            GateScope::PerKey => key,
            GateScope::Global(slot) => slot,
        }
    }
}

type SlotMap = DashMap<String, Arc<Mutex<()>>>;

#[derive(Clone, Default)]
pub struct SingleFlightGate {
    slots: Arc<SlotMap>,
}

impl SingleFlightGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive ownership of `slot`
    ///
    /// The slot is released when the returned guard drops, on every exit path.
    pub async fn acquire(&self, slot: &str) -> GateGuard {
        let mutex = self
            .slots
            .entry(slot.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .value()
            .clone();

        let guard = mutex.lock_owned().await;

        GateGuard {
            slot: slot.to_string(),
            slots: Arc::clone(&self.slots),
            guard: Some(guard),
        }
    }

    /// Run `f` while holding `slot`
    pub async fn with_exclusive<F, Fut, R>(&self, slot: &str, f: F) -> R
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = R>,
    {
        let _guard = self.acquire(slot).await;
        f().await
    }

    /// Slots currently held or waited on
    pub fn in_flight(&self) -> usize {
        self.slots.len()
    }

    pub fn is_in_flight(&self, slot: &str) -> bool {
        self.slots.contains_key(slot)
    }
}

/// Exclusive ownership of one slot
pub struct GateGuard {
    slot: String,
    slots: Arc<SlotMap>,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for GateGuard {
    fn drop(&mut self) {
        // Map + this guard hold the only references when nobody is queued
        self.slots
            .remove_if(&self.slot, |_, mutex| Arc::strong_count(mutex) <= 2);
        self.guard.take();
    }
}
