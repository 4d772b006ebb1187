// Keyed query cache: the single mediator between the UI-facing operations
// and the remote store. Guarantees at most one in-flight fetch per key and
// stale-after-write consistency via synchronous invalidation.

use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::debug;

use crate::clock::Clock;
use crate::observability::cache_metrics;
use crate::remote::{RetryHandler, StoreError};

/// Composite cache key: resource kind, optional record id, optional sub-view.
///
/// Renders as `kind[/id][/view]`, e.g. `startups/s1` for a record or
/// `startups/status/applied` for a stage-grouped view.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    kind: String,
    id: Option<String>,
    view: Option<String>,
}

impl CacheKey {
    /// The aggregate listing of a resource kind.
    pub fn collection(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            id: None,
            view: None,
        }
    }

    /// A single record.
    pub fn record(kind: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            id: Some(id.into()),
            view: None,
        }
    }

    /// A derived sub-view of a resource kind, e.g. `status/applied`.
    pub fn view(kind: impl Into<String>, view: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            id: None,
            view: Some(view.into()),
        }
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)?;
        if let Some(id) = &self.id {
            write!(f, "/{id}")?;
        }
        if let Some(view) = &self.view {
            write!(f, "/{view}")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub value: Value,
    pub fetched_at: DateTime<Utc>,
    /// Attempts consumed by the fetch that produced this value.
    pub retries: u32,
    pub stale: bool,
}

#[derive(Debug)]
enum Slot {
    Ready(CacheEntry),
    InFlight {
        tx: broadcast::Sender<Result<Value, StoreError>>,
        /// Set when an invalidation lands while the fetch is still pending;
        /// the result is stored already-stale so the next read refetches.
        invalidated: bool,
    },
}

enum FetchRole {
    Hit(Value),
    Wait(broadcast::Receiver<Result<Value, StoreError>>),
    Lead(broadcast::Sender<Result<Value, StoreError>>),
}

#[derive(Debug)]
pub struct QueryCache {
    slots: Mutex<HashMap<CacheKey, Slot>>,
    retry: RetryHandler,
    clock: Arc<dyn Clock>,
    max_age: Option<chrono::Duration>,
}

impl QueryCache {
    pub fn new(retry: RetryHandler, clock: Arc<dyn Clock>, max_age: Option<Duration>) -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
            retry,
            clock,
            max_age: max_age.and_then(|d| chrono::Duration::from_std(d).ok()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<CacheKey, Slot>> {
        // Never held across an await point.
        self.slots.lock().expect("cache map lock poisoned")
    }

    fn entry_is_fresh(&self, entry: &CacheEntry) -> bool {
        if entry.stale {
            return false;
        }
        match self.max_age {
            Some(max_age) => self.clock.now() - entry.fetched_at <= max_age,
            None => true,
        }
    }

    /// Return the cached value for `key`, or perform one remote read through
    /// the retry policy. Concurrent callers for the same key are coalesced
    /// onto a single in-flight request and all receive its result.
    pub async fn fetch<F, Fut>(&self, key: &CacheKey, loader: F) -> Result<Value, StoreError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<Value, StoreError>>,
    {
        let role = {
            let mut slots = self.lock();
            match slots.get(key) {
                Some(Slot::Ready(entry)) if self.entry_is_fresh(entry) => {
                    FetchRole::Hit(entry.value.clone())
                }
                Some(Slot::InFlight { tx, .. }) => FetchRole::Wait(tx.subscribe()),
                _ => {
                    let (tx, _rx) = broadcast::channel(1);
                    slots.insert(
                        key.clone(),
                        Slot::InFlight {
                            tx: tx.clone(),
                            invalidated: false,
                        },
                    );
                    FetchRole::Lead(tx)
                }
            }
        };

        match role {
            FetchRole::Hit(value) => {
                cache_metrics().record_cache_hit();
                debug!(key = %key, "cache hit");
                Ok(value)
            }
            FetchRole::Wait(mut rx) => {
                cache_metrics().record_coalesced_wait();
                debug!(key = %key, "awaiting in-flight fetch");
                match rx.recv().await {
                    Ok(result) => result,
                    Err(_) => Err(StoreError::Unknown(format!(
                        "in-flight fetch for {key} ended without a result"
                    ))),
                }
            }
            FetchRole::Lead(tx) => {
                cache_metrics().record_cache_miss();
                let result = self.retry.execute_tracked(loader).await;

                let shared = {
                    let mut slots = self.lock();
                    let was_invalidated = matches!(
                        slots.get(key),
                        Some(Slot::InFlight {
                            invalidated: true,
                            ..
                        })
                    );
                    match &result {
                        Ok(outcome) => {
                            slots.insert(
                                key.clone(),
                                Slot::Ready(CacheEntry {
                                    value: outcome.value.clone(),
                                    fetched_at: self.clock.now(),
                                    retries: outcome.attempts.saturating_sub(1),
                                    stale: was_invalidated,
                                }),
                            );
                            Ok(outcome.value.clone())
                        }
                        Err(err) => {
                            slots.remove(key);
                            Err(err.clone())
                        }
                    }
                };

                // Waiters subscribed while the slot was in flight; deliver.
                let _ = tx.send(shared.clone());
                shared
            }
        }
    }

    /// Perform a remote write through the retry policy, then synchronously
    /// mark `affected` entries stale before resolving, so a mutate-then-fetch
    /// sequence from the same task always observes the mutation.
    pub async fn mutate<T, F, Fut>(
        &self,
        affected: &[CacheKey],
        operation: F,
    ) -> Result<T, StoreError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, StoreError>>,
    {
        self.mutate_with(operation, |_| affected.to_vec()).await
    }

    /// Like [`mutate`](Self::mutate), but the affected-key set is computed
    /// from the mutation's result, for writes that can move a record between
    /// grouped views.
    pub async fn mutate_with<T, F, Fut, K>(
        &self,
        operation: F,
        affected: K,
    ) -> Result<T, StoreError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, StoreError>>,
        K: FnOnce(&T) -> Vec<CacheKey>,
    {
        let value = self.retry.execute(operation).await?;
        for key in affected(&value) {
            self.invalidate_key(&key);
        }
        Ok(value)
    }

    /// Mark a single entry stale. The next read for the key refetches.
    pub fn invalidate_key(&self, key: &CacheKey) {
        let mut slots = self.lock();
        Self::mark_stale(&mut slots, key);
        cache_metrics().record_invalidation();
        debug!(key = %key, "cache entry invalidated");
    }

    /// Mark every entry whose key matches `predicate` stale.
    pub fn invalidate_where(&self, predicate: impl Fn(&CacheKey) -> bool) {
        let mut slots = self.lock();
        let matching: Vec<CacheKey> = slots.keys().filter(|k| predicate(k)).cloned().collect();
        for key in &matching {
            Self::mark_stale(&mut slots, key);
            cache_metrics().record_invalidation();
        }
        debug!(count = matching.len(), "cache entries invalidated by predicate");
    }

    fn mark_stale(slots: &mut HashMap<CacheKey, Slot>, key: &CacheKey) {
        match slots.get_mut(key) {
            Some(Slot::Ready(entry)) => entry.stale = true,
            Some(Slot::InFlight { invalidated, .. }) => *invalidated = true,
            None => {}
        }
    }

    /// Drop everything. In-flight fetches are left to complete; their results
    /// land already-stale.
    pub fn clear(&self) {
        let mut slots = self.lock();
        let keys: Vec<CacheKey> = slots.keys().cloned().collect();
        for key in keys {
            Self::mark_stale(&mut slots, &key);
        }
        slots.retain(|_, slot| matches!(slot, Slot::InFlight { .. }));
    }

    /// Inspect a cached entry without touching freshness.
    pub fn entry(&self, key: &CacheKey) -> Option<CacheEntry> {
        let slots = self.lock();
        match slots.get(key) {
            Some(Slot::Ready(entry)) => Some(entry.clone()),
            _ => None,
        }
    }

    /// Whether a read for `key` would be served from cache.
    pub fn is_fresh(&self, key: &CacheKey) -> bool {
        let slots = self.lock();
        match slots.get(key) {
            Some(Slot::Ready(entry)) => self.entry_is_fresh(entry),
            _ => false,
        }
    }
}
