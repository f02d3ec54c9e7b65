//! Two-tier single-flight cache.
//!
//! `HybridCache` fronts an expensive loader with a process-local tier and
//! an optional shared tier. For any key, at most one loader runs at a time
//! inside this process: concurrent callers queue on a per-key async lock,
//! and whoever acquires it after the winner finds the fresh local entry.
//!
//! # Guarantees
//!
//! - A fresh local entry is returned without locking.
//! - The per-key lock is released when the holder completes, fails, is
//!   cancelled or is dropped, since it lives in an owned guard.
//! - Failed loads are not cached; the next caller retries.
//! - Shared-tier faults are logged and degrade to a miss.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use lookup_core::{LookupError, LookupResult};
use serde::{de::DeserializeOwned, Serialize};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::entry::CacheEntry;
use super::traits::{CacheStats, SharedCacheBackend};

// ============================================================================
// CONFIGURATION
// ============================================================================

/// Configuration for [`HybridCache`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    /// Soft cap on local entries. Expired entries go first, then the oldest.
    pub max_local_entries: usize,
    /// Consult and populate the shared tier when one is attached.
    pub shared_enabled: bool,
    /// Lifetime in the shared tier; `None` uses the entry TTL.
    pub shared_ttl: Option<Duration>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_local_entries: 1024,
            shared_enabled: true,
            shared_ttl: None,
        }
    }
}

impl CacheConfig {
    /// Set the local capacity.
    pub fn with_max_local_entries(mut self, max: usize) -> Self {
        self.max_local_entries = max;
        self
    }

    /// Enable or disable the shared tier.
    pub fn with_shared_enabled(mut self, enabled: bool) -> Self {
        self.shared_enabled = enabled;
        self
    }

    /// Override the shared-tier lifetime.
    pub fn with_shared_ttl(mut self, ttl: Duration) -> Self {
        self.shared_ttl = Some(ttl);
        self
    }
}

#[derive(Debug, Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    loads: AtomicU64,
    load_failures: AtomicU64,
    shared_hits: AtomicU64,
    shared_errors: AtomicU64,
    evictions: AtomicU64,
}

fn bump(counter: &AtomicU64) {
    counter.fetch_add(1, Ordering::Relaxed);
}

// ============================================================================
// CACHE
// ============================================================================

/// Single-flight cache with a local tier and an optional shared tier.
pub struct HybridCache<V> {
    local: DashMap<String, CacheEntry<V>>,
    in_flight: DashMap<String, Arc<Mutex<()>>>,
    shared: Option<Arc<dyn SharedCacheBackend>>,
    config: CacheConfig,
    counters: Counters,
}

impl<V> std::fmt::Debug for HybridCache<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HybridCache")
            .field("local_entries", &self.local.len())
            .field("in_flight", &self.in_flight.len())
            .field("shared", &self.shared.as_ref().map(|s| s.backend_name()))
            .field("config", &self.config)
            .finish()
    }
}

impl<V> HybridCache<V>
where
    V: Serialize + DeserializeOwned + Send + Sync + 'static,
{
    /// Local-only cache.
    pub fn new(config: CacheConfig) -> Self {
        Self {
            local: DashMap::new(),
            in_flight: DashMap::new(),
            shared: None,
            config,
            counters: Counters::default(),
        }
    }

    /// Cache backed by a shared tier.
    pub fn with_shared(config: CacheConfig, shared: Arc<dyn SharedCacheBackend>) -> Self {
        Self {
            shared: Some(shared),
            ..Self::new(config)
        }
    }

    /// Return the cached value for `key`, running `loader` at most once
    /// across concurrent callers when nothing fresh is cached.
    ///
    /// The loader receives a clone of `cancel`. Cancelling while waiting for
    /// another caller's load, or during this caller's own load, returns
    /// [`LookupError::Cancelled`] and frees the key for the next caller.
    pub async fn get_or_create<F, Fut>(
        &self,
        key: &str,
        ttl: Duration,
        cancel: &CancellationToken,
        loader: F,
    ) -> LookupResult<Arc<V>>
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = LookupResult<V>>,
    {
        if let Some(value) = self.fresh_local(key) {
            bump(&self.counters.hits);
            debug!(cache_key = key, "Local cache hit");
            return Ok(value);
        }

        let slot = self.slot(key);
        let guard = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                drop(slot);
                self.release_slot(key);
                return Err(LookupError::cancelled(format!("waiting for cache load of {key}")));
            }
            guard = Arc::clone(&slot).lock_owned() => guard,
        };

        let result = self.fill(key, ttl, cancel, loader).await;

        drop(guard);
        drop(slot);
        self.release_slot(key);
        result
    }

    /// Fresh value in the local tier, if any.
    pub fn get_local(&self, key: &str) -> Option<Arc<V>> {
        self.fresh_local(key)
    }

    /// Drop `key` from both tiers.
    pub async fn invalidate(&self, key: &str) {
        self.local.remove(key);
        if let Some(shared) = self.shared_tier() {
            if let Err(e) = shared.remove(key).await {
                bump(&self.counters.shared_errors);
                warn!(cache_key = key, backend = shared.backend_name(), error = %e, "Shared cache remove failed");
            }
        }
    }

    /// Current statistics snapshot.
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.counters.hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            loads: self.counters.loads.load(Ordering::Relaxed),
            load_failures: self.counters.load_failures.load(Ordering::Relaxed),
            shared_hits: self.counters.shared_hits.load(Ordering::Relaxed),
            shared_errors: self.counters.shared_errors.load(Ordering::Relaxed),
            evictions: self.counters.evictions.load(Ordering::Relaxed),
            entry_count: self.local.len() as u64,
        }
    }

    /// Keys with a load currently in progress or queued.
    pub fn in_flight_count(&self) -> usize {
        self.in_flight.len()
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    // ------------------------------------------------------------------------
    // internals
    // ------------------------------------------------------------------------

    /// Runs with the per-key lock held.
    async fn fill<F, Fut>(
        &self,
        key: &str,
        ttl: Duration,
        cancel: &CancellationToken,
        loader: F,
    ) -> LookupResult<Arc<V>>
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = LookupResult<V>>,
    {
        // Filled by the previous lock holder.
        if let Some(value) = self.fresh_local(key) {
            bump(&self.counters.hits);
            debug!(cache_key = key, "Cache filled while waiting");
            return Ok(value);
        }
        bump(&self.counters.misses);

        if let Some(entry) = self.read_shared(key).await {
            bump(&self.counters.hits);
            bump(&self.counters.shared_hits);
            debug!(cache_key = key, "Shared cache hit");
            let value = entry.value();
            self.store_local(key, entry);
            return Ok(value);
        }

        bump(&self.counters.loads);
        debug!(cache_key = key, "Cache miss, loading");
        let loaded = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(LookupError::cancelled(format!("cache load of {key}"))),
            result = loader(cancel.clone()) => result,
        };

        match loaded {
            Ok(value) => {
                let entry = CacheEntry::new(value, ttl);
                let value = entry.value();
                self.write_shared(key, &entry, ttl).await;
                self.store_local(key, entry);
                Ok(value)
            }
            Err(e) => {
                bump(&self.counters.load_failures);
                if e.is_cancelled() {
                    debug!(cache_key = key, "Cache load cancelled");
                } else {
                    warn!(cache_key = key, error = %e, "Cache load failed");
                }
                Err(e)
            }
        }
    }

    fn fresh_local(&self, key: &str) -> Option<Arc<V>> {
        let guard = self.local.get(key)?;
        let entry = guard.value();
        entry.is_fresh().then(|| entry.value())
    }

    fn slot(&self, key: &str) -> Arc<Mutex<()>> {
        Arc::clone(
            self.in_flight
                .entry(key.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .value(),
        )
    }

    /// Remove the per-key lock once nobody else holds a handle to it.
    fn release_slot(&self, key: &str) {
        self.in_flight
            .remove_if(key, |_, slot| Arc::strong_count(slot) == 1);
    }

    fn shared_tier(&self) -> Option<&Arc<dyn SharedCacheBackend>> {
        if self.config.shared_enabled {
            self.shared.as_ref()
        } else {
            None
        }
    }

    async fn read_shared(&self, key: &str) -> Option<CacheEntry<V>> {
        let shared = self.shared_tier()?;
        let bytes = match shared.get(key).await {
            Ok(bytes) => bytes?,
            Err(e) => {
                bump(&self.counters.shared_errors);
                warn!(cache_key = key, backend = shared.backend_name(), error = %e, "Shared cache read failed");
                return None;
            }
        };
        match CacheEntry::from_envelope(key, &bytes) {
            Ok(entry) if entry.is_fresh() => Some(entry),
            Ok(_) => None,
            Err(e) => {
                bump(&self.counters.shared_errors);
                warn!(cache_key = key, error = %e, "Discarding undecodable shared cache entry");
                None
            }
        }
    }

    async fn write_shared(&self, key: &str, entry: &CacheEntry<V>, ttl: Duration) {
        let Some(shared) = self.shared_tier() else {
            return;
        };
        let result = match entry.to_envelope(key) {
            Ok(bytes) => {
                shared
                    .put(key, bytes, self.config.shared_ttl.unwrap_or(ttl))
                    .await
            }
            Err(e) => Err(e),
        };
        if let Err(e) = result {
            bump(&self.counters.shared_errors);
            warn!(cache_key = key, backend = shared.backend_name(), error = %e, "Shared cache write failed");
        }
    }

    fn store_local(&self, key: &str, entry: CacheEntry<V>) {
        if !self.local.contains_key(key) && self.local.len() >= self.config.max_local_entries {
            self.evict();
        }
        self.local.insert(key.to_string(), entry);
    }

    fn evict(&self) {
        let before = self.local.len();
        self.local.retain(|_, entry| entry.is_fresh());
        let mut evicted = before.saturating_sub(self.local.len());

        if self.local.len() >= self.config.max_local_entries {
            let oldest = self
                .local
                .iter()
                .min_by_key(|entry| entry.value().cached_at())
                .map(|entry| entry.key().clone());
            if let Some(oldest) = oldest {
                self.local.remove(&oldest);
                evicted += 1;
            }
        }
        self.counters
            .evictions
            .fetch_add(evicted as u64, Ordering::Relaxed);
    }
}
