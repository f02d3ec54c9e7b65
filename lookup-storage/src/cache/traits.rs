//! Shared-tier cache backend trait and statistics.
//!
//! The shared tier stores opaque serialized envelopes keyed by string.
//! Freshness is carried inside the envelope, so a backend only has to
//! store and return bytes.

use std::time::Duration;

use async_trait::async_trait;
use lookup_core::LookupResult;
use serde::{Deserialize, Serialize};

/// Backend for the shared (second) cache tier.
///
/// Implementations must be safe for concurrent use from many tasks. Any
/// error returned here is treated by [`HybridCache`](super::HybridCache)
/// as a miss and logged, never surfaced to the caller.
#[async_trait]
pub trait SharedCacheBackend: Send + Sync {
    /// Fetch the stored envelope for `key`, if any.
    async fn get(&self, key: &str) -> LookupResult<Option<Vec<u8>>>;

    /// Store an envelope. `ttl` is a hint for backends with native expiry.
    async fn put(&self, key: &str, bytes: Vec<u8>, ttl: Duration) -> LookupResult<()>;

    /// Remove an envelope. Removing a missing key is not an error.
    async fn remove(&self, key: &str) -> LookupResult<()>;

    /// Short name used in logs.
    fn backend_name(&self) -> &'static str;
}

/// Cache statistics for monitoring.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    /// Lookups answered from either tier without running the loader.
    pub hits: u64,
    /// Lookups that found nothing fresh in the local tier.
    pub misses: u64,
    /// Times the loader actually ran.
    pub loads: u64,
    /// Loader runs that returned an error or were cancelled.
    pub load_failures: u64,
    /// Misses filled from the shared tier.
    pub shared_hits: u64,
    /// Shared-tier reads or writes that failed and were skipped.
    pub shared_errors: u64,
    /// Local entries dropped for capacity.
    pub evictions: u64,
    /// Entries currently held in the local tier.
    pub entry_count: u64,
}

impl CacheStats {
    /// Calculate the hit rate (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}
