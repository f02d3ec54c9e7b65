//! Lookup caching.
//!
//! - [`HybridCache`]: single-flight, two-tier cache used by the engine for
//!   whole-table snapshots
//! - [`SharedCacheBackend`]: the shared tier, implemented by
//!   [`InMemorySharedCache`] and [`LmdbSharedCache`]
//! - [`CacheEntry`]: value plus lifetime, and its serialized envelope

mod entry;
mod hybrid;
mod lmdb_backend;
mod memory_backend;
mod traits;

pub use entry::CacheEntry;
pub use hybrid::{CacheConfig, HybridCache};
pub use lmdb_backend::{LmdbCacheError, LmdbSharedCache};
pub use memory_backend::InMemorySharedCache;
pub use traits::{CacheStats, SharedCacheBackend};
