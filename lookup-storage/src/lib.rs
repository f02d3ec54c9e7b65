//! Lookup Storage - Caching and Data Sources
//!
//! Defines the [`LookupSource`] abstraction the engine reads rows from,
//! the structured queries it issues, the two-tier single-flight cache
//! that holds whole-table snapshots, and an in-memory mock source for
//! tests. The PostgreSQL source lives in lookup-api.

pub mod cache;
pub mod mock;
pub mod query;
pub mod source;

pub use cache::{
    CacheConfig, CacheEntry, CacheStats, HybridCache, InMemorySharedCache, LmdbCacheError,
    LmdbSharedCache, SharedCacheBackend,
};
pub use mock::{mock_row, MockLookupSource, MockRow};
pub use query::{LookupSnapshot, PageQuery, PageRows, Predicate, SnapshotQuery, SnapshotRow};
pub use source::LookupSource;
