//! Lookup Core - Data Types and Registry
//!
//! Pure data structures shared by every lookup crate: definitions, requests
//! and results, the filter-value union, validated SQL identifiers, the
//! read-only registry, engine configuration and the error taxonomy.
//! This crate performs no I/O.

pub mod config;
pub mod entities;
pub mod error;
pub mod filter;
pub mod identifier;
pub mod registry;

pub use config::EngineConfig;
pub use entities::{
    LookupDefinition, LookupItem, LookupRequest, LookupResponse, LookupStrategy,
    PagedLookupResult, DEFAULT_CACHE_TTL, DEFAULT_PAGE, DEFAULT_PAGE_SIZE,
};
pub use error::{
    CacheError, ConfigError, LookupError, LookupResult, SourceError, ValidationError,
};
pub use filter::FilterValue;
pub use identifier::{validate_lookup_key, Identifier, MAX_LOOKUP_KEY_LEN};
pub use registry::{LookupRegistry, LookupRegistryBuilder};

/// Validate a request against the engine limits: key format, 1-based page,
/// and page size within `1..=max_page_size`.
pub fn validate_request(request: &LookupRequest, config: &EngineConfig) -> Result<(), ValidationError> {
    validate_lookup_key(&request.lookup_key, config.max_lookup_key_len)?;
    if request.page < 1 {
        return Err(ValidationError::InvalidPage { page: request.page });
    }
    if request.page_size < 1 || request.page_size > i64::from(config.max_page_size) {
        return Err(ValidationError::InvalidPageSize {
            page_size: request.page_size,
            max: config.max_page_size,
        });
    }
    Ok(())
}
