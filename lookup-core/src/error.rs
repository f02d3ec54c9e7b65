//! Error types for lookup operations

use std::time::Duration;
use thiserror::Error;

/// Request and definition validation errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Invalid lookup key '{key}': {reason}")]
    InvalidLookupKey { key: String, reason: String },

    #[error("Invalid page {page}: pages are 1-based")]
    InvalidPage { page: i64 },

    #[error("Invalid page size {page_size}: must be between 1 and {max}")]
    InvalidPageSize { page_size: i64, max: u32 },

    #[error("Batch contains {count} lookups, at most {max} allowed")]
    BatchTooLarge { count: usize, max: usize },

    #[error("Batch cannot be empty")]
    EmptyBatch,

    #[error("Invalid value for parameter {name}: {reason}")]
    InvalidParameter { name: String, reason: String },

    #[error("Invalid SQL identifier '{value}': {reason}")]
    InvalidIdentifier { value: String, reason: String },
}

/// Data source failures. Every variant means the source is unavailable
/// for the fetch that hit it.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SourceError {
    #[error("Connection to {source_name} failed: {reason}")]
    Connection { source_name: String, reason: String },

    #[error("Query against {table} failed: {reason}")]
    Query { table: String, reason: String },

    #[error("Connection pool error: {reason}")]
    Pool { reason: String },

    #[error("Failed to decode row from {table}: {reason}")]
    Decode { table: String, reason: String },
}

/// Cache tier errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CacheError {
    #[error("Failed to (de)serialize cache entry {key}: {reason}")]
    Serialization { key: String, reason: String },

    #[error("Shared cache backend failed: {reason}")]
    Backend { reason: String },
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required configuration field: {field}")]
    MissingRequired { field: String },

    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Lookup key {key} is registered more than once")]
    DuplicateLookupKey { key: String },
}

/// Master error type for all lookup errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LookupError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Source unavailable: {0}")]
    Source(#[from] SourceError),

    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Operation cancelled: {reason}")]
    Cancelled { reason: String },

    #[error("Operation timed out after {after:?}")]
    Timeout { after: Duration },

    #[error("Internal error: {reason}")]
    Internal { reason: String },
}

impl LookupError {
    /// Create a Cancelled error.
    pub fn cancelled(reason: impl Into<String>) -> Self {
        Self::Cancelled {
            reason: reason.into(),
        }
    }

    /// Create an Internal error.
    pub fn internal(reason: impl Into<String>) -> Self {
        Self::Internal {
            reason: reason.into(),
        }
    }

    /// True when the data source could not serve the fetch.
    pub fn is_source_unavailable(&self) -> bool {
        matches!(self, Self::Source(_))
    }

    /// True for cooperative aborts (cancellation or timeout).
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. } | Self::Timeout { .. })
    }
}

/// Result type alias for lookup operations.
pub type LookupResult<T> = Result<T, LookupError>;

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_display_invalid_page_size() {
        let err = ValidationError::InvalidPageSize {
            page_size: 500,
            max: 100,
        };
        let msg = format!("{}", err);
        assert!(msg.contains("500"));
        assert!(msg.contains("100"));
    }

    #[test]
    fn test_source_error_display_query() {
        let err = SourceError::Query {
            table: "Ref_Country".to_string(),
            reason: "relation does not exist".to_string(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("Ref_Country"));
        assert!(msg.contains("relation does not exist"));
    }

    #[test]
    fn test_config_error_display_duplicate_key() {
        let err = ConfigError::DuplicateLookupKey {
            key: "Countries".to_string(),
        };
        assert!(format!("{}", err).contains("Countries"));
    }

    #[test]
    fn test_lookup_error_from_variants() {
        let validation = LookupError::from(ValidationError::EmptyBatch);
        assert!(matches!(validation, LookupError::Validation(_)));

        let source = LookupError::from(SourceError::Pool {
            reason: "exhausted".to_string(),
        });
        assert!(source.is_source_unavailable());

        let cache = LookupError::from(CacheError::Backend {
            reason: "io".to_string(),
        });
        assert!(matches!(cache, LookupError::Cache(_)));
        assert!(!cache.is_source_unavailable());
    }

    #[test]
    fn test_cancelled_and_timeout_classification() {
        assert!(LookupError::cancelled("client went away").is_cancelled());
        assert!(LookupError::Timeout {
            after: Duration::from_secs(30)
        }
        .is_cancelled());
        assert!(!LookupError::internal("boom").is_cancelled());
    }
}
