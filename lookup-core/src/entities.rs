//! Lookup definitions, requests and results.

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::filter::FilterValue;
use crate::identifier::Identifier;

/// Default lifetime of a cached lookup snapshot (60 minutes).
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(60 * 60);

/// Default page number for requests that omit it.
pub const DEFAULT_PAGE: i64 = 1;

/// Default page size for requests that omit it.
pub const DEFAULT_PAGE_SIZE: i64 = 20;

// ============================================================================
// STRATEGY
// ============================================================================

/// How a lookup is resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LookupStrategy {
    /// Whole table fetched once, cached, filtered in memory. No paging.
    Cached,
    /// Paged, filtered query against the source on every request.
    LiveSearch,
}

impl LookupStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cached => "cached",
            Self::LiveSearch => "live_search",
        }
    }
}

// ============================================================================
// DEFINITION
// ============================================================================

/// Static configuration of one lookup. Immutable once registered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LookupDefinition {
    /// Registry key as registered (lookups are case-insensitive).
    pub key: String,
    /// Source table.
    pub table: Identifier,
    /// Column holding the item value; always returned as text.
    pub id_column: Identifier,
    /// Column holding the display label.
    pub label_column: Identifier,
    /// Column a dependent lookup is filtered by (e.g. states by country).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter_column: Option<Identifier>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_by: Option<Identifier>,
    pub strategy: LookupStrategy,
    /// Snapshot lifetime for cached lookups.
    #[serde(
        rename = "cache_ttl_secs",
        default = "default_cache_ttl",
        with = "ttl_seconds"
    )]
    pub cache_ttl: Duration,
}

fn default_cache_ttl() -> Duration {
    DEFAULT_CACHE_TTL
}

mod ttl_seconds {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }
}

impl LookupDefinition {
    /// Create a definition. Identifiers are validated here.
    pub fn new(
        key: impl Into<String>,
        table: &str,
        id_column: &str,
        label_column: &str,
        strategy: LookupStrategy,
    ) -> Result<Self, ValidationError> {
        Ok(Self {
            key: key.into(),
            table: Identifier::parse(table)?,
            id_column: Identifier::parse(id_column)?,
            label_column: Identifier::parse(label_column)?,
            filter_column: None,
            order_by: None,
            strategy,
            cache_ttl: DEFAULT_CACHE_TTL,
        })
    }

    /// Create a cached-strategy definition.
    pub fn cached(
        key: impl Into<String>,
        table: &str,
        id_column: &str,
        label_column: &str,
    ) -> Result<Self, ValidationError> {
        Self::new(key, table, id_column, label_column, LookupStrategy::Cached)
    }

    /// Create a live-search definition.
    pub fn live(
        key: impl Into<String>,
        table: &str,
        id_column: &str,
        label_column: &str,
    ) -> Result<Self, ValidationError> {
        Self::new(key, table, id_column, label_column, LookupStrategy::LiveSearch)
    }

    /// Set the filter column.
    pub fn with_filter_column(mut self, column: &str) -> Result<Self, ValidationError> {
        self.filter_column = Some(Identifier::parse(column)?);
        Ok(self)
    }

    /// Set the order-by column.
    pub fn with_order_by(mut self, column: &str) -> Result<Self, ValidationError> {
        self.order_by = Some(Identifier::parse(column)?);
        Ok(self)
    }

    /// Set the cache lifetime.
    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    /// Column used to order live pages: the order-by column, else the label.
    pub fn effective_order_column(&self) -> &Identifier {
        self.order_by.as_ref().unwrap_or(&self.label_column)
    }

    /// Cache key of this lookup's snapshot.
    pub fn cache_key(&self) -> String {
        format!("lookup:{}", self.key.to_ascii_lowercase())
    }
}

// ============================================================================
// REQUEST
// ============================================================================

fn default_page() -> i64 {
    DEFAULT_PAGE
}

fn default_page_size() -> i64 {
    DEFAULT_PAGE_SIZE
}

/// One unit of lookup work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LookupRequest {
    pub lookup_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search_term: Option<String>,
    /// Filter parameters by name; only the one naming the definition's
    /// filter column is used.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub parameters: HashMap<String, FilterValue>,
    /// 1-based page number.
    #[serde(default = "default_page")]
    pub page: i64,
    #[serde(default = "default_page_size")]
    pub page_size: i64,
}

impl LookupRequest {
    pub fn new(lookup_key: impl Into<String>) -> Self {
        Self {
            lookup_key: lookup_key.into(),
            search_term: None,
            parameters: HashMap::new(),
            page: DEFAULT_PAGE,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    pub fn with_search(mut self, term: impl Into<String>) -> Self {
        self.search_term = Some(term.into());
        self
    }

    pub fn with_parameter(mut self, name: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        self.parameters.insert(name.into(), value.into());
        self
    }

    pub fn with_page(mut self, page: i64, page_size: i64) -> Self {
        self.page = page;
        self.page_size = page_size;
        self
    }

    /// The search term if it has any non-whitespace content.
    pub fn effective_search(&self) -> Option<&str> {
        self.search_term
            .as_deref()
            .filter(|term| !term.trim().is_empty())
    }

    /// Look up a parameter by name, ignoring ASCII case.
    pub fn parameter(&self, name: &str) -> Option<&FilterValue> {
        self.parameters.get(name).or_else(|| {
            self.parameters
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(name))
                .map(|(_, v)| v)
        })
    }

    /// Zero-based row offset of the requested page.
    pub fn offset(&self) -> u64 {
        let page = u64::try_from(self.page.max(1)).unwrap_or(1);
        let size = u64::try_from(self.page_size.max(0)).unwrap_or(0);
        (page - 1).saturating_mul(size)
    }
}

// ============================================================================
// RESULTS
// ============================================================================

/// One resolved lookup entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LookupItem {
    /// Item id rendered as text, whatever the source column type.
    pub value: String,
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

impl LookupItem {
    pub fn new(value: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            label: label.into(),
            metadata: None,
        }
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

/// Result of one lookup request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct PagedLookupResult {
    pub items: Vec<LookupItem>,
    /// Number of rows matching the request's filters across all pages.
    pub total_count: u64,
    pub has_more: bool,
}

impl PagedLookupResult {
    /// Result for an unknown lookup key.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Result that carries the whole filtered set (cached lookups).
    pub fn whole_set(items: Vec<LookupItem>) -> Self {
        let total_count = items.len() as u64;
        Self {
            items,
            total_count,
            has_more: false,
        }
    }

    /// Result for one page of a larger result set.
    pub fn page(items: Vec<LookupItem>, total_count: u64, offset: u64, page_size: u64) -> Self {
        Self {
            items,
            total_count,
            has_more: offset.saturating_add(page_size) < total_count,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Batch result keyed by each request's lookup key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct LookupResponse {
    pub data: HashMap<String, PagedLookupResult>,
}

impl LookupResponse {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a result; a later insert for the same key replaces the earlier.
    pub fn insert(&mut self, key: impl Into<String>, result: PagedLookupResult) {
        self.data.insert(key.into(), result);
    }

    pub fn get(&self, key: &str) -> Option<&PagedLookupResult> {
        self.data.get(key)
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}
