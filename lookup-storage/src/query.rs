//! Structured queries handed to a [`LookupSource`](crate::LookupSource).
//!
//! Queries carry validated identifiers and typed predicates rather than
//! SQL text, so each source renders them in its own dialect and the mock
//! source can evaluate them directly.

use chrono::{DateTime, Utc};
use lookup_core::{Identifier, LookupDefinition, LookupItem};
use serde::{Deserialize, Serialize};

/// Load every row of a lookup table for in-memory filtering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotQuery {
    pub table: Identifier,
    pub id_column: Identifier,
    pub label_column: Identifier,
    /// Projected alongside each row so dependent filters can run in memory.
    pub filter_column: Option<Identifier>,
    /// Rows come back ordered by this column, then by id.
    pub order_by: Identifier,
}

impl SnapshotQuery {
    pub fn for_definition(definition: &LookupDefinition) -> Self {
        Self {
            table: definition.table.clone(),
            id_column: definition.id_column.clone(),
            label_column: definition.label_column.clone(),
            filter_column: definition.filter_column.clone(),
            order_by: definition.effective_order_column().clone(),
        }
    }
}

/// A row predicate for [`PageQuery`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Predicate {
    /// Case-insensitive substring match. `term` is the raw user input;
    /// sources escape it for their own pattern syntax.
    LabelContains { column: Identifier, term: String },
    /// Text form of the column equals `value`.
    Equals { column: Identifier, value: String },
    /// Column is null.
    IsNull { column: Identifier },
}

/// One page of a filtered, ordered lookup table plus its total count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageQuery {
    pub table: Identifier,
    pub id_column: Identifier,
    pub label_column: Identifier,
    /// All predicates must hold.
    pub predicates: Vec<Predicate>,
    /// Sort keys, most significant first; always ends with the id column.
    pub order_by: Vec<Identifier>,
    pub offset: u64,
    pub limit: u64,
}

impl PageQuery {
    /// Unfiltered first page of `limit` rows ordered by the definition's
    /// order column with the id as tie-breaker.
    pub fn for_definition(definition: &LookupDefinition, limit: u64) -> Self {
        let mut order_by = vec![definition.effective_order_column().clone()];
        if order_by[0] != definition.id_column {
            order_by.push(definition.id_column.clone());
        }
        Self {
            table: definition.table.clone(),
            id_column: definition.id_column.clone(),
            label_column: definition.label_column.clone(),
            predicates: Vec::new(),
            order_by,
            offset: 0,
            limit,
        }
    }

    pub fn with_predicate(mut self, predicate: Predicate) -> Self {
        self.predicates.push(predicate);
        self
    }

    pub fn with_offset(mut self, offset: u64) -> Self {
        self.offset = offset;
        self
    }
}

/// A snapshot row: the item plus the text form of its filter column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotRow {
    pub item: LookupItem,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter_value: Option<String>,
}

impl SnapshotRow {
    pub fn new(item: LookupItem, filter_value: Option<String>) -> Self {
        Self { item, filter_value }
    }
}

/// Every row of a cached lookup, as held in the cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LookupSnapshot {
    pub rows: Vec<SnapshotRow>,
    pub loaded_at: DateTime<Utc>,
}

impl LookupSnapshot {
    pub fn new(rows: Vec<SnapshotRow>) -> Self {
        Self {
            rows,
            loaded_at: Utc::now(),
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Result of a [`PageQuery`].
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PageRows {
    pub items: Vec<LookupItem>,
    /// Rows matching the predicates, ignoring the window.
    pub total_count: u64,
}
