//! Cached strategy: filter a whole-table snapshot in memory.

use lookup_core::{LookupDefinition, LookupItem, LookupRequest, PagedLookupResult};
use lookup_storage::{LookupSnapshot, SnapshotRow};

/// Apply the request's filter parameter and search term to a snapshot.
///
/// The snapshot is never modified; the result is a new sequence in
/// snapshot order. Paging fields are ignored: the whole filtered set is
/// returned with `has_more == false`.
pub fn filter_snapshot(
    definition: &LookupDefinition,
    request: &LookupRequest,
    snapshot: &LookupSnapshot,
) -> PagedLookupResult {
    let filter = definition
        .filter_column
        .as_ref()
        .and_then(|column| request.parameter(column.as_str()));
    let needle = request.effective_search().map(str::to_lowercase);

    let items: Vec<LookupItem> = snapshot
        .rows
        .iter()
        .filter(|row| filter.map_or(true, |value| value.matches(row.filter_value.as_deref())))
        .filter(|row| needle.as_deref().map_or(true, |needle| label_contains(row, needle)))
        .map(|row| row.item.clone())
        .collect();

    PagedLookupResult::whole_set(items)
}

fn label_contains(row: &SnapshotRow, needle: &str) -> bool {
    row.item.label.to_lowercase().contains(needle)
}
