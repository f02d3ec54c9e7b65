//! In-memory mock lookup source for testing.
//!
//! Tables are lists of rows mapping column name to an optional text value.
//! Column names are matched case-insensitively, the way PostgreSQL treats
//! unquoted identifiers. Latency and outages can be injected, and snapshot
//! loads are counted per table so single-flight behavior can be asserted.

use std::cmp::Ordering as CmpOrdering;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use lookup_core::{Identifier, LookupError, LookupItem, LookupResult, SourceError};
use tokio_util::sync::CancellationToken;

use crate::query::{PageQuery, PageRows, Predicate, SnapshotQuery, SnapshotRow};
use crate::source::LookupSource;

/// One table row: lowercased column name to text value (`None` is SQL null).
pub type MockRow = HashMap<String, Option<String>>;

/// Build a [`MockRow`] from `(column, value)` pairs.
pub fn mock_row<'a, I>(cells: I) -> MockRow
where
    I: IntoIterator<Item = (&'a str, Option<&'a str>)>,
{
    cells
        .into_iter()
        .map(|(column, value)| (column.to_ascii_lowercase(), value.map(str::to_string)))
        .collect()
}

/// In-memory [`LookupSource`].
#[derive(Debug, Default)]
pub struct MockLookupSource {
    tables: DashMap<String, Vec<MockRow>>,
    snapshot_loads: DashMap<String, usize>,
    page_queries: AtomicUsize,
    latency_ms: AtomicU64,
    failing: AtomicBool,
}

impl MockLookupSource {
    /// Create an empty mock source.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`insert_table`](Self::insert_table).
    pub fn with_table(self, name: &str, rows: Vec<MockRow>) -> Self {
        self.insert_table(name, rows);
        self
    }

    /// Replace the contents of a table.
    pub fn insert_table(&self, name: &str, rows: Vec<MockRow>) {
        self.tables.insert(name.to_ascii_lowercase(), rows);
    }

    /// Delay every call by `latency`.
    pub fn set_latency(&self, latency: Duration) {
        self.latency_ms
            .store(latency.as_millis() as u64, Ordering::SeqCst);
    }

    /// Make every call fail with a connection error.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Snapshot loads started against `table`.
    pub fn snapshot_load_count(&self, table: &str) -> usize {
        self.snapshot_loads
            .get(&table.to_ascii_lowercase())
            .map_or(0, |count| *count)
    }

    /// Page queries started against any table.
    pub fn page_query_count(&self) -> usize {
        self.page_queries.load(Ordering::SeqCst)
    }

    async fn simulate_call(&self, cancel: &CancellationToken) -> LookupResult<()> {
        let latency = Duration::from_millis(self.latency_ms.load(Ordering::SeqCst));
        if !latency.is_zero() {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {}
                _ = tokio::time::sleep(latency) => {}
            }
        }
        if cancel.is_cancelled() {
            return Err(LookupError::cancelled("mock source call cancelled"));
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(SourceError::Connection {
                source_name: self.source_name().to_string(),
                reason: "simulated outage".to_string(),
            }
            .into());
        }
        Ok(())
    }

    fn rows(&self, table: &Identifier) -> LookupResult<Vec<MockRow>> {
        self.tables
            .get(&table.as_str().to_ascii_lowercase())
            .map(|rows| rows.clone())
            .ok_or_else(|| {
                SourceError::Query {
                    table: table.to_string(),
                    reason: "relation does not exist".to_string(),
                }
                .into()
            })
    }
}

fn cell<'a>(row: &'a MockRow, column: &Identifier) -> Option<&'a str> {
    row.get(&column.as_str().to_ascii_lowercase())
        .and_then(|value| value.as_deref())
}

fn required_cell(row: &MockRow, column: &Identifier, table: &Identifier) -> LookupResult<String> {
    cell(row, column).map(str::to_string).ok_or_else(|| {
        SourceError::Decode {
            table: table.to_string(),
            reason: format!("column {column} is null or missing"),
        }
        .into()
    })
}

/// Ascending order with nulls last.
fn compare_rows(a: &MockRow, b: &MockRow, columns: &[Identifier]) -> CmpOrdering {
    for column in columns {
        let ordering = match (cell(a, column), cell(b, column)) {
            (Some(x), Some(y)) => x.cmp(y),
            (Some(_), None) => CmpOrdering::Less,
            (None, Some(_)) => CmpOrdering::Greater,
            (None, None) => CmpOrdering::Equal,
        };
        if ordering != CmpOrdering::Equal {
            return ordering;
        }
    }
    CmpOrdering::Equal
}

fn satisfies(row: &MockRow, predicate: &Predicate) -> bool {
    match predicate {
        Predicate::LabelContains { column, term } => cell(row, column)
            .is_some_and(|label| label.to_lowercase().contains(&term.to_lowercase())),
        Predicate::Equals { column, value } => cell(row, column) == Some(value.as_str()),
        Predicate::IsNull { column } => cell(row, column).is_none(),
    }
}

#[async_trait]
impl LookupSource for MockLookupSource {
    async fn load_snapshot(
        &self,
        query: &SnapshotQuery,
        cancel: &CancellationToken,
    ) -> LookupResult<Vec<SnapshotRow>> {
        *self
            .snapshot_loads
            .entry(query.table.as_str().to_ascii_lowercase())
            .or_insert(0) += 1;
        self.simulate_call(cancel).await?;

        let mut rows = self.rows(&query.table)?;
        let order = [query.order_by.clone(), query.id_column.clone()];
        rows.sort_by(|a, b| compare_rows(a, b, &order));

        rows.iter()
            .map(|row| {
                let item = LookupItem::new(
                    required_cell(row, &query.id_column, &query.table)?,
                    required_cell(row, &query.label_column, &query.table)?,
                );
                let filter_value = query
                    .filter_column
                    .as_ref()
                    .and_then(|column| cell(row, column))
                    .map(str::to_string);
                Ok(SnapshotRow::new(item, filter_value))
            })
            .collect()
    }

    async fn query_page(
        &self,
        query: &PageQuery,
        cancel: &CancellationToken,
    ) -> LookupResult<PageRows> {
        self.page_queries.fetch_add(1, Ordering::SeqCst);
        self.simulate_call(cancel).await?;

        let mut rows: Vec<MockRow> = self
            .rows(&query.table)?
            .into_iter()
            .filter(|row| query.predicates.iter().all(|p| satisfies(row, p)))
            .collect();
        rows.sort_by(|a, b| compare_rows(a, b, &query.order_by));

        let total_count = rows.len() as u64;
        let items = rows
            .iter()
            .skip(usize::try_from(query.offset).unwrap_or(usize::MAX))
            .take(usize::try_from(query.limit).unwrap_or(usize::MAX))
            .map(|row| {
                Ok(LookupItem::new(
                    required_cell(row, &query.id_column, &query.table)?,
                    required_cell(row, &query.label_column, &query.table)?,
                ))
            })
            .collect::<LookupResult<Vec<_>>>()?;

        Ok(PageRows { items, total_count })
    }

    async fn health_check(&self) -> LookupResult<()> {
        self.simulate_call(&CancellationToken::new()).await
    }

    fn source_name(&self) -> &str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lookup_core::LookupDefinition;

    fn users() -> MockLookupSource {
        MockLookupSource::new().with_table(
            "AppUsers",
            vec![
                mock_row([("UserId", Some("3")), ("FullName", Some("Carol Jones"))]),
                mock_row([("UserId", Some("1")), ("FullName", Some("Alice Smith"))]),
                mock_row([("UserId", Some("2")), ("FullName", Some("Bob Smith"))]),
            ],
        )
    }

    fn users_def() -> LookupDefinition {
        LookupDefinition::live("Users", "AppUsers", "UserId", "FullName").unwrap()
    }

    #[tokio::test]
    async fn test_query_page_filters_orders_and_counts() {
        let source = users();
        let query = PageQuery::for_definition(&users_def(), 1).with_predicate(
            Predicate::LabelContains {
                column: users_def().label_column,
                term: "SMITH".to_string(),
            },
        );
        let page = source
            .query_page(&query, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(page.total_count, 2);
        assert_eq!(page.items, vec![LookupItem::new("1", "Alice Smith")]);

        let second = source
            .query_page(&query.with_offset(1), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(second.items, vec![LookupItem::new("2", "Bob Smith")]);
        assert_eq!(source.page_query_count(), 2);
    }

    #[tokio::test]
    async fn test_snapshot_counts_loads_and_projects_filter() {
        let source = MockLookupSource::new().with_table(
            "Ref_State",
            vec![
                mock_row([("Id", Some("2")), ("StateName", Some("Texas")), ("CountryId", Some("US"))]),
                mock_row([("Id", Some("1")), ("StateName", Some("Ontario")), ("CountryId", None)]),
            ],
        );
        let def = LookupDefinition::cached("States", "Ref_State", "Id", "StateName")
            .unwrap()
            .with_filter_column("CountryId")
            .unwrap();
        let rows = source
            .load_snapshot(&SnapshotQuery::for_definition(&def), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].item.label, "Ontario");
        assert_eq!(rows[0].filter_value, None);
        assert_eq!(rows[1].filter_value.as_deref(), Some("US"));
        assert_eq!(source.snapshot_load_count("ref_state"), 1);
    }

    #[tokio::test]
    async fn test_failure_and_cancellation() {
        let source = users();
        let query = PageQuery::for_definition(&users_def(), 10);

        source.set_failing(true);
        let err = source
            .query_page(&query, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(err.is_source_unavailable());
        assert!(source.health_check().await.is_err());
        source.set_failing(false);

        source.set_latency(Duration::from_secs(3600));
        let token = CancellationToken::new();
        token.cancel();
        let err = source.query_page(&query, &token).await.unwrap_err();
        assert!(err.is_cancelled());
    }

    #[tokio::test]
    async fn test_missing_table_is_query_error() {
        let source = MockLookupSource::new();
        let err = source
            .query_page(&PageQuery::for_definition(&users_def(), 10), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, LookupError::Source(SourceError::Query { .. })));
    }
}
