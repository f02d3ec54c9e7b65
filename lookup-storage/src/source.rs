//! Data source abstraction.

use async_trait::async_trait;
use lookup_core::LookupResult;
use tokio_util::sync::CancellationToken;

use crate::query::{PageQuery, PageRows, SnapshotQuery, SnapshotRow};

/// Where lookup rows come from.
///
/// Implementations must observe `cancel`: once it fires, in-flight work
/// should be abandoned (server-side where possible) and
/// [`LookupError::Cancelled`](lookup_core::LookupError::Cancelled) returned.
#[async_trait]
pub trait LookupSource: Send + Sync {
    /// All rows of a table, ordered by the query's order column then id.
    async fn load_snapshot(
        &self,
        query: &SnapshotQuery,
        cancel: &CancellationToken,
    ) -> LookupResult<Vec<SnapshotRow>>;

    /// One window of filtered rows and the total match count, read from a
    /// single consistent view.
    async fn query_page(
        &self,
        query: &PageQuery,
        cancel: &CancellationToken,
    ) -> LookupResult<PageRows>;

    /// Cheap reachability probe for readiness checks.
    async fn health_check(&self) -> LookupResult<()> {
        Ok(())
    }

    /// Name used in logs and error messages.
    fn source_name(&self) -> &str;
}
