//! Lookup resolution engine.
//!
//! Resolves one [`LookupRequest`] against the registry and dispatches on
//! the definition's strategy:
//!
//! - `Cached`: fetch the table snapshot through the single-flight cache and
//!   filter it in memory
//! - `LiveSearch`: push filtering, ordering and paging down to the source

use std::sync::Arc;

use lookup_core::{
    validate_request, EngineConfig, LookupDefinition, LookupError, LookupRegistry, LookupRequest,
    LookupResult, LookupStrategy, PagedLookupResult,
};
use lookup_storage::{
    CacheConfig, CacheStats, HybridCache, LookupSnapshot, LookupSource, SnapshotQuery,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn, Span};

use crate::{cached, live};

/// Resolves single lookup requests. Cheap to share behind an `Arc`.
pub struct LookupEngine {
    registry: Arc<LookupRegistry>,
    source: Arc<dyn LookupSource>,
    cache: HybridCache<LookupSnapshot>,
    config: EngineConfig,
}

impl std::fmt::Debug for LookupEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LookupEngine")
            .field("lookups", &self.registry.len())
            .field("source", &self.source.source_name())
            .field("cache", &self.cache)
            .field("config", &self.config)
            .finish()
    }
}

impl LookupEngine {
    /// Engine with a local-only snapshot cache.
    pub fn new(
        registry: Arc<LookupRegistry>,
        source: Arc<dyn LookupSource>,
        config: EngineConfig,
    ) -> Self {
        Self::with_cache(
            registry,
            source,
            config,
            HybridCache::new(CacheConfig::default()),
        )
    }

    /// Engine using a caller-built cache, e.g. one with a shared tier.
    pub fn with_cache(
        registry: Arc<LookupRegistry>,
        source: Arc<dyn LookupSource>,
        config: EngineConfig,
        cache: HybridCache<LookupSnapshot>,
    ) -> Self {
        Self {
            registry,
            source,
            cache,
            config,
        }
    }

    /// Resolve one request.
    ///
    /// Unknown keys yield an empty result rather than an error so one bad
    /// key cannot fail a batch. Source failures propagate as
    /// [`LookupError::Source`]; nothing is retried here.
    #[tracing::instrument(
        level = "debug",
        skip_all,
        fields(lookup_key = %request.lookup_key, strategy = tracing::field::Empty)
    )]
    pub async fn fetch(
        &self,
        request: &LookupRequest,
        cancel: &CancellationToken,
    ) -> LookupResult<PagedLookupResult> {
        validate_request(request, &self.config)?;
        if cancel.is_cancelled() {
            return Err(LookupError::cancelled("fetch cancelled before start"));
        }

        let Some(definition) = self.registry.resolve(&request.lookup_key) else {
            debug!("Unknown lookup key, returning empty result");
            return Ok(PagedLookupResult::empty());
        };
        Span::current().record("strategy", definition.strategy.as_str());

        let result = match definition.strategy {
            LookupStrategy::Cached => self.fetch_cached(definition, request, cancel).await,
            LookupStrategy::LiveSearch => self.fetch_live(definition, request, cancel).await,
        };
        match &result {
            Ok(page) => debug!(items = page.items.len(), total = page.total_count, "Lookup resolved"),
            Err(e) if e.is_cancelled() => debug!("Lookup cancelled"),
            Err(e) => warn!(error = %e, "Lookup failed"),
        }
        result
    }

    async fn fetch_cached(
        &self,
        definition: &LookupDefinition,
        request: &LookupRequest,
        cancel: &CancellationToken,
    ) -> LookupResult<PagedLookupResult> {
        let query = SnapshotQuery::for_definition(definition);
        let source = Arc::clone(&self.source);
        let snapshot = self
            .cache
            .get_or_create(
                &definition.cache_key(),
                definition.cache_ttl,
                cancel,
                |token| async move {
                    let rows = source.load_snapshot(&query, &token).await?;
                    debug!(rows = rows.len(), table = %query.table, "Loaded lookup snapshot");
                    Ok(LookupSnapshot::new(rows))
                },
            )
            .await?;
        Ok(cached::filter_snapshot(definition, request, &snapshot))
    }

    async fn fetch_live(
        &self,
        definition: &LookupDefinition,
        request: &LookupRequest,
        cancel: &CancellationToken,
    ) -> LookupResult<PagedLookupResult> {
        let query = live::page_query(definition, request);
        let rows = self.source.query_page(&query, cancel).await?;
        Ok(live::to_result(rows, &query))
    }

    /// Drop a cached lookup's snapshot from both cache tiers.
    pub async fn invalidate(&self, lookup_key: &str) {
        if let Some(definition) = self.registry.resolve(lookup_key) {
            self.cache.invalidate(&definition.cache_key()).await;
        }
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    pub fn registry(&self) -> &LookupRegistry {
        &self.registry
    }

    pub fn source(&self) -> &Arc<dyn LookupSource> {
        &self.source
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lookup_core::{LookupItem, ValidationError};
    use lookup_test_utils::fixtures;
    use lookup_test_utils::MockLookupSource;

    fn engine_with(source: Arc<MockLookupSource>) -> LookupEngine {
        LookupEngine::new(
            Arc::new(fixtures::registry()),
            source,
            EngineConfig::default(),
        )
    }

    #[tokio::test]
    async fn test_unknown_key_is_empty() {
        let engine = engine_with(Arc::new(fixtures::source()));
        let result = engine
            .fetch(&LookupRequest::new("UnknownX"), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(result, PagedLookupResult::empty());
    }

    #[tokio::test]
    async fn test_invalid_key_is_rejected() {
        let engine = engine_with(Arc::new(fixtures::source()));
        let err = engine
            .fetch(&LookupRequest::new("Users;--"), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            LookupError::Validation(ValidationError::InvalidLookupKey { .. })
        ));
    }

    #[tokio::test]
    async fn test_cached_lookup_loads_once_and_filters() {
        let source = Arc::new(fixtures::source());
        let engine = engine_with(source.clone());
        let token = CancellationToken::new();

        let all = engine
            .fetch(&LookupRequest::new("Countries"), &token)
            .await
            .unwrap();
        assert_eq!(all.total_count, fixtures::COUNTRIES.len() as u64);
        assert_eq!(all.items[0], LookupItem::new("CA", "Canada"));

        let searched = engine
            .fetch(&LookupRequest::new("countries").with_search("UNITED"), &token)
            .await
            .unwrap();
        assert_eq!(searched.total_count, 2);
        assert!(!searched.has_more);
        assert_eq!(source.snapshot_load_count("Ref_Country"), 1);
    }

    #[tokio::test]
    async fn test_dependent_lookup_filters_by_parameter() {
        let engine = engine_with(Arc::new(fixtures::source()));
        let result = engine
            .fetch(
                &LookupRequest::new("States").with_parameter("CountryId", "US"),
                &CancellationToken::new(),
            )
            .await
            .unwrap();
        assert_eq!(result.total_count, fixtures::states_in("US") as u64);
    }

    #[tokio::test]
    async fn test_live_lookup_pages() {
        let source = Arc::new(fixtures::source_with_providers(45));
        let engine = engine_with(source.clone());
        let token = CancellationToken::new();

        let first = engine
            .fetch(&LookupRequest::new("MedicalProviders"), &token)
            .await
            .unwrap();
        assert_eq!(first.items.len(), 20);
        assert_eq!(first.total_count, 45);
        assert!(first.has_more);

        let last = engine
            .fetch(&LookupRequest::new("MedicalProviders").with_page(3, 20), &token)
            .await
            .unwrap();
        assert_eq!(last.items.len(), 5);
        assert!(!last.has_more);
        assert_eq!(source.page_query_count(), 2);
        assert_eq!(source.snapshot_load_count("MedicalProviders"), 0);
    }

    #[tokio::test]
    async fn test_source_failure_propagates_and_is_not_cached() {
        let source = Arc::new(fixtures::source());
        let engine = engine_with(source.clone());
        let token = CancellationToken::new();

        source.set_failing(true);
        let err = engine
            .fetch(&LookupRequest::new("Countries"), &token)
            .await
            .unwrap_err();
        assert!(err.is_source_unavailable());

        source.set_failing(false);
        let ok = engine
            .fetch(&LookupRequest::new("Countries"), &token)
            .await
            .unwrap();
        assert!(!ok.is_empty());
        assert_eq!(engine.cache_stats().load_failures, 1);
    }

    #[tokio::test]
    async fn test_invalidate_forces_reload() {
        let source = Arc::new(fixtures::source());
        let engine = engine_with(source.clone());
        let token = CancellationToken::new();

        engine.fetch(&LookupRequest::new("Countries"), &token).await.unwrap();
        engine.invalidate("COUNTRIES").await;
        engine.fetch(&LookupRequest::new("Countries"), &token).await.unwrap();
        assert_eq!(source.snapshot_load_count("Ref_Country"), 2);
    }

    #[tokio::test]
    async fn test_cancelled_token_short_circuits() {
        let source = Arc::new(fixtures::source());
        let engine = engine_with(source.clone());
        let token = CancellationToken::new();
        token.cancel();
        let err = engine
            .fetch(&LookupRequest::new("Users"), &token)
            .await
            .unwrap_err();
        assert!(err.is_cancelled());
        assert_eq!(source.page_query_count(), 0);
    }
}
