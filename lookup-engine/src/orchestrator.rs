//! Batch orchestrator.
//!
//! Fans a batch of requests out to the engine, one task per request, and
//! joins them into one keyed response. Either every request resolves or
//! the batch fails as a whole: the first failure cancels the siblings and
//! no partial data is returned.

use std::sync::Arc;
use std::time::Instant;

use lookup_core::{
    LookupError, LookupRequest, LookupResponse, LookupResult, PagedLookupResult, ValidationError,
};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::engine::LookupEngine;

/// Resolves batches of lookup requests concurrently.
#[derive(Debug, Clone)]
pub struct LookupOrchestrator {
    engine: Arc<LookupEngine>,
}

impl LookupOrchestrator {
    pub fn new(engine: Arc<LookupEngine>) -> Self {
        Self { engine }
    }

    pub fn engine(&self) -> &Arc<LookupEngine> {
        &self.engine
    }

    /// Resolve every request and key the results by lookup key.
    ///
    /// When the same key appears more than once, the result of the later
    /// request wins. Cancelling `cancel`, exceeding the configured batch
    /// timeout, or any single failure aborts all outstanding fetches.
    pub async fn process_batch(
        &self,
        requests: Vec<LookupRequest>,
        cancel: &CancellationToken,
    ) -> LookupResult<LookupResponse> {
        let config = self.engine.config();
        if requests.is_empty() {
            return Err(ValidationError::EmptyBatch.into());
        }
        if requests.len() > config.max_batch_size {
            return Err(ValidationError::BatchTooLarge {
                count: requests.len(),
                max: config.max_batch_size,
            }
            .into());
        }

        let started = Instant::now();
        let count = requests.len();
        let batch_token = cancel.child_token();

        let joined = match config.batch_timeout {
            Some(limit) => {
                match tokio::time::timeout(limit, self.run_all(requests, &batch_token)).await {
                    Ok(result) => result,
                    Err(_) => Err(LookupError::Timeout { after: limit }),
                }
            }
            None => self.run_all(requests, &batch_token).await,
        };
        // Stops anything still running once the batch is decided.
        batch_token.cancel();

        let results = match joined {
            Ok(results) => results,
            Err(e) => {
                if e.is_cancelled() {
                    debug!(requests = count, error = %e, "Lookup batch aborted");
                } else {
                    warn!(requests = count, error = %e, "Lookup batch failed");
                }
                return Err(e);
            }
        };

        let mut response = LookupResponse::new();
        for (request, result) in results {
            response.insert(request.lookup_key, result);
        }
        info!(
            requests = count,
            keys = response.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Lookup batch completed"
        );
        Ok(response)
    }

    /// Run every request on its own task. Results come back in request
    /// order so duplicate keys resolve deterministically.
    async fn run_all(
        &self,
        requests: Vec<LookupRequest>,
        batch_token: &CancellationToken,
    ) -> LookupResult<Vec<(LookupRequest, PagedLookupResult)>> {
        let mut join_set = JoinSet::new();
        let mut slots: Vec<Option<(LookupRequest, PagedLookupResult)>> = Vec::new();
        slots.resize_with(requests.len(), || None);

        for (index, request) in requests.into_iter().enumerate() {
            let engine = Arc::clone(&self.engine);
            let token = batch_token.clone();
            join_set.spawn(async move {
                let result = engine.fetch(&request, &token).await;
                (index, request, result)
            });
        }

        // Dropping the set aborts remaining tasks on every early return.
        while let Some(joined) = join_set.join_next().await {
            let (index, request, result) = joined.map_err(|e| {
                LookupError::internal(format!("lookup task failed: {e}"))
            })?;
            match result {
                Ok(page) => slots[index] = Some((request, page)),
                Err(e) => {
                    batch_token.cancel();
                    join_set.abort_all();
                    return Err(e);
                }
            }
        }

        slots
            .into_iter()
            .map(|slot| slot.ok_or_else(|| LookupError::internal("lookup task produced no result")))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lookup_core::EngineConfig;
    use lookup_test_utils::fixtures;
    use lookup_test_utils::MockLookupSource;
    use std::time::Duration;

    fn orchestrator(source: Arc<MockLookupSource>, config: EngineConfig) -> LookupOrchestrator {
        LookupOrchestrator::new(Arc::new(LookupEngine::new(
            Arc::new(fixtures::registry()),
            source,
            config,
        )))
    }

    #[tokio::test]
    async fn test_known_and_unknown_keys() {
        let orch = orchestrator(Arc::new(fixtures::source()), EngineConfig::default());
        let response = orch
            .process_batch(
                vec![LookupRequest::new("Countries"), LookupRequest::new("UnknownX")],
                &CancellationToken::new(),
            )
            .await
            .unwrap();
        assert_eq!(response.len(), 2);
        assert!(!response.get("Countries").unwrap().is_empty());
        assert_eq!(response.get("UnknownX").unwrap(), &PagedLookupResult::empty());
    }

    #[tokio::test]
    async fn test_empty_and_oversized_batches_rejected() {
        let orch = orchestrator(
            Arc::new(fixtures::source()),
            EngineConfig::default().with_max_batch_size(2),
        );
        let token = CancellationToken::new();
        let err = orch.process_batch(vec![], &token).await.unwrap_err();
        assert_eq!(err, LookupError::Validation(ValidationError::EmptyBatch));

        let err = orch
            .process_batch(vec![LookupRequest::new("Users"); 3], &token)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            LookupError::Validation(ValidationError::BatchTooLarge { count: 3, max: 2 })
        ));
    }

    #[tokio::test]
    async fn test_duplicate_keys_last_request_wins() {
        let orch = orchestrator(Arc::new(fixtures::source()), EngineConfig::default());
        let response = orch
            .process_batch(
                vec![
                    LookupRequest::new("Users").with_search("smith"),
                    LookupRequest::new("Users").with_search("jones"),
                ],
                &CancellationToken::new(),
            )
            .await
            .unwrap();
        assert_eq!(response.len(), 1);
        assert_eq!(response.get("Users").unwrap().items[0].label, "Carol Jones");
    }

    #[tokio::test]
    async fn test_one_failure_fails_the_batch() {
        let source = Arc::new(fixtures::source());
        source.set_failing(true);
        let orch = orchestrator(source, EngineConfig::default());
        let err = orch
            .process_batch(
                vec![LookupRequest::new("UnknownX"), LookupRequest::new("Users")],
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();
        assert!(err.is_source_unavailable());
    }

    #[tokio::test]
    async fn test_batch_timeout() {
        let source = Arc::new(fixtures::source());
        source.set_latency(Duration::from_secs(3600));
        let orch = orchestrator(
            source,
            EngineConfig::default().with_batch_timeout(Some(Duration::from_millis(50))),
        );
        let err = orch
            .process_batch(vec![LookupRequest::new("Users")], &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, LookupError::Timeout { .. }));
    }

    #[tokio::test]
    async fn test_caller_cancellation_aborts_batch() {
        let source = Arc::new(fixtures::source());
        source.set_latency(Duration::from_secs(3600));
        let orch = orchestrator(source, EngineConfig::default().with_batch_timeout(None));
        let token = CancellationToken::new();

        let canceller = {
            let token = token.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(20)).await;
                token.cancel();
            })
        };
        let err = orch
            .process_batch(
                vec![LookupRequest::new("Countries"), LookupRequest::new("Users")],
                &token,
            )
            .await
            .unwrap_err();
        assert!(err.is_cancelled());
        canceller.await.unwrap();
    }
}
