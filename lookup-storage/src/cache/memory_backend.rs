//! In-process shared-tier backend.
//!
//! Stands in for an external distributed cache in tests and single-node
//! deployments. Honors the TTL hint so stale envelopes are dropped on read.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use lookup_core::{CacheError, LookupResult};

use super::traits::SharedCacheBackend;

#[derive(Debug, Default)]
pub struct InMemorySharedCache {
    entries: DashMap<String, (Vec<u8>, Instant)>,
    unavailable: AtomicBool,
}

impl InMemorySharedCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every call fail, simulating an unreachable cache server.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn check_available(&self) -> LookupResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(CacheError::Backend {
                reason: "in-memory shared cache marked unavailable".to_string(),
            }
            .into());
        }
        Ok(())
    }
}

#[async_trait]
impl SharedCacheBackend for InMemorySharedCache {
    async fn get(&self, key: &str) -> LookupResult<Option<Vec<u8>>> {
        self.check_available()?;
        let now = Instant::now();
        let found = self
            .entries
            .get(key)
            .map(|entry| (entry.0.clone(), entry.1));
        match found {
            Some((bytes, deadline)) if now < deadline => Ok(Some(bytes)),
            Some(_) => {
                self.entries.remove_if(key, |_, (_, deadline)| *deadline <= now);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn put(&self, key: &str, bytes: Vec<u8>, ttl: Duration) -> LookupResult<()> {
        self.check_available()?;
        let deadline = Instant::now()
            .checked_add(ttl)
            .unwrap_or_else(|| Instant::now() + Duration::from_secs(100 * 365 * 24 * 3600));
        self.entries.insert(key.to_string(), (bytes, deadline));
        Ok(())
    }

    async fn remove(&self, key: &str) -> LookupResult<()> {
        self.check_available()?;
        self.entries.remove(key);
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
