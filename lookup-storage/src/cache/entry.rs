//! Cache entries and the shared-tier envelope.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use lookup_core::{CacheError, LookupResult};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

/// A value held in the local tier together with its lifetime.
#[derive(Debug)]
pub struct CacheEntry<V> {
    value: Arc<V>,
    cached_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

impl<V> Clone for CacheEntry<V> {
    fn clone(&self) -> Self {
        Self {
            value: Arc::clone(&self.value),
            cached_at: self.cached_at,
            expires_at: self.expires_at,
        }
    }
}

impl<V> CacheEntry<V> {
    /// Entry cached now, living for `ttl`.
    pub fn new(value: V, ttl: Duration) -> Self {
        let cached_at = Utc::now();
        Self {
            value: Arc::new(value),
            cached_at,
            expires_at: expiry_after(cached_at, ttl),
        }
    }

    pub fn value(&self) -> Arc<V> {
        Arc::clone(&self.value)
    }

    pub fn cached_at(&self) -> DateTime<Utc> {
        self.cached_at
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    /// Whether the entry is still usable at `now`.
    pub fn is_fresh_at(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }

    pub fn is_fresh(&self) -> bool {
        self.is_fresh_at(Utc::now())
    }
}

impl<V: Serialize> CacheEntry<V> {
    /// Serialize into the shared-tier envelope format.
    pub fn to_envelope(&self, key: &str) -> LookupResult<Vec<u8>> {
        let envelope = Envelope {
            cached_at: self.cached_at,
            expires_at: self.expires_at,
            value: self.value.as_ref(),
        };
        serde_json::to_vec(&envelope).map_err(|e| {
            CacheError::Serialization {
                key: key.to_string(),
                reason: e.to_string(),
            }
            .into()
        })
    }
}

impl<V: DeserializeOwned> CacheEntry<V> {
    /// Decode a shared-tier envelope.
    pub fn from_envelope(key: &str, bytes: &[u8]) -> LookupResult<Self> {
        let envelope: Envelope<V> = serde_json::from_slice(bytes).map_err(|e| {
            CacheError::Serialization {
                key: key.to_string(),
                reason: e.to_string(),
            }
        })?;
        Ok(Self {
            value: Arc::new(envelope.value),
            cached_at: envelope.cached_at,
            expires_at: envelope.expires_at,
        })
    }
}

/// On-the-wire form of an entry in the shared tier. Serialized with
/// `T = &V`, deserialized with `T = V`.
#[derive(Serialize, Deserialize)]
struct Envelope<T> {
    cached_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    value: T,
}

/// `start + ttl`, saturating far in the future for huge TTLs.
fn expiry_after(start: DateTime<Utc>, ttl: Duration) -> DateTime<Utc> {
    chrono::Duration::from_std(ttl)
        .ok()
        .and_then(|delta| start.checked_add_signed(delta))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_until_expiry() {
        let entry = CacheEntry::new(5u32, Duration::from_secs(60));
        assert!(entry.is_fresh());
        assert!(!entry.is_fresh_at(entry.expires_at()));
        assert!(entry.is_fresh_at(entry.cached_at()));
    }

    #[test]
    fn test_zero_ttl_is_never_fresh() {
        let entry = CacheEntry::new("x".to_string(), Duration::ZERO);
        assert!(!entry.is_fresh_at(entry.cached_at()));
    }

    #[test]
    fn test_huge_ttl_saturates() {
        let entry = CacheEntry::new(1u8, Duration::MAX);
        assert_eq!(entry.expires_at(), DateTime::<Utc>::MAX_UTC);
        assert!(entry.is_fresh());
    }

    #[test]
    fn test_envelope_preserves_lifetime() {
        let entry = CacheEntry::new(vec!["a".to_string(), "b".to_string()], Duration::from_secs(5));
        let bytes = entry.to_envelope("lookup:countries").unwrap();
        let back: CacheEntry<Vec<String>> =
            CacheEntry::from_envelope("lookup:countries", &bytes).unwrap();
        assert_eq!(*back.value(), *entry.value());
        assert_eq!(back.expires_at(), entry.expires_at());
    }

    #[test]
    fn test_corrupt_envelope_is_cache_error() {
        let err = CacheEntry::<u32>::from_envelope("k", b"not json").unwrap_err();
        assert!(matches!(
            err,
            lookup_core::LookupError::Cache(CacheError::Serialization { .. })
        ));
    }
}
