//! LMDB-backed shared cache tier.
//!
//! Uses the heed crate (Rust bindings for LMDB) as a memory-mapped,
//! process-shared key-value store. Several service processes on one host
//! can point at the same directory and share loaded snapshots.
//!
//! # Record layout
//!
//! `[deadline: 8 bytes, unix millis LE][envelope bytes]`. The deadline is
//! derived from the TTL hint so stale records can be dropped without
//! decoding the envelope.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use heed::types::Bytes;
use heed::{Database, Env, EnvOpenOptions};
use lookup_core::{CacheError, LookupError, LookupResult};

use super::traits::SharedCacheBackend;

/// Error type for LMDB cache operations.
#[derive(Debug, thiserror::Error)]
pub enum LmdbCacheError {
    /// Failed to open or create the LMDB environment.
    #[error("Failed to open LMDB environment: {0}")]
    EnvOpen(String),

    /// Failed to open the database within the environment.
    #[error("Failed to open database: {0}")]
    DbOpen(String),

    /// Transaction error.
    #[error("Transaction error: {0}")]
    Transaction(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<LmdbCacheError> for LookupError {
    fn from(e: LmdbCacheError) -> Self {
        LookupError::Cache(CacheError::Backend {
            reason: e.to_string(),
        })
    }
}

const DEADLINE_LEN: usize = 8;

/// LMDB-backed implementation of [`SharedCacheBackend`].
pub struct LmdbSharedCache {
    env: Env,
    db: Database<Bytes, Bytes>,
}

impl LmdbSharedCache {
    /// Open (or create) an LMDB environment at `path`.
    ///
    /// # Arguments
    ///
    /// * `path` - Directory where LMDB files will be stored
    /// * `max_size_mb` - Maximum size of the memory map in megabytes
    pub fn open<P: AsRef<Path>>(path: P, max_size_mb: usize) -> Result<Self, LmdbCacheError> {
        std::fs::create_dir_all(&path)?;

        // SAFETY: the environment is opened once per path by this process and
        // the files are not modified through other means while mapped.
        let env = unsafe {
            EnvOpenOptions::new()
                .map_size(max_size_mb * 1024 * 1024)
                .max_dbs(1)
                .open(path.as_ref())
        }
        .map_err(|e| LmdbCacheError::EnvOpen(e.to_string()))?;

        let mut wtxn = env
            .write_txn()
            .map_err(|e| LmdbCacheError::Transaction(e.to_string()))?;
        let db: Database<Bytes, Bytes> = env
            .create_database(&mut wtxn, None)
            .map_err(|e| LmdbCacheError::DbOpen(e.to_string()))?;
        wtxn.commit()
            .map_err(|e| LmdbCacheError::Transaction(e.to_string()))?;

        Ok(Self { env, db })
    }

    /// Number of records currently stored, expired ones included.
    pub fn record_count(&self) -> Result<u64, LmdbCacheError> {
        let rtxn = self
            .env
            .read_txn()
            .map_err(|e| LmdbCacheError::Transaction(e.to_string()))?;
        self.db
            .len(&rtxn)
            .map_err(|e| LmdbCacheError::Transaction(e.to_string()))
    }

    fn delete_key(&self, key: &str) -> Result<bool, LmdbCacheError> {
        let mut wtxn = self
            .env
            .write_txn()
            .map_err(|e| LmdbCacheError::Transaction(e.to_string()))?;
        let deleted = self
            .db
            .delete(&mut wtxn, key.as_bytes())
            .map_err(|e| LmdbCacheError::Transaction(e.to_string()))?;
        wtxn.commit()
            .map_err(|e| LmdbCacheError::Transaction(e.to_string()))?;
        Ok(deleted)
    }
}

#[async_trait]
impl SharedCacheBackend for LmdbSharedCache {
    async fn get(&self, key: &str) -> LookupResult<Option<Vec<u8>>> {
        let record = {
            let rtxn = self
                .env
                .read_txn()
                .map_err(|e| LmdbCacheError::Transaction(e.to_string()))?;
            self.db
                .get(&rtxn, key.as_bytes())
                .map_err(|e| LmdbCacheError::Transaction(e.to_string()))?
                .map(<[u8]>::to_vec)
        };

        let Some(record) = record else {
            return Ok(None);
        };
        if record.len() < DEADLINE_LEN {
            self.delete_key(key)?;
            return Ok(None);
        }

        let mut deadline = [0u8; DEADLINE_LEN];
        deadline.copy_from_slice(&record[..DEADLINE_LEN]);
        if i64::from_le_bytes(deadline) <= Utc::now().timestamp_millis() {
            self.delete_key(key)?;
            return Ok(None);
        }
        Ok(Some(record[DEADLINE_LEN..].to_vec()))
    }

    async fn put(&self, key: &str, bytes: Vec<u8>, ttl: Duration) -> LookupResult<()> {
        let ttl_millis = i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX);
        let deadline = Utc::now().timestamp_millis().saturating_add(ttl_millis);

        let mut record = Vec::with_capacity(DEADLINE_LEN + bytes.len());
        record.extend_from_slice(&deadline.to_le_bytes());
        record.extend_from_slice(&bytes);

        let mut wtxn = self
            .env
            .write_txn()
            .map_err(|e| LmdbCacheError::Transaction(e.to_string()))?;
        self.db
            .put(&mut wtxn, key.as_bytes(), &record)
            .map_err(|e| LmdbCacheError::Transaction(e.to_string()))?;
        wtxn.commit()
            .map_err(|e| LmdbCacheError::Transaction(e.to_string()))?;
        Ok(())
    }

    async fn remove(&self, key: &str) -> LookupResult<()> {
        self.delete_key(key)?;
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "lmdb"
    }
}
