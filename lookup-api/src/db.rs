//! PostgreSQL Data Source
//!
//! Connection pooling with deadpool-postgres and the [`LookupSource`]
//! implementation that renders lookup queries through [`crate::sql`].
//!
//! Page and count statements are pipelined inside one `REPEATABLE READ,
//! READ ONLY` transaction so both see the same snapshot. When the caller's token is
//! cancelled the in-flight statement is cancelled server-side through the
//! connection's cancel token.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use deadpool_postgres::{Config, ManagerConfig, Pool, PoolConfig, RecyclingMethod, Runtime};
use lookup_core::{ConfigError, Identifier, LookupError, LookupItem, LookupResult, SourceError};
use lookup_storage::{LookupSource, PageQuery, PageRows, SnapshotQuery, SnapshotRow};
use tokio_postgres::{CancelToken, IsolationLevel, NoTls, Row};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::sql::{page_statements, snapshot_statement};

// ============================================================================
// CONNECTION POOL CONFIGURATION
// ============================================================================

/// Database connection pool configuration.
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// PostgreSQL host
    pub host: String,
    /// PostgreSQL port
    pub port: u16,
    /// Database name
    pub dbname: String,
    /// Database user
    pub user: String,
    /// Database password
    pub password: String,
    /// Maximum pool size
    pub max_size: usize,
    /// How long to wait for a pooled connection
    pub timeout: Duration,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5432,
            dbname: "lookups".to_string(),
            user: "postgres".to_string(),
            password: "".to_string(),
            max_size: 16,
            timeout: Duration::from_secs(30),
        }
    }
}

impl DbConfig {
    /// Create a new database configuration from environment variables.
    ///
    /// Environment variables:
    /// - `LOOKUP_DB_HOST` (default: localhost)
    /// - `LOOKUP_DB_PORT` (default: 5432)
    /// - `LOOKUP_DB_NAME` (default: lookups)
    /// - `LOOKUP_DB_USER` (default: postgres)
    /// - `LOOKUP_DB_PASSWORD` (default: empty)
    /// - `LOOKUP_DB_POOL_SIZE` (default: 16)
    /// - `LOOKUP_DB_TIMEOUT` seconds (default: 30)
    pub fn from_env() -> Self {
        Self {
            host: std::env::var("LOOKUP_DB_HOST").unwrap_or_else(|_| "localhost".to_string()),
            port: std::env::var("LOOKUP_DB_PORT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(5432),
            dbname: std::env::var("LOOKUP_DB_NAME").unwrap_or_else(|_| "lookups".to_string()),
            user: std::env::var("LOOKUP_DB_USER").unwrap_or_else(|_| "postgres".to_string()),
            password: std::env::var("LOOKUP_DB_PASSWORD").unwrap_or_default(),
            max_size: std::env::var("LOOKUP_DB_POOL_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(16),
            timeout: Duration::from_secs(
                std::env::var("LOOKUP_DB_TIMEOUT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(30),
            ),
        }
    }

    /// Create a connection pool from this configuration.
    pub fn create_pool(&self) -> LookupResult<Pool> {
        if self.max_size == 0 {
            return Err(ConfigError::InvalidValue {
                field: "LOOKUP_DB_POOL_SIZE".to_string(),
                value: "0".to_string(),
                reason: "must be positive".to_string(),
            }
            .into());
        }

        let mut cfg = Config::new();
        cfg.host = Some(self.host.clone());
        cfg.port = Some(self.port);
        cfg.dbname = Some(self.dbname.clone());
        cfg.user = Some(self.user.clone());
        cfg.password = Some(self.password.clone());

        cfg.manager = Some(ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        });

        let mut pool_cfg = PoolConfig::new(self.max_size);
        pool_cfg.timeouts.wait = Some(self.timeout);
        cfg.pool = Some(pool_cfg);

        let pool = cfg
            .create_pool(Some(Runtime::Tokio1), NoTls)
            .map_err(|e| SourceError::Pool {
                reason: format!("Failed to create pool: {}", e),
            })?;

        Ok(pool)
    }
}

// ============================================================================
// ERROR MAPPING
// ============================================================================

fn pool_error(err: deadpool_postgres::PoolError) -> LookupError {
    match err {
        deadpool_postgres::PoolError::Backend(e) => SourceError::Connection {
            source_name: "postgres".to_string(),
            reason: e.to_string(),
        }
        .into(),
        other => SourceError::Pool {
            reason: other.to_string(),
        }
        .into(),
    }
}

/// Server-reported errors are query failures; anything else means the
/// connection itself is gone.
fn query_error(table: &Identifier, err: tokio_postgres::Error) -> LookupError {
    if err.as_db_error().is_some() {
        SourceError::Query {
            table: table.to_string(),
            reason: err.to_string(),
        }
        .into()
    } else {
        SourceError::Connection {
            source_name: "postgres".to_string(),
            reason: err.to_string(),
        }
        .into()
    }
}

fn decode_error(table: &Identifier, err: tokio_postgres::Error) -> LookupError {
    SourceError::Decode {
        table: table.to_string(),
        reason: err.to_string(),
    }
    .into()
}

fn item_from_row(table: &Identifier, row: &Row) -> LookupResult<LookupItem> {
    let value: String = row.try_get("value").map_err(|e| decode_error(table, e))?;
    let label: Option<String> = row.try_get("label").map_err(|e| decode_error(table, e))?;
    Ok(LookupItem::new(value, label.unwrap_or_default()))
}

// ============================================================================
// LOOKUP SOURCE
// ============================================================================

/// PostgreSQL-backed [`LookupSource`].
#[derive(Clone)]
pub struct PgLookupSource {
    pool: Pool,
}

impl PgLookupSource {
    /// Create a new source with the given pool.
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    /// Create a new source from configuration.
    pub fn from_config(config: &DbConfig) -> LookupResult<Self> {
        Ok(Self::new(config.create_pool()?))
    }

    /// Get the current pool size for observability.
    pub fn pool_size(&self) -> usize {
        self.pool.status().size
    }

    async fn get_conn(&self) -> LookupResult<deadpool_postgres::Object> {
        self.pool.get().await.map_err(pool_error)
    }

    /// Race `work` against `cancel`; on cancellation ask the server to
    /// abort whatever the connection is running.
    async fn cancellable<T>(
        cancel: &CancellationToken,
        cancel_token: CancelToken,
        what: &str,
        work: impl Future<Output = LookupResult<T>>,
    ) -> LookupResult<T> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                if let Err(e) = cancel_token.cancel_query(NoTls).await {
                    warn!(error = %e, "Failed to cancel PostgreSQL query");
                }
                Err(LookupError::cancelled(what.to_string()))
            }
            result = work => result,
        }
    }
}

impl std::fmt::Debug for PgLookupSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PgLookupSource")
            .field("pool_size", &self.pool_size())
            .finish()
    }
}

#[async_trait]
impl LookupSource for PgLookupSource {
    async fn load_snapshot(
        &self,
        query: &SnapshotQuery,
        cancel: &CancellationToken,
    ) -> LookupResult<Vec<SnapshotRow>> {
        let client = self.get_conn().await?;
        let sql = snapshot_statement(query);
        debug!(table = %query.table, "Loading lookup snapshot");

        let work = async {
            let rows = client
                .query(sql.as_str(), &[])
                .await
                .map_err(|e| query_error(&query.table, e))?;
            rows.iter()
                .map(|row| {
                    let item = item_from_row(&query.table, row)?;
                    let filter_value: Option<String> = row
                        .try_get("filter_value")
                        .map_err(|e| decode_error(&query.table, e))?;
                    Ok(SnapshotRow::new(item, filter_value))
                })
                .collect::<LookupResult<Vec<_>>>()
        };
        Self::cancellable(cancel, client.cancel_token(), "snapshot load", work).await
    }

    async fn query_page(
        &self,
        query: &PageQuery,
        cancel: &CancellationToken,
    ) -> LookupResult<PageRows> {
        let mut client = self.get_conn().await?;
        let cancel_token = client.cancel_token();
        let statements = page_statements(query);
        debug!(
            table = %query.table,
            offset = query.offset,
            limit = query.limit,
            predicates = query.predicates.len(),
            "Running lookup page query"
        );

        let table = &query.table;
        let work = async {
            let tx = client
                .build_transaction()
                .isolation_level(IsolationLevel::RepeatableRead)
                .read_only(true)
                .start()
                .await
                .map_err(|e| query_error(table, e))?;

            // Both statements are in flight at once; the connection
            // pipelines them inside the transaction.
            let page_params = statements.page_params();
            let count_params = statements.count_params();
            let (rows, count_row) = tokio::try_join!(
                tx.query(statements.page_sql.as_str(), &page_params),
                tx.query_one(statements.count_sql.as_str(), &count_params),
            )
            .map_err(|e| query_error(table, e))?;
            tx.commit().await.map_err(|e| query_error(table, e))?;

            let total: i64 = count_row.try_get(0).map_err(|e| decode_error(table, e))?;
            let items = rows
                .iter()
                .map(|row| item_from_row(table, row))
                .collect::<LookupResult<Vec<_>>>()?;
            Ok(PageRows {
                items,
                total_count: u64::try_from(total).unwrap_or(0),
            })
        };
        Self::cancellable(cancel, cancel_token, "page query", work).await
    }

    async fn health_check(&self) -> LookupResult<()> {
        let client = self.get_conn().await?;
        client
            .simple_query("SELECT 1")
            .await
            .map_err(|e| SourceError::Connection {
                source_name: "postgres".to_string(),
                reason: e.to_string(),
            })?;
        Ok(())
    }

    fn source_name(&self) -> &str {
        "postgres"
    }
}
