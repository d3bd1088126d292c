//! Database Connection Pool Module
//!
//! PostgreSQL connection pooling via deadpool-postgres and the
//! [`QueryExecutor`] used by the command gateway.
//!
//! Every spec runs in its own transaction with `SET LOCAL statement_timeout`
//! and is wrapped as `WITH q AS (<text>) SELECT row_to_json(q) FROM q`, so
//! SELECTs and `UPDATE ... RETURNING` alike come back as JSON rows. Row
//! order is set on the outer query from `QuerySpec::order_by`.

use crate::error::{ApiError, ApiResult};
use async_trait::async_trait;
use deadpool_postgres::{Config, ManagerConfig, Pool, PoolError, RecyclingMethod, Runtime};
use proyo_core::{QueryError, QueryExecutor, QueryResult, QuerySpec, Row, SqlValue};
use serde_json::Value as JsonValue;
use std::time::Duration;
use tokio_postgres::error::SqlState;
use tokio_postgres::types::ToSql;
use tokio_postgres::NoTls;

// ============================================================================
// CONNECTION POOL CONFIGURATION
// ============================================================================

/// Database connection pool configuration.
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// Full connection string; overrides the discrete fields when set.
    pub url: Option<String>,
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
    /// Wait for a free connection
    pub timeout: Duration,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            url: None,
            host: "localhost".to_string(),
            port: 5432,
            dbname: "proyo".to_string(),
            user: "postgres".to_string(),
            password: "".to_string(),
            max_size: 16,
            timeout: Duration::from_secs(30),
        }
    }
}

impl DbConfig {
    /// Create a new database configuration from environment variables.
    pub fn from_env() -> Self {
        Self {
            url: std::env::var("PROYO_DB_URL").ok().filter(|s| !s.is_empty()),
            host: std::env::var("PROYO_DB_HOST").unwrap_or_else(|_| "localhost".to_string()),
            port: std::env::var("PROYO_DB_PORT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(5432),
            dbname: std::env::var("PROYO_DB_NAME").unwrap_or_else(|_| "proyo".to_string()),
            user: std::env::var("PROYO_DB_USER").unwrap_or_else(|_| "postgres".to_string()),
            password: std::env::var("PROYO_DB_PASSWORD").unwrap_or_default(),
            max_size: std::env::var("PROYO_DB_POOL_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(16),
            timeout: Duration::from_secs(
                std::env::var("PROYO_DB_TIMEOUT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(30),
            ),
        }
    }

    /// Create a connection pool from this configuration.
    pub fn create_pool(&self) -> ApiResult<Pool> {
        let mut cfg = Config::new();
        match &self.url {
            Some(url) => cfg.url = Some(url.clone()),
            None => {
                cfg.host = Some(self.host.clone());
                cfg.port = Some(self.port);
                cfg.dbname = Some(self.dbname.clone());
                cfg.user = Some(self.user.clone());
                cfg.password = Some(self.password.clone());
            }
        }

        cfg.manager = Some(ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        });
        let mut pool_config = deadpool_postgres::PoolConfig::new(self.max_size);
        pool_config.timeouts.wait = Some(self.timeout);
        cfg.pool = Some(pool_config);

        let pool = cfg
            .create_pool(Some(Runtime::Tokio1), NoTls)
            .map_err(|e| ApiError::database_error(format!("Failed to create pool: {}", e)))?;

        Ok(pool)
    }
}

// ============================================================================
// POSTGRES EXECUTOR
// ============================================================================

/// [`QueryExecutor`] backed by a deadpool-postgres pool.
#[derive(Clone)]
pub struct PgExecutor {
    pool: Pool,
}

impl PgExecutor {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    pub fn from_config(config: &DbConfig) -> ApiResult<Self> {
        Ok(Self::new(config.create_pool()?))
    }

    /// Current pool size for observability.
    pub fn pool_size(&self) -> usize {
        self.pool.status().size
    }

    async fn run(&self, spec: &QuerySpec) -> Result<QueryResult, QueryError> {
        let mut client = self.pool.get().await.map_err(pool_error)?;
        let tx = client.transaction().await.map_err(store_error)?;

        // SET does not take placeholders; the value is an integer we own.
        tx.batch_execute(&format!("SET LOCAL statement_timeout = {}", spec.timeout_ms))
            .await
            .map_err(store_error)?;

        let wrapped = wrap_as_json(spec);
        let params = bind_parameters(&spec.parameters);
        let rows = tx.query(&wrapped, &params).await.map_err(|e| {
            if e.code() == Some(&SqlState::QUERY_CANCELED) {
                QueryError::Timeout {
                    timeout_ms: spec.timeout_ms,
                }
            } else {
                store_error(e)
            }
        })?;
        tx.commit().await.map_err(store_error)?;

        let rows = rows
            .iter()
            .map(|row| row.try_get::<_, JsonValue>(0).map_err(store_error).and_then(into_row))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(QueryResult::from_rows(rows))
    }
}

#[async_trait]
impl QueryExecutor for PgExecutor {
    async fn execute(&self, spec: &QuerySpec) -> Result<QueryResult, QueryError> {
        let limit = Duration::from_millis(spec.timeout_ms);
        match tokio::time::timeout(limit, self.run(spec)).await {
            Ok(result) => result,
            Err(_) => Err(QueryError::Timeout {
                timeout_ms: spec.timeout_ms,
            }),
        }
    }

    async fn ping(&self) -> Result<(), QueryError> {
        let client = self.pool.get().await.map_err(pool_error)?;
        client
            .simple_query("SELECT 1")
            .await
            .map(|_| ())
            .map_err(|e| QueryError::connection(e.to_string()))
    }
}

/// Render every row as one JSON object. A CTE rather than a subquery so
/// `UPDATE ... RETURNING` can be wrapped too.
fn wrap_as_json(spec: &QuerySpec) -> String {
    match spec.order_by {
        Some(column) => format!(
            "WITH q AS ({}) SELECT row_to_json(q) FROM q ORDER BY q.\"{}\" ASC",
            spec.text, column
        ),
        None => format!("WITH q AS ({}) SELECT row_to_json(q) FROM q", spec.text),
    }
}

fn bind_parameters(values: &[SqlValue]) -> Vec<&(dyn ToSql + Sync)> {
    values
        .iter()
        .map(|value| match value {
            SqlValue::Text(text) => text as &(dyn ToSql + Sync),
            SqlValue::Bool(flag) => flag as &(dyn ToSql + Sync),
        })
        .collect()
}

fn into_row(value: JsonValue) -> Result<Row, QueryError> {
    match value {
        JsonValue::Object(map) => Ok(map),
        other => Err(QueryError::store(format!(
            "expected a JSON object row, got {}",
            other
        ))),
    }
}

fn store_error(err: tokio_postgres::Error) -> QueryError {
    match err.as_db_error() {
        Some(db) => QueryError::store(db.message()),
        None if err.is_closed() => QueryError::connection(err.to_string()),
        None => QueryError::store(err.to_string()),
    }
}

fn pool_error(err: PoolError) -> QueryError {
    QueryError::connection(err.to_string())
}
