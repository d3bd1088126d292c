//! Query execution capability.
//!
//! The gateway never talks to a store directly; it hands [`QuerySpec`]s to
//! an executor. The PostgreSQL implementation lives in the API crate and a
//! scripted one in the test utilities.

use async_trait::async_trait;

use crate::error::QueryError;
use crate::query::{QueryResult, QuerySpec};

/// Runs query specs against a data store.
///
/// Implementations must honor `spec.timeout_ms` and report expiry as
/// [`QueryError::Timeout`]. They never retry.
#[async_trait]
pub trait QueryExecutor: Send + Sync {
    /// Execute one spec and return its rows.
    async fn execute(&self, spec: &QuerySpec) -> Result<QueryResult, QueryError>;

    /// Cheap connectivity probe used by readiness checks.
    async fn ping(&self) -> Result<(), QueryError>;
}
