//! Error types for gateway dispatch

use thiserror::Error;

/// Failures reported by a [`QueryExecutor`](crate::QueryExecutor).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum QueryError {
    #[error("query exceeded its {timeout_ms}ms timeout")]
    Timeout { timeout_ms: u64 },

    #[error("store rejected query: {message}")]
    Store { message: String },

    #[error("store connection failed: {message}")]
    Connection { message: String },
}

impl QueryError {
    pub fn store(message: impl Into<String>) -> Self {
        QueryError::Store {
            message: message.into(),
        }
    }

    pub fn connection(message: impl Into<String>) -> Self {
        QueryError::Connection {
            message: message.into(),
        }
    }
}

/// Terminal failures of a command dispatch.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GatewayError {
    /// Unrecognized or missing command code, or a command missing the
    /// fields it needs. Client error.
    #[error("Invalid command: {reason}")]
    InvalidCommand { reason: String },

    /// The first stage of a two-stage lookup returned no rows.
    #[error("Asset table reference not found")]
    ReferenceNotFound,

    /// A single or staged query failed in the store.
    #[error("Query failed: {source}")]
    Query {
        #[source]
        source: QueryError,
    },

    /// One query of a parallel merge failed; no partial payload is produced.
    #[error("Query for '{slot}' failed: {source}")]
    PartialMerge {
        slot: String,
        #[source]
        source: QueryError,
    },

    /// A stored table reference could not be parsed into schema and table.
    #[error("Invalid asset table reference: {reference}")]
    InvalidReference { reference: String },
}

impl GatewayError {
    pub fn invalid_command(reason: impl Into<String>) -> Self {
        GatewayError::InvalidCommand {
            reason: reason.into(),
        }
    }

    /// True when the caller sent something the gateway cannot serve.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            GatewayError::InvalidCommand { .. } | GatewayError::ReferenceNotFound
        )
    }

    /// True for every store-side failure, including merge failures.
    pub fn is_query_failure(&self) -> bool {
        matches!(
            self,
            GatewayError::Query { .. }
                | GatewayError::PartialMerge { .. }
                | GatewayError::InvalidReference { .. }
        )
    }

    /// Short label for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            GatewayError::InvalidCommand { .. } => "invalid_command",
            GatewayError::ReferenceNotFound => "reference_not_found",
            GatewayError::Query { .. } => "query_failure",
            GatewayError::PartialMerge { .. } => "partial_merge_failure",
            GatewayError::InvalidReference { .. } => "invalid_reference",
        }
    }
}

impl From<QueryError> for GatewayError {
    fn from(source: QueryError) -> Self {
        GatewayError::Query { source }
    }
}
