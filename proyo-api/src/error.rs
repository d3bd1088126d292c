//! Error Types for the Proyo API
//!
//! This module defines error handling for the HTTP layer, including:
//! - ApiError struct for structured error responses
//! - ErrorCode enum for categorizing errors
//! - IntoResponse implementation producing the JSON error envelope
//!
//! Every failure leaves the service as
//! `{success: false, code, message, statusCode[, details]}`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use proyo_core::{GatewayError, QueryError};
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// ERROR CODE ENUM
// ============================================================================

/// Error codes for API responses.
///
/// Each error code maps to a specific HTTP status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // ========================================================================
    // Client Errors (400, 404, 405, 409)
    // ========================================================================
    /// Command code missing, unknown, or lacking the fields it needs
    InvalidCommand,

    /// Request contains invalid input data
    InvalidInput,

    /// Required field is missing from request
    MissingField,

    /// Two-stage lookup found no table reference
    ReferenceNotFound,

    /// Requested webhook does not exist
    WebhookNotFound,

    /// No route matches the request path
    RouteNotFound,

    /// Webhook exists but is bound to another HTTP method
    MethodNotAllowed,

    /// Built-in webhooks cannot be removed
    BuiltinWebhook,

    // ========================================================================
    // Server Errors (500, 503)
    // ========================================================================
    /// A store query failed or timed out
    QueryFailed,

    /// One query of a parallel merge failed
    PartialMergeFailed,

    /// Database operation failed outside a command dispatch
    DatabaseError,

    /// Internal server error
    InternalError,

    /// Service is temporarily unavailable
    ServiceUnavailable,
}

impl ErrorCode {
    /// Get the HTTP status code for this error code.
    pub fn status_code(&self) -> StatusCode {
        match self {
            ErrorCode::InvalidCommand | ErrorCode::InvalidInput | ErrorCode::MissingField => {
                StatusCode::BAD_REQUEST
            }

            ErrorCode::ReferenceNotFound
            | ErrorCode::WebhookNotFound
            | ErrorCode::RouteNotFound => StatusCode::NOT_FOUND,

            ErrorCode::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,

            ErrorCode::BuiltinWebhook => StatusCode::CONFLICT,

            ErrorCode::ServiceUnavailable => StatusCode::SERVICE_UNAVAILABLE,

            ErrorCode::QueryFailed
            | ErrorCode::PartialMergeFailed
            | ErrorCode::DatabaseError
            | ErrorCode::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get a default message for this error code.
    pub fn default_message(&self) -> &'static str {
        match self {
            ErrorCode::InvalidCommand => "Invalid command",
            ErrorCode::InvalidInput => "Invalid input data",
            ErrorCode::MissingField => "Required field is missing",
            ErrorCode::ReferenceNotFound => "Asset table reference not found",
            ErrorCode::WebhookNotFound => "Webhook not found",
            ErrorCode::RouteNotFound => "Route not found",
            ErrorCode::MethodNotAllowed => "Method not allowed",
            ErrorCode::BuiltinWebhook => "Built-in webhooks cannot be deleted",
            ErrorCode::QueryFailed => "Query failed",
            ErrorCode::PartialMergeFailed => "One or more merged queries failed",
            ErrorCode::DatabaseError => "Database operation failed",
            ErrorCode::InternalError => "Internal server error",
            ErrorCode::ServiceUnavailable => "Service temporarily unavailable",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

// ============================================================================
// API ERROR STRUCT
// ============================================================================

/// Structured error returned by every handler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct ApiError {
    /// Error code categorizing the error
    pub code: ErrorCode,

    /// Human-readable error message
    pub message: String,

    /// Underlying cause, present outside production
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Object>)]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    /// Create a new API error with the given code and message.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
        }
    }

    /// Create a new API error with the given code, using the default message.
    pub fn from_code(code: ErrorCode) -> Self {
        Self::new(code, code.default_message())
    }

    /// Add additional details to the error.
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        self.code.status_code()
    }

    // ========================================================================
    // Convenience constructors for common errors
    // ========================================================================

    pub fn invalid_command(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidCommand, message)
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidInput, message)
    }

    /// Create a MissingField error.
    pub fn missing_field(field: &str) -> Self {
        Self::new(
            ErrorCode::MissingField,
            format!("Required field '{}' is missing", field),
        )
    }

    /// Create a WebhookNotFound error.
    pub fn webhook_not_found(webhook_id: impl fmt::Display) -> Self {
        Self::new(
            ErrorCode::WebhookNotFound,
            format!("Webhook {} not found", webhook_id),
        )
    }

    pub fn route_not_found(path: &str) -> Self {
        Self::new(ErrorCode::RouteNotFound, format!("Route {} not found", path))
    }

    pub fn method_not_allowed(expected: impl fmt::Display, got: impl fmt::Display) -> Self {
        Self::new(
            ErrorCode::MethodNotAllowed,
            format!("Webhook accepts {}, got {}", expected, got),
        )
    }

    pub fn builtin_webhook(webhook_id: impl fmt::Display) -> Self {
        Self::new(
            ErrorCode::BuiltinWebhook,
            format!("Webhook {} is built in and cannot be deleted", webhook_id),
        )
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }

    pub fn database_error(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::DatabaseError, message)
    }

    pub fn service_unavailable(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ServiceUnavailable, message)
    }

    /// Map a gateway failure, attaching the cause as `details` when
    /// `expose_details` is set.
    ///
    /// Client errors keep their own message. Store failures are answered with
    /// a generic message; their cause is logged where the dispatch fails.
    pub fn from_gateway(err: GatewayError, expose_details: bool) -> Self {
        match &err {
            GatewayError::InvalidCommand { reason } => {
                Self::invalid_command(format!("Invalid command: {}", reason))
            }
            GatewayError::ReferenceNotFound => Self::from_code(ErrorCode::ReferenceNotFound),
            GatewayError::Query { .. } | GatewayError::InvalidReference { .. } => {
                Self::from_code(ErrorCode::QueryFailed).with_cause(&err, expose_details)
            }
            GatewayError::PartialMerge { .. } => {
                Self::from_code(ErrorCode::PartialMergeFailed).with_cause(&err, expose_details)
            }
        }
    }

    fn with_cause(self, cause: &impl fmt::Display, expose: bool) -> Self {
        if expose {
            self.with_details(serde_json::Value::String(cause.to_string()))
        } else {
            self
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for ApiError {}

// ============================================================================
// AXUM INTEGRATION
// ============================================================================

/// Wire form of an error.
#[derive(Debug, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ErrorEnvelope {
    pub success: bool,
    pub code: ErrorCode,
    pub message: String,
    pub status_code: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Object>)]
    pub details: Option<serde_json::Value>,
}

impl From<ApiError> for ErrorEnvelope {
    fn from(err: ApiError) -> Self {
        Self {
            success: false,
            status_code: err.status_code().as_u16(),
            code: err.code,
            message: err.message,
            details: err.details,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        (status, Json(ErrorEnvelope::from(self))).into_response()
    }
}

// ============================================================================
// CONVERSIONS FROM STANDARD ERRORS
// ============================================================================

/// Gateway failures reaching `?` without configuration context never expose
/// their cause.
impl From<GatewayError> for ApiError {
    fn from(err: GatewayError) -> Self {
        ApiError::from_gateway(err, false)
    }
}

/// Store failures outside a dispatch, such as the startup connectivity check.
impl From<QueryError> for ApiError {
    fn from(err: QueryError) -> Self {
        tracing::error!("Store error: {}", err);
        match err {
            QueryError::Connection { .. } => {
                ApiError::service_unavailable("Database is unreachable")
            }
            _ => ApiError::database_error("Database operation failed"),
        }
    }
}

/// Convert from serde_json::Error to ApiError.
impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        ApiError::invalid_input(format!("Invalid JSON: {}", err))
    }
}

// ============================================================================
// RESULT TYPE ALIAS
// ============================================================================

/// Result type alias for API operations.
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_error_code_status_mapping() {
        assert_eq!(ErrorCode::InvalidCommand.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(ErrorCode::ReferenceNotFound.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(ErrorCode::WebhookNotFound.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(ErrorCode::MethodNotAllowed.status_code(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(ErrorCode::BuiltinWebhook.status_code(), StatusCode::CONFLICT);
        assert_eq!(ErrorCode::QueryFailed.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            ErrorCode::PartialMergeFailed.status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            ErrorCode::ServiceUnavailable.status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[test]
    fn test_gateway_error_mapping() {
        let err = ApiError::from(GatewayError::invalid_command("unsupported command '9'"));
        assert_eq!(err.code, ErrorCode::InvalidCommand);
        assert!(err.message.contains("'9'"));

        let err = ApiError::from(GatewayError::ReferenceNotFound);
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(err.message, "Asset table reference not found");

        let err = ApiError::from(GatewayError::InvalidReference {
            reference: "nodot".to_string(),
        });
        assert_eq!(err.code, ErrorCode::QueryFailed);
    }

    #[test]
    fn test_query_failure_details_follow_flag() {
        let failure = || GatewayError::PartialMerge {
            slot: "progressData".to_string(),
            source: QueryError::store("relation does not exist"),
        };

        let hidden = ApiError::from_gateway(failure(), false);
        assert_eq!(hidden.code, ErrorCode::PartialMergeFailed);
        assert!(hidden.details.is_none());
        assert!(!hidden.message.contains("relation"));

        let shown = ApiError::from_gateway(failure(), true);
        let details = shown.details.map(|d| d.to_string()).unwrap_or_default();
        assert!(details.contains("progressData"));
        assert!(details.contains("relation does not exist"));
    }

    #[test]
    fn test_store_error_mapping() {
        let err = ApiError::from(QueryError::connection("connection refused"));
        assert_eq!(err.status_code(), StatusCode::SERVICE_UNAVAILABLE);
        assert!(!err.message.contains("refused"));

        let err = ApiError::from(QueryError::Timeout { timeout_ms: 100 });
        assert_eq!(err.code, ErrorCode::DatabaseError);
    }

    #[test]
    fn test_envelope_shape() -> Result<(), serde_json::Error> {
        let envelope = ErrorEnvelope::from(
            ApiError::webhook_not_found("abc").with_details(json!({"hint": "list first"})),
        );
        let value = serde_json::to_value(&envelope)?;
        assert_eq!(value["success"], json!(false));
        assert_eq!(value["code"], json!("WEBHOOK_NOT_FOUND"));
        assert_eq!(value["statusCode"], json!(404));
        assert_eq!(value["message"], json!("Webhook abc not found"));
        assert_eq!(value["details"]["hint"], json!("list first"));

        let bare = serde_json::to_value(ErrorEnvelope::from(ApiError::from_code(
            ErrorCode::InternalError,
        )))?;
        assert!(bare.get("details").is_none());
        Ok(())
    }

    #[test]
    fn test_error_display() {
        let err = ApiError::database_error("Connection failed");
        let display = format!("{}", err);

        assert!(display.contains("DatabaseError"));
        assert!(display.contains("Connection failed"));
    }
}
