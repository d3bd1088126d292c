//! Proyo API - Command Gateway Service
//!
//! Axum service in front of the activity store. One endpoint turns command
//! codes into parameterized PostgreSQL queries; a runtime webhook registry
//! exposes HTTP entry points that can be created and removed while the
//! service runs.

pub mod config;
pub mod db;
pub mod error;
pub mod gateway;
pub mod openapi;
pub mod routes;
pub mod state;
pub mod telemetry;
pub mod webhooks;

// Re-export commonly used types
pub use config::{ApiConfig, DEFAULT_GATEWAY_WEBHOOK_ID};
pub use db::{DbConfig, PgExecutor};
pub use error::{ApiError, ApiResult, ErrorCode, ErrorEnvelope};
pub use gateway::{CommandRouter, DispatchState};
pub use openapi::ApiDoc;
pub use routes::create_api_router;
pub use state::{AppState, GATEWAY_WEBHOOK_NAME};
pub use webhooks::{
    DeleteError, GatewayHandler, NewWebhook, RegistrationError, Webhook, WebhookDispatcher,
    WebhookHandler, WebhookId, WebhookMethod, WebhookRegistry, WebhookSummary,
};
