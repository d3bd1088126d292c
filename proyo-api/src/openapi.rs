//! OpenAPI document for the Proyo gateway.

use utoipa::OpenApi;

use crate::error::{ApiError, ErrorCode, ErrorEnvelope};
use crate::routes::{frontend, health, webhooks};
use crate::telemetry::metrics;
use crate::webhooks::{NewWebhook, WebhookId, WebhookMethod, WebhookSummary};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Proyo Gateway API",
        version = "0.1.0",
        description = "Command-driven data gateway with a runtime webhook registry",
        license(name = "MIT", url = "https://opensource.org/licenses/MIT")
    ),
    servers(
        (url = "http://localhost:3927", description = "Local Development")
    ),
    tags(
        (name = "Gateway", description = "Command dispatch to the activity store"),
        (name = "Webhooks", description = "Runtime webhook registration and invocation"),
        (name = "Health", description = "Liveness and readiness probes"),
        (name = "Observability", description = "Prometheus metrics"),
    ),
    paths(
        frontend::frontend_database_interface,
        webhooks::create_webhook,
        webhooks::list_webhooks,
        webhooks::delete_webhook,
        webhooks::invoke_webhook,
        health::root,
        health::health,
        health::liveness,
        health::readiness,
        metrics::metrics_handler,
    ),
    components(
        schemas(
            ApiError, ErrorCode, ErrorEnvelope,
            NewWebhook, WebhookId, WebhookMethod, WebhookSummary,
            webhooks::CreatedWebhook, webhooks::CreateWebhookResponse,
            webhooks::ListWebhooksResponse, webhooks::DeleteWebhookResponse,
            health::RootResponse, health::HealthResponse, health::HealthStatus,
            health::HealthDetails, health::ComponentHealth,
        )
    )
)]
pub struct ApiDoc;

impl ApiDoc {
    /// Generate OpenAPI spec as JSON string.
    pub fn to_json() -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&Self::openapi())
    }
}
