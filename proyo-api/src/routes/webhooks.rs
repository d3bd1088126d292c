//! Webhook REST API Routes
//!
//! Management endpoints under `/api/webhooks` and the invocation endpoint
//! `/webhook/{webhookId}`, which accepts every supported method and defers
//! to the registry at request time.

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::Method,
    response::IntoResponse,
    routing::{any, delete, get},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

use super::parse_payload;
use crate::{
    error::{ApiError, ApiResult},
    state::AppState,
    webhooks::{DeleteError, NewWebhook, WebhookId, WebhookSummary},
};

// ============================================================================
// TYPES
// ============================================================================

/// Identity of a newly registered webhook.
#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct CreatedWebhook {
    pub id: WebhookId,
    pub url: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct CreateWebhookResponse {
    pub success: bool,
    pub webhook: CreatedWebhook,
}

#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct ListWebhooksResponse {
    pub success: bool,
    pub webhooks: Vec<WebhookSummary>,
}

#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct DeleteWebhookResponse {
    pub success: bool,
}

// ============================================================================
// ROUTE HANDLERS
// ============================================================================

/// POST /api/webhooks - Register a new webhook
#[utoipa::path(
    post,
    path = "/api/webhooks",
    tag = "Webhooks",
    request_body = NewWebhook,
    responses(
        (status = 200, description = "Webhook registered", body = CreateWebhookResponse),
        (status = 400, description = "Missing or unsupported method", body = crate::error::ErrorEnvelope),
    ),
)]
pub async fn create_webhook(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> ApiResult<impl IntoResponse> {
    let request: NewWebhook = match parse_payload(&body)? {
        Value::Null => NewWebhook::default(),
        value => serde_json::from_value(value)?,
    };

    let webhook = state
        .registry
        .create(request, state.gateway_handler.clone())
        .await?;

    Ok(Json(CreateWebhookResponse {
        success: true,
        webhook: CreatedWebhook {
            id: webhook.id,
            url: webhook.url,
            name: webhook.name,
        },
    }))
}

/// GET /api/webhooks - List all webhooks
#[utoipa::path(
    get,
    path = "/api/webhooks",
    tag = "Webhooks",
    responses(
        (status = 200, description = "Registered webhooks", body = ListWebhooksResponse),
    ),
)]
pub async fn list_webhooks(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(ListWebhooksResponse {
        success: true,
        webhooks: state.registry.list().await,
    })
}

/// DELETE /api/webhooks/{webhookId} - Remove a webhook
#[utoipa::path(
    delete,
    path = "/api/webhooks/{webhookId}",
    tag = "Webhooks",
    params(
        ("webhookId" = String, Path, description = "Webhook ID")
    ),
    responses(
        (status = 200, description = "Webhook removed", body = DeleteWebhookResponse),
        (status = 404, description = "Webhook not found", body = crate::error::ErrorEnvelope),
        (status = 409, description = "Built-in webhook", body = crate::error::ErrorEnvelope),
    ),
)]
pub async fn delete_webhook(
    State(state): State<Arc<AppState>>,
    Path(webhook_id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let id = WebhookId::parse(&webhook_id).ok_or_else(|| ApiError::webhook_not_found(&webhook_id))?;

    state.registry.delete(&id).await.map_err(|e| match e {
        DeleteError::NotFound => ApiError::webhook_not_found(id),
        DeleteError::Builtin => ApiError::builtin_webhook(id),
    })?;

    Ok(Json(DeleteWebhookResponse { success: true }))
}

/// ANY /webhook/{webhookId} - Invoke a webhook
#[utoipa::path(
    post,
    path = "/webhook/{webhookId}",
    tag = "Webhooks",
    params(
        ("webhookId" = String, Path, description = "Webhook ID")
    ),
    request_body(content = Object, description = "Payload handed to the webhook handler"),
    responses(
        (status = 200, description = "Handler result"),
        (status = 400, description = "Body is not JSON or the command is invalid", body = crate::error::ErrorEnvelope),
        (status = 404, description = "Webhook not found", body = crate::error::ErrorEnvelope),
        (status = 405, description = "Webhook bound to another method", body = crate::error::ErrorEnvelope),
    ),
)]
pub async fn invoke_webhook(
    State(state): State<Arc<AppState>>,
    Path(webhook_id): Path<String>,
    method: Method,
    body: Bytes,
) -> ApiResult<impl IntoResponse> {
    let payload = parse_payload(&body)?;
    let value = state.dispatcher.invoke(&webhook_id, &method, payload).await?;
    Ok(Json(value))
}

// ============================================================================
// ROUTER
// ============================================================================

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/webhooks", get(list_webhooks).post(create_webhook))
        .route("/api/webhooks/:webhook_id", delete(delete_webhook))
        .route("/webhook/:webhook_id", any(invoke_webhook))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_create_response_shape() -> Result<(), serde_json::Error> {
        let id = WebhookId::new();
        let response = CreateWebhookResponse {
            success: true,
            webhook: CreatedWebhook {
                id,
                url: format!("http://localhost/webhook/{}", id),
                name: "orders".to_string(),
            },
        };
        let value = serde_json::to_value(&response)?;
        assert_eq!(value["success"], json!(true));
        assert_eq!(value["webhook"]["id"], json!(id.to_string()));
        assert_eq!(value["webhook"]["name"], json!("orders"));
        Ok(())
    }
}
