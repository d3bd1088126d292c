//! Webhook invocation.

use async_trait::async_trait;
use axum::http::Method;
use serde_json::Value;
use std::sync::Arc;

use super::registry::{WebhookId, WebhookRegistry};
use crate::error::{ApiError, ApiResult};
use crate::gateway::CommandRouter;
use crate::telemetry::metrics;

/// Code run when a webhook is called.
#[async_trait]
pub trait WebhookHandler: Send + Sync {
    /// Handle one invocation; `payload` is the parsed body or `null`.
    async fn handle(&self, payload: Value) -> ApiResult<Value>;
}

/// Forwards webhook payloads into the command gateway.
#[derive(Clone)]
pub struct GatewayHandler {
    router: CommandRouter,
    expose_details: bool,
}

impl GatewayHandler {
    pub fn new(router: CommandRouter, expose_details: bool) -> Self {
        Self {
            router,
            expose_details,
        }
    }
}

#[async_trait]
impl WebhookHandler for GatewayHandler {
    async fn handle(&self, payload: Value) -> ApiResult<Value> {
        self.router
            .handle_payload(payload)
            .await
            .map_err(|e| ApiError::from_gateway(e, self.expose_details))
    }
}

/// Resolves webhook ids and runs their handlers.
#[derive(Clone)]
pub struct WebhookDispatcher {
    registry: Arc<WebhookRegistry>,
}

impl WebhookDispatcher {
    pub fn new(registry: Arc<WebhookRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<WebhookRegistry> {
        &self.registry
    }

    /// Invoke the webhook registered under `id`.
    ///
    /// The handler's result, success or error, is returned unchanged.
    pub async fn invoke(&self, id: &str, method: &Method, payload: Value) -> ApiResult<Value> {
        let webhook = match WebhookId::parse(id) {
            Some(parsed) => self.registry.resolve(&parsed).await,
            None => None,
        };
        let Some(webhook) = webhook else {
            tracing::warn!(webhook_id = %id, "Unknown webhook invoked");
            return Err(ApiError::webhook_not_found(id));
        };

        if !webhook.method.matches(method) {
            tracing::warn!(
                webhook_id = %webhook.id,
                expected = %webhook.method,
                got = %method,
                "Webhook invoked with wrong method"
            );
            return Err(ApiError::method_not_allowed(webhook.method, method));
        }

        tracing::info!(webhook_id = %webhook.id, name = %webhook.name, "Received webhook request");
        let result = webhook.handler.handle(payload).await;

        if let Some(metrics) = metrics() {
            metrics.record_webhook_invocation(result.is_ok());
        }
        if let Err(e) = &result {
            tracing::debug!(webhook_id = %webhook.id, code = %e.code, "Webhook handler returned an error");
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use crate::webhooks::registry::{NewWebhook, WebhookMethod};
    use serde_json::json;

    struct Fixed(ApiResult<Value>);

    #[async_trait]
    impl WebhookHandler for Fixed {
        async fn handle(&self, _payload: Value) -> ApiResult<Value> {
            self.0.clone()
        }
    }

    async fn dispatcher_with(method: &str, handler: Fixed) -> Result<(WebhookDispatcher, String), String> {
        let registry = Arc::new(WebhookRegistry::new("http://localhost"));
        let webhook = registry
            .create(
                NewWebhook {
                    method: Some(method.to_string()),
                    ..NewWebhook::default()
                },
                Arc::new(handler),
            )
            .await
            .map_err(|e| e.to_string())?;
        Ok((WebhookDispatcher::new(registry), webhook.id.to_string()))
    }

    #[tokio::test]
    async fn test_invoke_returns_handler_value() -> Result<(), String> {
        let (dispatcher, id) = dispatcher_with("POST", Fixed(Ok(json!({"ok": 1})))).await?;
        let value = dispatcher
            .invoke(&id, &Method::POST, Value::Null)
            .await
            .map_err(|e| e.to_string())?;
        assert_eq!(value, json!({"ok": 1}));
        Ok(())
    }

    #[tokio::test]
    async fn test_handler_error_passes_through() -> Result<(), String> {
        let failure = ApiError::invalid_command("Invalid command: unsupported command '9'");
        let (dispatcher, id) = dispatcher_with("POST", Fixed(Err(failure.clone()))).await?;
        let result = dispatcher.invoke(&id, &Method::POST, json!({"cmd": "9"})).await;
        assert_eq!(result.err(), Some(failure));
        Ok(())
    }

    #[tokio::test]
    async fn test_method_mismatch_is_405() -> Result<(), String> {
        let (dispatcher, id) = dispatcher_with("get", Fixed(Ok(Value::Null))).await?;
        let err = dispatcher
            .invoke(&id, &Method::POST, Value::Null)
            .await
            .err()
            .ok_or("expected an error")?;
        assert_eq!(err.code, ErrorCode::MethodNotAllowed);
        Ok(())
    }

    #[tokio::test]
    async fn test_unknown_and_malformed_ids_are_404() {
        let dispatcher = WebhookDispatcher::new(Arc::new(WebhookRegistry::new("http://localhost")));
        for id in ["not-a-uuid", "5d4dbdb7-c22c-43bd-bda4-5017b5e95264"] {
            let result = dispatcher.invoke(id, &Method::POST, Value::Null).await;
            assert_eq!(result.err().map(|e| e.code), Some(ErrorCode::WebhookNotFound));
        }
    }

    #[tokio::test]
    async fn test_builtin_resolves() -> Result<(), String> {
        let registry = Arc::new(WebhookRegistry::new("http://localhost"));
        let id = uuid::Uuid::new_v4();
        registry
            .register_builtin(id, "fixed", WebhookMethod::Post, Arc::new(Fixed(Ok(json!([])))))
            .await;
        let value = WebhookDispatcher::new(registry)
            .invoke(&id.to_string(), &Method::POST, Value::Null)
            .await
            .map_err(|e| e.to_string())?;
        assert_eq!(value, json!([]));
        Ok(())
    }
}
