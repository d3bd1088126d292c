//! Shared application state.

use proyo_core::{QueryBuilder, QueryExecutor};
use std::sync::Arc;

use crate::config::ApiConfig;
use crate::gateway::CommandRouter;
use crate::webhooks::{
    GatewayHandler, WebhookDispatcher, WebhookHandler, WebhookMethod, WebhookRegistry,
};

/// Name of the pre-registered gateway webhook.
pub const GATEWAY_WEBHOOK_NAME: &str = "Frontend database interface";

/// Everything the handlers share.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ApiConfig>,
    pub router: CommandRouter,
    pub registry: Arc<WebhookRegistry>,
    pub dispatcher: WebhookDispatcher,
    /// Handler bound to webhooks created through the API
    pub gateway_handler: Arc<dyn WebhookHandler>,
}

impl AppState {
    /// Wire the gateway around `executor` and pre-register the gateway
    /// webhook under `config.gateway_webhook_id`.
    pub async fn new(executor: Arc<dyn QueryExecutor>, config: ApiConfig) -> Self {
        let router = CommandRouter::new(executor, QueryBuilder::new(config.query_timeout_ms));
        let gateway_handler: Arc<dyn WebhookHandler> = Arc::new(GatewayHandler::new(
            router.clone(),
            config.expose_error_details(),
        ));

        let registry = Arc::new(WebhookRegistry::new(config.public_base_url.clone()));
        registry
            .register_builtin(
                config.gateway_webhook_id,
                GATEWAY_WEBHOOK_NAME,
                WebhookMethod::Post,
                gateway_handler.clone(),
            )
            .await;

        Self {
            config: Arc::new(config),
            dispatcher: WebhookDispatcher::new(registry.clone()),
            router,
            registry,
            gateway_handler,
        }
    }
}
