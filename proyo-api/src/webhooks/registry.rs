//! In-memory webhook table.
//!
//! Every operation takes the lock exactly once. Ids are UUIDv4 and are
//! never handed out twice: deleted ids are retired, not recycled.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::dispatcher::WebhookHandler;
use crate::error::ApiError;
use crate::telemetry::metrics;

// ============================================================================
// TYPES
// ============================================================================

/// Webhook identifier.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, utoipa::ToSchema,
)]
#[serde(transparent)]
#[schema(value_type = String, format = "uuid")]
pub struct WebhookId(Uuid);

impl WebhookId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parse a path segment; anything that is not a UUID yields `None`.
    pub fn parse(raw: &str) -> Option<Self> {
        Uuid::parse_str(raw.trim()).ok().map(Self)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for WebhookId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for WebhookId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

impl fmt::Display for WebhookId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// HTTP method a webhook answers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum WebhookMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl WebhookMethod {
    /// Case-insensitive parse of a method name.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "GET" => Some(WebhookMethod::Get),
            "POST" => Some(WebhookMethod::Post),
            "PUT" => Some(WebhookMethod::Put),
            "PATCH" => Some(WebhookMethod::Patch),
            "DELETE" => Some(WebhookMethod::Delete),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            WebhookMethod::Get => "GET",
            WebhookMethod::Post => "POST",
            WebhookMethod::Put => "PUT",
            WebhookMethod::Patch => "PATCH",
            WebhookMethod::Delete => "DELETE",
        }
    }

    pub fn matches(&self, method: &axum::http::Method) -> bool {
        method.as_str() == self.as_str()
    }
}

impl fmt::Display for WebhookMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A registered webhook. Clones share the handler.
#[derive(Clone)]
pub struct Webhook {
    pub id: WebhookId,
    /// Caller-supplied path hint, kept as metadata
    pub path: Option<String>,
    pub method: WebhookMethod,
    pub url: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
    /// Built-in webhooks cannot be deleted
    pub builtin: bool,
    pub handler: Arc<dyn WebhookHandler>,
}

impl fmt::Debug for Webhook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Webhook")
            .field("id", &self.id)
            .field("path", &self.path)
            .field("method", &self.method)
            .field("url", &self.url)
            .field("name", &self.name)
            .field("created_at", &self.created_at)
            .field("builtin", &self.builtin)
            .finish_non_exhaustive()
    }
}

impl Webhook {
    pub fn summary(&self) -> WebhookSummary {
        WebhookSummary {
            id: self.id,
            url: self.url.clone(),
            method: self.method,
            name: self.name.clone(),
            created_at: self.created_at,
        }
    }
}

/// Listing entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct WebhookSummary {
    pub id: WebhookId,
    pub url: String,
    pub method: WebhookMethod,
    pub name: String,
    #[schema(value_type = String, format = "date-time")]
    pub created_at: DateTime<Utc>,
}

/// Registration input as received from callers.
#[derive(Debug, Clone, Default, Serialize, Deserialize, utoipa::ToSchema)]
pub struct NewWebhook {
    /// Optional path hint
    #[serde(default)]
    pub path: Option<String>,
    /// HTTP method; required
    #[serde(default)]
    pub method: Option<String>,
    /// Display name; defaults to `Webhook {id}`
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistrationError {
    #[error("HTTP method is required")]
    MissingMethod,

    #[error("Unsupported HTTP method '{0}'")]
    InvalidMethod(String),
}

impl From<RegistrationError> for ApiError {
    fn from(err: RegistrationError) -> Self {
        match err {
            RegistrationError::MissingMethod => ApiError::missing_field("method"),
            RegistrationError::InvalidMethod(_) => ApiError::invalid_input(err.to_string()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DeleteError {
    #[error("webhook not found")]
    NotFound,

    #[error("built-in webhook cannot be deleted")]
    Builtin,
}

// ============================================================================
// REGISTRY
// ============================================================================

#[derive(Default)]
struct Table {
    webhooks: HashMap<WebhookId, Webhook>,
    retired: HashSet<WebhookId>,
}

impl Table {
    fn is_taken(&self, id: &WebhookId) -> bool {
        self.webhooks.contains_key(id) || self.retired.contains(id)
    }
}

/// Shared webhook table.
pub struct WebhookRegistry {
    base_url: String,
    table: RwLock<Table>,
}

impl WebhookRegistry {
    /// `base_url` prefixes every webhook URL, e.g. `https://gw.example.org`.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            table: RwLock::new(Table::default()),
        }
    }

    fn url_for(&self, id: &WebhookId) -> String {
        format!("{}/webhook/{}", self.base_url, id)
    }

    /// Register a webhook bound to `handler` under a fresh id.
    pub async fn create(
        &self,
        request: NewWebhook,
        handler: Arc<dyn WebhookHandler>,
    ) -> Result<Webhook, RegistrationError> {
        let raw_method = request
            .method
            .as_deref()
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .ok_or(RegistrationError::MissingMethod)?;
        let method = WebhookMethod::parse(raw_method)
            .ok_or_else(|| RegistrationError::InvalidMethod(raw_method.to_string()))?;

        let mut table = self.table.write().await;
        let id = loop {
            let candidate = WebhookId::new();
            if !table.is_taken(&candidate) {
                break candidate;
            }
        };

        let webhook = Webhook {
            id,
            path: request.path.filter(|p| !p.trim().is_empty()),
            method,
            url: self.url_for(&id),
            name: request
                .name
                .filter(|n| !n.trim().is_empty())
                .unwrap_or_else(|| format!("Webhook {}", id)),
            created_at: Utc::now(),
            builtin: false,
            handler,
        };
        table.webhooks.insert(id, webhook.clone());
        publish_count(table.webhooks.len());

        tracing::info!(webhook_id = %id, method = %method, name = %webhook.name, "Webhook registered");
        Ok(webhook)
    }

    /// Install a fixed, protected entry, replacing any entry with that id.
    pub async fn register_builtin(
        &self,
        id: impl Into<WebhookId>,
        name: impl Into<String>,
        method: WebhookMethod,
        handler: Arc<dyn WebhookHandler>,
    ) -> Webhook {
        let id = id.into();
        let webhook = Webhook {
            id,
            path: None,
            method,
            url: self.url_for(&id),
            name: name.into(),
            created_at: Utc::now(),
            builtin: true,
            handler,
        };

        let mut table = self.table.write().await;
        table.retired.remove(&id);
        table.webhooks.insert(id, webhook.clone());
        publish_count(table.webhooks.len());

        tracing::info!(webhook_id = %id, method = %method, "Built-in webhook registered");
        webhook
    }

    /// Every live webhook, oldest first, ties broken by id.
    pub async fn list(&self) -> Vec<WebhookSummary> {
        let table = self.table.read().await;
        let mut summaries: Vec<_> = table.webhooks.values().map(Webhook::summary).collect();
        summaries.sort_by(|a, b| (a.created_at, a.id).cmp(&(b.created_at, b.id)));
        summaries
    }

    pub async fn resolve(&self, id: &WebhookId) -> Option<Webhook> {
        self.table.read().await.webhooks.get(id).cloned()
    }

    /// Remove a webhook and retire its id.
    pub async fn delete(&self, id: &WebhookId) -> Result<Webhook, DeleteError> {
        let mut table = self.table.write().await;
        match table.webhooks.get(id) {
            None => return Err(DeleteError::NotFound),
            Some(webhook) if webhook.builtin => return Err(DeleteError::Builtin),
            Some(_) => {}
        }

        let removed = table.webhooks.remove(id).ok_or(DeleteError::NotFound)?;
        table.retired.insert(*id);
        publish_count(table.webhooks.len());

        tracing::info!(webhook_id = %id, "Webhook removed");
        Ok(removed)
    }

    pub async fn len(&self) -> usize {
        self.table.read().await.webhooks.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

fn publish_count(count: usize) {
    if let Some(metrics) = metrics() {
        metrics.set_registered_webhooks(count);
    }
}
