//! Runtime Webhooks
//!
//! Webhooks are HTTP entry points created, listed and removed while the
//! service runs. The route table never changes: one catch-all route hands
//! each call to the [`WebhookDispatcher`], which looks the id up in the
//! [`WebhookRegistry`] and runs the attached handler.

pub mod dispatcher;
pub mod registry;

pub use dispatcher::{GatewayHandler, WebhookDispatcher, WebhookHandler};
pub use registry::{
    DeleteError, NewWebhook, RegistrationError, Webhook, WebhookId, WebhookMethod,
    WebhookRegistry, WebhookSummary,
};
