//! Route tree.
//!
//! The table is fixed at startup. Runtime webhooks are resolved per request
//! through the registry, so registering or deleting one never rebuilds it.

pub mod frontend;
pub mod health;
pub mod webhooks;

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Bytes,
    http::{header, request::Parts, HeaderValue, Method, Uri},
    middleware::from_fn,
    routing::get,
    Router,
};
use serde_json::Value;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use utoipa::OpenApi;

use crate::config::ApiConfig;
use crate::error::{ApiError, ApiResult};
use crate::openapi::ApiDoc;
use crate::state::AppState;
use crate::telemetry::{metrics_handler, observability_middleware};

pub use frontend::create_router as frontend_router;
pub use health::create_router as health_router;
pub use webhooks::create_router as webhooks_router;

// ============================================================================
// SHARED HELPERS
// ============================================================================

/// Parse a request body as JSON; an empty body is `null`.
pub(crate) fn parse_payload(body: &Bytes) -> ApiResult<Value> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Null);
    }
    Ok(serde_json::from_slice(body)?)
}

/// Fallback for unmatched routes.
async fn route_not_found(method: Method, uri: Uri) -> ApiError {
    tracing::warn!(method = %method, path = %uri.path(), "Route not found");
    ApiError::route_not_found(uri.path())
}

/// Handler for /openapi.json endpoint; Swagger UI serves it otherwise.
#[cfg(not(feature = "swagger-ui"))]
async fn openapi_json() -> axum::Json<utoipa::openapi::OpenApi> {
    axum::Json(ApiDoc::openapi())
}

// ============================================================================
// CORS LAYER
// ============================================================================

/// Build the CORS layer from ApiConfig.
///
/// With no configured origins every origin is allowed; otherwise origins are
/// matched by [`ApiConfig::is_origin_allowed`], including `*.domain` entries.
fn build_cors_layer(config: &ApiConfig) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT, header::AUTHORIZATION])
        .max_age(Duration::from_secs(config.cors_max_age_secs));

    if config.cors_origins.is_empty() {
        tracing::info!("CORS: allowing all origins");
        cors.allow_origin(Any).allow_headers(Any)
    } else {
        tracing::info!("CORS: allowing origins: {:?}", config.cors_origins);
        let allowed = config.clone();
        let origins = AllowOrigin::predicate(move |origin: &HeaderValue, _: &Parts| {
            origin
                .to_str()
                .map(|o| allowed.is_origin_allowed(o))
                .unwrap_or(false)
        });

        if config.cors_allow_credentials {
            cors.allow_origin(origins).allow_credentials(true)
        } else {
            cors.allow_origin(origins)
        }
    }
}

// ============================================================================
// ROUTER
// ============================================================================

/// Create the complete router:
/// - `POST /frontend_database_interface` command gateway
/// - `/api/webhooks` management and `/webhook/{id}` invocation
/// - `/`, `/health`, `/health/live`, `/health/ready`
/// - `/metrics` and `/openapi.json`
/// - Swagger UI at `/documentation` (when the swagger-ui feature is enabled)
///
/// # Middleware Order (outer to inner)
/// 1. CORS - handles preflight requests
/// 2. Observability - tracing and metrics
pub fn create_api_router(state: AppState) -> Router {
    let config = state.config.clone();
    let state = Arc::new(state);

    let router = Router::new()
        .merge(frontend::create_router(state.clone()))
        .merge(webhooks::create_router(state.clone()))
        .merge(health::create_router(state))
        .route("/metrics", get(metrics_handler));

    #[cfg(feature = "swagger-ui")]
    let router = router.merge(
        utoipa_swagger_ui::SwaggerUi::new("/documentation").url("/openapi.json", ApiDoc::openapi()),
    );
    #[cfg(not(feature = "swagger-ui"))]
    let router = router.route("/openapi.json", get(openapi_json));

    router
        .fallback(route_not_found)
        .layer(from_fn(observability_middleware))
        .layer(build_cors_layer(&config))
}
