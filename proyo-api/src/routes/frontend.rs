//! Command gateway endpoint.

use axum::{body::Bytes, extract::State, response::IntoResponse, routing::post, Json, Router};
use std::sync::Arc;

use super::parse_payload;
use crate::{
    error::{ApiError, ApiResult},
    state::AppState,
};

/// POST /frontend_database_interface - Run a command
///
/// Command "1" answers with an object keyed by slot; every other command
/// answers with a row array.
#[utoipa::path(
    post,
    path = "/frontend_database_interface",
    tag = "Gateway",
    request_body(content = Object, description = "`cmd` plus the fields the command needs"),
    responses(
        (status = 200, description = "Rows, or rows grouped by slot"),
        (status = 400, description = "Invalid command", body = crate::error::ErrorEnvelope),
        (status = 404, description = "Asset table reference not found", body = crate::error::ErrorEnvelope),
        (status = 500, description = "Query failed", body = crate::error::ErrorEnvelope),
    ),
)]
pub async fn frontend_database_interface(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> ApiResult<impl IntoResponse> {
    let payload = parse_payload(&body)?;
    let value = state
        .router
        .handle_payload(payload)
        .await
        .map_err(|e| ApiError::from_gateway(e, state.config.expose_error_details()))?;
    Ok(Json(value))
}

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/frontend_database_interface", post(frontend_database_interface))
        .with_state(state)
}
