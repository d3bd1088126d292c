//! HTTP scenarios driven through the full router with a scripted store.

use axum::{
    body::{to_bytes, Body},
    http::{Method, Request, StatusCode},
    Router,
};
use proyo_api::{create_api_router, ApiConfig, AppState, DEFAULT_GATEWAY_WEBHOOK_ID};
use proyo_test_utils::*;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

type TestResult = Result<(), Box<dyn std::error::Error>>;

async fn app_with(executor: MockExecutor) -> Router {
    let state = AppState::new(Arc::new(executor), ApiConfig::default()).await;
    create_api_router(state)
}

async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    body: Option<Value>,
) -> Result<(StatusCode, Value), Box<dyn std::error::Error>> {
    let mut builder = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(value) => {
            builder = builder.header("content-type", "application/json");
            Body::from(serde_json::to_vec(&value)?)
        }
        None => Body::empty(),
    };

    let response = app.clone().oneshot(builder.body(body)?).await?;
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await?;
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes)?
    };
    Ok((status, value))
}

#[tokio::test]
async fn webhook_lifecycle_create_list_delete() -> TestResult {
    let app = app_with(MockExecutor::new()).await;

    let (status, created) = send(
        &app,
        Method::POST,
        "/api/webhooks",
        Some(json!({"path": "/orders", "method": "post", "name": "Orders"})),
    )
    .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(created["success"], json!(true));
    let id = created["webhook"]["id"].as_str().ok_or("missing id")?.to_string();
    assert_eq!(created["webhook"]["name"], json!("Orders"));
    assert_eq!(
        created["webhook"]["url"],
        json!(format!("http://localhost:3927/webhook/{}", id))
    );

    let (status, listed) = send(&app, Method::GET, "/api/webhooks", None).await?;
    assert_eq!(status, StatusCode::OK);
    let ids: Vec<&str> = listed["webhooks"]
        .as_array()
        .ok_or("webhooks is not an array")?
        .iter()
        .filter_map(|w| w["id"].as_str())
        .collect();
    assert_eq!(ids.len(), 2);
    assert!(ids.contains(&id.as_str()));
    assert!(ids.contains(&DEFAULT_GATEWAY_WEBHOOK_ID.to_string().as_str()));

    let uri = format!("/api/webhooks/{}", id);
    let (status, deleted) = send(&app, Method::DELETE, &uri, None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(deleted, json!({"success": true}));

    let (status, again) = send(&app, Method::DELETE, &uri, None).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(again["code"], json!("WEBHOOK_NOT_FOUND"));

    let (status, _) = send(&app, Method::POST, &format!("/webhook/{}", id), Some(json!({}))).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn builtin_webhook_cannot_be_deleted() -> TestResult {
    let app = app_with(MockExecutor::new()).await;
    let uri = format!("/api/webhooks/{}", DEFAULT_GATEWAY_WEBHOOK_ID);

    let (status, body) = send(&app, Method::DELETE, &uri, None).await?;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], json!("BUILTIN_WEBHOOK"));

    let (_, listed) = send(&app, Method::GET, "/api/webhooks", None).await?;
    assert_eq!(listed["webhooks"].as_array().map(Vec::len), Some(1));
    Ok(())
}

#[tokio::test]
async fn create_without_method_is_rejected() -> TestResult {
    let app = app_with(MockExecutor::new()).await;

    let (status, body) = send(&app, Method::POST, "/api/webhooks", Some(json!({"path": "/x"}))).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], json!("MISSING_FIELD"));

    let (status, body) = send(&app, Method::POST, "/api/webhooks", None).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], json!(false));

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/webhooks",
        Some(json!({"method": "TRACE"})),
    )
    .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], json!("INVALID_INPUT"));
    Ok(())
}

#[tokio::test]
async fn asset_lookup_without_reference_is_not_found() -> TestResult {
    let app = app_with(MockExecutor::new()).await;

    let (status, body) = send(
        &app,
        Method::POST,
        "/frontend_database_interface",
        Some(asset_lookup_payload()),
    )
    .await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], json!("Asset table reference not found"));
    assert_eq!(body["statusCode"], json!(404));
    Ok(())
}

#[tokio::test]
async fn asset_lookup_returns_second_stage_rows() -> TestResult {
    let executor = MockExecutor::new()
        .with_rows(
            "asset_table_reference",
            vec![row(json!({"asset_table_reference": "class8_assets.activity123"}))],
        )
        .with_rows(
            "order_index",
            vec![
                row(json!({"order_index": 1, "asset": "intro.png"})),
                row(json!({"order_index": 2, "asset": "quiz.json"})),
            ],
        );
    let app = app_with(executor).await;

    let (status, body) = send(
        &app,
        Method::POST,
        "/frontend_database_interface",
        Some(asset_lookup_payload()),
    )
    .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().map(Vec::len), Some(2));
    assert_eq!(body[0]["asset"], json!("intro.png"));
    Ok(())
}

#[tokio::test]
async fn invalid_command_uses_error_envelope() -> TestResult {
    let app = app_with(MockExecutor::new()).await;

    let (status, body) = send(
        &app,
        Method::POST,
        "/frontend_database_interface",
        Some(json!({"cmd": "9", "user": "auden_cbse"})),
    )
    .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], json!(false));
    assert_eq!(body["code"], json!("INVALID_COMMAND"));
    assert_eq!(body["statusCode"], json!(400));
    assert!(body["message"]
        .as_str()
        .is_some_and(|m| m.starts_with("Invalid command")));
    Ok(())
}

#[tokio::test]
async fn malformed_json_is_bad_request() -> TestResult {
    let app = app_with(MockExecutor::new()).await;
    let request = Request::builder()
        .method(Method::POST)
        .uri("/frontend_database_interface")
        .header("content-type", "application/json")
        .body(Body::from("{\"cmd\":"))?;

    let response = app.oneshot(request).await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = serde_json::from_slice(&to_bytes(response.into_body(), usize::MAX).await?)?;
    assert_eq!(body["code"], json!("INVALID_INPUT"));
    Ok(())
}

#[tokio::test]
async fn token_usage_returns_rows() -> TestResult {
    let executor = MockExecutor::new().with_rows(
        "p_total",
        vec![row(json!({"p_input_token": 10, "p_output_token": 5, "p_total": 15}))],
    );
    let app = app_with(executor).await;

    let (status, body) = send(
        &app,
        Method::POST,
        "/frontend_database_interface",
        Some(token_usage_payload()),
    )
    .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!([{"p_input_token": 10, "p_output_token": 5, "p_total": 15}]));
    Ok(())
}

#[tokio::test]
async fn gateway_webhook_forwards_to_dispatcher() -> TestResult {
    let executor = MockExecutor::new().with_rows("p_total", vec![row(json!({"p_total": 42}))]);
    let app = app_with(executor).await;
    let uri = format!("/webhook/{}", DEFAULT_GATEWAY_WEBHOOK_ID);

    let (status, body) = send(&app, Method::POST, &uri, Some(token_usage_payload())).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!([{"p_total": 42}]));

    let (status, body) = send(&app, Method::POST, &uri, Some(json!({"cmd": "x"}))).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], json!("INVALID_COMMAND"));
    Ok(())
}

#[tokio::test]
async fn created_webhook_runs_gateway_commands() -> TestResult {
    let executor = MockExecutor::new().with_rows("p_total", vec![row(json!({"p_total": 7}))]);
    let app = app_with(executor).await;

    let (_, created) = send(
        &app,
        Method::POST,
        "/api/webhooks",
        Some(json!({"method": "PUT"})),
    )
    .await?;
    let id = created["webhook"]["id"].as_str().ok_or("missing id")?;
    let uri = format!("/webhook/{}", id);

    let (status, body) = send(&app, Method::PUT, &uri, Some(token_usage_payload())).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!([{"p_total": 7}]));
    Ok(())
}

#[tokio::test]
async fn webhook_method_mismatch_is_rejected() -> TestResult {
    let app = app_with(MockExecutor::new()).await;
    let uri = format!("/webhook/{}", DEFAULT_GATEWAY_WEBHOOK_ID);

    let (status, body) = send(&app, Method::GET, &uri, None).await?;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(body["code"], json!("METHOD_NOT_ALLOWED"));
    Ok(())
}

#[tokio::test]
async fn unknown_webhook_ids_are_not_found() -> TestResult {
    let app = app_with(MockExecutor::new()).await;

    for uri in ["/webhook/not-a-uuid", "/webhook/00000000-0000-4000-8000-000000000000"] {
        let (status, body) = send(&app, Method::POST, uri, Some(json!({}))).await?;
        assert_eq!(status, StatusCode::NOT_FOUND, "{}", uri);
        assert_eq!(body["code"], json!("WEBHOOK_NOT_FOUND"));
    }
    Ok(())
}

#[tokio::test]
async fn unknown_route_is_not_found() -> TestResult {
    let app = app_with(MockExecutor::new()).await;

    let (status, body) = send(&app, Method::GET, "/nowhere", None).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], json!("ROUTE_NOT_FOUND"));
    assert_eq!(body["success"], json!(false));
    Ok(())
}

#[tokio::test]
async fn root_and_health_respond() -> TestResult {
    let app = app_with(MockExecutor::new()).await;

    let (status, body) = send(&app, Method::GET, "/", None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"status": "ok", "message": "ProyoGeek API is running"}));

    let (status, body) = send(&app, Method::GET, "/health", None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], json!("healthy"));

    let (status, body) = send(&app, Method::GET, "/health/ready", None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["details"]["webhooks"], json!(1));
    Ok(())
}

#[tokio::test]
async fn readiness_fails_when_store_is_unreachable() -> TestResult {
    let app = app_with(MockExecutor::new().unreachable()).await;

    let (status, body) = send(&app, Method::GET, "/health/ready", None).await?;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["status"], json!("unhealthy"));
    assert_eq!(body["details"]["database"]["status"], json!("unhealthy"));
    Ok(())
}

#[tokio::test]
async fn cors_allows_configured_origins_only() -> TestResult {
    let config = ApiConfig {
        cors_origins: vec!["https://proyo.io".to_string(), "*.proyo.io".to_string()],
        ..ApiConfig::default()
    };
    let state = AppState::new(Arc::new(MockExecutor::new()), config).await;
    let app = create_api_router(state);

    for (origin, allowed) in [
        ("https://proyo.io", true),
        ("https://app.proyo.io", true),
        ("https://evil.example", false),
    ] {
        let request = Request::builder()
            .method(Method::GET)
            .uri("/")
            .header("origin", origin)
            .body(Body::empty())?;
        let response = app.clone().oneshot(request).await?;
        let echoed = response
            .headers()
            .get("access-control-allow-origin")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        assert_eq!(echoed.as_deref() == Some(origin), allowed, "{}", origin);
    }
    Ok(())
}
