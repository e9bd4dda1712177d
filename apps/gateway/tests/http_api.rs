// [apps/gateway/tests/http_api.rs]
//! Exercises the HTTP surface end to end against an in-memory datastore:
//! register, log in, hit an authenticated endpoint, confirm a missing or
//! stale token is rejected.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use meridian_domain::config::GatewayConfig;
use meridian_gateway::routes::build_router;
use meridian_gateway::state::AppState;
use meridian_store::StoreClient;
use meridian_synthesis::{LocalProvider, Provider, SynthesisEngine};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

async fn test_state() -> AppState {
    test_state_with_config(GatewayConfig::default()).await
}

async fn test_state_with_config(config: GatewayConfig) -> AppState {
    let store = StoreClient::connect(":memory:", None).await.expect("in-memory datastore");
    let primary: Arc<dyn Provider> = Arc::new(LocalProvider::new("http://127.0.0.1:1", "unused"));
    let synthesis = SynthesisEngine::new(primary, vec![], 60, 1);
    AppState::new(config, store, synthesis, "http://127.0.0.1:1", b"test-signing-secret".to_vec(), "k1".to_string())
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn health_reports_maintenance_until_promoted() {
    let state = test_state().await;
    let router = build_router(state.clone());

    let response = router
        .clone()
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

    state.resume_operational();
    let response = router
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn register_then_login_then_access_protected_route() {
    let state = test_state().await;
    state.resume_operational();
    let router = build_router(state);

    let register_body = json!({
        "display_name": "ana",
        "password": "correct-horse-battery-staple",
        "role": "operator",
        "environment": "dev",
    });
    let response = router
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/auth/register")
                .header("content-type", "application/json")
                .body(Body::from(register_body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let login_body = json!({
        "display_name": "ana",
        "password": "correct-horse-battery-staple",
    });
    let response = router
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/auth/login")
                .header("content-type", "application/json")
                .body(Body::from(login_body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let login_json = body_json(response).await;
    let token = login_json["token"].as_str().unwrap().to_string();

    let response = router
        .clone()
        .oneshot(
            Request::builder()
                .uri("/auth/me")
                .header("authorization", format!("Bearer {token}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let me = body_json(response).await;
    assert_eq!(me["display_name"], "ana");
    assert_eq!(me["role"], "operator");

    let response = router
        .oneshot(Request::builder().uri("/auth/me").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], "Unauthenticated");
    assert!(body["error"]["message"].is_string());
}

#[tokio::test]
async fn nlp_validate_flags_destructive_commands_without_auth_bypass() {
    let state = test_state().await;
    state.resume_operational();
    let router = build_router(state.clone());

    // Unauthenticated callers can't reach /nlp/validate either; it sits
    // behind the same auth_guard as every other /nlp/* route.
    let response = router
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/nlp/validate")
                .header("content-type", "application/json")
                .body(Body::from(json!({"command": "kubectl delete namespace production"}).to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], "Unauthenticated");
}

#[tokio::test]
async fn exhausted_rate_limit_returns_the_error_envelope() {
    let mut config = GatewayConfig::default();
    config.rate_limit = 1;
    let state = test_state_with_config(config).await;
    state.resume_operational();
    let router = build_router(state);

    let register_body = json!({
        "display_name": "rita",
        "password": "correct-horse-battery-staple",
        "role": "operator",
        "environment": "dev",
    });
    router
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/auth/register")
                .header("content-type", "application/json")
                .body(Body::from(register_body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    let login_body = json!({"display_name": "rita", "password": "correct-horse-battery-staple"});
    let response = router
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/auth/login")
                .header("content-type", "application/json")
                .body(Body::from(login_body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    let token = body_json(response).await["token"].as_str().unwrap().to_string();

    let validate_request = || {
        Request::builder()
            .method("POST")
            .uri("/nlp/validate")
            .header("content-type", "application/json")
            .header("authorization", format!("Bearer {token}"))
            .body(Body::from(json!({"command": "kubectl get pods"}).to_string()))
            .unwrap()
    };

    let first = router.clone().oneshot(validate_request()).await.unwrap();
    assert_eq!(first.status(), StatusCode::OK);

    let second = router.oneshot(validate_request()).await.unwrap();
    assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);
    let body = body_json(second).await;
    assert_eq!(body["error"]["code"], "RateLimited");
    assert!(body["error"]["message"].is_string());
}
