// [apps/gateway/src/routes.rs]
/*!
 * =================================================================
 * APARATO: ROUTING MATRIX
 * CLASIFICACIÓN: API ADAPTER LAYER (L3)
 * RESPONSABILIDAD: COMPOSICIÓN DE ESTRATOS REST Y WEBSOCKET
 * =================================================================
 */

use crate::handlers::{audit, auth, commands, nlp, ws};
use crate::middleware::{auth_guard, health_guard, rate_limit_commands, rate_limit_nlp};
use crate::state::AppState;
use axum::extract::State;
use axum::http::{header, Method};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{middleware, Router};
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .max_age(Duration::from_secs(3600));

    // Registration and login issue the token; nothing to authenticate yet.
    let public_auth = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login));

    let protected_auth = Router::new()
        .route("/refresh", post(auth::refresh))
        .route("/logout", post(auth::logout))
        .route("/me", get(auth::me))
        .layer(middleware::from_fn_with_state(state.clone(), auth_guard));

    let nlp_process = Router::new()
        .route("/process", post(nlp::process))
        .layer(middleware::from_fn_with_state(state.clone(), rate_limit_nlp));

    let nlp_rest = Router::new()
        .route("/validate", post(nlp::validate))
        .route("/providers", get(nlp::providers))
        .route("/health", get(nlp::health));

    let nlp_routes = nlp_process
        .merge(nlp_rest)
        .layer(middleware::from_fn_with_state(state.clone(), auth_guard));

    let commands_execute = Router::new()
        .route("/execute", post(commands::execute))
        .layer(middleware::from_fn_with_state(state.clone(), rate_limit_commands));

    let commands_rest = Router::new()
        .route("/executions", get(commands::list_executions))
        .route("/executions/:id", get(commands::get_execution))
        .route("/executions/:id/cancel", post(commands::cancel_execution))
        .route("/approvals", post(commands::request_approval).get(commands::pending_approvals))
        .route("/rollback-plans", post(commands::create_rollback_plan))
        .route("/rollback-plans/:id/execute", post(commands::execute_rollback));

    let commands_routes = commands_execute
        .merge(commands_rest)
        .layer(middleware::from_fn_with_state(state.clone(), auth_guard));

    let audit_routes = Router::new()
        .route("/entries", get(audit::entries))
        .route("/verify", get(audit::verify))
        .layer(middleware::from_fn_with_state(state.clone(), auth_guard));

    let guarded = Router::new()
        // The socket authenticates itself over its first frame, not a
        // header, so it sits outside `auth_guard` entirely.
        .route("/ws", get(ws::handler))
        .nest("/auth", public_auth.merge(protected_auth))
        .nest("/nlp", nlp_routes)
        .nest("/commands", commands_routes)
        .nest("/audit", audit_routes)
        .layer(middleware::from_fn_with_state(state.clone(), health_guard));

    // `/health` sits outside the maintenance gate so it can still answer
    // while startup certification (or a later incident) holds the rest
    // of the service down.
    Router::new()
        .route("/health", get(health))
        .merge(guarded)
        .layer(cors)
        .with_state(state)
}

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    match state.is_operational() {
        Ok(()) => (axum::http::StatusCode::OK, "ok"),
        Err(_) => (axum::http::StatusCode::SERVICE_UNAVAILABLE, "maintenance"),
    }
}
