// [apps/gateway/src/handlers/auth.rs]
//! `/auth/*`: registration, login, session refresh/revocation, identity
//! introspection. Credentials never outlive this module's request bodies —
//! only the hashed form ever reaches the datastore.

use crate::error::HttpApiError;
use crate::middleware::AuthenticatedIdentity;
use crate::state::AppState;
use axum::extract::{Extension, State};
use axum::Json;
use chrono::Utc;
use meridian_crypto::password::meets_password_policy;
use meridian_crypto::token::issue_token;
use meridian_domain::error::ErrorCode;
use meridian_domain::identity::{Environment, Role, TokenClaims};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::instrument;

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub display_name: String,
    pub password: String,
    pub role: Role,
    pub environment: Environment,
    #[serde(default)]
    pub permissions: HashSet<String>,
}

#[derive(Debug, Serialize)]
pub struct IdentityView {
    pub id: String,
    pub display_name: String,
    pub role: Role,
    pub permissions: HashSet<String>,
    pub environment: Environment,
}

#[instrument(skip(state, body))]
pub async fn register(State(state): State<AppState>, Json(body): Json<RegisterRequest>) -> Result<Json<IdentityView>, HttpApiError> {
    if !meets_password_policy(&body.password) {
        return Err(HttpApiError::new(ErrorCode::InvalidRequest, "password does not meet the minimum policy"));
    }

    let identity = state
        .sessions
        .register(&body.display_name, &body.password, body.role, body.environment, body.permissions)
        .await?;

    Ok(Json(IdentityView {
        id: identity.id.to_string(),
        display_name: identity.display_name,
        role: identity.role,
        permissions: identity.permissions,
        environment: identity.environment,
    }))
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub display_name: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub expires_at: String,
}

#[instrument(skip(state, body))]
pub async fn login(State(state): State<AppState>, Json(body): Json<LoginRequest>) -> Result<Json<LoginResponse>, HttpApiError> {
    let identity = state.sessions.login(&body.display_name, &body.password).await?;
    let session = state.sessions.create_session(&identity, state.config.session_ttl_hours).await?;

    let claims = TokenClaims {
        sub: identity.id,
        sid: session.id,
        role: identity.role,
        iat: Utc::now().timestamp(),
        nbf: Utc::now().timestamp(),
        exp: session.expires_at.timestamp(),
        iss: format!("{}-auth", env!("CARGO_PKG_NAME")),
    };
    let token = issue_token(&claims, &state.token_secret, &state.token_key_id)
        .map_err(|e| HttpApiError::new(ErrorCode::Internal, e.to_string()))?;

    Ok(Json(LoginResponse {
        token,
        expires_at: session.expires_at.to_rfc3339(),
    }))
}

#[derive(Debug, Serialize)]
pub struct RefreshResponse {
    pub token: String,
    pub expires_at: String,
}

#[instrument(skip(state))]
pub async fn refresh(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedIdentity>,
) -> Result<Json<RefreshResponse>, HttpApiError> {
    let session = state
        .sessions
        .refresh_session(auth.session_id, state.config.session_ttl_hours)
        .await?;

    let claims = TokenClaims {
        sub: auth.identity.id,
        sid: session.id,
        role: auth.identity.role,
        iat: Utc::now().timestamp(),
        nbf: Utc::now().timestamp(),
        exp: session.expires_at.timestamp(),
        iss: format!("{}-auth", env!("CARGO_PKG_NAME")),
    };
    let token = issue_token(&claims, &state.token_secret, &state.token_key_id)
        .map_err(|e| HttpApiError::new(ErrorCode::Internal, e.to_string()))?;

    Ok(Json(RefreshResponse {
        token,
        expires_at: session.expires_at.to_rfc3339(),
    }))
}

#[instrument(skip(state))]
pub async fn logout(State(state): State<AppState>, Extension(auth): Extension<AuthenticatedIdentity>) -> Result<(), HttpApiError> {
    state.sessions.revoke_session(auth.session_id).await?;
    Ok(())
}

#[instrument(skip(_state))]
pub async fn me(State(_state): State<AppState>, Extension(auth): Extension<AuthenticatedIdentity>) -> Json<IdentityView> {
    Json(IdentityView {
        id: auth.identity.id.to_string(),
        display_name: auth.identity.display_name,
        role: auth.identity.role,
        permissions: auth.identity.permissions,
        environment: auth.identity.environment,
    })
}
