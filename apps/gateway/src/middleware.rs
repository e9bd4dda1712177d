// [apps/gateway/src/middleware.rs]
/*!
 * =================================================================
 * APARATO: AUTHENTICATION & HEALTH GUARDS
 * CLASIFICACIÓN: SECURITY STRATUM (L4)
 * RESPONSABILIDAD: VALIDACIÓN DE TOKEN, INYECCIÓN DE IDENTIDAD, RATE LIMITING
 * =================================================================
 */

use crate::error::HttpApiError;
use crate::state::AppState;
use axum::{
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use meridian_crypto::token::validate_token;
use meridian_domain::error::ErrorCode;
use meridian_domain::identity::Identity;
use serde_json::json;
use tracing::{debug, warn};
use uuid::Uuid;

/// Authenticated caller, injected into request extensions once `auth_guard`
/// resolves a token. Handlers pull this out instead of re-deriving it.
#[derive(Debug, Clone)]
pub struct AuthenticatedIdentity {
    pub identity: Identity,
    pub session_id: Uuid,
}

pub async fn health_guard(State(state): State<AppState>, req: Request, next: Next) -> Response {
    if let Err(reason) = state.is_operational() {
        warn!(reason, "request rejected: system in maintenance mode");
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({
                "error": {
                    "code": "Unavailable",
                    "message": reason,
                }
            })),
        )
            .into_response();
    }
    next.run(req).await
}

/// Validates the bearer token's signature and expiry, then confirms its
/// `sid` claim still names a live, unrevoked session before trusting it.
/// A token that verifies but whose session was since revoked is rejected
/// here rather than by the caller re-checking downstream.
pub async fn auth_guard(State(state): State<AppState>, mut req: Request, next: Next) -> Result<Response, HttpApiError> {
    let token = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .ok_or_else(|| HttpApiError::new(ErrorCode::Unauthenticated, "missing bearer token"))?;

    let claims = validate_token(token, &state.token_secret, Utc::now().timestamp()).map_err(|e| {
        debug!(error = %e, "token validation failed");
        HttpApiError::new(ErrorCode::Unauthenticated, "token validation failed")
    })?;

    let session = state
        .sessions
        .get_session(claims.sid)
        .await
        .map_err(|_| HttpApiError::new(ErrorCode::Unauthenticated, "session not found"))?;

    if session.revoked || session.is_expired(Utc::now()) || session.id != claims.sid {
        return Err(HttpApiError::new(ErrorCode::Unauthenticated, "session is revoked or expired"));
    }

    let identity = state
        .sessions
        .get_identity(claims.sub)
        .await
        .map_err(|_| HttpApiError::new(ErrorCode::Unauthenticated, "identity not found"))?;

    req.extensions_mut().insert(AuthenticatedIdentity {
        identity,
        session_id: session.id,
    });

    Ok(next.run(req).await)
}

/// Shared rate-limit enforcement. `endpoint_class` separates the
/// synthesis and execute buckets so a burst against one doesn't starve the
/// other, per-principal.
async fn enforce_rate_limit(state: &AppState, identity: &AuthenticatedIdentity, endpoint_class: &str) -> Result<(), HttpApiError> {
    if !state.config.enable_rate_limiting {
        return Ok(());
    }
    if state
        .rate_limiter
        .try_acquire(&identity.identity.id.to_string(), endpoint_class)
    {
        Ok(())
    } else {
        warn!(principal = %identity.identity.id, endpoint_class, "rate limit exceeded");
        Err(HttpApiError::new(
            ErrorCode::RateLimited,
            format!("rate limit exceeded for '{endpoint_class}'"),
        ))
    }
}

pub async fn rate_limit_nlp(State(state): State<AppState>, req: Request, next: Next) -> Result<Response, HttpApiError> {
    let identity = req
        .extensions()
        .get::<AuthenticatedIdentity>()
        .cloned()
        .ok_or_else(|| HttpApiError::new(ErrorCode::Unauthenticated, "missing authenticated identity"))?;
    enforce_rate_limit(&state, &identity, "nlp").await?;
    Ok(next.run(req).await)
}

pub async fn rate_limit_commands(State(state): State<AppState>, req: Request, next: Next) -> Result<Response, HttpApiError> {
    let identity = req
        .extensions()
        .get::<AuthenticatedIdentity>()
        .cloned()
        .ok_or_else(|| HttpApiError::new(ErrorCode::Unauthenticated, "missing authenticated identity"))?;
    enforce_rate_limit(&state, &identity, "commands").await?;
    Ok(next.run(req).await)
}
