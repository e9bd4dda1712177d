// [apps/gateway/src/handlers/nlp.rs]
//! `/nlp/*`: natural-language synthesis, literal-command validation, and
//! provider introspection.

use crate::error::HttpApiError;
use crate::execution::RequestContext;
use crate::middleware::AuthenticatedIdentity;
use crate::state::AppState;
use axum::extract::{Extension, Query, State};
use axum::http::HeaderMap;
use axum::Json;
use meridian_domain::classification::Classification;
use meridian_domain::error::ErrorCode;
use meridian_domain::synthesis::SynthesisRequest;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{instrument, warn};
use uuid::Uuid;

fn build_context(auth: &AuthenticatedIdentity, headers: &HeaderMap, namespace: Option<String>, query: String) -> RequestContext {
    RequestContext {
        identity: auth.identity.clone(),
        session_id: auth.session_id,
        correlation_id: Uuid::new_v4(),
        namespace: namespace.unwrap_or_else(|| "default".to_string()),
        cluster_context: "default".to_string(),
        address: headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("unknown")
            .to_string(),
        agent: headers
            .get(axum::http::header::USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("unknown")
            .to_string(),
        query,
    }
}

#[derive(Debug, Deserialize)]
pub struct ProcessRequest {
    pub query: String,
    #[serde(default)]
    pub context: BTreeMap<String, String>,
    #[serde(default)]
    pub cluster_info: Option<ClusterInfo>,
    #[serde(default)]
    pub provider: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ClusterInfo {
    #[serde(default)]
    pub namespace: Option<String>,
    #[serde(default)]
    pub cluster: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ProcessResponse {
    pub id: Uuid,
    pub query: String,
    pub generated_command: String,
    pub explanation: String,
    pub safety_level: String,
    pub confidence: f32,
    pub potential_impact: Vec<String>,
    pub required_permissions: Vec<String>,
    pub approval_required: bool,
}

#[instrument(skip(state, body))]
pub async fn process(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedIdentity>,
    headers: HeaderMap,
    Json(mut body): Json<ProcessRequest>,
) -> Result<Json<ProcessResponse>, HttpApiError> {
    let mut request = SynthesisRequest {
        query: body.query.clone(),
        context: std::mem::take(&mut body.context),
        namespace_hint: body.cluster_info.as_ref().and_then(|c| c.namespace.clone()),
        cluster_hint: body.cluster_info.as_ref().and_then(|c| c.cluster.clone()),
        user_role: auth.identity.role,
        environment: auth.identity.environment,
        provider_preference: body.provider,
    };
    request.truncate_query();

    let result = state
        .synthesis
        .synthesize(&request)
        .await
        .map_err(|e| HttpApiError::new(ErrorCode::Unavailable, e.to_string()))?;

    let classification = state.safety.classify(
        &result.command,
        auth.identity.environment,
        auth.identity.role,
        request.namespace_hint.as_deref(),
        &state.config.critical_namespaces,
    );

    let audit_ctx = build_context(&auth, &headers, request.namespace_hint.clone(), body.query.clone());
    if let Err(err) = state.execution_engine.record_synthesis(&audit_ctx, &result.command, &classification).await {
        warn!(error = %err, "failed to append synthesis audit entry");
    }

    Ok(Json(ProcessResponse {
        id: Uuid::new_v4(),
        query: body.query,
        generated_command: result.command,
        explanation: result.explanation,
        safety_level: format!("{:?}", classification.level).to_lowercase(),
        confidence: result.confidence,
        potential_impact: classification.reasons,
        required_permissions: required_permissions_for(&classification),
        approval_required: classification.requires_approval,
    }))
}

#[derive(Debug, Deserialize)]
pub struct ValidateRequest {
    pub command: String,
}

#[derive(Debug, Serialize)]
pub struct ValidateResponse {
    pub safety_level: String,
    pub reasons: Vec<String>,
    pub requires_approval: bool,
    pub is_blocked: bool,
}

#[instrument(skip(state, body))]
pub async fn validate(State(state): State<AppState>, Json(body): Json<ValidateRequest>) -> Json<ValidateResponse> {
    let classification = state.safety.classify_lexical_only(&body.command);
    Json(ValidateResponse {
        safety_level: format!("{:?}", classification.level).to_lowercase(),
        reasons: classification.reasons,
        requires_approval: classification.requires_approval,
        is_blocked: classification.is_blocked,
    })
}

#[derive(Debug, Deserialize)]
pub struct ProvidersQuery {}

#[derive(Debug, Serialize)]
pub struct ProvidersResponse {
    pub default: String,
    pub fallback_enabled: bool,
}

#[instrument(skip(state))]
pub async fn providers(State(state): State<AppState>, Query(_query): Query<ProvidersQuery>) -> Json<ProvidersResponse> {
    Json(ProvidersResponse {
        default: state.config.default_provider.clone(),
        fallback_enabled: state.config.enable_fallback,
    })
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub providers: Vec<ProviderHealth>,
}

#[derive(Debug, Serialize)]
pub struct ProviderHealth {
    pub name: String,
    pub healthy: bool,
}

/// Reads the snapshot `services::provider_health_poller` refreshes every
/// 30s rather than probing providers on this request's path.
#[instrument(skip(state))]
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let snapshot = state.provider_health.read().expect("provider health lock poisoned").clone();
    Json(HealthResponse {
        providers: snapshot
            .into_iter()
            .map(|(name, healthy)| ProviderHealth { name, healthy })
            .collect(),
    })
}

fn required_permissions_for(classification: &Classification) -> Vec<String> {
    if classification.is_blocked {
        Vec::new()
    } else if classification.requires_approval {
        vec!["approve".to_string()]
    } else {
        vec!["execute".to_string()]
    }
}
