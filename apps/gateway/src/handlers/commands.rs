// [apps/gateway/src/handlers/commands.rs]
//! `/commands/*`: execution submission and lifecycle, approvals, and
//! rollback plans. Thin adapters over `ExecutionEngine` — the state
//! machine and audit wiring live there, not here.

use crate::error::HttpApiError;
use crate::execution::RequestContext;
use crate::middleware::AuthenticatedIdentity;
use crate::state::AppState;
use axum::extract::{Extension, Path, Query, State};
use axum::http::HeaderMap;
use axum::Json;
use meridian_domain::execution::{Execution, RollbackPlan};
use serde::{Deserialize, Serialize};
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
pub struct ExecuteRequest {
    pub command: String,
    #[serde(default)]
    pub namespace: Option<String>,
    /// The natural-language query that produced `command`, if the caller
    /// went through `/nlp/process` first. Optional: a literal command
    /// submitted without synthesis has none.
    #[serde(default)]
    pub query: Option<String>,
}

pub async fn execute(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedIdentity>,
    headers: HeaderMap,
    Json(body): Json<ExecuteRequest>,
) -> Result<Json<Execution>, HttpApiError> {
    let ctx = build_context(&auth, &headers, body.namespace, body.query.unwrap_or_default());
    let execution = state.execution_engine.execute(ctx, body.command).await?;
    Ok(Json(execution))
}

#[derive(Debug, Deserialize)]
pub struct ListExecutionsQuery {
    #[serde(default)]
    pub page: Option<u32>,
    #[serde(default)]
    pub limit: Option<u32>,
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ExecutionPage {
    pub items: Vec<Execution>,
    pub page: u32,
    pub limit: u32,
}

/// Paged list scoped to the caller's own executions. `ExecutionRepository`
/// only exposes `list_by_owner` — cross-principal listing is an admin
/// surface this endpoint doesn't currently offer.
pub async fn list_executions(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedIdentity>,
    Query(query): Query<ListExecutionsQuery>,
) -> Result<Json<ExecutionPage>, HttpApiError> {
    let all = state.executions.list_by_owner(auth.identity.id).await?;
    let page = query.page.unwrap_or(1).max(1);
    let limit = query.limit.unwrap_or(20).clamp(1, 200);

    let filtered: Vec<Execution> = all
        .into_iter()
        .filter(|e| query.status.as_deref().map(|s| status_matches(e, s)).unwrap_or(true))
        .collect();

    let start = ((page - 1) * limit) as usize;
    let items = filtered.into_iter().skip(start).take(limit as usize).collect();

    Ok(Json(ExecutionPage { items, page, limit }))
}

fn status_matches(execution: &Execution, status: &str) -> bool {
    format!("{:?}", execution.status).to_lowercase() == status.to_lowercase()
}

pub async fn get_execution(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<Json<Execution>, HttpApiError> {
    let execution = state.executions.get(id).await?;
    Ok(Json(execution))
}

pub async fn cancel_execution(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<Json<Execution>, HttpApiError> {
    let execution = state.execution_engine.cancel(id).await?;
    Ok(Json(execution))
}

#[derive(Debug, Deserialize)]
pub struct RequestApprovalRequest {
    pub execution_id: Uuid,
    #[serde(default)]
    pub reason: Option<String>,
}

pub async fn request_approval(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedIdentity>,
    headers: HeaderMap,
    Json(body): Json<RequestApprovalRequest>,
) -> Result<Json<meridian_domain::execution::Approval>, HttpApiError> {
    let ctx = build_context(&auth, &headers, None, String::new());
    let approval = state
        .execution_engine
        .request_approval(ctx, body.execution_id, body.reason.unwrap_or_default())
        .await?;
    Ok(Json(approval))
}

/// Approvals are not persisted as a queryable table of their own — the
/// pending set is simply every execution still `awaitingApproval` for the
/// caller's scope.
pub async fn pending_approvals(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedIdentity>,
) -> Result<Json<Vec<Execution>>, HttpApiError> {
    let all = state.executions.list_by_owner(auth.identity.id).await?;
    let pending = all
        .into_iter()
        .filter(|e| matches!(e.status, meridian_domain::execution::ExecutionStatus::AwaitingApproval))
        .collect();
    Ok(Json(pending))
}

#[derive(Debug, Deserialize)]
pub struct CreateRollbackPlanRequest {
    pub execution_id: Uuid,
}

pub async fn create_rollback_plan(
    State(state): State<AppState>,
    Json(body): Json<CreateRollbackPlanRequest>,
) -> Result<Json<RollbackPlan>, HttpApiError> {
    let plan = state.execution_engine.create_rollback_plan(body.execution_id).await?;
    Ok(Json(plan))
}

pub async fn execute_rollback(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedIdentity>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Json<RollbackPlan>, HttpApiError> {
    let ctx = build_context(&auth, &headers, None, String::new());
    let plan = state.execution_engine.execute_rollback(ctx, id).await?;
    Ok(Json(plan))
}
