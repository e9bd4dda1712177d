// [apps/gateway/src/handlers/audit.rs]
//! `/audit/*`: queryable view over the tamper-evident chain and its
//! integrity check.

use crate::error::HttpApiError;
use crate::state::AppState;
use axum::extract::{Query, State};
use axum::Json;
use meridian_domain::audit::{AuditEntry, IntegrityViolation};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct EntriesQuery {
    pub from: u64,
    pub to: u64,
}

pub async fn entries(State(state): State<AppState>, Query(query): Query<EntriesQuery>) -> Result<Json<Vec<AuditEntry>>, HttpApiError> {
    let entries = state.audit.range(query.from, query.to).await?;
    Ok(Json(entries))
}

#[derive(Debug, Deserialize)]
pub struct VerifyQuery {
    pub from: u64,
    pub to: u64,
}

#[derive(Debug, Serialize)]
pub struct VerifyResponse {
    pub violations: Vec<IntegrityViolation>,
    pub intact: bool,
}

/// Verification anchors the first entry in the range against its own
/// recorded `previous_checksum` rather than recomputing an independent
/// expectation, since the caller-supplied range may start mid-chain.
pub async fn verify(State(state): State<AppState>, Query(query): Query<VerifyQuery>) -> Result<Json<VerifyResponse>, HttpApiError> {
    let anchor = state.audit.range(query.from, query.from).await?;
    let expected_previous = anchor
        .first()
        .map(|e| e.previous_checksum.clone())
        .unwrap_or_default();

    let violations = state.audit.verify(query.from, query.to, &expected_previous).await?;
    let intact = violations.is_empty();
    Ok(Json(VerifyResponse { violations, intact }))
}
