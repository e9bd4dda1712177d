// [apps/gateway/src/error.rs]
//! Maps every internal error type this service produces onto the
//! `{error:{code,message,details?}}` HTTP body and matching status code.

use crate::execution::ExecutionError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use meridian_domain::error::{ApiError, ErrorCode};
use meridian_store::StoreError;
use serde_json::json;

pub struct HttpApiError(pub ApiError);

impl HttpApiError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self(ApiError::new(code, message))
    }
}

impl IntoResponse for HttpApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.code.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = json!({
            "error": {
                "code": self.0.code,
                "message": self.0.message,
                "details": self.0.details,
                "severity": self.0.code.severity(),
            }
        });
        (status, Json(body)).into_response()
    }
}

impl From<ApiError> for HttpApiError {
    fn from(value: ApiError) -> Self {
        Self(value)
    }
}

/// Classifies a datastore failure into the stable HTTP taxonomy. Query and
/// mapping faults are internal bugs; everything else names a real outcome
/// the caller can act on.
impl From<StoreError> for HttpApiError {
    fn from(err: StoreError) -> Self {
        let code = match &err {
            StoreError::NotFound(_) => ErrorCode::NotFound,
            StoreError::Conflict(_) => ErrorCode::Conflict,
            StoreError::AccountLockedOut(_) => ErrorCode::Unauthorized,
            StoreError::InvalidCredentials => ErrorCode::Unauthenticated,
            StoreError::ChainIntegrity(_) => ErrorCode::IntegrityViolation,
            StoreError::Connection(_) | StoreError::Configuration(_) => ErrorCode::Unavailable,
            StoreError::Query(_) | StoreError::Mapping(_) => ErrorCode::Internal,
        };
        Self(ApiError::new(code, err.to_string()))
    }
}

/// Classifies execution-engine outcomes the same way: a blocked command is
/// a policy rejection, not a server fault, and a stale state transition is
/// a conflict the caller can retry against the execution's current status.
impl From<ExecutionError> for HttpApiError {
    fn from(err: ExecutionError) -> Self {
        let code = match &err {
            ExecutionError::Unauthorized(_) => ErrorCode::Unauthorized,
            ExecutionError::Blocked(_) => ErrorCode::Blocked,
            ExecutionError::NotFound(_) => ErrorCode::NotFound,
            ExecutionError::InvalidState(_) => ErrorCode::Conflict,
            ExecutionError::NoRollbackAvailable(_) => ErrorCode::InvalidRequest,
            ExecutionError::UnparseableCommand => ErrorCode::InvalidRequest,
            ExecutionError::Store(store_err) => return store_err_into(store_err),
        };
        Self(ApiError::new(code, err.to_string()))
    }
}

fn store_err_into(err: &StoreError) -> HttpApiError {
    let code = match err {
        StoreError::NotFound(_) => ErrorCode::NotFound,
        StoreError::Conflict(_) => ErrorCode::Conflict,
        StoreError::AccountLockedOut(_) => ErrorCode::Unauthorized,
        StoreError::InvalidCredentials => ErrorCode::Unauthenticated,
        StoreError::ChainIntegrity(_) => ErrorCode::IntegrityViolation,
        StoreError::Connection(_) | StoreError::Configuration(_) => ErrorCode::Unavailable,
        StoreError::Query(_) | StoreError::Mapping(_) => ErrorCode::Internal,
    };
    HttpApiError(ApiError::new(code, err.to_string()))
}
