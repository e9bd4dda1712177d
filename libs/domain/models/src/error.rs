// [libs/domain/models/src/error.rs]
//! The stable error-code taxonomy every HTTP surface maps into.
//! Internal crates raise their own `thiserror` types; the gateway's
//! `ApiError` (see `apps/gateway/src/error.rs`) is the only place that
//! converts into this taxonomy.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum ErrorCode {
    Unauthenticated,
    Unauthorized,
    Blocked,
    ApprovalRequired,
    InvalidRequest,
    RateLimited,
    Unavailable,
    Internal,
    NotFound,
    Conflict,
    IntegrityViolation,
}

impl ErrorCode {
    /// Matching HTTP status for this code.
    pub fn status_code(self) -> u16 {
        match self {
            ErrorCode::Unauthenticated => 401,
            ErrorCode::Unauthorized => 403,
            ErrorCode::Blocked => 403,
            ErrorCode::ApprovalRequired => 409,
            ErrorCode::InvalidRequest => 400,
            ErrorCode::RateLimited => 429,
            ErrorCode::Unavailable => 503,
            ErrorCode::Internal => 500,
            ErrorCode::NotFound => 404,
            ErrorCode::Conflict => 409,
            ErrorCode::IntegrityViolation => 500,
        }
    }

    /// Severity used for the `{error:{...}}` body and for alerting hooks.
    pub fn severity(self) -> &'static str {
        match self {
            ErrorCode::Blocked | ErrorCode::IntegrityViolation => "high",
            ErrorCode::ApprovalRequired
            | ErrorCode::RateLimited
            | ErrorCode::Unavailable
            | ErrorCode::Conflict => "medium",
            _ => "info",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    pub code: ErrorCode,
    pub message: String,
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }
}
