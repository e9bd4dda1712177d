// [libs/domain/models/src/synthesis.rs]
//! Natural-language request/response pair exchanged with the command
//! synthesis engine.

use crate::identity::{Environment, Role};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// Upper bound on query length; longer queries are truncated rather than rejected.
pub const MAX_QUERY_LENGTH: usize = 2000;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SynthesisRequest {
    pub query: String,
    /// Sorted for deterministic fingerprinting — see `fingerprint()`.
    pub context: BTreeMap<String, String>,
    pub namespace_hint: Option<String>,
    pub cluster_hint: Option<String>,
    pub user_role: Role,
    pub environment: Environment,
    pub provider_preference: Option<String>,
}

impl SynthesisRequest {
    /// Truncates `query` to `MAX_QUERY_LENGTH`, mutating in place.
    pub fn truncate_query(&mut self) {
        if self.query.chars().count() > MAX_QUERY_LENGTH {
            self.query = self.query.chars().take(MAX_QUERY_LENGTH).collect();
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SynthesisResult {
    pub command: String,
    pub explanation: String,
    pub confidence: f32,
    pub token_count: Option<u32>,
    pub provider: String,
    pub latency: Duration,
    pub warnings: Vec<String>,
    pub suggestions: Vec<String>,
}

impl SynthesisResult {
    pub fn default_confidence() -> f32 {
        0.5
    }
}

/// Raw text returned by an LLM transport before structured parsing.
#[derive(Debug, Clone)]
pub struct ProviderRawResponse {
    pub text: String,
    pub token_count: Option<u32>,
}
