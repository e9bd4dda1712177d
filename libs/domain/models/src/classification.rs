// [libs/domain/models/src/classification.rs]
//! Safety verdict produced by the safety classification and policy engine.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SafetyLevel {
    Safe,
    Warning,
    Dangerous,
    Blocked,
}

impl SafetyLevel {
    /// Baseline risk contribution before status/category adjustments.
    pub fn base_risk(self) -> f32 {
        match self {
            SafetyLevel::Safe => 0.0,
            SafetyLevel::Warning => 0.2,
            SafetyLevel::Dangerous | SafetyLevel::Blocked => 0.5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub level: SafetyLevel,
    /// Reasons in evaluation order — determinism depends on this staying
    /// append-only during classification.
    pub reasons: Vec<String>,
    pub score: f32,
    pub requires_approval: bool,
    pub is_blocked: bool,
}

impl Classification {
    pub fn new(level: SafetyLevel) -> Self {
        Self {
            level,
            reasons: Vec::new(),
            score: level.base_risk(),
            requires_approval: matches!(level, SafetyLevel::Warning | SafetyLevel::Dangerous),
            is_blocked: matches!(level, SafetyLevel::Blocked),
        }
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reasons.push(reason.into());
        self
    }
}
