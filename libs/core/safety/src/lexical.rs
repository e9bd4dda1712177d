// [libs/core/safety/src/lexical.rs]
//! Ordered, first-match-wins lexical classification.

use meridian_domain::classification::{Classification, SafetyLevel};

/// Blocking patterns — always set `is_blocked`, regardless of role.
const BLOCKING_PATTERNS: &[&str] = &["rm -rf", "destroy", "--cascade=foreground", "--grace-period=0"];

const DANGEROUS_PATTERNS: &[&str] = &[
    "delete",
    "destroy",
    "--force",
    "--cascade=foreground",
    "--grace-period=0",
    "drain",
    "cordon",
    "evict",
    "rm -rf",
];

/// `edit` is treated as a warning-level verb, not safe or unlisted.
const WARNING_PATTERNS: &[&str] = &[
    "create", "apply", "patch", "replace", "scale", "restart", "edit", "label", "annotate",
    "expose", "rollout",
];

/// Base classification before any contextual escalation. Deterministic:
/// same command string always yields the same level and reason list in the
/// same order.
pub fn classify_lexical(command: &str) -> Classification {
    let normalized = command.to_lowercase();

    let level = if DANGEROUS_PATTERNS.iter().any(|p| normalized.contains(p)) {
        SafetyLevel::Dangerous
    } else if WARNING_PATTERNS.iter().any(|p| normalized.contains(p)) {
        SafetyLevel::Warning
    } else {
        SafetyLevel::Safe
    };

    let mut classification = Classification::new(level);

    for pattern in DANGEROUS_PATTERNS {
        if normalized.contains(pattern) {
            classification = classification.with_reason(format!("Dangerous pattern: {pattern}"));
        }
    }
    if level == SafetyLevel::Warning {
        for pattern in WARNING_PATTERNS {
            if normalized.contains(pattern) {
                classification = classification.with_reason(format!("Warning pattern: {pattern}"));
            }
        }
    }

    for pattern in BLOCKING_PATTERNS {
        if normalized.contains(pattern) {
            classification.is_blocked = true;
            classification = classification.with_reason(format!("Blocked pattern: {pattern}"));
        }
    }

    classification
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn safe_read_has_no_escalation() {
        let c = classify_lexical("kubectl get pods -n default");
        assert_eq!(c.level, SafetyLevel::Safe);
        assert!(!c.is_blocked);
    }

    #[test]
    fn scale_is_warning() {
        let c = classify_lexical("kubectl scale deployment payments --replicas=4");
        assert_eq!(c.level, SafetyLevel::Warning);
    }

    #[test]
    fn destroy_is_dangerous_and_blocked() {
        let c = classify_lexical("rm -rf /");
        assert_eq!(c.level, SafetyLevel::Dangerous);
        assert!(c.is_blocked);
        assert!(c.reasons.iter().any(|r| r.contains("Blocked pattern: rm -rf")));
    }

    #[test]
    fn edit_is_warning_not_safe() {
        let c = classify_lexical("kubectl edit configmap app-config");
        assert_eq!(c.level, SafetyLevel::Warning);
    }

    #[test]
    fn determinism_across_invocations() {
        let a = classify_lexical("kubectl delete pod crashloop-5");
        let b = classify_lexical("kubectl delete pod crashloop-5");
        assert_eq!(a.level, b.level);
        assert_eq!(a.reasons, b.reasons);
    }
}
