// [libs/infra/cluster-client/src/classify.rs]
//! Deterministic, ordered substring classification of a transport/server
//! failure message into a stable `FailureKind`, so the execution engine and
//! the audit entry always agree on why a call failed.

use meridian_domain::execution::FailureKind;

const NETWORK_MARKERS: &[&str] = &["connection refused", "connection reset", "unreachable", "dns"];
const PERMISSION_MARKERS: &[&str] = &["forbidden", "unauthorized", "permission denied", "403", "401"];
const NOT_FOUND_MARKERS: &[&str] = &["not found", "404", "no such"];
const VALIDATION_MARKERS: &[&str] = &["invalid", "bad request", "malformed", "422", "400"];
const TIMEOUT_MARKERS: &[&str] = &["timed out", "timeout", "deadline exceeded"];

/// First-match-wins over an ordered table: network and permission are
/// checked before the generic "not found"/"invalid" buckets, since a
/// message like "connection refused: 403 forbidden upstream" should read
/// as a network failure, not a permission one.
pub fn classify_failure(message: &str) -> FailureKind {
    let lowered = message.to_lowercase();

    if NETWORK_MARKERS.iter().any(|m| lowered.contains(m)) {
        return FailureKind::Network;
    }
    if TIMEOUT_MARKERS.iter().any(|m| lowered.contains(m)) {
        return FailureKind::Timeout;
    }
    if PERMISSION_MARKERS.iter().any(|m| lowered.contains(m)) {
        return FailureKind::Permission;
    }
    if NOT_FOUND_MARKERS.iter().any(|m| lowered.contains(m)) {
        return FailureKind::NotFound;
    }
    if VALIDATION_MARKERS.iter().any(|m| lowered.contains(m)) {
        return FailureKind::Validation;
    }
    FailureKind::Unknown
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_network_failure() {
        assert_eq!(classify_failure("connection refused by upstream"), FailureKind::Network);
    }

    #[test]
    fn classifies_permission_failure() {
        assert_eq!(classify_failure("403 forbidden: insufficient scope"), FailureKind::Permission);
    }

    #[test]
    fn classifies_not_found_failure() {
        assert_eq!(classify_failure("deployment payments not found"), FailureKind::NotFound);
    }

    #[test]
    fn classifies_validation_failure() {
        assert_eq!(classify_failure("400 bad request: invalid replica count"), FailureKind::Validation);
    }

    #[test]
    fn classifies_timeout_failure() {
        assert_eq!(classify_failure("context deadline exceeded"), FailureKind::Timeout);
    }

    #[test]
    fn unrecognized_message_is_unknown() {
        assert_eq!(classify_failure("the cluster rejected the request"), FailureKind::Unknown);
    }

    #[test]
    fn network_takes_priority_over_permission() {
        assert_eq!(
            classify_failure("connection refused: 403 forbidden upstream"),
            FailureKind::Network
        );
    }
}
