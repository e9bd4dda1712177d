// [apps/gateway/src/rollback.rs]
//! Derives inverse steps for a completed mutating command. A scale inverts
//! to a scale back to its captured previous replica count; `kubectl rollout
//! undo` is the cluster's own mechanism for reverting a restart/rollout/
//! apply/patch; `create` inverts to a `delete` of the same resource. Verbs
//! with no deterministic inverse (deletion, a scale with no captured prior
//! count) are refused rather than guessed at.

const ROLLOUT_INVERTIBLE: &[&str] = &["restart", "rollout", "apply", "patch"];

#[derive(Debug, thiserror::Error)]
pub enum RollbackPlanError {
    #[error("no deterministic rollback exists for this command")]
    NoInverseAvailable,
}

pub fn build_inverse_command(
    command: &str,
    resource_kind: &str,
    resource_name: Option<&str>,
    previous_replicas: Option<u32>,
) -> Result<String, RollbackPlanError> {
    let lowered = command.to_lowercase();

    if lowered.contains("delete") {
        return Err(RollbackPlanError::NoInverseAvailable);
    }

    if lowered.contains("scale") {
        return match (resource_name, previous_replicas) {
            (Some(name), Some(replicas)) => {
                Ok(format!("kubectl scale {resource_kind} {name} --replicas={replicas}"))
            }
            _ => Err(RollbackPlanError::NoInverseAvailable),
        };
    }

    if ROLLOUT_INVERTIBLE.iter().any(|kw| lowered.contains(kw)) {
        return Ok(match resource_name {
            Some(name) => format!("kubectl rollout undo {resource_kind} {name}"),
            None => format!("kubectl rollout undo {resource_kind}"),
        });
    }

    if let Some(rest) = lowered.strip_prefix("kubectl create ") {
        return Ok(format!("kubectl delete {rest}"));
    }

    Err(RollbackPlanError::NoInverseAvailable)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scale_with_captured_state_inverts_to_scale_back() {
        assert_eq!(
            build_inverse_command("kubectl scale deployment payments --replicas=4", "deployment", Some("payments"), Some(2))
                .unwrap(),
            "kubectl scale deployment payments --replicas=2"
        );
    }

    #[test]
    fn scale_without_captured_state_has_no_inverse() {
        assert!(build_inverse_command("kubectl scale deployment payments --replicas=4", "deployment", None, None).is_err());
        assert!(build_inverse_command("kubectl scale deployment payments --replicas=4", "deployment", Some("payments"), None).is_err());
    }

    #[test]
    fn restart_inverts_to_rollout_undo_with_resource_name() {
        assert_eq!(
            build_inverse_command("kubectl rollout restart deployment payments", "deployment", Some("payments"), None).unwrap(),
            "kubectl rollout undo deployment payments"
        );
    }

    #[test]
    fn create_inverts_to_delete() {
        assert_eq!(
            build_inverse_command("kubectl create deployment payments", "deployment", Some("payments"), None).unwrap(),
            "kubectl delete deployment payments"
        );
    }

    #[test]
    fn deletion_has_no_inverse() {
        assert!(build_inverse_command("kubectl delete pod crashloop-5", "pod", Some("crashloop-5"), None).is_err());
    }
}
