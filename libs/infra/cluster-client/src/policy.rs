// [libs/infra/cluster-client/src/policy.rs]
//! RBAC-style allow-lists enforced before any call reaches the cluster:
//! verb, resource kind, namespace, replica ceiling, and an explicit
//! critical-resource deletion refusal that no permission can override.

use crate::errors::ClientError;
use meridian_domain::identity::Identity;
use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verb {
    Read,
    List,
    Describe,
    Logs,
    Scale,
    Restart,
    Delete,
    Apply,
    Create,
    Patch,
}

impl Verb {
    /// Verbs that mutate cluster state and therefore require the `write`
    /// permission (or admin) in addition to the verb-specific one.
    pub fn is_write(self) -> bool {
        matches!(
            self,
            Verb::Scale | Verb::Restart | Verb::Apply | Verb::Create | Verb::Patch
        )
    }

    pub fn is_destructive(self) -> bool {
        matches!(self, Verb::Delete)
    }

    pub fn permission_name(self) -> &'static str {
        match self {
            Verb::Read => "read",
            Verb::List => "list",
            Verb::Describe => "describe",
            Verb::Logs => "logs",
            Verb::Scale => "scale",
            Verb::Restart => "restart",
            Verb::Delete => "delete",
            Verb::Apply => "apply",
            Verb::Create => "create",
            Verb::Patch => "patch",
        }
    }
}

pub struct ClusterRequest {
    pub verb: Verb,
    pub resource_kind: String,
    pub namespace: String,
    pub replicas: Option<u32>,
    pub command_text: String,
}

pub struct RbacPolicy {
    pub allowed_resource_kinds: HashSet<String>,
    pub allowed_namespaces: Vec<String>,
    pub max_replicas: u32,
    pub critical_resource_kinds: HashSet<String>,
}

impl RbacPolicy {
    fn namespace_allowed(&self, namespace: &str) -> bool {
        self.allowed_namespaces.iter().any(|ns| ns == "*" || ns == namespace)
    }
}

/// Pure, synchronous permission and policy check. Never performs I/O:
/// callers run it before attempting the network call, so a rejected
/// request never reaches the cluster.
pub fn check_request(
    identity: &Identity,
    policy: &RbacPolicy,
    request: &ClusterRequest,
) -> Result<(), ClientError> {
    if !identity.has_permission(request.verb.permission_name()) {
        return Err(ClientError::Unauthorized(format!(
            "identity lacks the '{}' permission",
            request.verb.permission_name()
        )));
    }

    if request.verb.is_write() && !identity.has_permission("write") {
        return Err(ClientError::Unauthorized(
            "write verbs require the 'write' permission".to_string(),
        ));
    }

    if request.verb.is_destructive() && !identity.has_permission("delete") {
        return Err(ClientError::Unauthorized(
            "delete verb requires the 'delete' permission".to_string(),
        ));
    }

    if !policy.allowed_resource_kinds.contains(&request.resource_kind) {
        return Err(ClientError::Forbidden(format!(
            "resource kind '{}' is not allow-listed",
            request.resource_kind
        )));
    }

    if !policy.namespace_allowed(&request.namespace) {
        return Err(ClientError::Forbidden(format!(
            "namespace '{}' is not allow-listed for this identity",
            request.namespace
        )));
    }

    if let Some(replicas) = request.replicas {
        if request.verb == Verb::Scale && replicas > policy.max_replicas {
            return Err(ClientError::Forbidden(format!(
                "replica count {replicas} exceeds the maximum of {}",
                policy.max_replicas
            )));
        }
    }

    if request.verb.is_destructive() && policy.critical_resource_kinds.contains(&request.resource_kind) {
        return Err(ClientError::Forbidden(format!(
            "deletion of resource kind '{}' is refused unconditionally",
            request.resource_kind
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use meridian_domain::identity::{Environment, Role};
    use uuid::Uuid;

    fn identity_with(permissions: &[&str]) -> Identity {
        Identity {
            id: Uuid::new_v4(),
            display_name: "operator".to_string(),
            role: Role::Operator,
            permissions: permissions.iter().map(|p| p.to_string()).collect(),
            environment: Environment::Dev,
        }
    }

    fn base_policy() -> RbacPolicy {
        RbacPolicy {
            allowed_resource_kinds: ["deployment".to_string(), "pod".to_string()].into_iter().collect(),
            allowed_namespaces: vec!["payments".to_string()],
            max_replicas: 10,
            critical_resource_kinds: ["namespace".to_string()].into_iter().collect(),
        }
    }

    #[test]
    fn rejects_missing_verb_permission() {
        let identity = identity_with(&[]);
        let request = ClusterRequest {
            verb: Verb::Read,
            resource_kind: "pod".to_string(),
            namespace: "payments".to_string(),
            replicas: None,
            command_text: "kubectl get pods".to_string(),
        };
        assert!(matches!(
            check_request(&identity, &base_policy(), &request),
            Err(ClientError::Unauthorized(_))
        ));
    }

    #[test]
    fn rejects_write_without_write_permission() {
        let identity = identity_with(&["scale"]);
        let request = ClusterRequest {
            verb: Verb::Scale,
            resource_kind: "deployment".to_string(),
            namespace: "payments".to_string(),
            replicas: Some(4),
            command_text: "kubectl scale".to_string(),
        };
        assert!(matches!(
            check_request(&identity, &base_policy(), &request),
            Err(ClientError::Unauthorized(_))
        ));
    }

    #[test]
    fn replica_count_at_cap_is_accepted() {
        let identity = identity_with(&["scale", "write"]);
        let request = ClusterRequest {
            verb: Verb::Scale,
            resource_kind: "deployment".to_string(),
            namespace: "payments".to_string(),
            replicas: Some(10),
            command_text: "kubectl scale".to_string(),
        };
        assert!(check_request(&identity, &base_policy(), &request).is_ok());
    }

    #[test]
    fn replica_count_over_cap_is_rejected() {
        let identity = identity_with(&["scale", "write"]);
        let request = ClusterRequest {
            verb: Verb::Scale,
            resource_kind: "deployment".to_string(),
            namespace: "payments".to_string(),
            replicas: Some(11),
            command_text: "kubectl scale".to_string(),
        };
        assert!(matches!(
            check_request(&identity, &base_policy(), &request),
            Err(ClientError::Forbidden(_))
        ));
    }

    #[test]
    fn critical_resource_deletion_refused_even_for_admin_permissions() {
        let identity = identity_with(&["delete", "write"]);
        let mut policy = base_policy();
        policy.allowed_resource_kinds.insert("namespace".to_string());
        let request = ClusterRequest {
            verb: Verb::Delete,
            resource_kind: "namespace".to_string(),
            namespace: "payments".to_string(),
            replicas: None,
            command_text: "kubectl delete namespace payments".to_string(),
        };
        assert!(matches!(
            check_request(&identity, &policy, &request),
            Err(ClientError::Forbidden(_))
        ));
    }

    #[test]
    fn wildcard_namespace_allows_any() {
        let identity = identity_with(&["read"]);
        let mut policy = base_policy();
        policy.allowed_namespaces = vec!["*".to_string()];
        let request = ClusterRequest {
            verb: Verb::Read,
            resource_kind: "pod".to_string(),
            namespace: "kube-system".to_string(),
            replicas: None,
            command_text: "kubectl get pods -n kube-system".to_string(),
        };
        assert!(check_request(&identity, &policy, &request).is_ok());
    }
}
