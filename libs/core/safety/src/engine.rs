// [libs/core/safety/src/engine.rs]
//! Contextual escalation layered on top of the pure lexical base
//! classification, plus a classification cache.

use crate::lexical::classify_lexical;
use meridian_cache::TtlLruCache;
use meridian_crypto::digest::fingerprint;
use meridian_domain::classification::{Classification, SafetyLevel};
use meridian_domain::identity::{Environment, Role};
use tracing::{debug, instrument};

pub struct SafetyEngine {
    cache: TtlLruCache<Classification>,
    cache_ttl_minutes: i64,
}

impl SafetyEngine {
    pub fn new(cache_ttl_minutes: i64) -> Self {
        Self {
            cache: TtlLruCache::new(),
            cache_ttl_minutes,
        }
    }

    /// Pure lexical classification, no context, no cache. Exposed for
    /// `POST /nlp/validate` and for callers that only need the base level.
    pub fn classify_lexical_only(&self, command: &str) -> Classification {
        classify_lexical(command)
    }

    /// Full policy decision: lexical base + environment/role/namespace
    /// escalation, memoized by a fingerprint that includes environment and
    /// role, since those two inputs can change the verdict for an otherwise
    /// identical command.
    #[instrument(skip(self, critical_namespaces))]
    pub fn classify(
        &self,
        command: &str,
        environment: Environment,
        role: Role,
        namespace: Option<&str>,
        critical_namespaces: &[String],
    ) -> Classification {
        let cache_key = fingerprint(&[
            command,
            &format!("{environment:?}"),
            &format!("{role:?}"),
            namespace.unwrap_or(""),
        ]);

        if let Some(cached) = self.cache.get(&cache_key) {
            debug!(command, "classification cache hit");
            return cached;
        }

        let mut classification = classify_lexical(command);
        escalate_for_environment(&mut classification, environment);
        escalate_for_namespace(&mut classification, namespace, critical_namespaces);
        escalate_for_role(&mut classification, role);

        self.cache
            .insert(cache_key, classification.clone(), self.cache_ttl_minutes);
        classification
    }
}

fn escalate_level(classification: &mut Classification, new_level: SafetyLevel, reason: impl Into<String>) {
    if new_level > classification.level {
        classification.level = new_level;
        classification.score = new_level.base_risk().max(classification.score);
        classification.requires_approval |= matches!(new_level, SafetyLevel::Warning | SafetyLevel::Dangerous);
        classification.reasons.push(reason.into());
    }
}

fn escalate_for_environment(classification: &mut Classification, environment: Environment) {
    if environment != Environment::Production {
        return;
    }
    match classification.level {
        SafetyLevel::Safe => escalate_level(
            classification,
            SafetyLevel::Warning,
            "Escalated: production environment (safe -> warning)",
        ),
        SafetyLevel::Warning => escalate_level(
            classification,
            SafetyLevel::Dangerous,
            "Escalated: production environment (warning -> dangerous)",
        ),
        _ => {}
    }
}

fn escalate_for_namespace(
    classification: &mut Classification,
    namespace: Option<&str>,
    critical_namespaces: &[String],
) {
    let Some(namespace) = namespace else {
        return;
    };
    let is_critical = critical_namespaces.iter().any(|ns| ns == "*" || ns == namespace);
    if is_critical && classification.level != SafetyLevel::Safe {
        escalate_level(
            classification,
            SafetyLevel::Dangerous,
            format!("Escalated: critical namespace '{namespace}'"),
        );
    }
}

fn escalate_for_role(classification: &mut Classification, role: Role) {
    if role == Role::Developer && classification.level == SafetyLevel::Dangerous {
        if !classification.requires_approval {
            classification
                .reasons
                .push("Escalated: developer role forces approval on dangerous commands".to_string());
        }
        classification.requires_approval = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn production_escalates_warning_to_dangerous() {
        let engine = SafetyEngine::new(60);
        let c = engine.classify(
            "kubectl scale deployment payments --replicas=4",
            Environment::Production,
            Role::Operator,
            Some("payments-prod"),
            &[],
        );
        assert_eq!(c.level, SafetyLevel::Dangerous);
        assert!(c.requires_approval);
    }

    #[test]
    fn policy_monotonicity_across_environments() {
        let engine = SafetyEngine::new(60);
        let dev = engine.classify("kubectl scale deployment x --replicas=2", Environment::Dev, Role::Operator, None, &[]);
        let staging = engine.classify(
            "kubectl scale deployment x --replicas=2",
            Environment::Staging,
            Role::Operator,
            None,
            &[],
        );
        let prod = engine.classify(
            "kubectl scale deployment x --replicas=2",
            Environment::Production,
            Role::Operator,
            None,
            &[],
        );
        assert!(dev.level <= staging.level);
        assert!(staging.level <= prod.level);
    }

    #[test]
    fn critical_namespace_forces_dangerous() {
        let engine = SafetyEngine::new(60);
        let critical = vec!["kube-system".to_string()];
        let c = engine.classify(
            "kubectl scale deployment x --replicas=2",
            Environment::Dev,
            Role::Operator,
            Some("kube-system"),
            &critical,
        );
        assert_eq!(c.level, SafetyLevel::Dangerous);
    }

    #[test]
    fn developer_role_forces_approval_on_dangerous() {
        let engine = SafetyEngine::new(60);
        let c = engine.classify(
            "kubectl delete pod crashloop-5",
            Environment::Dev,
            Role::Developer,
            None,
            &[],
        );
        assert_eq!(c.level, SafetyLevel::Dangerous);
        assert!(c.requires_approval);
    }

    #[test]
    fn blocked_pattern_is_blocked_regardless_of_role() {
        let engine = SafetyEngine::new(60);
        let c = engine.classify("rm -rf /data", Environment::Dev, Role::Admin, None, &[]);
        assert!(c.is_blocked);
    }
}
