// [apps/gateway/src/command_parser.rs]
//! Turns a synthesized or literal kubectl-style command string into the
//! structured `ClusterRequest` the cluster client's RBAC check and
//! transport expect. Ordered keyword scan, same shape as the lexical
//! safety classifier: first matching verb wins.

use meridian_cluster_client::Verb;

const VERB_TABLE: &[(&str, Verb)] = &[
    ("delete", Verb::Delete),
    ("apply", Verb::Apply),
    ("patch", Verb::Patch),
    ("create", Verb::Create),
    ("scale", Verb::Scale),
    ("rollout restart", Verb::Restart),
    ("restart", Verb::Restart),
    ("logs", Verb::Logs),
    ("describe", Verb::Describe),
    ("get", Verb::List),
];

const KNOWN_RESOURCE_KINDS: &[&str] = &[
    "pod",
    "pods",
    "deployment",
    "deployments",
    "statefulset",
    "statefulsets",
    "daemonset",
    "daemonsets",
    "replicaset",
    "replicasets",
    "service",
    "services",
    "configmap",
    "configmaps",
    "secret",
    "secrets",
    "namespace",
    "namespaces",
    "node",
    "nodes",
    "job",
    "jobs",
    "cronjob",
    "cronjobs",
    "ingress",
    "ingresses",
];

pub struct ParsedCommand {
    pub verb: Verb,
    pub resource_kind: String,
    pub resource_name: Option<String>,
    pub replicas: Option<u32>,
}

fn singularize(word: &str) -> String {
    word.strip_suffix('s').unwrap_or(word).to_string()
}

/// Returns `None` only if no recognized verb appears anywhere in the
/// command; resource kind defaults to `"unknown"` rather than failing,
/// since an unrecognized resource kind is still rejected downstream by
/// the RBAC allow-list.
pub fn parse_command(command: &str) -> Option<ParsedCommand> {
    let lowered = command.to_lowercase();
    let tokens: Vec<&str> = lowered.split_whitespace().collect();

    let verb = VERB_TABLE
        .iter()
        .find(|(keyword, _)| lowered.contains(keyword))
        .map(|(_, verb)| *verb)?;

    let resource_kind_index = tokens
        .iter()
        .position(|token| KNOWN_RESOURCE_KINDS.iter().any(|kind| kind == token));

    let resource_kind = resource_kind_index
        .map(|idx| singularize(tokens[idx]))
        .unwrap_or_else(|| "unknown".to_string());

    // The token right after the resource kind is the resource's name, as
    // long as it isn't itself a flag (e.g. `kubectl scale deployment
    // --replicas=4` has no name token at all).
    let resource_name = resource_kind_index
        .and_then(|idx| tokens.get(idx + 1))
        .filter(|token| !token.starts_with('-'))
        .map(|token| token.to_string());

    let replicas = lowered
        .split("--replicas")
        .nth(1)
        .and_then(|rest| rest.trim_start_matches(['=', ' ']).split_whitespace().next())
        .and_then(|n| n.parse().ok());

    Some(ParsedCommand {
        verb,
        resource_kind,
        resource_name,
        replicas,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_scale_with_replica_count() {
        let parsed = parse_command("kubectl scale deployment payments --replicas=4").unwrap();
        assert_eq!(parsed.verb, Verb::Scale);
        assert_eq!(parsed.resource_kind, "deployment");
        assert_eq!(parsed.resource_name.as_deref(), Some("payments"));
        assert_eq!(parsed.replicas, Some(4));
    }

    #[test]
    fn parses_plain_get() {
        let parsed = parse_command("kubectl get pods").unwrap();
        assert_eq!(parsed.verb, Verb::List);
        assert_eq!(parsed.resource_kind, "pod");
    }

    #[test]
    fn scale_without_resource_name_leaves_it_none() {
        let parsed = parse_command("kubectl scale deployment --replicas=4").unwrap();
        assert_eq!(parsed.resource_name, None);
    }

    #[test]
    fn delete_takes_priority_over_get_in_combined_text() {
        let parsed = parse_command("kubectl delete pod crashloop-5").unwrap();
        assert_eq!(parsed.verb, Verb::Delete);
    }

    #[test]
    fn unrecognized_command_returns_none() {
        assert!(parse_command("echo hello world").is_none());
    }
}
