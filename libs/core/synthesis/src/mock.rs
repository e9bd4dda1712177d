// [libs/core/synthesis/src/mock.rs]
//! Deterministic keyword-to-command substitution used when no configured
//! provider is reachable. Never calls out over the network: a fixed rule
//! table plus a small set of confidence adjustments, so the same query
//! always yields the same command.

use crate::parser::ParsedResponse;

struct Rule {
    keywords: &'static [&'static str],
    command: &'static str,
    explanation: &'static str,
}

const RULES: &[Rule] = &[
    Rule {
        keywords: &["pods", "pod"],
        command: "kubectl get pods",
        explanation: "Lists pods in the current namespace.",
    },
    Rule {
        keywords: &["nodes", "node"],
        command: "kubectl get nodes",
        explanation: "Lists cluster nodes.",
    },
    Rule {
        keywords: &["logs", "log"],
        command: "kubectl logs",
        explanation: "Tails logs for the named resource.",
    },
    Rule {
        keywords: &["scale", "replicas"],
        command: "kubectl scale",
        explanation: "Adjusts replica count for a deployment.",
    },
    Rule {
        keywords: &["delete", "remove"],
        command: "kubectl delete",
        explanation: "Deletes the named resource.",
    },
    Rule {
        keywords: &["restart", "rollout"],
        command: "kubectl rollout restart",
        explanation: "Restarts a deployment's pods in a rolling fashion.",
    },
    Rule {
        keywords: &["describe", "inspect"],
        command: "kubectl describe",
        explanation: "Shows detailed state for the named resource.",
    },
    Rule {
        keywords: &["events"],
        command: "kubectl get events",
        explanation: "Lists recent cluster events.",
    },
    Rule {
        keywords: &["namespaces", "namespace"],
        command: "kubectl get namespaces",
        explanation: "Lists namespaces.",
    },
];

const FILLER_TOKENS: &[&str] = &["please", "thanks", "um", "just", "maybe"];
const TOOL_NAME_MENTION: &str = "kubectl";

const BASE_CONFIDENCE: f32 = 0.7;

/// Produces a deterministic response for a sanitized query with no network
/// call. Confidence is adjusted by a few surface signals: mentioning the
/// tool name by name, an overly short query, or filler words that suggest
/// the operator was unsure what they wanted. An unmatched query already
/// falls back to the safe read-only default below, so it isn't penalized
/// a second time on confidence.
pub fn synthesize_mock(sanitized_query: &str) -> ParsedResponse {
    let lowered = sanitized_query.to_lowercase();

    let matched = RULES
        .iter()
        .find(|rule| rule.keywords.iter().any(|kw| lowered.contains(kw)));

    let (command, explanation) = match matched {
        Some(rule) => (rule.command.to_string(), rule.explanation.to_string()),
        None => (
            "kubectl get pods".to_string(),
            "No specific resource recognized; defaulted to a read-only listing.".to_string(),
        ),
    };

    let mut confidence = BASE_CONFIDENCE;
    if lowered.contains(TOOL_NAME_MENTION) {
        confidence += 0.2;
    }
    let len = sanitized_query.chars().count();
    if (20..=100).contains(&len) {
        confidence += 0.1;
    }
    if len < 8 {
        confidence -= 0.2;
    }
    if FILLER_TOKENS.iter().any(|token| lowered.contains(token)) {
        confidence -= 0.3;
    }

    ParsedResponse {
        command,
        explanation,
        confidence: confidence.clamp(0.1, 1.0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_keyword_rule() {
        let response = synthesize_mock("show me all pods in default");
        assert_eq!(response.command, "kubectl get pods");
    }

    #[test]
    fn tool_name_mention_boosts_confidence() {
        let plain = synthesize_mock("show me all pods in default namespace right now");
        let with_tool = synthesize_mock("run kubectl to show me all pods in default namespace");
        assert!(with_tool.confidence > plain.confidence);
    }

    #[test]
    fn very_short_query_is_penalized() {
        let response = synthesize_mock("pods");
        assert!(response.confidence < BASE_CONFIDENCE);
    }

    #[test]
    fn filler_tokens_reduce_confidence() {
        let response = synthesize_mock("please just show me the pods maybe");
        assert!(response.confidence < BASE_CONFIDENCE);
    }

    #[test]
    fn unmatched_query_falls_back_to_safe_default() {
        let response = synthesize_mock("what is the weather like");
        assert_eq!(response.command, "kubectl get pods");
    }

    #[test]
    fn confidence_is_always_within_bounds() {
        let response = synthesize_mock("please um just delete maybe");
        assert!(response.confidence >= 0.1 && response.confidence <= 1.0);
    }
}
