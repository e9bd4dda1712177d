// [libs/core/synthesis/src/parser.rs]
//! Turns a raw provider completion into a `(command, explanation, confidence)`
//! triple. Providers are asked for strict JSON but routinely wrap it in
//! prose or code fences, so parsing degrades through three tiers rather
//! than failing outright on the first miss.

use serde::Deserialize;

pub struct ParsedResponse {
    pub command: String,
    pub explanation: String,
    pub confidence: f32,
}

#[derive(Deserialize)]
struct StructuredReply {
    command: String,
    #[serde(default)]
    explanation: String,
    #[serde(default)]
    confidence: Option<f32>,
}

const DEFAULT_STRUCTURED_CONFIDENCE: f32 = 0.5;
const DEFAULT_PREFIX_CONFIDENCE: f32 = 0.8;
const DEFAULT_SAFE_FALLBACK_CONFIDENCE: f32 = 0.3;

const COMMAND_PREFIXES: &[&str] = &["kubectl ", "command:", "$ kubectl"];

/// Attempts structured JSON extraction first, then a command-prefix line
/// scan, then falls back to a safe read-only default so a malformed
/// completion never surfaces as a hard error to the caller.
pub fn parse_response(raw_text: &str) -> ParsedResponse {
    if let Some(parsed) = parse_json_object(raw_text) {
        return parsed;
    }
    if let Some(parsed) = parse_command_prefix_line(raw_text) {
        return parsed;
    }
    safe_fallback()
}

fn parse_json_object(raw_text: &str) -> Option<ParsedResponse> {
    let start = raw_text.find('{')?;
    let end = raw_text.rfind('}')?;
    if end < start {
        return None;
    }
    let candidate = &raw_text[start..=end];
    let reply: StructuredReply = serde_json::from_str(candidate).ok()?;
    if reply.command.trim().is_empty() {
        return None;
    }
    Some(ParsedResponse {
        command: reply.command.trim().to_string(),
        explanation: reply.explanation,
        confidence: reply
            .confidence
            .unwrap_or(DEFAULT_STRUCTURED_CONFIDENCE)
            .clamp(0.0, 1.0),
    })
}

fn parse_command_prefix_line(raw_text: &str) -> Option<ParsedResponse> {
    let lines: Vec<&str> = raw_text.lines().collect();
    for (index, line) in lines.iter().enumerate() {
        let trimmed = line.trim();
        let lowered = trimmed.to_lowercase();
        for prefix in COMMAND_PREFIXES {
            if lowered.starts_with(prefix) {
                let command = trimmed
                    .trim_start_matches(|c: char| c == '$' || c.is_whitespace())
                    .trim_start_matches("command:")
                    .trim()
                    .to_string();
                if command.is_empty() {
                    continue;
                }
                let explanation = lines[index + 1..]
                    .iter()
                    .map(|l| l.trim())
                    .filter(|l| !l.is_empty())
                    .collect::<Vec<_>>()
                    .join(" ");
                return Some(ParsedResponse {
                    command,
                    explanation,
                    confidence: DEFAULT_PREFIX_CONFIDENCE,
                });
            }
        }
    }
    None
}

fn safe_fallback() -> ParsedResponse {
    ParsedResponse {
        command: "kubectl get pods".to_string(),
        explanation: "Provider response could not be parsed; defaulted to a read-only command."
            .to_string(),
        confidence: DEFAULT_SAFE_FALLBACK_CONFIDENCE,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_clean_json_object() {
        let raw = r#"{"command": "kubectl get pods -n default", "explanation": "lists pods", "confidence": 0.92}"#;
        let parsed = parse_response(raw);
        assert_eq!(parsed.command, "kubectl get pods -n default");
        assert_eq!(parsed.confidence, 0.92);
    }

    #[test]
    fn parses_json_embedded_in_prose() {
        let raw = "Sure, here you go:\n{\"command\": \"kubectl get nodes\", \"explanation\": \"lists nodes\"}\nHope that helps!";
        let parsed = parse_response(raw);
        assert_eq!(parsed.command, "kubectl get nodes");
        assert_eq!(parsed.confidence, DEFAULT_STRUCTURED_CONFIDENCE);
    }

    #[test]
    fn falls_back_to_command_prefix_line() {
        let raw = "I'd run:\nkubectl scale deployment/web --replicas=3\nto do that.";
        let parsed = parse_response(raw);
        assert_eq!(parsed.command, "kubectl scale deployment/web --replicas=3");
        assert_eq!(parsed.confidence, DEFAULT_PREFIX_CONFIDENCE);
    }

    #[test]
    fn falls_back_to_safe_default_on_garbage() {
        let parsed = parse_response("I'm not sure what you mean by that.");
        assert_eq!(parsed.command, "kubectl get pods");
        assert_eq!(parsed.confidence, DEFAULT_SAFE_FALLBACK_CONFIDENCE);
    }

    #[test]
    fn rejects_json_with_empty_command() {
        let raw = r#"{"command": "", "explanation": "nothing"}"#;
        let parsed = parse_response(raw);
        assert_eq!(parsed.command, "kubectl get pods");
    }
}
