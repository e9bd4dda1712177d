// [libs/core/synthesis/src/prompt.rs]
//! Prompt construction. Built once per request from an immutable template
//! — the template text itself never changes at runtime, only the
//! per-request context folded into the user turn.

use meridian_domain::synthesis::SynthesisRequest;

const SYSTEM_PREAMBLE: &str = r#"You translate natural-language operator requests into a single \
container-orchestration cluster command. Respond with a strict JSON object of the shape \
{"command": string, "explanation": string, "confidence": number between 0 and 1}. \
Safety classes you must keep in mind when choosing a command: safe (reads), warning \
(mutations such as create/apply/patch/scale/restart), and dangerous (delete/force/drain/evict). \
Never include commentary outside the JSON object."#;

pub struct Prompt {
    pub system: String,
    pub user: String,
}

pub fn build_prompt(request: &SynthesisRequest, sanitized_query: &str) -> Prompt {
    let mut context_lines = vec![
        format!("role: {:?}", request.user_role),
        format!("environment: {:?}", request.environment),
    ];
    if let Some(namespace) = &request.namespace_hint {
        context_lines.push(format!("namespace: {namespace}"));
    }
    if let Some(cluster) = &request.cluster_hint {
        context_lines.push(format!("cluster: {cluster}"));
    }
    for (key, value) in &request.context {
        context_lines.push(format!("{key}: {value}"));
    }

    let user = format!(
        "Context:\n{}\n\nRequest: {sanitized_query}",
        context_lines.join("\n")
    );

    Prompt {
        system: SYSTEM_PREAMBLE.to_string(),
        user,
    }
}
