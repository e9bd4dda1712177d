// [libs/core/synthesis/src/provider.rs]
//! Provider transport. Each provider turns a `Prompt` into a raw completion
//! string; parsing and confidence scoring happen one layer up in `engine`.

use crate::error::SynthesisError;
use crate::prompt::Prompt;
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::instrument;

#[async_trait]
pub trait Provider: Send + Sync {
    /// Human-readable identifier recorded on the `SynthesisResult`.
    fn name(&self) -> &str;

    /// Sends the prompt to the backing service and returns its raw text
    /// completion, pre-parsing.
    async fn process(&self, prompt: &Prompt) -> Result<String, SynthesisError>;

    /// Cheap reachability probe used to filter the fallback chain before a
    /// slower `process` call is attempted.
    async fn healthy(&self) -> bool;
}

/// Talks to a local, Ollama-style `/api/generate` endpoint.
pub struct LocalProvider {
    client: reqwest::Client,
    base_url: String,
    model: String,
}

impl LocalProvider {
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            model: model.into(),
        }
    }
}

#[derive(Deserialize)]
struct OllamaChunk {
    response: String,
    #[serde(default)]
    done: bool,
}

#[async_trait]
impl Provider for LocalProvider {
    fn name(&self) -> &str {
        "local"
    }

    #[instrument(skip(self, prompt), fields(provider = "local"))]
    async fn process(&self, prompt: &Prompt) -> Result<String, SynthesisError> {
        let body = serde_json::json!({
            "model": self.model,
            "system": prompt.system,
            "prompt": prompt.user,
            "stream": true,
        });

        let response = self
            .client
            .post(format!("{}/api/generate", self.base_url))
            .json(&body)
            .send()
            .await
            .map_err(|e| SynthesisError::Unavailable(e.to_string()))?;

        let raw = response
            .text()
            .await
            .map_err(|e| SynthesisError::Unavailable(e.to_string()))?;

        // Ollama streams newline-delimited JSON chunks even with stream
        // disabled in some versions; fold all `response` fragments.
        let mut assembled = String::new();
        for line in raw.lines() {
            if line.trim().is_empty() {
                continue;
            }
            let chunk: OllamaChunk = serde_json::from_str(line)
                .map_err(|e| SynthesisError::MalformedResponse(e.to_string()))?;
            assembled.push_str(&chunk.response);
            if chunk.done {
                break;
            }
        }
        Ok(assembled)
    }

    async fn healthy(&self) -> bool {
        self.client
            .get(format!("{}/api/tags", self.base_url))
            .timeout(Duration::from_secs(2))
            .send()
            .await
            .map(|r| r.status().is_success())
            .unwrap_or(false)
    }
}

/// Talks to an OpenAI-compatible `/chat/completions` endpoint.
pub struct CloudProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl CloudProvider {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            api_key: api_key.into(),
            model: model.into(),
        }
    }
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessageBody,
}

#[derive(Deserialize)]
struct ChatMessageBody {
    content: String,
}

#[async_trait]
impl Provider for CloudProvider {
    fn name(&self) -> &str {
        "cloud"
    }

    #[instrument(skip(self, prompt), fields(provider = "cloud"))]
    async fn process(&self, prompt: &Prompt) -> Result<String, SynthesisError> {
        let body = serde_json::json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": prompt.system},
                {"role": "user", "content": prompt.user},
            ],
        });

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| SynthesisError::Unavailable(e.to_string()))?;

        if !response.status().is_success() {
            return Err(SynthesisError::Unavailable(format!(
                "cloud provider returned status {}",
                response.status()
            )));
        }

        let parsed: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| SynthesisError::MalformedResponse(e.to_string()))?;

        parsed
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| SynthesisError::MalformedResponse("empty choices array".to_string()))
    }

    async fn healthy(&self) -> bool {
        self.client
            .get(format!("{}/models", self.base_url))
            .bearer_auth(&self.api_key)
            .timeout(Duration::from_secs(2))
            .send()
            .await
            .map(|r| r.status().is_success())
            .unwrap_or(false)
    }
}
