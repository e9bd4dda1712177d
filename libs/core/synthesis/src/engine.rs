// [libs/core/synthesis/src/engine.rs]
//! Orchestrates a single synthesis request end to end: sanitize the query,
//! check the cache, attempt the primary provider under a deadline, fall
//! back across any remaining healthy providers, and finally fall back to
//! the deterministic mock before giving up.

use crate::error::SynthesisError;
use crate::mock::synthesize_mock;
use crate::parser::parse_response;
use crate::prompt::build_prompt;
use crate::provider::Provider;
use crate::sanitize::sanitize_query;
use meridian_cache::TtlLruCache;
use meridian_crypto::digest::fingerprint;
use meridian_domain::synthesis::{SynthesisRequest, SynthesisResult};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{instrument, warn};

pub struct SynthesisEngine {
    primary: Arc<dyn Provider>,
    fallbacks: Vec<Arc<dyn Provider>>,
    cache: TtlLruCache<SynthesisResult>,
    cache_ttl_minutes: i64,
    timeout: Duration,
}

impl SynthesisEngine {
    pub fn new(
        primary: Arc<dyn Provider>,
        fallbacks: Vec<Arc<dyn Provider>>,
        cache_ttl_minutes: i64,
        timeout_seconds: u64,
    ) -> Self {
        Self {
            primary,
            fallbacks,
            cache: TtlLruCache::new(),
            cache_ttl_minutes,
            timeout: Duration::from_secs(timeout_seconds),
        }
    }

    fn cache_key(request: &SynthesisRequest, sanitized_query: &str) -> String {
        let context_repr: String = request
            .context
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join(",");
        fingerprint(&[
            sanitized_query,
            &format!("{:?}", request.user_role),
            &format!("{:?}", request.environment),
            request.namespace_hint.as_deref().unwrap_or(""),
            request.cluster_hint.as_deref().unwrap_or(""),
            &context_repr,
        ])
    }

    #[instrument(skip(self, request), fields(role = ?request.user_role, environment = ?request.environment))]
    pub async fn synthesize(
        &self,
        request: &SynthesisRequest,
    ) -> Result<SynthesisResult, SynthesisError> {
        let sanitized_query = sanitize_query(&request.query);
        let key = Self::cache_key(request, &sanitized_query);

        if let Some(cached) = self.cache.get(&key) {
            return Ok(cached);
        }

        let prompt = build_prompt(request, &sanitized_query);

        let result = match self.try_primary(&prompt).await {
            Ok(result) => result,
            Err(primary_err) => {
                warn!(error = %primary_err, "primary synthesis provider failed, trying fallbacks");
                match self.try_fallbacks(&prompt).await {
                    Some(result) => result,
                    None => self.mock_result(&sanitized_query),
                }
            }
        };

        self.cache.insert(key, result.clone(), self.cache_ttl_minutes);
        Ok(result)
    }

    async fn try_primary(
        &self,
        prompt: &crate::prompt::Prompt,
    ) -> Result<SynthesisResult, SynthesisError> {
        let started = Instant::now();
        let raw = tokio::time::timeout(self.timeout, self.primary.process(prompt))
            .await
            .map_err(|_| SynthesisError::Timeout)??;
        Ok(self.to_result(self.primary.name(), &raw, started.elapsed()))
    }

    async fn try_fallbacks(&self, prompt: &crate::prompt::Prompt) -> Option<SynthesisResult> {
        for provider in &self.fallbacks {
            if !provider.healthy().await {
                continue;
            }
            let started = Instant::now();
            match tokio::time::timeout(self.timeout, provider.process(prompt)).await {
                Ok(Ok(raw)) => return Some(self.to_result(provider.name(), &raw, started.elapsed())),
                Ok(Err(err)) => warn!(error = %err, provider = provider.name(), "fallback provider failed"),
                Err(_) => warn!(provider = provider.name(), "fallback provider timed out"),
            }
        }
        None
    }

    /// Probes the primary and every fallback provider, in configured order.
    /// Cheap enough to run off a polling daemon rather than on the request
    /// path of `GET /nlp/health`.
    pub async fn health_snapshot(&self) -> Vec<(String, bool)> {
        let mut snapshot = vec![(self.primary.name().to_string(), self.primary.healthy().await)];
        for provider in &self.fallbacks {
            snapshot.push((provider.name().to_string(), provider.healthy().await));
        }
        snapshot
    }

    fn mock_result(&self, sanitized_query: &str) -> SynthesisResult {
        let parsed = synthesize_mock(sanitized_query);
        SynthesisResult {
            command: parsed.command,
            explanation: parsed.explanation,
            confidence: parsed.confidence,
            token_count: None,
            provider: "mock".to_string(),
            latency: Duration::ZERO,
            warnings: vec!["Served by the deterministic mock provider.".to_string()],
            suggestions: Vec::new(),
        }
    }

    fn to_result(&self, provider_name: &str, raw_text: &str, latency: Duration) -> SynthesisResult {
        let parsed = parse_response(raw_text);
        SynthesisResult {
            command: parsed.command,
            explanation: parsed.explanation,
            confidence: parsed.confidence,
            token_count: None,
            provider: provider_name.to_string(),
            latency,
            warnings: Vec::new(),
            suggestions: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prompt::Prompt;
    use async_trait::async_trait;
    use meridian_domain::identity::{Environment, Role};
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FlakyProvider {
        name: &'static str,
        calls: AtomicUsize,
        fails: usize,
        response: &'static str,
    }

    #[async_trait]
    impl Provider for FlakyProvider {
        fn name(&self) -> &str {
            self.name
        }

        async fn process(&self, _prompt: &Prompt) -> Result<String, SynthesisError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.fails {
                Err(SynthesisError::Unavailable("simulated outage".to_string()))
            } else {
                Ok(self.response.to_string())
            }
        }

        async fn healthy(&self) -> bool {
            true
        }
    }

    fn sample_request(query: &str) -> SynthesisRequest {
        SynthesisRequest {
            query: query.to_string(),
            context: BTreeMap::new(),
            namespace_hint: None,
            cluster_hint: None,
            user_role: Role::Operator,
            environment: Environment::Dev,
            provider_preference: None,
        }
    }

    #[tokio::test]
    async fn falls_back_when_primary_fails() {
        let primary = Arc::new(FlakyProvider {
            name: "primary",
            calls: AtomicUsize::new(0),
            fails: 999,
            response: "unused",
        });
        let fallback = Arc::new(FlakyProvider {
            name: "fallback",
            calls: AtomicUsize::new(0),
            fails: 0,
            response: r#"{"command": "kubectl get pods", "explanation": "ok", "confidence": 0.7}"#,
        });
        let engine = SynthesisEngine::new(primary, vec![fallback], 60, 5);
        let result = engine.synthesize(&sample_request("show pods")).await.unwrap();
        assert_eq!(result.provider, "fallback");
        assert_eq!(result.command, "kubectl get pods");
    }

    #[tokio::test]
    async fn falls_back_to_mock_when_everything_fails() {
        let primary = Arc::new(FlakyProvider {
            name: "primary",
            calls: AtomicUsize::new(0),
            fails: 999,
            response: "",
        });
        let engine = SynthesisEngine::new(primary, vec![], 60, 5);
        let result = engine.synthesize(&sample_request("show pods")).await.unwrap();
        assert_eq!(result.provider, "mock");
    }

    #[tokio::test]
    async fn second_identical_request_is_served_from_cache() {
        let primary = Arc::new(FlakyProvider {
            name: "primary",
            calls: AtomicUsize::new(0),
            fails: 0,
            response: r#"{"command": "kubectl get nodes", "explanation": "ok", "confidence": 0.9}"#,
        });
        let engine = SynthesisEngine::new(primary, vec![], 60, 5);
        let request = sample_request("show nodes");
        let first = engine.synthesize(&request).await.unwrap();
        let second = engine.synthesize(&request).await.unwrap();
        assert_eq!(first.command, second.command);
    }
}
