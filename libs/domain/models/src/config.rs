// [libs/domain/models/src/config.rs]
//! Recognized configuration options. Parsed from environment variables at
//! the composition root directly in `main.rs`, rather than through a
//! generic config-file loader.

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub default_provider: String,
    pub enable_fallback: bool,
    pub max_retries: u32,
    pub timeout_seconds: u64,
    pub enable_caching: bool,
    pub cache_ttl_minutes: i64,
    pub enable_rate_limiting: bool,
    pub rate_limit: u32,
    pub session_ttl_hours: i64,
    pub max_replicas: u32,
    pub allowed_namespaces: Vec<String>,
    pub critical_namespaces: Vec<String>,
    pub retention_days: i64,
    pub async_audit: bool,
    pub async_buffer_size: usize,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            default_provider: "local".to_string(),
            enable_fallback: true,
            max_retries: 2,
            timeout_seconds: 30,
            enable_caching: true,
            cache_ttl_minutes: 60,
            enable_rate_limiting: true,
            rate_limit: 30,
            session_ttl_hours: 8,
            max_replicas: 10,
            allowed_namespaces: vec!["*".to_string()],
            critical_namespaces: vec![
                "kube-system".to_string(),
                "kube-public".to_string(),
                "kube-node-lease".to_string(),
            ],
            retention_days: 90,
            async_audit: false,
            async_buffer_size: 1024,
        }
    }
}

impl GatewayConfig {
    /// Reads overrides from the process environment; anything unset falls
    /// back to `Default::default()`.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            default_provider: env_string("DEFAULT_PROVIDER", defaults.default_provider),
            enable_fallback: env_bool("ENABLE_FALLBACK", defaults.enable_fallback),
            max_retries: env_parse("MAX_RETRIES", defaults.max_retries),
            timeout_seconds: env_parse("TIMEOUT_SECONDS", defaults.timeout_seconds),
            enable_caching: env_bool("ENABLE_CACHING", defaults.enable_caching),
            cache_ttl_minutes: env_parse("CACHE_TTL_MINUTES", defaults.cache_ttl_minutes),
            enable_rate_limiting: env_bool("ENABLE_RATE_LIMITING", defaults.enable_rate_limiting),
            rate_limit: env_parse("RATE_LIMIT", defaults.rate_limit),
            session_ttl_hours: env_parse("SESSION_TTL_HOURS", defaults.session_ttl_hours),
            max_replicas: env_parse("MAX_REPLICAS", defaults.max_replicas),
            allowed_namespaces: env_list("ALLOWED_NAMESPACES", defaults.allowed_namespaces),
            critical_namespaces: env_list("CRITICAL_NAMESPACES", defaults.critical_namespaces),
            retention_days: env_parse("RETENTION_DAYS", defaults.retention_days),
            async_audit: env_bool("ASYNC_AUDIT", defaults.async_audit),
            async_buffer_size: env_parse("ASYNC_BUFFER_SIZE", defaults.async_buffer_size),
        }
    }
}

fn env_string(key: &str, default: String) -> String {
    std::env::var(key).unwrap_or(default)
}

fn env_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_list(key: &str, default: Vec<String>) -> Vec<String> {
    match std::env::var(key) {
        Ok(raw) if !raw.is_empty() => raw.split(',').map(|s| s.trim().to_string()).collect(),
        _ => default,
    }
}
