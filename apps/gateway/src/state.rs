// [apps/gateway/src/state.rs]
/*!
 * =================================================================
 * APARATO: GATEWAY STATE HUB
 * CLASIFICACIÓN: APPLICATION STATE (L1-APP)
 * RESPONSABILIDAD: COMPOSICIÓN DE REPOSITORIOS, MOTORES Y CLIENTES
 * =================================================================
 */

use crate::audit_buffer::AsyncAuditBuffer;
use crate::execution::ExecutionEngine;
use crate::ratelimit::RateLimiter;
use crate::ws_hub::WsHub;
use meridian_cluster_client::{ClusterClient, RbacPolicy};
use meridian_domain::config::GatewayConfig;
use meridian_safety::SafetyEngine;
use meridian_store::{AuditRepository, ExecutionRepository, RollbackRepository, SessionRepository, StoreClient};
use meridian_synthesis::SynthesisEngine;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tracing::debug;

/// Default kubectl resource kinds an identity may be granted access to.
/// Not part of `GatewayConfig` since it names cluster vocabulary rather
/// than a per-deployment policy knob.
const DEFAULT_RESOURCE_KINDS: &[&str] = &[
    "pod",
    "deployment",
    "statefulset",
    "daemonset",
    "replicaset",
    "service",
    "configmap",
    "secret",
    "namespace",
    "node",
    "job",
    "cronjob",
    "ingress",
];

/// Liveness state consulted by the health guard; flips to `Maintenance`
/// under operator command or when a critical background daemon reports
/// the system can no longer serve requests safely.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SystemMode {
    Operational,
    Maintenance(String),
}

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<GatewayConfig>,
    pub store: StoreClient,
    pub sessions: Arc<SessionRepository>,
    pub audit: Arc<AuditRepository>,
    pub executions: Arc<ExecutionRepository>,
    pub rollbacks: Arc<RollbackRepository>,
    pub cluster: Arc<ClusterClient>,
    pub rbac_policy: Arc<RbacPolicy>,
    pub synthesis: Arc<SynthesisEngine>,
    pub safety: Arc<SafetyEngine>,
    pub rate_limiter: Arc<RateLimiter>,
    pub ws_hub: Arc<WsHub>,
    pub token_secret: Arc<Vec<u8>>,
    pub token_key_id: Arc<String>,
    pub mode: Arc<RwLock<SystemMode>>,
    pub execution_engine: Arc<ExecutionEngine>,
    /// Set when `GatewayConfig::async_audit` is on; `kernel::launch` drains
    /// it on shutdown before the process exits.
    pub audit_buffer: Option<Arc<AsyncAuditBuffer>>,
    /// Populated by `services::provider_health_poller`; `GET /nlp/health`
    /// reads this instead of probing providers on every request.
    pub provider_health: Arc<RwLock<Vec<(String, bool)>>>,
}

impl AppState {
    pub fn new(
        config: GatewayConfig,
        store: StoreClient,
        synthesis: SynthesisEngine,
        cluster_base_url: &str,
        token_secret: Vec<u8>,
        token_key_id: String,
    ) -> Self {
        debug!("composing gateway application state");

        let rbac_policy = Arc::new(RbacPolicy {
            allowed_resource_kinds: DEFAULT_RESOURCE_KINDS.iter().map(|s| s.to_string()).collect(),
            allowed_namespaces: config.allowed_namespaces.clone(),
            max_replicas: config.max_replicas,
            critical_resource_kinds: ["namespace".to_string(), "node".to_string()].into_iter().collect(),
        });

        let audit = Arc::new(AuditRepository::new(store.clone()));
        let executions = Arc::new(ExecutionRepository::new(store.clone()));
        let rollbacks = Arc::new(RollbackRepository::new(store.clone()));
        let cluster = Arc::new(ClusterClient::new(cluster_base_url));
        let safety = Arc::new(SafetyEngine::new(24 * 60));
        let ws_hub = Arc::new(WsHub::new());

        let audit_buffer = config
            .async_audit
            .then(|| AsyncAuditBuffer::spawn(Arc::clone(&audit), config.async_buffer_size));

        let execution_engine = Arc::new(ExecutionEngine::new(
            Arc::clone(&executions),
            Arc::clone(&rollbacks),
            Arc::clone(&audit),
            Arc::clone(&cluster),
            Arc::clone(&safety),
            Arc::clone(&rbac_policy),
            Arc::clone(&ws_hub),
            config.critical_namespaces.clone(),
            Duration::from_secs(config.timeout_seconds),
            audit_buffer.clone(),
        ));

        Self {
            sessions: Arc::new(SessionRepository::new(store.clone())),
            audit,
            executions,
            rollbacks,
            cluster,
            rbac_policy,
            safety,
            rate_limiter: Arc::new(RateLimiter::new(config.rate_limit)),
            ws_hub,
            token_secret: Arc::new(token_secret),
            token_key_id: Arc::new(token_key_id),
            // Stays here until `Bootstrap::spawn_diagnostics` certifies the
            // audit chain and promotes it; the health guard reflects this.
            mode: Arc::new(RwLock::new(SystemMode::Maintenance("starting up".to_string()))),
            execution_engine,
            audit_buffer,
            provider_health: Arc::new(RwLock::new(Vec::new())),
            synthesis: Arc::new(synthesis),
            config: Arc::new(config),
            store,
        }
    }

    /// Consulted by the health guard; `Err` carries the maintenance reason.
    pub fn is_operational(&self) -> Result<(), String> {
        match &*self.mode.read().expect("mode lock poisoned") {
            SystemMode::Operational => Ok(()),
            SystemMode::Maintenance(reason) => Err(reason.clone()),
        }
    }

    pub fn enter_maintenance(&self, reason: impl Into<String>) {
        *self.mode.write().expect("mode lock poisoned") = SystemMode::Maintenance(reason.into());
    }

    pub fn resume_operational(&self) {
        *self.mode.write().expect("mode lock poisoned") = SystemMode::Operational;
    }
}
