// [apps/gateway/src/kernel.rs]
/*!
 * =================================================================
 * APARATO: GATEWAY KERNEL
 * CLASIFICACIÓN: COMPOSITION ROOT (L1-APP)
 * RESPONSABILIDAD: IGNICIÓN DE INFRAESTRUCTURA Y ARRANQUE DE SERVICIOS
 * =================================================================
 */

use crate::bootstrap::Bootstrap;
use crate::routes::build_router;
use crate::services::{
    spawn_provider_health_poller, spawn_rate_limit_sweeper, spawn_retention_archiver, spawn_rollback_expirer,
    spawn_session_reaper,
};
use crate::state::AppState;
use meridian_domain::config::GatewayConfig;
use meridian_store::StoreClient;
use meridian_synthesis::{CloudProvider, LocalProvider, Provider, SynthesisEngine};
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use tracing::{error, info, instrument};

pub struct GatewayKernel {
    pub server_network_port: u16,
    pub application_state: AppState,
}

impl GatewayKernel {
    /// Connects the datastore, assembles the synthesis provider chain, and
    /// composes `AppState`. The gateway starts in `Maintenance` and only
    /// flips operational once `launch` certifies the audit chain.
    #[instrument(skip(database_access_token, token_secret))]
    pub async fn ignite(
        database_connection_url: &str,
        database_access_token: Option<String>,
        listening_port: u16,
        config: GatewayConfig,
        token_secret: Vec<u8>,
        token_key_id: String,
        cluster_base_url: &str,
    ) -> Self {
        let store = StoreClient::connect(database_connection_url, database_access_token)
            .await
            .expect("FATAL: datastore connection failed, ignition aborted");

        let synthesis = build_synthesis_engine(&config);

        let application_state = AppState::new(config, store, synthesis, cluster_base_url, token_secret, token_key_id);

        Self {
            server_network_port: listening_port,
            application_state,
        }
    }

    /// Certifies the audit chain, spawns the maintenance daemons, and
    /// serves HTTP + WebSocket traffic until `SIGINT`/`SIGTERM`. On
    /// shutdown, drains the async audit buffer (if enabled) before
    /// returning so a killed process never loses a buffered entry.
    pub async fn launch(self) {
        let state = self.application_state;

        Bootstrap::spawn_diagnostics(state.clone());

        spawn_session_reaper(state.clone());
        spawn_rollback_expirer(state.clone());
        spawn_rate_limit_sweeper(state.clone());
        spawn_retention_archiver(state.clone());
        spawn_provider_health_poller(state.clone());

        let audit_buffer = state.audit_buffer.clone();
        let router = build_router(state);

        let bind_address = SocketAddr::new("0.0.0.0".parse::<IpAddr>().unwrap(), self.server_network_port);
        info!(%bind_address, "gateway listening");

        let listener = tokio::net::TcpListener::bind(bind_address)
            .await
            .expect("FATAL: failed to bind network port");

        let result = axum::serve(listener, router)
            .with_graceful_shutdown(shutdown_signal())
            .await;

        if let Some(buffer) = audit_buffer {
            info!("draining async audit buffer before exit");
            buffer.flush_and_close().await;
        }

        if let Err(err) = result {
            error!(error = %err, "server loop exited with an error");
            std::process::exit(1);
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    info!("shutdown signal received, draining in-flight work");
}

fn build_synthesis_engine(config: &GatewayConfig) -> SynthesisEngine {
    let local_base_url = std::env::var("LOCAL_PROVIDER_URL").unwrap_or_else(|_| "http://localhost:11434".to_string());
    let local_model = std::env::var("LOCAL_PROVIDER_MODEL").unwrap_or_else(|_| "llama3".to_string());
    let local_provider: Arc<dyn Provider> = Arc::new(LocalProvider::new(local_base_url, local_model));

    let cloud_provider: Option<Arc<dyn Provider>> = std::env::var("CLOUD_PROVIDER_API_KEY").ok().map(|api_key| {
        let cloud_base_url = std::env::var("CLOUD_PROVIDER_URL").unwrap_or_else(|_| "https://api.openai.com/v1".to_string());
        let cloud_model = std::env::var("CLOUD_PROVIDER_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string());
        Arc::new(CloudProvider::new(cloud_base_url, api_key, cloud_model)) as Arc<dyn Provider>
    });

    let (primary, fallbacks) = match (config.default_provider.as_str(), &cloud_provider) {
        ("cloud", Some(cloud)) => (Arc::clone(cloud), if config.enable_fallback { vec![Arc::clone(&local_provider)] } else { vec![] }),
        _ => (
            local_provider,
            if config.enable_fallback {
                cloud_provider.into_iter().collect()
            } else {
                vec![]
            },
        ),
    };

    SynthesisEngine::new(primary, fallbacks, config.cache_ttl_minutes, config.timeout_seconds)
}
