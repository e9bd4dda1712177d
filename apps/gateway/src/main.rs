// [apps/gateway/src/main.rs]
/*!
 * =================================================================
 * APARATO: GATEWAY ENTRY POINT
 * CLASIFICACIÓN: APPLICATION SHELL (L3)
 * RESPONSABILIDAD: CARGA DE ENTORNO E IGNICIÓN DEL KERNEL
 * =================================================================
 */

use dotenvy::dotenv;
use meridian_domain::config::GatewayConfig;
use meridian_gateway::prelude::GatewayKernel;
use meridian_telemetry::init_tracing;
use tracing::info;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();
    init_tracing("meridian_gateway");

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_stack_size(4 * 1024 * 1024)
        .build()?;

    runtime.block_on(async {
        info!("gateway ignition sequence starting");

        let database_connection_url =
            std::env::var("DATABASE_URL").expect("FATAL: DATABASE_URL not set in runtime environment");
        let database_access_token = std::env::var("TURSO_AUTH_TOKEN").ok();

        let listening_port: u16 = std::env::var("PORT")
            .unwrap_or_else(|_| "8080".to_string())
            .parse()
            .unwrap_or(8080);

        let token_secret = std::env::var("TOKEN_SECRET")
            .expect("FATAL: TOKEN_SECRET not set in runtime environment")
            .into_bytes();
        let token_key_id = std::env::var("TOKEN_KEY_ID").unwrap_or_else(|_| "k1".to_string());

        let cluster_base_url = std::env::var("CLUSTER_API_URL").unwrap_or_else(|_| "http://localhost:9090".to_string());

        let config = GatewayConfig::from_env();

        let kernel = GatewayKernel::ignite(
            &database_connection_url,
            database_access_token,
            listening_port,
            config,
            token_secret,
            token_key_id,
            &cluster_base_url,
        )
        .await;

        info!(port = listening_port, "gateway kernel ignited, launching");
        kernel.launch().await;

        Ok(())
    })
}
