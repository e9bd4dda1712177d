// [apps/gateway/src/services/provider_health_poller.rs]
use crate::state::AppState;
use std::time::Duration;
use tokio::time::interval;
use tracing::debug;

const POLL_INTERVAL_SECONDS: u64 = 30;

/// Probes the synthesis provider chain on a fixed interval and publishes
/// the result into `AppState::provider_health`, so `GET /nlp/health` never
/// performs network I/O on the request path.
pub fn spawn_provider_health_poller(state: AppState) {
    tokio::spawn(async move {
        let mut ticker = interval(Duration::from_secs(POLL_INTERVAL_SECONDS));
        loop {
            ticker.tick().await;
            let snapshot = state.synthesis.health_snapshot().await;
            debug!(providers = snapshot.len(), "provider health snapshot refreshed");
            *state.provider_health.write().expect("provider health lock poisoned") = snapshot;
        }
    });
}
