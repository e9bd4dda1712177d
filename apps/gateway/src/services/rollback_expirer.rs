// [apps/gateway/src/services/rollback_expirer.rs]
//! Marks rollback plans past their TTL as expired so a stale plan is never
//! offered to an operator for execution against a cluster that has since
//! moved on.

use crate::state::AppState;
use std::time::Duration;
use tokio::time::interval;
use tracing::{info, warn};

const SWEEP_INTERVAL_SECONDS: u64 = 600;

pub fn spawn_rollback_expirer(state: AppState) {
    tokio::spawn(async move {
        let mut ticker = interval(Duration::from_secs(SWEEP_INTERVAL_SECONDS));
        loop {
            ticker.tick().await;
            match state.rollbacks.expire_stale().await {
                Ok(expired) if expired > 0 => info!(expired, "expired stale rollback plans"),
                Ok(_) => {}
                Err(err) => warn!(error = %err, "rollback plan sweep failed"),
            }
        }
    });
}
