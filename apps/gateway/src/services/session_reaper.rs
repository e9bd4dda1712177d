// [apps/gateway/src/services/session_reaper.rs]
//! Periodically deletes expired and revoked sessions so the table doesn't
//! grow unbounded across the lifetime of a long-running deployment.

use crate::state::AppState;
use std::time::Duration;
use tokio::time::interval;
use tracing::{info, warn};

const SWEEP_INTERVAL_SECONDS: u64 = 300;

pub fn spawn_session_reaper(state: AppState) {
    tokio::spawn(async move {
        let mut ticker = interval(Duration::from_secs(SWEEP_INTERVAL_SECONDS));
        loop {
            ticker.tick().await;
            match state.sessions.cleanup_expired().await {
                Ok(reaped) if reaped > 0 => info!(reaped, "swept expired sessions"),
                Ok(_) => {}
                Err(err) => warn!(error = %err, "session sweep failed"),
            }
        }
    });
}
