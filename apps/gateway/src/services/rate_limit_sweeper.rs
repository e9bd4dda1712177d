// [apps/gateway/src/services/rate_limit_sweeper.rs]
//! Drops rate-limit buckets that have sat idle, so the in-memory map
//! doesn't accumulate one entry per principal-that-ever-made-a-request for
//! the life of the process.

use crate::state::AppState;
use std::time::Duration;
use tokio::time::interval;
use tracing::debug;

const SWEEP_INTERVAL_SECONDS: u64 = 900;
const IDLE_THRESHOLD_SECONDS: u64 = 1800;

pub fn spawn_rate_limit_sweeper(state: AppState) {
    tokio::spawn(async move {
        let mut ticker = interval(Duration::from_secs(SWEEP_INTERVAL_SECONDS));
        loop {
            ticker.tick().await;
            state.rate_limiter.sweep_idle(Duration::from_secs(IDLE_THRESHOLD_SECONDS));
            debug!("swept idle rate-limit buckets");
        }
    });
}
