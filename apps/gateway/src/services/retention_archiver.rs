// [apps/gateway/src/services/retention_archiver.rs]
//! Seals off audit entries past the configured retention window into an
//! archive batch, so `verify` has a fixed terminator to anchor against
//! instead of walking an ever-growing live table from the beginning.

use crate::state::AppState;
use chrono::{Duration as ChronoDuration, Utc};
use std::time::Duration;
use tokio::time::interval;
use tracing::{info, warn};

const SWEEP_INTERVAL_SECONDS: u64 = 3600;

pub fn spawn_retention_archiver(state: AppState) {
    tokio::spawn(async move {
        let mut ticker = interval(Duration::from_secs(SWEEP_INTERVAL_SECONDS));
        loop {
            ticker.tick().await;
            let cutoff = Utc::now() - ChronoDuration::days(state.config.retention_days);

            match state.audit.latest_id_before(cutoff).await {
                Ok(Some(through_id)) => match state.audit.archive_through(through_id).await {
                    Ok(batch) => info!(through_id = batch.archived_through_id, "audit retention archive batch recorded"),
                    Err(err) => warn!(error = %err, "audit retention archive failed"),
                },
                Ok(None) => {}
                Err(err) => warn!(error = %err, "audit retention cutoff lookup failed"),
            }
        }
    });
}
