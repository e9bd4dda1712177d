// [apps/gateway/src/services/mod.rs]
//! Background maintenance daemons. Each one owns a single sweep loop over
//! a fixed interval; none of them are on the request path.

pub mod provider_health_poller;
pub mod rate_limit_sweeper;
pub mod retention_archiver;
pub mod rollback_expirer;
pub mod session_reaper;

pub use provider_health_poller::spawn_provider_health_poller;
pub use rate_limit_sweeper::spawn_rate_limit_sweeper;
pub use retention_archiver::spawn_retention_archiver;
pub use rollback_expirer::spawn_rollback_expirer;
pub use session_reaper::spawn_session_reaper;
