//! Structured tracing bootstrap.
//!
//! One call per binary, at the top of `main`, before anything else touches
//! the network or the datastore. Level is controlled by `RUST_LOG`; falls
//! back to `info` for the local crates and `warn` for dependencies so a
//! bare `cargo run` doesn't drown in library chatter.

use tracing_subscriber::{fmt, EnvFilter};

/// Initializes the global tracing subscriber for `service_name`.
///
/// Emits newline-delimited JSON when `MERIDIAN_LOG_FORMAT=json` is set
/// (production / container deployments); otherwise emits the human-readable
/// compact format (local development).
pub fn init_tracing(service_name: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("info,{service_name}=debug")));

    let json_format = std::env::var("MERIDIAN_LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let subscriber = fmt().with_env_filter(filter).with_target(true);

    if json_format {
        let _ = subscriber.json().try_init();
    } else {
        let _ = subscriber.try_init();
    }
}
