// [libs/core/synthesis/src/error.rs]
use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum SynthesisError {
    #[error("[SYNTH_TRANSPORT_FAULT]: provider unreachable -> {0}")]
    Unavailable(String),

    #[error("[SYNTH_PARSE_FAULT]: provider response could not be parsed -> {0}")]
    MalformedResponse(String),

    #[error("[SYNTH_EXHAUSTED]: no provider (primary, fallback, or mock) produced a result")]
    NoProvider,

    #[error("[SYNTH_DEADLINE_FAULT]: request exceeded its synthesis deadline")]
    Timeout,

    #[error("[SYNTH_RATE_FAULT]: principal exceeded the synthesis rate limit")]
    RateLimited,
}
