// [libs/core/crypto/src/digest.rs]
//! The audit-chain digest function: SHA-256 over every field of an entry
//! plus the previous entry's checksum, serialized lower-case hex. Kept in
//! one place so the appender and the verifier are structurally incapable
//! of drifting apart.

use meridian_domain::audit::DigestInput;
use sha2::{Digest, Sha256};

/// Stable decimal representation for the risk score: fixed to 4 decimal
/// places so float formatting never differs between append and verify.
fn format_risk_score(score: f32) -> String {
    format!("{:.4}", score)
}

pub fn compute_digest(input: &DigestInput<'_>) -> String {
    let mut hasher = Sha256::new();
    for field in [
        input.actor_id,
        input.session_id,
        input.query,
        input.command,
        input.classification,
        input.status,
        input.cluster_context,
        input.namespace_context,
        input.timestamp,
        input.address,
        input.agent,
        input.previous_checksum,
    ] {
        hasher.update(field.as_bytes());
    }
    hasher.update(format_risk_score(input.risk_score).as_bytes());
    hasher.update(input.category.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Non-cryptographic fingerprint used for cache keys (synthesis and
/// classification caches alike). Also SHA-256, just over a different,
/// public set of fields — no previous-checksum chaining involved.
pub fn fingerprint(parts: &[&str]) -> String {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part.as_bytes());
        hasher.update([0u8]); // field separator, avoids "ab"+"c" == "a"+"bc" collisions
    }
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digest_is_deterministic() {
        let input = DigestInput {
            actor_id: "a",
            session_id: "s",
            query: "q",
            command: "c",
            classification: "safe",
            status: "completed",
            cluster_context: "prod",
            namespace_context: "default",
            timestamp: "t",
            address: "127.0.0.1",
            agent: "curl",
            previous_checksum: "",
            risk_score: 0.0,
            category: "read",
        };
        assert_eq!(compute_digest(&input), compute_digest(&input));
    }

    #[test]
    fn fingerprint_respects_field_boundaries() {
        let a = fingerprint(&["ab", "c"]);
        let b = fingerprint(&["a", "bc"]);
        assert_ne!(a, b);
    }
}
