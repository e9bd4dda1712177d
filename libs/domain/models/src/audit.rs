// [libs/domain/models/src/audit.rs]
//! Tamper-evident audit entry. Digest computation itself lives in
//! `meridian_crypto` — this module only carries the data shape, since
//! the chain is a datastore concern and the hash is a crypto concern.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    /// Monotonically increasing row id; assigned by the store on insert.
    pub id: u64,
    pub timestamp: DateTime<Utc>,
    pub actor_id: Uuid,
    pub session_id: Uuid,
    pub query: String,
    pub command: String,
    pub classification: String,
    pub status: String,
    pub cluster_context: String,
    pub namespace_context: String,
    pub risk_score: f32,
    pub checksum: String,
    pub previous_checksum: String,
    pub correlation_id: Uuid,
    pub address: String,
    pub agent: String,
    pub category: String,
}

/// The subset of `AuditEntry` fields that feed the digest, extracted so the
/// appender and the verifier compute it from the exact same inputs.
pub struct DigestInput<'a> {
    pub actor_id: &'a str,
    pub session_id: &'a str,
    pub query: &'a str,
    pub command: &'a str,
    pub classification: &'a str,
    pub status: &'a str,
    pub cluster_context: &'a str,
    pub namespace_context: &'a str,
    pub timestamp: &'a str,
    pub address: &'a str,
    pub agent: &'a str,
    pub previous_checksum: &'a str,
    pub risk_score: f32,
    pub category: &'a str,
}

impl AuditEntry {
    /// `actor_id`, `session_id` and `timestamp` on `AuditEntry` are typed
    /// (`Uuid` / `DateTime`), not `String`, so they can't be borrowed as
    /// `&str` directly. The caller formats them into locals that outlive
    /// this call and passes the borrows in, guaranteeing the appender and
    /// the verifier hash the exact same serialized representation rather
    /// than two independently-formatted strings that could drift.
    pub fn digest_input<'a>(
        &'a self,
        timestamp_str: &'a str,
        actor_id_str: &'a str,
        session_id_str: &'a str,
    ) -> DigestInput<'a> {
        DigestInput {
            actor_id: actor_id_str,
            session_id: session_id_str,
            query: &self.query,
            command: &self.command,
            classification: &self.classification,
            status: &self.status,
            cluster_context: &self.cluster_context,
            namespace_context: &self.namespace_context,
            timestamp: timestamp_str,
            address: &self.address,
            agent: &self.agent,
            previous_checksum: &self.previous_checksum,
            risk_score: self.risk_score,
            category: &self.category,
        }
    }
}

/// Mismatch kind reported when a chain verification pass fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IntegrityMismatchKind {
    Checksum,
    Chain,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntegrityViolation {
    pub entry_id: u64,
    pub kind: IntegrityMismatchKind,
}

/// Metadata recorded alongside an archive batch so verification can resume
/// cleanly from the live table's first surviving entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchiveBatch {
    pub id: Uuid,
    pub archived_through_id: u64,
    pub terminator_checksum: String,
    pub archived_at: DateTime<Utc>,
}
