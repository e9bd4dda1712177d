// [libs/domain/models/src/identity.rs]
//! Identity, Session and the principal-facing enums (role, environment).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use uuid::Uuid;

/// Role a principal acts under for the duration of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Operator,
    Developer,
    Viewer,
}

impl Role {
    /// Admins bypass the permission set entirely; every other role is
    /// checked against `Identity::permissions`.
    pub fn is_admin(self) -> bool {
        matches!(self, Role::Admin)
    }
}

/// Target environment a command would run against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Dev,
    Staging,
    Production,
}

/// An authenticated principal, reconstructed from a `Session` on every
/// request and discarded when the request completes. Never persisted as
/// such — only `Session` rows live in the datastore.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Identity {
    pub id: Uuid,
    pub display_name: String,
    pub role: Role,
    pub permissions: HashSet<String>,
    pub environment: Environment,
}

impl Identity {
    /// Pure permission check: admins can do anything; everyone else needs
    /// the verb-derived permission string in their set.
    pub fn has_permission(&self, permission: &str) -> bool {
        self.role.is_admin() || self.permissions.contains(permission)
    }
}

/// Server-trusted continuation of a prior login. The opaque `token` is never
/// round-tripped back out of the datastore layer in cleartext logs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub role: Role,
    pub environment: Environment,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub last_seen_address: Option<String>,
    pub agent: Option<String>,
    pub revoked: bool,
}

impl Session {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

/// Claims embedded in a signed session token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Subject: owning principal id.
    pub sub: Uuid,
    /// Session id.
    pub sid: Uuid,
    pub role: Role,
    /// Issued-at, unix seconds.
    pub iat: i64,
    /// Not-before, unix seconds.
    pub nbf: i64,
    /// Expiry, unix seconds.
    pub exp: i64,
    pub iss: String,
}
