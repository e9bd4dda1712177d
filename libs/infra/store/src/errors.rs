// [libs/infra/store/src/errors.rs]
//! Error catalog for every repository in this crate. Bracketed tags give
//! log lines a stable grep target independent of the English message text.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("[STORE_NET_FAULT]: database uplink unavailable -> {0}")]
    Connection(String),

    #[error("[STORE_CONFIG_FAULT]: datastore misconfigured -> {0}")]
    Configuration(String),

    #[error("[STORE_QUERY_FAULT]: {0}")]
    Query(#[from] libsql::Error),

    #[error("[STORE_MAPPING_FAULT]: row could not be mapped to a domain type -> {0}")]
    Mapping(String),

    #[error("[STORE_NOT_FOUND]: {0}")]
    NotFound(String),

    #[error("[STORE_CONFLICT]: {0}")]
    Conflict(String),

    #[error("[STORE_INTEGRITY_FAULT]: audit chain integrity violated at entry {0}")]
    ChainIntegrity(u64),

    #[error("[STORE_LOCKOUT]: account is in cooldown until {0}")]
    AccountLockedOut(String),

    #[error("[STORE_AUTH_FAULT]: invalid credentials")]
    InvalidCredentials,
}
