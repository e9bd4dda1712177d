// [libs/infra/cluster-client/src/errors.rs]
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("[CLUSTER_AUTH_FAULT]: {0}")]
    Unauthorized(String),

    #[error("[CLUSTER_POLICY_FAULT]: {0}")]
    Forbidden(String),

    #[error("[CLUSTER_TRANSPORT_FAULT]: {0}")]
    Transport(String),

    #[error("[CLUSTER_DEADLINE_FAULT]: call exceeded its deadline")]
    Deadline,
}
