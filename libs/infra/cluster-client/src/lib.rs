// [libs/infra/cluster-client/src/lib.rs]
/*!
 * =================================================================
 * APARATO: CLUSTER CLIENT
 * CLASIFICACIÓN: INFRASTRUCTURE (L3)
 * RESPONSABILIDAD: INVOCACIÓN ACOTADA Y ESCOPADA DEL CLUSTER OBJETIVO
 * =================================================================
 */

pub mod classify;
pub mod client;
pub mod errors;
pub mod policy;
pub mod sanitize;

pub use classify::classify_failure;
pub use client::{ClusterCallFailure, ClusterClient, ClusterResponse};
pub use errors::ClientError;
pub use policy::{check_request, ClusterRequest, RbacPolicy, Verb};
