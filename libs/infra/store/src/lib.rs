// [libs/infra/store/src/lib.rs]
/*!
 * =================================================================
 * APARATO: PERSISTENCE LAYER
 * CLASIFICACIÓN: INFRASTRUCTURE (L3)
 * RESPONSABILIDAD: IDENTIDADES, SESIONES, CADENA DE AUDITORÍA Y EJECUCIONES
 * =================================================================
 */

pub mod client;
pub mod errors;
pub mod repositories;
mod schema;

pub use client::StoreClient;
pub use errors::StoreError;
pub use repositories::{AuditRepository, ExecutionRepository, RollbackRepository, SessionRepository};
