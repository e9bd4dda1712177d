// [libs/domain/models/src/lib.rs]
/*!
 * =================================================================
 * APARATO: DOMAIN MODEL ROOT
 * CLASIFICACIÓN: DOMAIN ENTITIES (L2)
 * RESPONSABILIDAD: DEFINICIÓN ÚNICA DE LAS ENTIDADES DEL CONTROL PLANE
 *
 * Every other crate in the workspace depends on this one and nothing
 * here depends back on them. Keep it that way.
 * =================================================================
 */

pub mod audit;
pub mod cache;
pub mod classification;
pub mod config;
pub mod error;
pub mod execution;
pub mod identity;
pub mod synthesis;

pub mod prelude {
    pub use crate::audit::AuditEntry;
    pub use crate::cache::CacheEntry;
    pub use crate::classification::{Classification, SafetyLevel};
    pub use crate::config::GatewayConfig;
    pub use crate::error::{ApiError, ErrorCode};
    pub use crate::execution::{Approval, Execution, ExecutionStatus, RollbackPlan, RollbackStep};
    pub use crate::identity::{Environment, Identity, Role, Session};
    pub use crate::synthesis::{SynthesisRequest, SynthesisResult};
}
