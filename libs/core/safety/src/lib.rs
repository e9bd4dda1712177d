// [libs/core/safety/src/lib.rs]
/*!
 * =================================================================
 * APARATO: SAFETY CLASSIFICATION & POLICY ENGINE
 * CLASIFICACIÓN: CORE (L1)
 * RESPONSABILIDAD: VEREDICTO DE SEGURIDAD Y ESCALACIÓN CONTEXTUAL
 * =================================================================
 */

pub mod engine;
pub mod lexical;

pub use engine::SafetyEngine;
