// [libs/core/synthesis/src/lib.rs]
/*!
 * =================================================================
 * APARATO: COMMAND SYNTHESIS ENGINE
 * CLASIFICACIÓN: CORE (L1)
 * RESPONSABILIDAD: TRADUCCIÓN DE LENGUAJE NATURAL A COMANDOS DE CLUSTER
 * =================================================================
 */

pub mod engine;
pub mod error;
pub mod mock;
pub mod parser;
pub mod prompt;
pub mod provider;
pub mod sanitize;

pub use engine::SynthesisEngine;
pub use error::SynthesisError;
pub use provider::{CloudProvider, LocalProvider, Provider};
