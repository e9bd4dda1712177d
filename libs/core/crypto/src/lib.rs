// [libs/core/crypto/src/lib.rs]
/*!
 * =================================================================
 * APARATO: CRYPTOGRAPHIC PRIMITIVES
 * CLASIFICACIÓN: CORE SECURITY (L1)
 * RESPONSABILIDAD: HASHING DE CONTRASEÑAS, TOKENS Y DIGESTS DE AUDITORÍA
 * =================================================================
 */

pub mod digest;
pub mod error;
pub mod password;
pub mod token;

pub use error::CryptoError;
