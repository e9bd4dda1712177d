// [libs/core/crypto/src/error.rs]
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CryptoError {
    #[error("[CRYPTO_HASH_FAULT]: password hashing failed -> {0}")]
    HashFailure(String),

    #[error("[CRYPTO_VERIFY_FAULT]: password verification failed -> {0}")]
    VerifyFailure(String),

    #[error("[CRYPTO_TOKEN_FAULT]: malformed token")]
    MalformedToken,

    #[error("[CRYPTO_TOKEN_FAULT]: signature mismatch")]
    InvalidSignature,

    #[error("[CRYPTO_TOKEN_FAULT]: token not yet valid")]
    NotYetValid,

    #[error("[CRYPTO_TOKEN_FAULT]: token expired")]
    Expired,
}
