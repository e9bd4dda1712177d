// [libs/core/crypto/src/password.rs]
//! Memory-hard password hashing with a per-principal salt; hash comparison
//! is constant-time.

use crate::error::CryptoError;
use argon2::password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;

/// Hashes `plaintext` with a freshly generated salt. The returned string is
/// the full PHC-format hash (algorithm + params + salt + digest) and is
/// what gets persisted — no separate salt column is needed.
pub fn hash_password(plaintext: &str) -> Result<String, CryptoError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(plaintext.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| CryptoError::HashFailure(e.to_string()))
}

/// Constant-time verification against a stored PHC hash string.
pub fn verify_password(plaintext: &str, stored_hash: &str) -> Result<bool, CryptoError> {
    let parsed = PasswordHash::new(stored_hash)
        .map_err(|e| CryptoError::VerifyFailure(e.to_string()))?;
    Ok(Argon2::default()
        .verify_password(plaintext.as_bytes(), &parsed)
        .is_ok())
}

/// A password is rejected (`WeakCredential`) below this length or if it
/// fails the minimal character-class mix.
pub fn meets_password_policy(plaintext: &str) -> bool {
    if plaintext.chars().count() < 10 {
        return false;
    }
    let has_letter = plaintext.chars().any(|c| c.is_alphabetic());
    let has_digit_or_symbol = plaintext.chars().any(|c| !c.is_alphabetic());
    has_letter && has_digit_or_symbol
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_and_rejects_wrong_password() {
        let hash = hash_password("correct-horse-battery-staple-9").unwrap();
        assert!(verify_password("correct-horse-battery-staple-9", &hash).unwrap());
        assert!(!verify_password("wrong-password-entirely-1", &hash).unwrap());
    }

    #[test]
    fn policy_rejects_short_and_single_class() {
        assert!(!meets_password_policy("short1"));
        assert!(!meets_password_policy("alletterslong"));
        assert!(meets_password_policy("correct-horse-9"));
    }
}
