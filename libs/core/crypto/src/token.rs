// [libs/core/crypto/src/token.rs]
//! HMAC-SHA256 signed session tokens.
//!
//! Layout mirrors a JWT: `base64url(header).base64url(claims).base64url(sig)`,
//! but we don't pull in a JWT crate — the claim set is small and fixed, and
//! hand-rolling it keeps the signature verification path in full view
//! instead of behind a generic library.

use crate::error::CryptoError;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD as B64, Engine};
use hmac::{Hmac, Mac};
use meridian_domain::identity::TokenClaims;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct TokenHeader {
    alg: &'static str,
    /// Identifier of the signing key, so keys can be rotated without
    /// invalidating tokens signed under a previous generation.
    kid: String,
}

/// Signs `claims` under `secret`, tagging the header with `key_id`.
pub fn issue_token(claims: &TokenClaims, secret: &[u8], key_id: &str) -> Result<String, CryptoError> {
    let header = TokenHeader {
        alg: "HS256",
        kid: key_id.to_string(),
    };
    let header_b64 = B64.encode(serde_json::to_vec(&header).map_err(|_| CryptoError::MalformedToken)?);
    let claims_b64 = B64.encode(serde_json::to_vec(claims).map_err(|_| CryptoError::MalformedToken)?);
    let signing_input = format!("{header_b64}.{claims_b64}");
    let signature = sign(&signing_input, secret);
    Ok(format!("{signing_input}.{signature}"))
}

/// Verifies signature, `nbf <= now <= exp`, and returns the decoded claims.
/// Does not consult the datastore — checking that the token's `sid` matches
/// the retrieved session's id is the caller's job once it has looked the
/// session up.
pub fn validate_token(token: &str, secret: &[u8], now_unix: i64) -> Result<TokenClaims, CryptoError> {
    let parts: Vec<&str> = token.split('.').collect();
    let [header_b64, claims_b64, signature_b64] = parts[..] else {
        return Err(CryptoError::MalformedToken);
    };

    let signing_input = format!("{header_b64}.{claims_b64}");
    let expected_signature = sign(&signing_input, secret);

    if !bool::from(
        expected_signature
            .as_bytes()
            .ct_eq(signature_b64.as_bytes()),
    ) {
        return Err(CryptoError::InvalidSignature);
    }

    let claims_bytes = B64
        .decode(claims_b64)
        .map_err(|_| CryptoError::MalformedToken)?;
    let claims: TokenClaims =
        serde_json::from_slice(&claims_bytes).map_err(|_| CryptoError::MalformedToken)?;

    if now_unix < claims.nbf {
        return Err(CryptoError::NotYetValid);
    }
    if now_unix > claims.exp {
        return Err(CryptoError::Expired);
    }

    Ok(claims)
}

fn sign(signing_input: &str, secret: &[u8]) -> String {
    let mut mac = HmacSha256::new_from_slice(secret).expect("HMAC accepts keys of any length");
    mac.update(signing_input.as_bytes());
    B64.encode(mac.finalize().into_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use meridian_domain::identity::Role;
    use uuid::Uuid;

    fn sample_claims(iat: i64, nbf: i64, exp: i64) -> TokenClaims {
        TokenClaims {
            sub: Uuid::new_v4(),
            sid: Uuid::new_v4(),
            role: Role::Operator,
            iat,
            nbf,
            exp,
            iss: "meridian-auth".to_string(),
        }
    }

    #[test]
    fn round_trip_succeeds_within_window() {
        let secret = b"test-secret-key";
        let claims = sample_claims(1000, 1000, 2000);
        let token = issue_token(&claims, secret, "k1").unwrap();
        let decoded = validate_token(&token, secret, 1500).unwrap();
        assert_eq!(decoded.sub, claims.sub);
    }

    #[test]
    fn rejects_expired_and_not_yet_valid() {
        let secret = b"test-secret-key";
        let claims = sample_claims(1000, 1000, 2000);
        let token = issue_token(&claims, secret, "k1").unwrap();
        assert!(matches!(
            validate_token(&token, secret, 2001),
            Err(CryptoError::Expired)
        ));
        assert!(matches!(
            validate_token(&token, secret, 999),
            Err(CryptoError::NotYetValid)
        ));
    }

    #[test]
    fn rejects_tampered_signature() {
        let secret = b"test-secret-key";
        let claims = sample_claims(1000, 1000, 2000);
        let mut token = issue_token(&claims, secret, "k1").unwrap();
        token.push('x');
        assert!(matches!(
            validate_token(&token, secret, 1500),
            Err(CryptoError::InvalidSignature)
        ));
    }

    #[test]
    fn rejects_wrong_key() {
        let claims = sample_claims(1000, 1000, 2000);
        let token = issue_token(&claims, b"secret-a", "k1").unwrap();
        assert!(matches!(
            validate_token(&token, b"secret-b", 1500),
            Err(CryptoError::InvalidSignature)
        ));
    }
}
