//! Token service: HS256 JWTs carrying the user id, signed with a random
//! key persisted in the data directory.

use std::path::Path;

use chrono::Utc;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use rand::Rng;

use crate::auth::middleware::Claims;

/// Load or generate the JWT signing key (256-bit random secret).
/// Key is stored as raw bytes in data_dir/jwt_secret.
/// The key MUST be cryptographically random, never human-readable.
pub fn load_or_generate_jwt_secret(data_dir: &str) -> Result<Vec<u8>, Box<dyn std::error::Error>> {
    let key_path = Path::new(data_dir).join("jwt_secret");

    if key_path.exists() {
        let key = std::fs::read(&key_path)?;
        if key.len() == 32 {
            tracing::info!("JWT signing key loaded from {}", key_path.display());
            return Ok(key);
        }
        // Invalid key file — regenerate
        tracing::warn!("JWT key file has wrong size ({}), regenerating", key.len());
    }

    let key: [u8; 32] = rand::rng().random();
    std::fs::write(&key_path, key)?;
    tracing::info!("JWT signing key generated at {}", key_path.display());
    Ok(key.to_vec())
}

/// Issue an access token for a user. Claims: user_id, iat, exp.
pub fn issue_token(
    secret: &[u8],
    user_id: i64,
    ttl_secs: i64,
) -> Result<String, jsonwebtoken::errors::Error> {
    let now = Utc::now().timestamp();
    let claims = Claims {
        user_id,
        iat: now,
        exp: now + ttl_secs,
    };

    encode(
        &Header::default(), // HS256
        &claims,
        &EncodingKey::from_secret(secret),
    )
}

/// Verify a token and return the user id it was issued for.
/// Fails on bad signature, expiry, or malformed claims.
pub fn verify_token(secret: &[u8], token: &str) -> Result<i64, jsonwebtoken::errors::Error> {
    let validation = Validation::new(jsonwebtoken::Algorithm::HS256);
    let token_data = decode::<Claims>(token, &DecodingKey::from_secret(secret), &validation)?;
    Ok(token_data.claims.user_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issue_and_verify_roundtrip() {
        let secret = [7u8; 32];
        let token = issue_token(&secret, 42, 3600).unwrap();
        assert_eq!(verify_token(&secret, &token).unwrap(), 42);
    }

    #[test]
    fn wrong_secret_rejected() {
        let token = issue_token(&[7u8; 32], 42, 3600).unwrap();
        assert!(verify_token(&[8u8; 32], &token).is_err());
    }

    #[test]
    fn expired_token_rejected() {
        let secret = [7u8; 32];
        // exp in the past (beyond the default leeway)
        let token = issue_token(&secret, 42, -600).unwrap();
        assert!(verify_token(&secret, &token).is_err());
    }
}
