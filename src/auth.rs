//! Password hashing and bearer tokens.
//!
//! Passwords are stored as Argon2id PHC strings (`$argon2id$v=19$...`), which carry their
//! own salt and parameters. Tokens are HS256 JWTs carrying the user id and role.

use argon2::password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::AuthConfig;
use crate::error::{AppError, AppResult};
use crate::types::{Role, User};

pub fn hash_password(password: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("password hashing failed: {}", e))?;
    Ok(hash.to_string())
}

/// Checks `password` against a stored PHC string. Unparseable hashes never match.
pub fn verify_password(password: &str, stored: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(stored) else {
        return false;
    };
    Argon2::default().verify_password(password.as_bytes(), &parsed).is_ok()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub role: Role,
    pub exp: usize,
}

pub fn issue_token(cfg: &AuthConfig, user: &User) -> AppResult<String> {
    let ttl = i64::try_from(cfg.token_ttl_secs)
        .ok()
        .and_then(Duration::try_seconds)
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("auth.token_ttl_secs out of range")))?;
    let expires = Utc::now()
        .checked_add_signed(ttl)
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("token expiry out of range")))?;
    let claims = Claims { sub: user.id, role: user.role, exp: expires.timestamp() as usize };
    encode(&Header::default(), &claims, &EncodingKey::from_secret(cfg.jwt_secret.as_bytes()))
        .map_err(|e| AppError::Internal(anyhow::anyhow!("token encoding failed: {}", e)))
}

pub fn verify_token(cfg: &AuthConfig, token: &str) -> AppResult<Claims> {
    decode::<Claims>(token, &DecodingKey::from_secret(cfg.jwt_secret.as_bytes()), &Validation::default())
        .map(|data| data.claims)
        .map_err(|e| {
            tracing::debug!("rejected bearer token: {}", e);
            AppError::Unauthorized("Invalid or expired token".to_string())
        })
}
