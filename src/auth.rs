//! Login, session tokens, and role checks.
//!
//! Tokens are random, 64 hex characters, and stored only as SHA-256 hashes;
//! a leaked database never yields a usable bearer token. Passwords are
//! stored hashed the same way. Sessions last seven days; expired rows are
//! swept opportunistically on every validation.

use chrono::Utc;
use sha2::{Digest, Sha256};
use tracing::info;
use uuid::Uuid;

use crate::db::DbHandle;
use crate::errors::AuthError;
use crate::models::{Role, User};

const SESSION_DAYS: i64 = 7;

pub fn sha256_hex(input: &str) -> String {
    Sha256::digest(input.as_bytes())
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect()
}

fn generate_token() -> String {
    format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple())
}

/// Check credentials and open a session. Returns the bearer token (the
/// only time it exists in plain form) and the user it belongs to.
pub async fn login(
    db: &DbHandle,
    phone_number: &str,
    password: &str,
) -> Result<(String, User), AuthError> {
    let password_hash = sha256_hex(password);
    let phone = phone_number.to_string();
    let user = db
        .call(move |db| db.verify_login(&phone, &password_hash))
        .await
        .map_err(AuthError::Database)?
        .ok_or(AuthError::InvalidCredentials)?;

    let token = generate_token();
    let token_hash = sha256_hex(&token);
    let expires_at = (Utc::now() + chrono::Duration::days(SESSION_DAYS))
        .format("%Y-%m-%d %H:%M:%S")
        .to_string();
    let user_id = user.id;
    db.call(move |db| db.create_session(user_id, &token_hash, &expires_at))
        .await
        .map_err(AuthError::Database)?;

    info!(user = user_id, "User logged in");
    Ok((token, user))
}

/// Resolve a bearer token to its user, sweeping expired sessions on the way.
pub async fn validate_token(db: &DbHandle, token: &str) -> Result<User, AuthError> {
    let token_hash = sha256_hex(token);
    db.call(move |db| {
        db.purge_expired_sessions()?;
        db.session_user(&token_hash)
    })
    .await
    .map_err(AuthError::Database)?
    .ok_or(AuthError::SessionInvalid)
}

/// Drop the session behind a token. Logging out twice is fine.
pub async fn logout(db: &DbHandle, token: &str) -> Result<(), AuthError> {
    let token_hash = sha256_hex(token);
    db.call(move |db| db.delete_session(&token_hash))
        .await
        .map_err(AuthError::Database)?;
    Ok(())
}

/// Gate an operation on the caller's role.
pub fn require_role(user: &User, allowed: &[Role]) -> Result<(), AuthError> {
    if allowed.contains(&user.role) {
        Ok(())
    } else {
        Err(AuthError::Forbidden {
            role: user.role.to_string(),
        })
    }
}
