use std::sync::LazyLock;

use argon2::{
    Argon2,
    PasswordHash,
    PasswordVerifier,
    PasswordHasher,
};
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::{Duration, Utc};
use rand::{RngCore, rngs::OsRng};
use regex::Regex;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use argon2::password_hash::{SaltString, rand_core::OsRng as PHOsRng};

use crate::error::ApiError;
use crate::models::{AppState, Role};
use crate::store::NewSession;

pub const MIN_PASSWORD_LEN: usize = 8;

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").expect("valid email regex")
});

/// Verify password using Argon2 hash stored in DB.
pub fn verify_password(password: &str, stored_hash: &str) -> bool {
    let parsed = match PasswordHash::new(stored_hash) {
        Ok(p) => p,
        Err(_) => return false,
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

/// Hash a new password using Argon2id with a random salt.
pub fn hash_password(password: &str) -> Result<String, String> {
    let salt = SaltString::generate(&mut PHOsRng);
    let argon2 = Argon2::default();

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|phc| phc.to_string())
        .map_err(|e| format!("argon2 hash error: {e}"))
}

/// Generate an opaque session token to return to the client.
/// Only hash(token) is stored.
pub fn generate_access_token() -> String {
    let mut bytes = [0u8; 32];
    OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Hash token for storage (SHA-256 hex).
pub fn hash_access_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    let out = hasher.finalize();
    hex::encode(out)
}

pub fn is_valid_email(email: &str) -> bool {
    email.len() <= 254 && EMAIL_RE.is_match(email)
}

pub fn validate_credentials(email: &str, password: &str) -> Result<(), ApiError> {
    if !is_valid_email(email) {
        return Err(ApiError::validation("Please enter a valid email"));
    }
    if password.len() < MIN_PASSWORD_LEN {
        return Err(ApiError::validation(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    Ok(())
}

/// Creates a session for `principal_id` and returns the raw token.
pub async fn issue_session(
    state: &AppState,
    principal_id: Uuid,
    role: Role,
) -> Result<String, ApiError> {
    let access_token = generate_access_token();
    let expires_at = Utc::now() + Duration::hours(state.session_ttl_hours);

    let session = state
        .store
        .create_session(NewSession {
            principal_id,
            role,
            token_hash: hash_access_token(&access_token),
            expires_at,
        })
        .await?;

    tracing::info!(
        session_token_id = %session.session_token_id,
        role = role.as_str(),
        "session issued"
    );
    Ok(access_token)
}
