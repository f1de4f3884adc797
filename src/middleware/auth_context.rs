use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum_extra::TypedHeader;
use chrono::{DateTime, Utc};
use headers::{Authorization, authorization::Bearer};
use uuid::Uuid;

use crate::auth::hash_access_token;
use crate::error::ApiError;
use crate::models::{AppState, Principal, Role};

/// Headers the legacy frontend sends the raw token in, one per panel.
pub const LEGACY_TOKEN_HEADERS: [&str; 3] = ["token", "dtoken", "atoken"];

/// The verified principal behind a request. Identity always comes from
/// here, never from the request body.
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub principal_id: Uuid,
    pub role: Role,
    pub session_token_id: Uuid,
    pub expires_at: DateTime<Utc>,
}

impl AuthContext {
    pub fn principal(&self) -> Principal {
        Principal {
            id: self.principal_id,
            role: self.role,
        }
    }

    /// The single capability check every role-scoped route goes through.
    pub fn require(&self, role: Role) -> Result<(), ApiError> {
        if self.role == role {
            Ok(())
        } else {
            Err(ApiError::Forbidden(
                "FORBIDDEN",
                format!("Only {} accounts can use this endpoint", role.as_str()),
            ))
        }
    }
}

fn legacy_token(parts: &Parts) -> Option<String> {
    LEGACY_TOKEN_HEADERS
        .iter()
        .filter_map(|name| parts.headers.get(*name))
        .filter_map(|v| v.to_str().ok())
        .map(str::trim)
        .find(|v| !v.is_empty())
        .map(str::to_string)
}

impl FromRequestParts<AppState> for AuthContext {
    type Rejection = ApiError;

    fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> impl std::future::Future<Output = Result<Self, Self::Rejection>> + Send {
        async move {
            // Authorization: Bearer <token>, else one of the legacy headers
            let token = match TypedHeader::<Authorization<Bearer>>::from_request_parts(parts, state)
                .await
            {
                Ok(TypedHeader(authz)) => authz.token().to_string(),
                Err(_) => legacy_token(parts).ok_or_else(ApiError::invalid_credential)?,
            };

            let token_hash = hash_access_token(&token);

            let session = state
                .store
                .find_active_session(&token_hash)
                .await?
                .ok_or_else(ApiError::invalid_credential)?;

            Ok(AuthContext {
                principal_id: session.principal_id,
                role: session.role,
                session_token_id: session.session_token_id,
                expires_at: session.expires_at,
            })
        }
    }
}
