// src/routes/auth_routes.rs

use axum::{
    Json, Router,
    extract::State,
    routing::{get, post},
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::{
    auth::issue_session,
    error::ApiError,
    middleware::auth_context::AuthContext,
    models::{ApiOk, AppState, Empty, LoginRequest, Principal, Role, TokenData},
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/me", get(me))
        .route("/logout", post(logout))
}

#[derive(Debug, Serialize)]
pub struct MeData {
    pub principal: Principal,
    pub session: SessionInfo,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionInfo {
    pub session_token_id: Uuid,
    pub expires_at: DateTime<Utc>,
}

/// Trims the email and rejects empty fields. Shared by every login route.
pub(crate) fn login_fields(req: &LoginRequest) -> Result<(&str, &str), ApiError> {
    let email = req.email.trim();
    if email.is_empty() || req.password.is_empty() {
        return Err(ApiError::validation("Missing Details"));
    }
    Ok((email, req.password.as_str()))
}

/// Issues a session and wraps its token in the success envelope.
pub(crate) async fn token_response(
    state: &AppState,
    principal_id: Uuid,
    role: Role,
    message: Option<&str>,
) -> Result<Json<ApiOk<TokenData>>, ApiError> {
    let token = issue_session(state, principal_id, role).await?;
    let mut body = ApiOk::data(TokenData { token });
    body.message = message.map(str::to_string);
    Ok(Json(body))
}

pub async fn me(auth: AuthContext) -> Result<Json<ApiOk<MeData>>, ApiError> {
    Ok(Json(ApiOk::data(MeData {
        principal: auth.principal(),
        session: SessionInfo {
            session_token_id: auth.session_token_id,
            expires_at: auth.expires_at,
        },
    })))
}

pub async fn logout(
    State(state): State<AppState>,
    auth: AuthContext,
) -> Result<Json<ApiOk<Empty>>, ApiError> {
    if !state.store.revoke_session(auth.session_token_id).await? {
        return Err(ApiError::invalid_credential());
    }
    tracing::info!(session_token_id = %auth.session_token_id, "session revoked");
    Ok(Json(ApiOk::message("Logged out")))
}
