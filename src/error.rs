use axum::{
    Json,
    extract::rejection::{JsonRejection, PathRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

use crate::store::StoreError;

/// Failure envelope: `{ success: false, code, message }`.
///
/// The frontend reads `success` from the body and shows `message`
/// verbatim, so every failure is sent with HTTP 200.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub code: String,
    pub message: String,
}

/// Sent instead of the detail of an `Upstream` failure, which is only logged.
pub const UPSTREAM_MESSAGE: &str = "Service unavailable";

#[derive(Debug)]
pub enum ApiError {
    Unauthorized(&'static str, String),
    Forbidden(&'static str, String),
    BadRequest(&'static str, String),
    NotFound(&'static str, String),
    Conflict(&'static str, String),
    Upstream(String),
}

impl ApiError {
    pub fn invalid_credential() -> Self {
        ApiError::Unauthorized("INVALID_CREDENTIAL", "Not Authorized Login Again".into())
    }

    pub fn not_owner() -> Self {
        ApiError::Unauthorized("UNAUTHORIZED", "Unauthorized action".into())
    }

    pub fn validation(message: impl Into<String>) -> Self {
        ApiError::BadRequest("VALIDATION_ERROR", message.into())
    }

    pub fn doctor_not_found() -> Self {
        ApiError::NotFound("NOT_FOUND", "Doctor not found".into())
    }

    pub fn appointment_not_found() -> Self {
        ApiError::NotFound("NOT_FOUND", "Appointment not found".into())
    }

    pub fn doctor_unavailable() -> Self {
        ApiError::Conflict("DOCTOR_UNAVAILABLE", "Doctor not available".into())
    }

    pub fn slot_taken() -> Self {
        ApiError::Conflict("SLOT_TAKEN", "Slot not available".into())
    }

    pub fn code(&self) -> &str {
        match self {
            ApiError::Unauthorized(code, _)
            | ApiError::Forbidden(code, _)
            | ApiError::BadRequest(code, _)
            | ApiError::NotFound(code, _)
            | ApiError::Conflict(code, _) => code,
            ApiError::Upstream(_) => "UPSTREAM_FAILURE",
        }
    }

    /// What the client sees. Upstream detail stays in the logs.
    pub fn public_message(&self) -> &str {
        match self {
            ApiError::Upstream(_) => UPSTREAM_MESSAGE,
            other => other.message(),
        }
    }

    pub fn message(&self) -> &str {
        match self {
            ApiError::Unauthorized(_, msg)
            | ApiError::Forbidden(_, msg)
            | ApiError::BadRequest(_, msg)
            | ApiError::NotFound(_, msg)
            | ApiError::Conflict(_, msg)
            | ApiError::Upstream(msg) => msg,
        }
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code(), self.message())
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::DoctorNotFound => ApiError::doctor_not_found(),
            StoreError::DoctorUnavailable => ApiError::doctor_unavailable(),
            StoreError::SlotTaken => ApiError::slot_taken(),
            StoreError::EmailTaken => {
                ApiError::Conflict("EMAIL_TAKEN", "Email already registered".into())
            }
            other => ApiError::Upstream(other.to_string()),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::validation(format!("Invalid request body: {}", rejection.body_text()))
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError::validation(format!("Invalid path parameter: {}", rejection.body_text()))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match &self {
            ApiError::Upstream(msg) => tracing::error!(error = %msg, "upstream failure"),
            other => tracing::warn!(code = other.code(), message = other.message(), "request rejected"),
        }

        let body = Json(ErrorResponse {
            success: false,
            code: self.code().to_string(),
            message: self.public_message().to_string(),
        });
        (StatusCode::OK, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn body_of(err: ApiError) -> serde_json::Value {
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_database_detail_not_sent_to_client() {
        let err = ApiError::from(StoreError::Database(sqlx::Error::PoolTimedOut));
        assert_eq!(err.code(), "UPSTREAM_FAILURE");
        assert!(err.message().contains("pool timed out"));

        let body = body_of(err).await;
        assert_eq!(body["success"], false);
        assert_eq!(body["code"], "UPSTREAM_FAILURE");
        assert_eq!(body["message"], UPSTREAM_MESSAGE);

        let body = body_of(StoreError::Decode("unknown role 7".into()).into()).await;
        assert_eq!(body["message"], UPSTREAM_MESSAGE);
    }

    #[tokio::test]
    async fn test_client_errors_keep_their_message() {
        let body = body_of(ApiError::slot_taken()).await;
        assert_eq!(body["code"], "SLOT_TAKEN");
        assert_eq!(body["message"], "Slot not available");
    }
}
