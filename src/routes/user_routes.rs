// src/routes/user_routes.rs

use axum::{
    Extension, Json, Router,
    extract::State,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    auth::{hash_password, validate_credentials, verify_password},
    booking,
    error::ApiError,
    extract::ApiJson,
    middleware::auth_context::AuthContext,
    models::{Address, ApiOk, AppState, Empty, LoginRequest, Patient, Role, TokenData},
    routes::{appointment_routes, auth_routes},
    store::{NewPatient, PatientUpdate},
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/get-profile", get(get_profile))
        .route("/update-profile", post(update_profile))
        .route("/book-appointment", post(book_appointment))
        .route("/appointments", get(appointment_routes::list_appointments))
        .route("/cancel-appointment", post(appointment_routes::cancel_appointment))
        .layer(Extension(Role::Patient))
}

/* =========================
   DTOs
   ========================= */

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateProfileRequest {
    pub name: String,
    pub phone: String,
    pub dob: String,
    pub gender: String,
    pub address: Option<Address>,
    pub image: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookAppointmentRequest {
    pub doc_id: Uuid,
    pub slot_date: String,
    pub slot_time: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserData {
    pub user_data: Patient,
}

/* =========================
   Validation helpers
   ========================= */

fn validate_name(name: &str) -> Result<(), ApiError> {
    if name.trim().is_empty() {
        return Err(ApiError::validation("Missing Details"));
    }
    Ok(())
}

fn validate_profile(req: &UpdateProfileRequest) -> Result<(), ApiError> {
    let required = [&req.name, &req.phone, &req.dob, &req.gender];
    if required.iter().any(|v| v.trim().is_empty()) {
        return Err(ApiError::validation("Data Missing"));
    }
    if let Some(image) = &req.image {
        validate_image_url(image)?;
    }
    Ok(())
}

pub(crate) fn validate_image_url(image: &str) -> Result<(), ApiError> {
    let image = image.trim();
    if !(image.starts_with("https://") || image.starts_with("http://")) {
        return Err(ApiError::validation("image must be an http(s) URL"));
    }
    Ok(())
}

/* =========================
   Handlers
   ========================= */

pub async fn register(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<RegisterRequest>,
) -> Result<Json<ApiOk<TokenData>>, ApiError> {
    validate_name(&req.name)?;
    let email = req.email.trim();
    validate_credentials(email, &req.password)?;

    let password_hash = hash_password(&req.password).map_err(ApiError::Upstream)?;
    let patient = state
        .store
        .create_patient(NewPatient {
            name: req.name.trim().to_string(),
            email: email.to_string(),
            password_hash,
        })
        .await?;

    tracing::info!(patient_id = %patient.id, "patient registered");
    auth_routes::token_response(&state, patient.id, Role::Patient, None).await
}

pub async fn login(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<LoginRequest>,
) -> Result<Json<ApiOk<TokenData>>, ApiError> {
    let (email, password) = auth_routes::login_fields(&req)?;

    let patient = state
        .store
        .find_patient_by_email(email)
        .await?
        .ok_or_else(|| ApiError::Unauthorized("INVALID_CREDENTIAL", "User does not exist".into()))?;

    if !verify_password(password, &patient.password_hash) {
        return Err(ApiError::Unauthorized(
            "INVALID_CREDENTIAL",
            "Invalid credentials".into(),
        ));
    }

    auth_routes::token_response(&state, patient.id, Role::Patient, None).await
}

pub async fn get_profile(
    State(state): State<AppState>,
    auth: AuthContext,
) -> Result<Json<ApiOk<UserData>>, ApiError> {
    auth.require(Role::Patient)?;

    let patient = state
        .store
        .find_patient(auth.principal_id)
        .await?
        .ok_or_else(ApiError::invalid_credential)?;

    Ok(Json(ApiOk::data(UserData { user_data: patient })))
}

pub async fn update_profile(
    State(state): State<AppState>,
    auth: AuthContext,
    ApiJson(req): ApiJson<UpdateProfileRequest>,
) -> Result<Json<ApiOk<Empty>>, ApiError> {
    auth.require(Role::Patient)?;
    validate_profile(&req)?;

    state
        .store
        .update_patient(
            auth.principal_id,
            PatientUpdate {
                name: req.name.trim().to_string(),
                phone: req.phone.trim().to_string(),
                dob: req.dob.trim().to_string(),
                gender: req.gender.trim().to_string(),
                address: req.address,
                image: req.image.map(|i| i.trim().to_string()),
            },
        )
        .await?
        .ok_or_else(ApiError::invalid_credential)?;

    Ok(Json(ApiOk::message("Profile Updated")))
}

pub async fn book_appointment(
    State(state): State<AppState>,
    auth: AuthContext,
    ApiJson(req): ApiJson<BookAppointmentRequest>,
) -> Result<Json<ApiOk<Empty>>, ApiError> {
    auth.require(Role::Patient)?;

    booking::book_appointment(
        state.store.as_ref(),
        auth.principal_id,
        req.doc_id,
        &req.slot_date,
        &req.slot_time,
    )
    .await?;

    Ok(Json(ApiOk::message("Appointment Booked")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(name: &str, phone: &str, image: Option<&str>) -> UpdateProfileRequest {
        UpdateProfileRequest {
            name: name.into(),
            phone: phone.into(),
            dob: "1990-01-01".into(),
            gender: "Female".into(),
            address: None,
            image: image.map(str::to_string),
        }
    }

    #[test]
    fn test_validate_name() {
        assert!(validate_name("Jane").is_ok());
        assert!(validate_name("").is_err());
        assert!(validate_name("   ").is_err());
    }

    #[test]
    fn test_validate_profile() {
        assert!(validate_profile(&profile("Jane", "5551234", None)).is_ok());
        assert!(validate_profile(&profile("Jane", "", None)).is_err());
        assert!(validate_profile(&profile(" ", "5551234", None)).is_err());
        assert!(
            validate_profile(&profile("Jane", "5551234", Some("https://cdn.example.com/a.png")))
                .is_ok()
        );
        assert!(validate_profile(&profile("Jane", "5551234", Some("a.png"))).is_err());
    }

    #[test]
    fn test_book_request_ignores_client_user_id() {
        let req: BookAppointmentRequest = serde_json::from_str(
            r#"{"userId":"someone-else","docId":"6b1f4c52-7f2a-4b7e-9a55-0f3f8e6c2d11","slotDate":"5_3_2025","slotTime":"10:00 AM"}"#,
        )
        .unwrap();
        assert_eq!(req.slot_date, "5_3_2025");
        assert_eq!(req.slot_time, "10:00 AM");
    }
}
