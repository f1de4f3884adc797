// src/routes/doctor_routes.rs

use axum::{
    Extension, Json, Router,
    extract::State,
    routing::{get, post},
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    auth::{hash_password, validate_credentials, verify_password},
    error::ApiError,
    extract::{ApiJson, ApiPath},
    middleware::auth_context::AuthContext,
    models::{
        Address, ApiOk, AppState, DoctorView, DoctorsData, Empty, LoginRequest, PLACEHOLDER_IMAGE,
        Role, TokenData,
    },
    routes::{appointment_routes, auth_routes},
    slots::{SlotCandidate, available_slots},
    store::{DoctorUpdate, NewDoctor},
};

pub fn router() -> Router<AppState> {
    Router::new()
        // public
        .route("/list", get(list_doctors))
        .route("/slots/{doc_id}", get(doctor_slots))
        .route("/register", post(register))
        .route("/login", post(login))
        // doctor panel
        .route("/appointments", get(appointment_routes::list_appointments))
        .route("/complete-appointment", post(appointment_routes::complete_appointment))
        .route("/cancel-appointment", post(appointment_routes::cancel_appointment))
        .route("/dashboard", get(appointment_routes::dashboard))
        .route("/profile", get(profile))
        .route("/update-profile", post(update_profile))
        .layer(Extension(Role::Doctor))
}

/* =========================
   DTOs
   ========================= */

#[derive(Debug, Deserialize)]
pub struct RegisterDoctorRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    pub speciality: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateDoctorRequest {
    pub fees: Option<f64>,
    pub address: Option<Address>,
    pub available: Option<bool>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileData {
    pub profile_data: DoctorView,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DaySlotsView {
    pub slot_date: String,
    pub slots: Vec<SlotCandidate>,
}

#[derive(Debug, Serialize)]
pub struct SlotsData {
    pub available: bool,
    pub days: Vec<DaySlotsView>,
}

/* =========================
   Validation helpers
   ========================= */

pub(crate) fn validate_fees(fees: f64) -> Result<(), ApiError> {
    if !fees.is_finite() || fees < 0.0 {
        return Err(ApiError::validation("fees must be a non-negative number"));
    }
    Ok(())
}

fn validate_registration(req: &RegisterDoctorRequest) -> Result<(), ApiError> {
    if req.name.trim().is_empty() || req.speciality.trim().is_empty() {
        return Err(ApiError::validation("Missing Details"));
    }
    validate_credentials(req.email.trim(), &req.password)
}

/* =========================
   Handlers
   ========================= */

/// Public listing. Emails and credentials stay out.
pub async fn list_doctors(
    State(state): State<AppState>,
) -> Result<Json<ApiOk<DoctorsData>>, ApiError> {
    let mut doctors = Vec::new();
    for doctor in state.store.list_doctors().await? {
        let booked = state.store.booked_slots(doctor.id).await?;
        doctors.push(doctor.view(booked, false));
    }
    Ok(Json(ApiOk::data(DoctorsData { doctors })))
}

/// Free slots for the next seven days, in clinic local time.
pub async fn doctor_slots(
    State(state): State<AppState>,
    ApiPath(doc_id): ApiPath<Uuid>,
) -> Result<Json<ApiOk<SlotsData>>, ApiError> {
    let doctor = state
        .store
        .find_doctor(doc_id)
        .await?
        .ok_or_else(ApiError::doctor_not_found)?;
    let booked = state.store.booked_slots(doc_id).await?;

    let now = Utc::now().with_timezone(&state.clinic_offset).naive_local();
    let days = available_slots(now, &booked)
        .into_iter()
        .map(|day| DaySlotsView {
            slot_date: day.date_key(),
            slots: day.collect(),
        })
        .collect();

    Ok(Json(ApiOk::data(SlotsData {
        available: doctor.available,
        days,
    })))
}

pub async fn register(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<RegisterDoctorRequest>,
) -> Result<Json<ApiOk<TokenData>>, ApiError> {
    validate_registration(&req)?;

    let password_hash = hash_password(&req.password).map_err(ApiError::Upstream)?;
    let doctor = state
        .store
        .create_doctor(NewDoctor {
            name: req.name.trim().to_string(),
            email: req.email.trim().to_string(),
            password_hash,
            image: PLACEHOLDER_IMAGE.to_string(),
            speciality: req.speciality.trim().to_string(),
            degree: "MBBS".to_string(),
            experience: "1 Year".to_string(),
            about: "New doctor on the platform".to_string(),
            fees: 50.0,
            address: Address::default(),
            // listed only once an admin switches them on
            available: false,
        })
        .await?;

    tracing::info!(doctor_id = %doctor.id, "doctor registered");
    auth_routes::token_response(
        &state,
        doctor.id,
        Role::Doctor,
        Some("Registration successful! Please complete your profile."),
    )
    .await
}

pub async fn login(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<LoginRequest>,
) -> Result<Json<ApiOk<TokenData>>, ApiError> {
    let (email, password) = auth_routes::login_fields(&req)?;

    let doctor = state
        .store
        .find_doctor_by_email(email)
        .await?
        .filter(|d| verify_password(password, &d.password_hash))
        .ok_or_else(|| ApiError::Unauthorized("INVALID_CREDENTIAL", "Invalid credentials".into()))?;

    auth_routes::token_response(&state, doctor.id, Role::Doctor, None).await
}

pub async fn profile(
    State(state): State<AppState>,
    auth: AuthContext,
) -> Result<Json<ApiOk<ProfileData>>, ApiError> {
    auth.require(Role::Doctor)?;

    let doctor = state
        .store
        .find_doctor(auth.principal_id)
        .await?
        .ok_or_else(ApiError::invalid_credential)?;
    let booked = state.store.booked_slots(doctor.id).await?;

    Ok(Json(ApiOk::data(ProfileData {
        profile_data: doctor.view(booked, true),
    })))
}

pub async fn update_profile(
    State(state): State<AppState>,
    auth: AuthContext,
    ApiJson(req): ApiJson<UpdateDoctorRequest>,
) -> Result<Json<ApiOk<Empty>>, ApiError> {
    auth.require(Role::Doctor)?;
    if let Some(fees) = req.fees {
        validate_fees(fees)?;
    }

    let doctor = state
        .store
        .update_doctor(
            auth.principal_id,
            DoctorUpdate {
                fees: req.fees,
                address: req.address,
                available: req.available,
            },
        )
        .await?
        .ok_or_else(ApiError::invalid_credential)?;

    tracing::info!(doctor_id = %doctor.id, available = doctor.available, "doctor profile updated");
    Ok(Json(ApiOk::message("Profile Updated")))
}
