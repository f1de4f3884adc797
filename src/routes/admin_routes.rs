// src/routes/admin_routes.rs

use axum::{
    Extension, Json, Router,
    extract::State,
    routing::{get, post},
};
use serde::Deserialize;

use crate::{
    auth::{hash_password, validate_credentials, verify_password},
    error::ApiError,
    extract::ApiJson,
    middleware::auth_context::AuthContext,
    models::{
        ADMIN_PRINCIPAL_ID, Address, ApiOk, AppState, DoctorIdRequest, DoctorsData, Empty,
        LoginRequest, PLACEHOLDER_IMAGE, Role, TokenData,
    },
    routes::{
        appointment_routes, auth_routes,
        doctor_routes::validate_fees,
        user_routes::validate_image_url,
    },
    store::NewDoctor,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/login", post(login))
        .route("/add-doctor", post(add_doctor))
        .route("/all-doctors", get(all_doctors))
        .route("/change-availability", post(change_availability))
        .route("/appointments", get(appointment_routes::list_appointments))
        .route("/cancel-appointment", post(appointment_routes::cancel_appointment))
        .route("/dashboard", get(appointment_routes::dashboard))
        .layer(Extension(Role::Admin))
}

#[derive(Debug, Deserialize)]
pub struct AddDoctorRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    pub image: Option<String>,
    pub speciality: String,
    pub degree: String,
    pub experience: String,
    pub about: String,
    pub fees: f64,
    #[serde(default)]
    pub address: Address,
}

fn validate_add_doctor(req: &AddDoctorRequest) -> Result<(), ApiError> {
    let required = [
        &req.name,
        &req.speciality,
        &req.degree,
        &req.experience,
        &req.about,
    ];
    if required.iter().any(|v| v.trim().is_empty()) {
        return Err(ApiError::validation("Missing Details"));
    }
    validate_credentials(req.email.trim(), &req.password)?;
    validate_fees(req.fees)?;
    if let Some(image) = &req.image {
        validate_image_url(image)?;
    }
    Ok(())
}

pub async fn login(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<LoginRequest>,
) -> Result<Json<ApiOk<TokenData>>, ApiError> {
    let (email, password) = auth_routes::login_fields(&req)?;

    let Some(admin) = state.admin.as_ref() else {
        tracing::warn!("admin login attempted but ADMIN_EMAIL / ADMIN_PASSWORD_HASH are not set");
        return Err(ApiError::Unauthorized(
            "INVALID_CREDENTIAL",
            "Invalid credentials".into(),
        ));
    };

    if !admin.email.eq_ignore_ascii_case(email) || !verify_password(password, &admin.password_hash)
    {
        return Err(ApiError::Unauthorized(
            "INVALID_CREDENTIAL",
            "Invalid credentials".into(),
        ));
    }

    auth_routes::token_response(&state, ADMIN_PRINCIPAL_ID, Role::Admin, None).await
}

pub async fn add_doctor(
    State(state): State<AppState>,
    auth: AuthContext,
    ApiJson(req): ApiJson<AddDoctorRequest>,
) -> Result<Json<ApiOk<Empty>>, ApiError> {
    auth.require(Role::Admin)?;
    validate_add_doctor(&req)?;

    let password_hash = hash_password(&req.password).map_err(ApiError::Upstream)?;
    let doctor = state
        .store
        .create_doctor(NewDoctor {
            name: req.name.trim().to_string(),
            email: req.email.trim().to_string(),
            password_hash,
            image: req
                .image
                .map(|i| i.trim().to_string())
                .unwrap_or_else(|| PLACEHOLDER_IMAGE.to_string()),
            speciality: req.speciality.trim().to_string(),
            degree: req.degree.trim().to_string(),
            experience: req.experience.trim().to_string(),
            about: req.about.trim().to_string(),
            fees: req.fees,
            address: req.address,
            available: true,
        })
        .await?;

    tracing::info!(doctor_id = %doctor.id, "doctor added by admin");
    Ok(Json(ApiOk::message("Doctor Added")))
}

pub async fn all_doctors(
    State(state): State<AppState>,
    auth: AuthContext,
) -> Result<Json<ApiOk<DoctorsData>>, ApiError> {
    auth.require(Role::Admin)?;

    let mut doctors = Vec::new();
    for doctor in state.store.list_doctors().await? {
        let booked = state.store.booked_slots(doctor.id).await?;
        doctors.push(doctor.view(booked, true));
    }
    Ok(Json(ApiOk::data(DoctorsData { doctors })))
}

pub async fn change_availability(
    State(state): State<AppState>,
    auth: AuthContext,
    ApiJson(req): ApiJson<DoctorIdRequest>,
) -> Result<Json<ApiOk<Empty>>, ApiError> {
    auth.require(Role::Admin)?;

    let doctor = state
        .store
        .toggle_doctor_availability(req.doc_id)
        .await?
        .ok_or_else(ApiError::doctor_not_found)?;

    tracing::info!(doctor_id = %doctor.id, available = doctor.available, "doctor availability changed");
    Ok(Json(ApiOk::message("Availability Changed")))
}
