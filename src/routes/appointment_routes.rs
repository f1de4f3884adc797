// src/routes/appointment_routes.rs

//! Appointment operations shared by the patient, doctor and admin routers.
//!
//! Each role router installs `Extension(Role)` for the role it serves and
//! mounts these handlers; the handler checks the caller against that role
//! and then lets the principal decide what it may see or change.

use axum::{Extension, Json, extract::State};
use serde::Serialize;

use crate::{
    booking,
    dashboard::{self, DashData, DashScope},
    error::ApiError,
    extract::ApiJson,
    middleware::auth_context::AuthContext,
    models::{ApiOk, AppState, AppointmentIdRequest, AppointmentsData, Empty, Role},
};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardData {
    pub dash_data: DashData,
}

pub async fn list_appointments(
    State(state): State<AppState>,
    Extension(role): Extension<Role>,
    auth: AuthContext,
) -> Result<Json<ApiOk<AppointmentsData>>, ApiError> {
    auth.require(role)?;

    let appointments = state
        .store
        .list_appointments(booking::scope_for(&auth.principal()))
        .await?;

    Ok(Json(ApiOk::data(AppointmentsData { appointments })))
}

pub async fn cancel_appointment(
    State(state): State<AppState>,
    Extension(role): Extension<Role>,
    auth: AuthContext,
    ApiJson(req): ApiJson<AppointmentIdRequest>,
) -> Result<Json<ApiOk<Empty>>, ApiError> {
    auth.require(role)?;

    booking::cancel_appointment(state.store.as_ref(), &auth.principal(), req.appointment_id)
        .await?;

    Ok(Json(ApiOk::message("Appointment Cancelled")))
}

pub async fn complete_appointment(
    State(state): State<AppState>,
    auth: AuthContext,
    ApiJson(req): ApiJson<AppointmentIdRequest>,
) -> Result<Json<ApiOk<Empty>>, ApiError> {
    auth.require(Role::Doctor)?;

    booking::complete_appointment(state.store.as_ref(), &auth.principal(), req.appointment_id)
        .await?;

    Ok(Json(ApiOk::message("Appointment Completed")))
}

pub async fn dashboard(
    State(state): State<AppState>,
    Extension(role): Extension<Role>,
    auth: AuthContext,
) -> Result<Json<ApiOk<DashboardData>>, ApiError> {
    auth.require(role)?;
    let principal = auth.principal();

    let appointments = state
        .store
        .list_appointments(booking::scope_for(&principal))
        .await?;
    let scope = match principal.role {
        Role::Admin => DashScope::Admin {
            doctors: state.store.count_doctors().await?,
        },
        _ => DashScope::Doctor,
    };

    Ok(Json(ApiOk::data(DashboardData {
        dash_data: dashboard::summarize(&appointments, scope),
    })))
}
