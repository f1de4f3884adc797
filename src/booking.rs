//! Booking, cancellation and completion of appointment slots.
//!
//! Slot occupancy is never stored separately from appointments: a slot is
//! taken while a non-cancelled appointment holds it. Booking therefore is a
//! single conditional insert at the store, and cancelling releases the
//! slot by changing the appointment status.

use uuid::Uuid;

use crate::error::ApiError;
use crate::models::{Appointment, AppointmentStatus, Principal, Role};
use crate::slots::{SlotError, canonical_slot};
use crate::store::{AppointmentScope, NewAppointment, Store, Transition};

/// Appointments a principal is allowed to see.
pub fn scope_for(principal: &Principal) -> AppointmentScope {
    match principal.role {
        Role::Patient => AppointmentScope::Patient(principal.id),
        Role::Doctor => AppointmentScope::Doctor(principal.id),
        Role::Admin => AppointmentScope::All,
    }
}

fn may_cancel(principal: &Principal, appointment: &Appointment) -> bool {
    match principal.role {
        Role::Patient => appointment.patient_id == principal.id,
        Role::Doctor => appointment.doctor_id == principal.id,
        Role::Admin => true,
    }
}

fn may_complete(principal: &Principal, appointment: &Appointment) -> bool {
    principal.role == Role::Doctor && appointment.doctor_id == principal.id
}

fn slot_validation_error(e: SlotError) -> ApiError {
    match e {
        SlotError::BadDate => ApiError::validation("slotDate must be D_M_YYYY"),
        SlotError::BadTime => ApiError::validation("slotTime must be H:MM AM/PM"),
        SlotError::OffGrid => {
            ApiError::validation("slotTime must be a half-hour slot between 10:00 AM and 8:30 PM")
        }
    }
}

pub async fn book_appointment(
    store: &dyn Store,
    patient_id: Uuid,
    doctor_id: Uuid,
    slot_date: &str,
    slot_time: &str,
) -> Result<Appointment, ApiError> {
    let (slot_date, slot_time) = canonical_slot(slot_date, slot_time).map_err(slot_validation_error)?;

    let doctor = store
        .find_doctor(doctor_id)
        .await?
        .ok_or_else(ApiError::doctor_not_found)?;
    if !doctor.available {
        return Err(ApiError::doctor_unavailable());
    }

    let booked = store.booked_slots(doctor_id).await?;
    if booked
        .get(&slot_date)
        .is_some_and(|times| times.contains(&slot_time))
    {
        return Err(ApiError::slot_taken());
    }

    let patient = store
        .find_patient(patient_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("NOT_FOUND", "Patient not found".into()))?;

    // The store repeats the availability and occupancy checks atomically
    // with the insert; the reads above only order the failure reasons.
    let appointment = store
        .insert_appointment(NewAppointment {
            patient_id,
            doctor_id,
            slot_date,
            slot_time,
            patient: patient.snapshot(),
            doctor: doctor.snapshot(),
            amount: doctor.fees,
        })
        .await?;

    tracing::info!(
        appointment_id = %appointment.id,
        doctor_id = %doctor_id,
        slot_date = %appointment.slot_date,
        slot_time = %appointment.slot_time,
        "appointment booked"
    );
    Ok(appointment)
}

async fn load_appointment(store: &dyn Store, id: Uuid) -> Result<Appointment, ApiError> {
    store
        .find_appointment(id)
        .await?
        .ok_or_else(ApiError::appointment_not_found)
}

/// Cancels an appointment and releases its slot. Cancelling twice is a
/// no-op; a completed appointment cannot be cancelled.
pub async fn cancel_appointment(
    store: &dyn Store,
    principal: &Principal,
    appointment_id: Uuid,
) -> Result<Appointment, ApiError> {
    let appointment = load_appointment(store, appointment_id).await?;
    if !may_cancel(principal, &appointment) {
        return Err(ApiError::not_owner());
    }

    match store
        .transition_appointment(appointment_id, AppointmentStatus::Cancelled)
        .await?
    {
        Some(Transition::Applied(a)) => {
            tracing::info!(
                appointment_id = %a.id,
                doctor_id = %a.doctor_id,
                slot_date = %a.slot_date,
                slot_time = %a.slot_time,
                by = principal.role.as_str(),
                "appointment cancelled"
            );
            Ok(a)
        }
        Some(Transition::Unchanged(a)) => {
            tracing::debug!(appointment_id = %a.id, "appointment already cancelled");
            Ok(a)
        }
        Some(Transition::Rejected(_)) => Err(ApiError::Conflict(
            "INVALID_TRANSITION",
            "Completed appointments cannot be cancelled".into(),
        )),
        None => Err(ApiError::appointment_not_found()),
    }
}

/// Marks an appointment completed. The slot stays taken.
pub async fn complete_appointment(
    store: &dyn Store,
    principal: &Principal,
    appointment_id: Uuid,
) -> Result<Appointment, ApiError> {
    let appointment = load_appointment(store, appointment_id).await?;
    if !may_complete(principal, &appointment) {
        return Err(ApiError::not_owner());
    }

    match store
        .transition_appointment(appointment_id, AppointmentStatus::Completed)
        .await?
    {
        Some(Transition::Applied(a)) => {
            tracing::info!(appointment_id = %a.id, doctor_id = %a.doctor_id, "appointment completed");
            Ok(a)
        }
        Some(Transition::Unchanged(a)) => Ok(a),
        Some(Transition::Rejected(_)) => Err(ApiError::Conflict(
            "INVALID_TRANSITION",
            "Cancelled appointments cannot be completed".into(),
        )),
        None => Err(ApiError::appointment_not_found()),
    }
}
