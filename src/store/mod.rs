//! Persistence boundary. Handlers and the booking service only talk to
//! `dyn Store`; `PgStore` backs production, `MemoryStore` backs tests and
//! database-less runs.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::{
    Address, Appointment, AppointmentStatus, Doctor, DoctorSnapshot, Patient, PatientSnapshot,
    Role, Session, SlotsBooked,
};

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("doctor not found")]
    DoctorNotFound,
    #[error("doctor not available")]
    DoctorUnavailable,
    #[error("slot already booked")]
    SlotTaken,
    #[error("email already registered")]
    EmailTaken,
    #[error("db error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("row decode error: {0}")]
    Decode(String),
}

#[derive(Debug, Clone)]
pub struct NewPatient {
    pub name: String,
    pub email: String,
    pub password_hash: String,
}

#[derive(Debug, Clone, Default)]
pub struct PatientUpdate {
    pub name: String,
    pub phone: String,
    pub dob: String,
    pub gender: String,
    pub address: Option<Address>,
    pub image: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewDoctor {
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub image: String,
    pub speciality: String,
    pub degree: String,
    pub experience: String,
    pub about: String,
    pub fees: f64,
    pub address: Address,
    pub available: bool,
}

#[derive(Debug, Clone, Default)]
pub struct DoctorUpdate {
    pub fees: Option<f64>,
    pub address: Option<Address>,
    pub available: Option<bool>,
}

/// Everything the store needs to persist a booking. The store re-checks
/// doctor availability and slot occupancy atomically with the insert.
#[derive(Debug, Clone)]
pub struct NewAppointment {
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub slot_date: String,
    pub slot_time: String,
    pub patient: PatientSnapshot,
    pub doctor: DoctorSnapshot,
    pub amount: f64,
}

#[derive(Debug, Clone, Copy)]
pub enum AppointmentScope {
    Patient(Uuid),
    Doctor(Uuid),
    All,
}

/// Result of a compare-and-set on a pending appointment.
#[derive(Debug, Clone)]
pub enum Transition {
    /// Was pending, now has the requested status.
    Applied(Appointment),
    /// Already had the requested status.
    Unchanged(Appointment),
    /// Already finished with the other terminal status.
    Rejected(Appointment),
}

#[derive(Debug, Clone)]
pub struct NewSession {
    pub principal_id: Uuid,
    pub role: Role,
    pub token_hash: String,
    pub expires_at: DateTime<Utc>,
}

#[async_trait]
pub trait Store: Send + Sync {
    async fn create_patient(&self, new: NewPatient) -> Result<Patient, StoreError>;
    async fn find_patient(&self, id: Uuid) -> Result<Option<Patient>, StoreError>;
    async fn find_patient_by_email(&self, email: &str) -> Result<Option<Patient>, StoreError>;
    async fn update_patient(
        &self,
        id: Uuid,
        update: PatientUpdate,
    ) -> Result<Option<Patient>, StoreError>;

    async fn create_doctor(&self, new: NewDoctor) -> Result<Doctor, StoreError>;
    async fn find_doctor(&self, id: Uuid) -> Result<Option<Doctor>, StoreError>;
    async fn find_doctor_by_email(&self, email: &str) -> Result<Option<Doctor>, StoreError>;
    async fn list_doctors(&self) -> Result<Vec<Doctor>, StoreError>;
    async fn count_doctors(&self) -> Result<i64, StoreError>;
    async fn update_doctor(
        &self,
        id: Uuid,
        update: DoctorUpdate,
    ) -> Result<Option<Doctor>, StoreError>;
    /// Flips `available` in a single write.
    async fn toggle_doctor_availability(&self, id: Uuid) -> Result<Option<Doctor>, StoreError>;

    /// Inserts the appointment only if the doctor is available and no other
    /// non-cancelled appointment holds the same (doctor, date, time).
    async fn insert_appointment(&self, new: NewAppointment) -> Result<Appointment, StoreError>;
    async fn find_appointment(&self, id: Uuid) -> Result<Option<Appointment>, StoreError>;
    /// In booking order.
    async fn list_appointments(
        &self,
        scope: AppointmentScope,
    ) -> Result<Vec<Appointment>, StoreError>;
    /// Occupied slots of a doctor, derived from non-cancelled appointments.
    async fn booked_slots(&self, doctor_id: Uuid) -> Result<SlotsBooked, StoreError>;
    /// Moves a pending appointment to `to`. `None` if the appointment does not exist.
    async fn transition_appointment(
        &self,
        id: Uuid,
        to: AppointmentStatus,
    ) -> Result<Option<Transition>, StoreError>;

    async fn create_session(&self, new: NewSession) -> Result<Session, StoreError>;
    /// Looks up a live (unrevoked, unexpired) session by token hash.
    async fn find_active_session(&self, token_hash: &str) -> Result<Option<Session>, StoreError>;
    async fn revoke_session(&self, session_token_id: Uuid) -> Result<bool, StoreError>;
}

/// Groups active appointments into the `slots_booked` shape.
pub(crate) fn slots_from_appointments<'a>(
    appointments: impl IntoIterator<Item = &'a Appointment>,
) -> SlotsBooked {
    let mut slots = SlotsBooked::new();
    for a in appointments.into_iter().filter(|a| a.is_active()) {
        let times = slots.entry(a.slot_date.clone()).or_default();
        if !times.contains(&a.slot_time) {
            times.push(a.slot_time.clone());
        }
    }
    slots
}
