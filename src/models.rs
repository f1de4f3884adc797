use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::store::Store;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub session_ttl_hours: i64,
    pub admin: Option<AdminCredentials>,
    pub clinic_offset: FixedOffset,
}

/// Admin login is checked against configured credentials, there is no admin table.
#[derive(Clone, Debug)]
pub struct AdminCredentials {
    pub email: String,
    pub password_hash: String,
}

/// Profile image until one is set.
pub const PLACEHOLDER_IMAGE: &str = "https://via.placeholder.com/150";

/// Principal id used for admin sessions.
pub const ADMIN_PRINCIPAL_ID: Uuid = Uuid::nil();

/// date-key ("D_M_YYYY") -> booked time labels ("H:MM AM/PM")
pub type SlotsBooked = BTreeMap<String, Vec<String>>;

/* -------------------------
   Roles & status
--------------------------*/

/// Stored as smallint: 0 patient, 1 doctor, 2 admin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(i16)]
pub enum Role {
    Patient = 0,
    Doctor = 1,
    Admin = 2,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Patient => "patient",
            Role::Doctor => "doctor",
            Role::Admin => "admin",
        }
    }
}

/// Appointment lifecycle. Completed and Cancelled are terminal and exclusive.
/// Stored as smallint: 0 pending, 1 completed, 2 cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(i16)]
pub enum AppointmentStatus {
    Pending = 0,
    Completed = 1,
    Cancelled = 2,
}

impl TryFrom<i16> for Role {
    type Error = i16;

    fn try_from(v: i16) -> Result<Self, i16> {
        match v {
            0 => Ok(Role::Patient),
            1 => Ok(Role::Doctor),
            2 => Ok(Role::Admin),
            other => Err(other),
        }
    }
}

impl TryFrom<i16> for AppointmentStatus {
    type Error = i16;

    fn try_from(v: i16) -> Result<Self, i16> {
        match v {
            0 => Ok(AppointmentStatus::Pending),
            1 => Ok(AppointmentStatus::Completed),
            2 => Ok(AppointmentStatus::Cancelled),
            other => Err(other),
        }
    }
}

/// Authenticated identity an operation runs on behalf of.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Principal {
    pub id: Uuid,
    pub role: Role,
}

/* -------------------------
   Records
--------------------------*/

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Address {
    #[serde(default)]
    pub line1: String,
    #[serde(default)]
    pub line2: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Patient {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub image: String,
    pub phone: String,
    pub address: Address,
    pub gender: String,
    pub dob: String,
}

impl Patient {
    pub fn snapshot(&self) -> PatientSnapshot {
        PatientSnapshot {
            id: self.id,
            name: self.name.clone(),
            email: self.email.clone(),
            image: self.image.clone(),
            phone: self.phone.clone(),
            address: self.address.clone(),
            gender: self.gender.clone(),
            dob: self.dob.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Doctor {
    pub id: Uuid,
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
    pub created_at: DateTime<Utc>,
}

impl Doctor {
    pub fn snapshot(&self) -> DoctorSnapshot {
        DoctorSnapshot {
            id: self.id,
            name: self.name.clone(),
            email: self.email.clone(),
            image: self.image.clone(),
            speciality: self.speciality.clone(),
            degree: self.degree.clone(),
            experience: self.experience.clone(),
            about: self.about.clone(),
            fees: self.fees,
            address: self.address.clone(),
        }
    }

    /// Wire view. Email is only included for the doctor themself and the admin.
    pub fn view(&self, slots_booked: SlotsBooked, include_email: bool) -> DoctorView {
        DoctorView {
            id: self.id,
            name: self.name.clone(),
            email: include_email.then(|| self.email.clone()),
            image: self.image.clone(),
            speciality: self.speciality.clone(),
            degree: self.degree.clone(),
            experience: self.experience.clone(),
            about: self.about.clone(),
            fees: self.fees,
            address: self.address.clone(),
            available: self.available,
            date: self.created_at,
            slots_booked,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DoctorView {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub image: String,
    pub speciality: String,
    pub degree: String,
    pub experience: String,
    pub about: String,
    pub fees: f64,
    pub address: Address,
    pub available: bool,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub date: DateTime<Utc>,
    pub slots_booked: SlotsBooked,
}

/// Patient fields frozen into an appointment at booking time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatientSnapshot {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub image: String,
    pub phone: String,
    pub address: Address,
    pub gender: String,
    pub dob: String,
}

/// Doctor fields frozen into an appointment at booking time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DoctorSnapshot {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub image: String,
    pub speciality: String,
    pub degree: String,
    pub experience: String,
    pub about: String,
    pub fees: f64,
    pub address: Address,
}

#[derive(Debug, Clone, Serialize)]
#[serde(into = "AppointmentView")]
pub struct Appointment {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub slot_date: String,
    pub slot_time: String,
    pub patient: PatientSnapshot,
    pub doctor: DoctorSnapshot,
    pub amount: f64,
    pub status: AppointmentStatus,
    pub payment: bool,
    pub created_at: DateTime<Utc>,
}

impl Appointment {
    pub fn is_active(&self) -> bool {
        self.status != AppointmentStatus::Cancelled
    }

    pub fn is_completed(&self) -> bool {
        self.status == AppointmentStatus::Completed
    }
}

/// Appointment as the frontend reads it. `cancelled` and `isCompleted`
/// are derived from the status and can never both be true.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AppointmentView {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub user_id: Uuid,
    pub doc_id: Uuid,
    pub slot_date: String,
    pub slot_time: String,
    pub user_data: PatientSnapshot,
    pub doc_data: DoctorSnapshot,
    pub amount: f64,
    pub status: AppointmentStatus,
    pub cancelled: bool,
    pub is_completed: bool,
    pub payment: bool,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub date: DateTime<Utc>,
}

impl From<Appointment> for AppointmentView {
    fn from(a: Appointment) -> Self {
        AppointmentView {
            id: a.id,
            user_id: a.patient_id,
            doc_id: a.doctor_id,
            cancelled: a.status == AppointmentStatus::Cancelled,
            is_completed: a.status == AppointmentStatus::Completed,
            slot_date: a.slot_date,
            slot_time: a.slot_time,
            user_data: a.patient,
            doc_data: a.doctor,
            amount: a.amount,
            status: a.status,
            payment: a.payment,
            date: a.created_at,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Session {
    pub session_token_id: Uuid,
    pub principal_id: Uuid,
    pub role: Role,
    pub expires_at: DateTime<Utc>,
}

/* -------------------------
   Response envelope
--------------------------*/

/// `{ success: true, message?, ...data }`
#[derive(Debug, Serialize)]
pub struct ApiOk<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(flatten)]
    pub data: T,
}

#[derive(Debug, Serialize)]
pub struct Empty {}

impl<T> ApiOk<T> {
    pub fn data(data: T) -> Self {
        ApiOk {
            success: true,
            message: None,
            data,
        }
    }
}

impl ApiOk<Empty> {
    pub fn message(message: impl Into<String>) -> Self {
        ApiOk {
            success: true,
            message: Some(message.into()),
            data: Empty {},
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TokenData {
    pub token: String,
}

#[derive(Debug, Serialize)]
pub struct AppointmentsData {
    pub appointments: Vec<Appointment>,
}

#[derive(Debug, Serialize)]
pub struct DoctorsData {
    pub doctors: Vec<DoctorView>,
}

/* -------------------------
   Request DTOs
--------------------------*/

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppointmentIdRequest {
    pub appointment_id: Uuid,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DoctorIdRequest {
    pub doc_id: Uuid,
}
