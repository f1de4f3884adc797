use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use super::{
    AppointmentScope, DoctorUpdate, NewAppointment, NewDoctor, NewPatient, NewSession,
    PatientUpdate, Store, StoreError, Transition, slots_from_appointments,
};
use crate::models::{
    Address, Appointment, AppointmentStatus, Doctor, DoctorSnapshot, Patient, PatientSnapshot,
    Role, Session, SlotsBooked,
};

pub struct PgStore {
    db: PgPool,
}

impl PgStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

/* -------------------------
   DB Row Models
--------------------------*/

#[derive(Debug, FromRow)]
struct PatientRow {
    patient_id: Uuid,
    name: String,
    email: String,
    password_hash: String,
    image: String,
    phone: String,
    address_line1: String,
    address_line2: String,
    gender: String,
    dob: String,
}

impl From<PatientRow> for Patient {
    fn from(r: PatientRow) -> Self {
        Patient {
            id: r.patient_id,
            name: r.name,
            email: r.email,
            password_hash: r.password_hash,
            image: r.image,
            phone: r.phone,
            address: Address {
                line1: r.address_line1,
                line2: r.address_line2,
            },
            gender: r.gender,
            dob: r.dob,
        }
    }
}

#[derive(Debug, FromRow)]
struct DoctorRow {
    doctor_id: Uuid,
    name: String,
    email: String,
    password_hash: String,
    image: String,
    speciality: String,
    degree: String,
    experience: String,
    about: String,
    fees: f64,
    address_line1: String,
    address_line2: String,
    available: bool,
    created_at: DateTime<Utc>,
}

impl From<DoctorRow> for Doctor {
    fn from(r: DoctorRow) -> Self {
        Doctor {
            id: r.doctor_id,
            name: r.name,
            email: r.email,
            password_hash: r.password_hash,
            image: r.image,
            speciality: r.speciality,
            degree: r.degree,
            experience: r.experience,
            about: r.about,
            fees: r.fees,
            address: Address {
                line1: r.address_line1,
                line2: r.address_line2,
            },
            available: r.available,
            created_at: r.created_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct AppointmentRow {
    appointment_id: Uuid,
    patient_id: Uuid,
    doctor_id: Uuid,
    slot_date: String,
    slot_time: String,
    patient_data: Json<PatientSnapshot>,
    doctor_data: Json<DoctorSnapshot>,
    amount: f64,
    status: i16,
    payment: bool,
    created_at: DateTime<Utc>,
}

impl TryFrom<AppointmentRow> for Appointment {
    type Error = StoreError;

    fn try_from(r: AppointmentRow) -> Result<Self, StoreError> {
        let status = AppointmentStatus::try_from(r.status)
            .map_err(|v| StoreError::Decode(format!("unknown appointment status {v}")))?;
        Ok(Appointment {
            id: r.appointment_id,
            patient_id: r.patient_id,
            doctor_id: r.doctor_id,
            slot_date: r.slot_date,
            slot_time: r.slot_time,
            patient: r.patient_data.0,
            doctor: r.doctor_data.0,
            amount: r.amount,
            status,
            payment: r.payment,
            created_at: r.created_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct SessionRow {
    session_token_id: Uuid,
    principal_id: Uuid,
    role: i16,
    expires_at: DateTime<Utc>,
}

impl TryFrom<SessionRow> for Session {
    type Error = StoreError;

    fn try_from(r: SessionRow) -> Result<Self, StoreError> {
        let role = Role::try_from(r.role)
            .map_err(|v| StoreError::Decode(format!("unknown role {v}")))?;
        Ok(Session {
            session_token_id: r.session_token_id,
            principal_id: r.principal_id,
            role,
            expires_at: r.expires_at,
        })
    }
}

const PATIENT_COLUMNS: &str = r#"
    patient_id, name, email, password_hash, image, phone,
    address_line1, address_line2, gender, dob
"#;

const DOCTOR_COLUMNS: &str = r#"
    doctor_id, name, email, password_hash, image, speciality, degree,
    experience, about, fees, address_line1, address_line2, available, created_at
"#;

const APPOINTMENT_COLUMNS: &str = r#"
    appointment_id, patient_id, doctor_id, slot_date, slot_time,
    patient_data, doctor_data, amount, status, payment, created_at
"#;

/// Unique violations on the email indexes mean the address is registered.
fn map_email_conflict(e: sqlx::Error) -> StoreError {
    match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => StoreError::EmailTaken,
        _ => StoreError::Database(e),
    }
}

fn to_appointments(rows: Vec<AppointmentRow>) -> Result<Vec<Appointment>, StoreError> {
    rows.into_iter().map(Appointment::try_from).collect()
}

#[async_trait]
impl Store for PgStore {
    async fn create_patient(&self, new: NewPatient) -> Result<Patient, StoreError> {
        let row: PatientRow = sqlx::query_as(&format!(
            r#"
            INSERT INTO patient (name, email, password_hash)
            VALUES ($1, $2, $3)
            RETURNING {PATIENT_COLUMNS}
            "#
        ))
        .bind(&new.name)
        .bind(&new.email)
        .bind(&new.password_hash)
        .fetch_one(&self.db)
        .await
        .map_err(map_email_conflict)?;

        Ok(row.into())
    }

    async fn find_patient(&self, id: Uuid) -> Result<Option<Patient>, StoreError> {
        let row: Option<PatientRow> = sqlx::query_as(&format!(
            "SELECT {PATIENT_COLUMNS} FROM patient WHERE patient_id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await?;

        Ok(row.map(Into::into))
    }

    async fn find_patient_by_email(&self, email: &str) -> Result<Option<Patient>, StoreError> {
        let row: Option<PatientRow> = sqlx::query_as(&format!(
            "SELECT {PATIENT_COLUMNS} FROM patient WHERE lower(email) = lower($1)"
        ))
        .bind(email)
        .fetch_optional(&self.db)
        .await?;

        Ok(row.map(Into::into))
    }

    async fn update_patient(
        &self,
        id: Uuid,
        update: PatientUpdate,
    ) -> Result<Option<Patient>, StoreError> {
        let (line1, line2) = match update.address {
            Some(a) => (Some(a.line1), Some(a.line2)),
            None => (None, None),
        };

        let row: Option<PatientRow> = sqlx::query_as(&format!(
            r#"
            UPDATE patient
            SET name = $2,
                phone = $3,
                dob = $4,
                gender = $5,
                address_line1 = COALESCE($6, address_line1),
                address_line2 = COALESCE($7, address_line2),
                image = COALESCE($8, image)
            WHERE patient_id = $1
            RETURNING {PATIENT_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(&update.name)
        .bind(&update.phone)
        .bind(&update.dob)
        .bind(&update.gender)
        .bind(line1)
        .bind(line2)
        .bind(update.image)
        .fetch_optional(&self.db)
        .await?;

        Ok(row.map(Into::into))
    }

    async fn create_doctor(&self, new: NewDoctor) -> Result<Doctor, StoreError> {
        let row: DoctorRow = sqlx::query_as(&format!(
            r#"
            INSERT INTO doctor (
              name, email, password_hash, image, speciality, degree,
              experience, about, fees, address_line1, address_line2, available
            )
            VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12)
            RETURNING {DOCTOR_COLUMNS}
            "#
        ))
        .bind(&new.name)
        .bind(&new.email)
        .bind(&new.password_hash)
        .bind(&new.image)
        .bind(&new.speciality)
        .bind(&new.degree)
        .bind(&new.experience)
        .bind(&new.about)
        .bind(new.fees)
        .bind(&new.address.line1)
        .bind(&new.address.line2)
        .bind(new.available)
        .fetch_one(&self.db)
        .await
        .map_err(map_email_conflict)?;

        Ok(row.into())
    }

    async fn find_doctor(&self, id: Uuid) -> Result<Option<Doctor>, StoreError> {
        let row: Option<DoctorRow> = sqlx::query_as(&format!(
            "SELECT {DOCTOR_COLUMNS} FROM doctor WHERE doctor_id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await?;

        Ok(row.map(Into::into))
    }

    async fn find_doctor_by_email(&self, email: &str) -> Result<Option<Doctor>, StoreError> {
        let row: Option<DoctorRow> = sqlx::query_as(&format!(
            "SELECT {DOCTOR_COLUMNS} FROM doctor WHERE lower(email) = lower($1)"
        ))
        .bind(email)
        .fetch_optional(&self.db)
        .await?;

        Ok(row.map(Into::into))
    }

    async fn list_doctors(&self) -> Result<Vec<Doctor>, StoreError> {
        let rows: Vec<DoctorRow> = sqlx::query_as(&format!(
            "SELECT {DOCTOR_COLUMNS} FROM doctor ORDER BY created_at ASC"
        ))
        .fetch_all(&self.db)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn count_doctors(&self) -> Result<i64, StoreError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM doctor")
            .fetch_one(&self.db)
            .await?;
        Ok(count)
    }

    async fn update_doctor(
        &self,
        id: Uuid,
        update: DoctorUpdate,
    ) -> Result<Option<Doctor>, StoreError> {
        let (line1, line2) = match update.address {
            Some(a) => (Some(a.line1), Some(a.line2)),
            None => (None, None),
        };

        let row: Option<DoctorRow> = sqlx::query_as(&format!(
            r#"
            UPDATE doctor
            SET fees = COALESCE($2, fees),
                address_line1 = COALESCE($3, address_line1),
                address_line2 = COALESCE($4, address_line2),
                available = COALESCE($5, available)
            WHERE doctor_id = $1
            RETURNING {DOCTOR_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(update.fees)
        .bind(line1)
        .bind(line2)
        .bind(update.available)
        .fetch_optional(&self.db)
        .await?;

        Ok(row.map(Into::into))
    }

    async fn toggle_doctor_availability(&self, id: Uuid) -> Result<Option<Doctor>, StoreError> {
        let row: Option<DoctorRow> = sqlx::query_as(&format!(
            r#"
            UPDATE doctor
            SET available = NOT available
            WHERE doctor_id = $1
            RETURNING {DOCTOR_COLUMNS}
            "#
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await?;

        Ok(row.map(Into::into))
    }

    async fn insert_appointment(&self, new: NewAppointment) -> Result<Appointment, StoreError> {
        let mut tx = self.db.begin().await?;

        // Holds off an availability toggle until the booking commits.
        let available: Option<bool> = sqlx::query_scalar(
            r#"
            SELECT available
            FROM doctor
            WHERE doctor_id = $1
            FOR SHARE
            "#,
        )
        .bind(new.doctor_id)
        .fetch_optional(&mut *tx)
        .await?;

        match available {
            None => return Err(StoreError::DoctorNotFound),
            Some(false) => return Err(StoreError::DoctorUnavailable),
            Some(true) => {}
        }

        // appointment_active_slot turns a concurrent duplicate into a unique violation
        let row: AppointmentRow = sqlx::query_as(&format!(
            r#"
            INSERT INTO appointment (
              patient_id, doctor_id, slot_date, slot_time,
              patient_data, doctor_data, amount
            )
            VALUES ($1,$2,$3,$4,$5,$6,$7)
            RETURNING {APPOINTMENT_COLUMNS}
            "#
        ))
        .bind(new.patient_id)
        .bind(new.doctor_id)
        .bind(&new.slot_date)
        .bind(&new.slot_time)
        .bind(Json(&new.patient))
        .bind(Json(&new.doctor))
        .bind(new.amount)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db) if db.is_unique_violation() => StoreError::SlotTaken,
            _ => StoreError::Database(e),
        })?;

        tx.commit().await?;

        row.try_into()
    }

    async fn find_appointment(&self, id: Uuid) -> Result<Option<Appointment>, StoreError> {
        let row: Option<AppointmentRow> = sqlx::query_as(&format!(
            "SELECT {APPOINTMENT_COLUMNS} FROM appointment WHERE appointment_id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await?;

        row.map(Appointment::try_from).transpose()
    }

    async fn list_appointments(
        &self,
        scope: AppointmentScope,
    ) -> Result<Vec<Appointment>, StoreError> {
        let rows: Vec<AppointmentRow> = match scope {
            AppointmentScope::Patient(id) => {
                sqlx::query_as(&format!(
                    "SELECT {APPOINTMENT_COLUMNS} FROM appointment WHERE patient_id = $1 ORDER BY seq ASC"
                ))
                .bind(id)
                .fetch_all(&self.db)
                .await?
            }
            AppointmentScope::Doctor(id) => {
                sqlx::query_as(&format!(
                    "SELECT {APPOINTMENT_COLUMNS} FROM appointment WHERE doctor_id = $1 ORDER BY seq ASC"
                ))
                .bind(id)
                .fetch_all(&self.db)
                .await?
            }
            AppointmentScope::All => {
                sqlx::query_as(&format!(
                    "SELECT {APPOINTMENT_COLUMNS} FROM appointment ORDER BY seq ASC"
                ))
                .fetch_all(&self.db)
                .await?
            }
        };

        to_appointments(rows)
    }

    async fn booked_slots(&self, doctor_id: Uuid) -> Result<SlotsBooked, StoreError> {
        let rows: Vec<AppointmentRow> = sqlx::query_as(&format!(
            r#"
            SELECT {APPOINTMENT_COLUMNS}
            FROM appointment
            WHERE doctor_id = $1
              AND status <> 2
            ORDER BY seq ASC
            "#
        ))
        .bind(doctor_id)
        .fetch_all(&self.db)
        .await?;

        let appointments = to_appointments(rows)?;
        Ok(slots_from_appointments(&appointments))
    }

    async fn transition_appointment(
        &self,
        id: Uuid,
        to: AppointmentStatus,
    ) -> Result<Option<Transition>, StoreError> {
        let updated: Option<AppointmentRow> = sqlx::query_as(&format!(
            r#"
            UPDATE appointment
            SET status = $2
            WHERE appointment_id = $1
              AND status = 0
            RETURNING {APPOINTMENT_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(to as i16)
        .fetch_optional(&self.db)
        .await?;

        if let Some(row) = updated {
            return Ok(Some(Transition::Applied(row.try_into()?)));
        }

        // Not pending (a terminal status never goes back), so this read is stable.
        let Some(current) = self.find_appointment(id).await? else {
            return Ok(None);
        };
        if current.status == to {
            Ok(Some(Transition::Unchanged(current)))
        } else {
            Ok(Some(Transition::Rejected(current)))
        }
    }

    async fn create_session(&self, new: NewSession) -> Result<Session, StoreError> {
        let row: SessionRow = sqlx::query_as(
            r#"
            INSERT INTO session_token
                (principal_id, role, session_token_hash, expires_at)
            VALUES
                ($1, $2, $3, $4)
            RETURNING session_token_id, principal_id, role, expires_at
            "#,
        )
        .bind(new.principal_id)
        .bind(new.role as i16)
        .bind(&new.token_hash)
        .bind(new.expires_at)
        .fetch_one(&self.db)
        .await?;

        row.try_into()
    }

    async fn find_active_session(&self, token_hash: &str) -> Result<Option<Session>, StoreError> {
        // lookup and last_seen_at touch in one statement
        let row: Option<SessionRow> = sqlx::query_as(
            r#"
            UPDATE session_token
            SET last_seen_at = now()
            WHERE session_token_hash = $1
              AND revoked_at IS NULL
              AND expires_at > now()
            RETURNING session_token_id, principal_id, role, expires_at
            "#,
        )
        .bind(token_hash)
        .fetch_optional(&self.db)
        .await?;

        row.map(Session::try_from).transpose()
    }

    async fn revoke_session(&self, session_token_id: Uuid) -> Result<bool, StoreError> {
        let res = sqlx::query(
            r#"
            UPDATE session_token
            SET revoked_at = now()
            WHERE session_token_id = $1
              AND revoked_at IS NULL
            "#,
        )
        .bind(session_token_id)
        .execute(&self.db)
        .await?;

        Ok(res.rows_affected() > 0)
    }
}
