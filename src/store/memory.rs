use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{
    AppointmentScope, DoctorUpdate, NewAppointment, NewDoctor, NewPatient, NewSession,
    PatientUpdate, Store, StoreError, Transition, slots_from_appointments,
};
use crate::models::{
    Address, Appointment, AppointmentStatus, Doctor, PLACEHOLDER_IMAGE, Patient, Session,
    SlotsBooked,
};

#[derive(Default)]
struct State {
    patients: Vec<Patient>,
    doctors: Vec<Doctor>,
    appointments: Vec<Appointment>,
    sessions: Vec<StoredSession>,
}

struct StoredSession {
    session: Session,
    token_hash: String,
    revoked: bool,
}

/// Single-process store. Every operation runs under one lock, so the
/// booking check-and-insert is atomic.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn email_eq(a: &str, b: &str) -> bool {
    a.eq_ignore_ascii_case(b)
}

#[async_trait]
impl Store for MemoryStore {
    async fn create_patient(&self, new: NewPatient) -> Result<Patient, StoreError> {
        let mut st = self.state.lock().await;
        if st.patients.iter().any(|p| email_eq(&p.email, &new.email)) {
            return Err(StoreError::EmailTaken);
        }
        let patient = Patient {
            id: Uuid::new_v4(),
            name: new.name,
            email: new.email,
            password_hash: new.password_hash,
            image: PLACEHOLDER_IMAGE.to_string(),
            phone: "0000000000".to_string(),
            address: Address::default(),
            gender: "Not Selected".to_string(),
            dob: "Not Selected".to_string(),
        };
        st.patients.push(patient.clone());
        Ok(patient)
    }

    async fn find_patient(&self, id: Uuid) -> Result<Option<Patient>, StoreError> {
        let st = self.state.lock().await;
        Ok(st.patients.iter().find(|p| p.id == id).cloned())
    }

    async fn find_patient_by_email(&self, email: &str) -> Result<Option<Patient>, StoreError> {
        let st = self.state.lock().await;
        Ok(st.patients.iter().find(|p| email_eq(&p.email, email)).cloned())
    }

    async fn update_patient(
        &self,
        id: Uuid,
        update: PatientUpdate,
    ) -> Result<Option<Patient>, StoreError> {
        let mut st = self.state.lock().await;
        let Some(p) = st.patients.iter_mut().find(|p| p.id == id) else {
            return Ok(None);
        };
        p.name = update.name;
        p.phone = update.phone;
        p.dob = update.dob;
        p.gender = update.gender;
        if let Some(address) = update.address {
            p.address = address;
        }
        if let Some(image) = update.image {
            p.image = image;
        }
        Ok(Some(p.clone()))
    }

    async fn create_doctor(&self, new: NewDoctor) -> Result<Doctor, StoreError> {
        let mut st = self.state.lock().await;
        if st.doctors.iter().any(|d| email_eq(&d.email, &new.email)) {
            return Err(StoreError::EmailTaken);
        }
        let doctor = Doctor {
            id: Uuid::new_v4(),
            name: new.name,
            email: new.email,
            password_hash: new.password_hash,
            image: new.image,
            speciality: new.speciality,
            degree: new.degree,
            experience: new.experience,
            about: new.about,
            fees: new.fees,
            address: new.address,
            available: new.available,
            created_at: Utc::now(),
        };
        st.doctors.push(doctor.clone());
        Ok(doctor)
    }

    async fn find_doctor(&self, id: Uuid) -> Result<Option<Doctor>, StoreError> {
        let st = self.state.lock().await;
        Ok(st.doctors.iter().find(|d| d.id == id).cloned())
    }

    async fn find_doctor_by_email(&self, email: &str) -> Result<Option<Doctor>, StoreError> {
        let st = self.state.lock().await;
        Ok(st.doctors.iter().find(|d| email_eq(&d.email, email)).cloned())
    }

    async fn list_doctors(&self) -> Result<Vec<Doctor>, StoreError> {
        let st = self.state.lock().await;
        Ok(st.doctors.clone())
    }

    async fn count_doctors(&self) -> Result<i64, StoreError> {
        let st = self.state.lock().await;
        Ok(st.doctors.len() as i64)
    }

    async fn update_doctor(
        &self,
        id: Uuid,
        update: DoctorUpdate,
    ) -> Result<Option<Doctor>, StoreError> {
        let mut st = self.state.lock().await;
        let Some(d) = st.doctors.iter_mut().find(|d| d.id == id) else {
            return Ok(None);
        };
        if let Some(fees) = update.fees {
            d.fees = fees;
        }
        if let Some(address) = update.address {
            d.address = address;
        }
        if let Some(available) = update.available {
            d.available = available;
        }
        Ok(Some(d.clone()))
    }

    async fn toggle_doctor_availability(&self, id: Uuid) -> Result<Option<Doctor>, StoreError> {
        let mut st = self.state.lock().await;
        let Some(d) = st.doctors.iter_mut().find(|d| d.id == id) else {
            return Ok(None);
        };
        d.available = !d.available;
        Ok(Some(d.clone()))
    }

    async fn insert_appointment(&self, new: NewAppointment) -> Result<Appointment, StoreError> {
        let mut st = self.state.lock().await;

        let doctor = st
            .doctors
            .iter()
            .find(|d| d.id == new.doctor_id)
            .ok_or(StoreError::DoctorNotFound)?;
        if !doctor.available {
            return Err(StoreError::DoctorUnavailable);
        }

        let taken = st.appointments.iter().any(|a| {
            a.is_active()
                && a.doctor_id == new.doctor_id
                && a.slot_date == new.slot_date
                && a.slot_time == new.slot_time
        });
        if taken {
            return Err(StoreError::SlotTaken);
        }

        let appointment = Appointment {
            id: Uuid::new_v4(),
            patient_id: new.patient_id,
            doctor_id: new.doctor_id,
            slot_date: new.slot_date,
            slot_time: new.slot_time,
            patient: new.patient,
            doctor: new.doctor,
            amount: new.amount,
            status: AppointmentStatus::Pending,
            payment: false,
            created_at: Utc::now(),
        };
        st.appointments.push(appointment.clone());
        Ok(appointment)
    }

    async fn find_appointment(&self, id: Uuid) -> Result<Option<Appointment>, StoreError> {
        let st = self.state.lock().await;
        Ok(st.appointments.iter().find(|a| a.id == id).cloned())
    }

    async fn list_appointments(
        &self,
        scope: AppointmentScope,
    ) -> Result<Vec<Appointment>, StoreError> {
        let st = self.state.lock().await;
        Ok(st
            .appointments
            .iter()
            .filter(|a| match scope {
                AppointmentScope::Patient(id) => a.patient_id == id,
                AppointmentScope::Doctor(id) => a.doctor_id == id,
                AppointmentScope::All => true,
            })
            .cloned()
            .collect())
    }

    async fn booked_slots(&self, doctor_id: Uuid) -> Result<SlotsBooked, StoreError> {
        let st = self.state.lock().await;
        Ok(slots_from_appointments(
            st.appointments.iter().filter(|a| a.doctor_id == doctor_id),
        ))
    }

    async fn transition_appointment(
        &self,
        id: Uuid,
        to: AppointmentStatus,
    ) -> Result<Option<Transition>, StoreError> {
        let mut st = self.state.lock().await;
        let Some(a) = st.appointments.iter_mut().find(|a| a.id == id) else {
            return Ok(None);
        };
        let outcome = if a.status == AppointmentStatus::Pending {
            a.status = to;
            Transition::Applied(a.clone())
        } else if a.status == to {
            Transition::Unchanged(a.clone())
        } else {
            Transition::Rejected(a.clone())
        };
        Ok(Some(outcome))
    }

    async fn create_session(&self, new: NewSession) -> Result<Session, StoreError> {
        let mut st = self.state.lock().await;
        let now = Utc::now();
        st.sessions.retain(|s| !s.revoked && s.session.expires_at > now);

        let session = Session {
            session_token_id: Uuid::new_v4(),
            principal_id: new.principal_id,
            role: new.role,
            expires_at: new.expires_at,
        };
        st.sessions.push(StoredSession {
            session: session.clone(),
            token_hash: new.token_hash,
            revoked: false,
        });
        Ok(session)
    }

    async fn find_active_session(&self, token_hash: &str) -> Result<Option<Session>, StoreError> {
        let st = self.state.lock().await;
        let now = Utc::now();
        Ok(st
            .sessions
            .iter()
            .find(|s| s.token_hash == token_hash && !s.revoked && s.session.expires_at > now)
            .map(|s| s.session.clone()))
    }

    async fn revoke_session(&self, session_token_id: Uuid) -> Result<bool, StoreError> {
        let mut st = self.state.lock().await;
        match st
            .sessions
            .iter_mut()
            .find(|s| s.session.session_token_id == session_token_id && !s.revoked)
        {
            Some(s) => {
                s.revoked = true;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}
