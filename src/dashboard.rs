use std::collections::HashSet;

use serde::Serialize;

use crate::models::Appointment;

pub const LATEST_APPOINTMENTS: usize = 5;

/// Which panel the summary is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DashScope {
    Doctor,
    Admin { doctors: i64 },
}

/// Newest appointments, keyed the way each panel reads them: the doctor
/// panel expects `latestAppointment`, the admin panel `latestAppointments`.
#[derive(Debug, Serialize)]
pub enum LatestAppointments {
    #[serde(rename = "latestAppointment")]
    Doctor(Vec<Appointment>),
    #[serde(rename = "latestAppointments")]
    Admin(Vec<Appointment>),
}

impl LatestAppointments {
    pub fn as_slice(&self) -> &[Appointment] {
        match self {
            LatestAppointments::Doctor(v) | LatestAppointments::Admin(v) => v,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct DashData {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub doctors: Option<i64>,
    pub earnings: f64,
    pub appointments: usize,
    pub patients: usize,
    #[serde(flatten)]
    pub latest: LatestAppointments,
}

/// Summarizes appointments given in booking order.
pub fn summarize(appointments: &[Appointment], scope: DashScope) -> DashData {
    let earnings: f64 = appointments
        .iter()
        .filter(|a| a.is_completed() || a.payment)
        .map(|a| a.amount)
        .sum();

    let patients = appointments
        .iter()
        .map(|a| a.patient_id)
        .collect::<HashSet<_>>()
        .len();

    let newest: Vec<Appointment> = appointments
        .iter()
        .rev()
        .take(LATEST_APPOINTMENTS)
        .cloned()
        .collect();

    let (doctors, latest) = match scope {
        DashScope::Doctor => (None, LatestAppointments::Doctor(newest)),
        DashScope::Admin { doctors } => (Some(doctors), LatestAppointments::Admin(newest)),
    };

    DashData {
        doctors,
        earnings,
        appointments: appointments.len(),
        patients,
        latest,
    }
}
