//! Read-side rows: each record joined with its parents and the display
//! names of the actors involved.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::PatientStatus;
use super::{Checkup, Diagnosis, Patient, Prescription};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatientListing {
    pub patient: Patient,
    pub created_by_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckupListing {
    pub checkup: Checkup,
    pub patient_name: String,
    pub patient_status: PatientStatus,
    pub created_by_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiagnosisListing {
    pub diagnosis: Diagnosis,
    pub checkup_description: String,
    pub checkup_date: NaiveDateTime,
    pub patient_id: Uuid,
    pub patient_name: String,
    pub created_by_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrescriptionListing {
    pub prescription: Prescription,
    pub diagnosis_description: String,
    pub patient_id: Uuid,
    pub patient_name: String,
    pub created_by_name: String,
    pub fulfilled_by_name: Option<String>,
}

/// Patient count for one pipeline stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCount {
    pub status: PatientStatus,
    pub count: i64,
}
