//! Clinic workflow operations.
//!
//! Every operation takes the acting profile id explicitly. Writes run in a
//! single `BEGIN IMMEDIATE` transaction covering authorization, validation,
//! parent and uniqueness checks, the insert, the status transition and the
//! audit row. Any error drops the transaction, which rolls everything back.

use chrono::{Duration, NaiveDateTime, SubsecRound, Utc};
use rusqlite::{Connection, Transaction, TransactionBehavior};
use serde_json::json;
use uuid::Uuid;

use crate::authorization::{authorize, AuthorizationError, Operation, Table};
use crate::db::repository;
use crate::db::DatabaseError;
use crate::fulfillment::{guard_prescription_update, GuardError};
use crate::models::enums::{Gender, PatientStatus, Role};
use crate::models::*;
use crate::status::advance_patient_status;

/// Oldest age accepted at registration.
pub const MAX_AGE: i32 = 150;

// ═══════════════════════════════════════════════════════════
// Errors
// ═══════════════════════════════════════════════════════════

#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    #[error("Unknown actor {0}")]
    UnknownActor(Uuid),
    #[error("Role {role} may not {operation} {table}")]
    Unauthorized {
        role: Role,
        table: &'static str,
        operation: &'static str,
    },
    #[error("Invalid input: {0}")]
    Validation(String),
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: Uuid },
    #[error("{0}")]
    Duplicate(String),
    #[error("Prescription {0} is already fulfilled")]
    AlreadyFulfilled(Uuid),
    #[error("Prescription field {0} is immutable")]
    ImmutableField(&'static str),
    #[error("A fulfilled prescription cannot be marked unfulfilled")]
    FulfillmentRevert,
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
}

/// Coarse error classes reported to collaborators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Authorization,
    Validation,
    NotFound,
    Duplicate,
    AlreadyFulfilled,
    Storage,
}

impl ErrorKind {
    /// Stable machine-readable code.
    pub fn code(self) -> &'static str {
        match self {
            Self::Authorization => "AUTHORIZATION_DENIED",
            Self::Validation => "VALIDATION_FAILED",
            Self::NotFound => "NOT_FOUND",
            Self::Duplicate => "DUPLICATE",
            Self::AlreadyFulfilled => "ALREADY_FULFILLED",
            Self::Storage => "STORAGE",
        }
    }
}

impl WorkflowError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::UnknownActor(_) | Self::Unauthorized { .. } => ErrorKind::Authorization,
            Self::Validation(_) => ErrorKind::Validation,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::Duplicate(_) => ErrorKind::Duplicate,
            Self::AlreadyFulfilled(_) | Self::ImmutableField(_) | Self::FulfillmentRevert => {
                ErrorKind::AlreadyFulfilled
            }
            Self::Database(_) => ErrorKind::Storage,
        }
    }
}

impl WorkflowError {
    fn not_found(entity: &'static str, id: &Uuid) -> Self {
        Self::NotFound { entity, id: *id }
    }
}

impl From<AuthorizationError> for WorkflowError {
    fn from(err: AuthorizationError) -> Self {
        match err {
            AuthorizationError::Database(e) => Self::Database(e),
            AuthorizationError::UnknownActor(id) => Self::UnknownActor(id),
            AuthorizationError::Forbidden {
                role,
                table,
                operation,
            } => Self::Unauthorized {
                role,
                table,
                operation,
            },
        }
    }
}

impl From<GuardError> for WorkflowError {
    fn from(err: GuardError) -> Self {
        match err {
            GuardError::NotPharmacist(role) => Self::Unauthorized {
                role,
                table: Table::Prescriptions.as_str(),
                operation: Operation::Update.as_str(),
            },
            GuardError::ImmutableField(field) => Self::ImmutableField(field),
            GuardError::AlreadyFulfilled(id) => Self::AlreadyFulfilled(id),
            GuardError::FulfillmentRevert => Self::FulfillmentRevert,
        }
    }
}

// ═══════════════════════════════════════════════════════════
// Helpers
// ═══════════════════════════════════════════════════════════

/// Current UTC time at the precision the store keeps (microseconds).
fn now() -> NaiveDateTime {
    Utc::now().naive_utc().trunc_subsecs(6)
}

fn begin(conn: &Connection) -> Result<Transaction<'_>, WorkflowError> {
    Transaction::new_unchecked(conn, TransactionBehavior::Immediate)
        .map_err(|e| WorkflowError::Database(e.into()))
}

fn commit(tx: Transaction<'_>) -> Result<(), WorkflowError> {
    tx.commit().map_err(|e| WorkflowError::Database(e.into()))
}

fn require_text(field: &str, value: &str) -> Result<String, WorkflowError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(WorkflowError::Validation(format!("{field} is required")));
    }
    Ok(trimmed.to_string())
}

/// Translate constraint failures raised by SQLite itself. The pre-checks
/// normally catch these first; this covers writers racing on the same row.
fn classify_insert_error(
    err: DatabaseError,
    duplicate: impl FnOnce() -> String,
    missing: impl FnOnce() -> WorkflowError,
) -> WorkflowError {
    if err.is_unique_violation() {
        WorkflowError::Duplicate(duplicate())
    } else if err.is_foreign_key_violation() {
        missing()
    } else {
        WorkflowError::Database(err)
    }
}

fn audit_insert(
    conn: &Connection,
    at: &NaiveDateTime,
    actor: &Profile,
    table: Table,
    entity_id: &Uuid,
    detail: serde_json::Value,
) -> Result<(), DatabaseError> {
    repository::insert_audit_entry(
        conn,
        at,
        &actor.id,
        "insert",
        table.as_str(),
        entity_id,
        Some(&detail),
    )
}

// ═══════════════════════════════════════════════════════════
// Profiles (called by the authentication collaborator)
// ═══════════════════════════════════════════════════════════

pub fn register_profile(
    conn: &Connection,
    name: &str,
    role: Role,
) -> Result<Profile, WorkflowError> {
    let profile = Profile {
        id: Uuid::new_v4(),
        name: require_text("name", name)?,
        role,
        created_at: now(),
    };
    repository::insert_profile(conn, &profile)?;
    tracing::info!(profile_id = %profile.id, role = %role, "Profile registered");
    Ok(profile)
}

pub fn change_profile_role(
    conn: &Connection,
    profile_id: &Uuid,
    role: Role,
) -> Result<Profile, WorkflowError> {
    match repository::update_profile_role(conn, profile_id, role) {
        Err(DatabaseError::NotFound { .. }) => {
            return Err(WorkflowError::not_found("Profile", profile_id))
        }
        other => other?,
    }
    tracing::info!(profile_id = %profile_id, role = %role, "Profile role changed");
    repository::get_profile(conn, profile_id)?
        .ok_or(WorkflowError::not_found("Profile", profile_id))
}

// ═══════════════════════════════════════════════════════════
// Inserts
// ═══════════════════════════════════════════════════════════

pub fn create_patient(
    conn: &Connection,
    name: &str,
    gender: Gender,
    age: i32,
    actor_id: &Uuid,
) -> Result<Patient, WorkflowError> {
    let tx = begin(conn)?;
    let actor = authorize(&tx, actor_id, Table::Patients, Operation::Insert)?;

    let name = require_text("name", name)?;
    if !(0..=MAX_AGE).contains(&age) {
        return Err(WorkflowError::Validation(format!(
            "age must be between 0 and {MAX_AGE}, got {age}"
        )));
    }

    let created_at = now();
    let patient = Patient {
        id: Uuid::new_v4(),
        name,
        gender,
        age,
        status: PatientStatus::Registered,
        created_by: actor.id,
        created_at,
    };
    repository::insert_patient(&tx, &patient)?;
    audit_insert(
        &tx,
        &created_at,
        &actor,
        Table::Patients,
        &patient.id,
        json!({ "name": patient.name, "gender": gender.as_str(), "age": age }),
    )?;
    commit(tx)?;

    tracing::info!(patient_id = %patient.id, actor_id = %actor.id, "Patient registered");
    Ok(patient)
}

/// Record a checkup taken now.
///
/// Checkups are keyed on the instant they were taken, so a follow-up for the
/// same patient is always a new row. Only the first one moves the patient
/// from `registered` to `checked`.
pub fn create_checkup(
    conn: &Connection,
    patient_id: &Uuid,
    description: &str,
    actor_id: &Uuid,
) -> Result<Checkup, WorkflowError> {
    create_checkup_at(conn, patient_id, description, None, actor_id)
}

/// Record a checkup taken at an explicit UTC instant (back-entry of paper
/// records). Two checkups for one patient at the same instant are duplicates.
pub fn create_checkup_on(
    conn: &Connection,
    patient_id: &Uuid,
    description: &str,
    taken_at: NaiveDateTime,
    actor_id: &Uuid,
) -> Result<Checkup, WorkflowError> {
    let taken_at = taken_at.trunc_subsecs(6);
    create_checkup_at(conn, patient_id, description, Some(taken_at), actor_id)
}

fn create_checkup_at(
    conn: &Connection,
    patient_id: &Uuid,
    description: &str,
    taken_at: Option<NaiveDateTime>,
    actor_id: &Uuid,
) -> Result<Checkup, WorkflowError> {
    let tx = begin(conn)?;
    let actor = authorize(&tx, actor_id, Table::Checkups, Operation::Insert)?;
    let description = require_text("description", description)?;

    let missing = || WorkflowError::not_found("Patient", patient_id);
    repository::get_patient(&tx, patient_id)?.ok_or_else(missing)?;

    let created_at = now();
    let checkup_date = match taken_at {
        Some(taken_at) => {
            if repository::checkup_exists_at(&tx, patient_id, &taken_at)? {
                return Err(WorkflowError::Duplicate(format!(
                    "Patient {patient_id} already has a checkup at {taken_at}"
                )));
            }
            taken_at
        }
        None => next_free_instant(&tx, patient_id, created_at)?,
    };
    let duplicate = || format!("Patient {patient_id} already has a checkup at {checkup_date}");

    let checkup = Checkup {
        id: Uuid::new_v4(),
        patient_id: *patient_id,
        description,
        checkup_date,
        created_by: actor.id,
        created_at,
    };
    repository::insert_checkup(&tx, &checkup)
        .map_err(|e| classify_insert_error(e, duplicate, missing))?;
    let status = advance_patient_status(&tx, patient_id)?;
    audit_insert(
        &tx,
        &created_at,
        &actor,
        Table::Checkups,
        &checkup.id,
        json!({
            "patient_id": patient_id,
            "checkup_date": repository::format_datetime(&checkup_date),
            "status": status.as_str(),
        }),
    )?;
    commit(tx)?;

    tracing::info!(checkup_id = %checkup.id, patient_id = %patient_id, "Checkup recorded");
    Ok(checkup)
}

/// First instant at or after `from` with no checkup for the patient. Two
/// follow-ups inside one microsecond land one tick apart.
fn next_free_instant(
    conn: &Connection,
    patient_id: &Uuid,
    from: NaiveDateTime,
) -> Result<NaiveDateTime, WorkflowError> {
    let mut instant = from;
    while repository::checkup_exists_at(conn, patient_id, &instant)? {
        instant += Duration::microseconds(1);
    }
    Ok(instant)
}

pub fn create_diagnosis(
    conn: &Connection,
    checkup_id: &Uuid,
    description: &str,
    actor_id: &Uuid,
) -> Result<Diagnosis, WorkflowError> {
    let tx = begin(conn)?;
    let actor = authorize(&tx, actor_id, Table::Diagnoses, Operation::Insert)?;
    let description = require_text("description", description)?;

    let missing = || WorkflowError::not_found("Checkup", checkup_id);
    let checkup = repository::get_checkup(&tx, checkup_id)?.ok_or_else(missing)?;

    let duplicate = || format!("Checkup {checkup_id} is already diagnosed");
    if repository::get_diagnosis_for_checkup(&tx, checkup_id)?.is_some() {
        return Err(WorkflowError::Duplicate(duplicate()));
    }

    let created_at = now();
    let diagnosis = Diagnosis {
        id: Uuid::new_v4(),
        checkup_id: *checkup_id,
        description,
        created_by: actor.id,
        created_at,
    };
    repository::insert_diagnosis(&tx, &diagnosis)
        .map_err(|e| classify_insert_error(e, duplicate, missing))?;
    let status = advance_patient_status(&tx, &checkup.patient_id)?;
    audit_insert(
        &tx,
        &created_at,
        &actor,
        Table::Diagnoses,
        &diagnosis.id,
        json!({
            "checkup_id": checkup_id,
            "patient_id": checkup.patient_id,
            "status": status.as_str(),
        }),
    )?;
    commit(tx)?;

    tracing::info!(diagnosis_id = %diagnosis.id, checkup_id = %checkup_id, "Diagnosis recorded");
    Ok(diagnosis)
}

pub fn create_prescription(
    conn: &Connection,
    diagnosis_id: &Uuid,
    details: &str,
    actor_id: &Uuid,
) -> Result<Prescription, WorkflowError> {
    let tx = begin(conn)?;
    let actor = authorize(&tx, actor_id, Table::Prescriptions, Operation::Insert)?;
    let details = require_text("prescription_details", details)?;

    let missing = || WorkflowError::not_found("Diagnosis", diagnosis_id);
    let patient_id = repository::patient_id_for_diagnosis(&tx, diagnosis_id)?.ok_or_else(missing)?;

    let duplicate = || format!("Diagnosis {diagnosis_id} already has a prescription");
    if repository::get_prescription_for_diagnosis(&tx, diagnosis_id)?.is_some() {
        return Err(WorkflowError::Duplicate(duplicate()));
    }

    let created_at = now();
    let prescription = Prescription {
        id: Uuid::new_v4(),
        diagnosis_id: *diagnosis_id,
        prescription_details: details,
        fulfilled: false,
        fulfilled_datetime: None,
        fulfilled_by: None,
        created_by: actor.id,
        created_at,
    };
    repository::insert_prescription(&tx, &prescription)
        .map_err(|e| classify_insert_error(e, duplicate, missing))?;
    let status = advance_patient_status(&tx, &patient_id)?;
    audit_insert(
        &tx,
        &created_at,
        &actor,
        Table::Prescriptions,
        &prescription.id,
        json!({
            "diagnosis_id": diagnosis_id,
            "patient_id": patient_id,
            "status": status.as_str(),
        }),
    )?;
    commit(tx)?;

    tracing::info!(
        prescription_id = %prescription.id,
        diagnosis_id = %diagnosis_id,
        "Prescription recorded"
    );
    Ok(prescription)
}

// ═══════════════════════════════════════════════════════════
// Prescription updates
// ═══════════════════════════════════════════════════════════

/// Mark a prescription as dispensed by the acting pharmacist.
pub fn fulfill_prescription(
    conn: &Connection,
    prescription_id: &Uuid,
    actor_id: &Uuid,
) -> Result<Prescription, WorkflowError> {
    let tx = begin(conn)?;
    let actor = authorize(&tx, actor_id, Table::Prescriptions, Operation::Update)?;

    let existing = repository::get_prescription(&tx, prescription_id)?
        .ok_or(WorkflowError::not_found("Prescription", prescription_id))?;

    let proposed = Prescription {
        fulfilled: true,
        ..existing.clone()
    };
    let stored = write_guarded_update(&tx, &existing, &proposed, &actor)?;
    commit(tx)?;
    Ok(stored)
}

/// Apply a client-proposed prescription row. Only the fulfillment flip is
/// accepted; see [`guard_prescription_update`].
pub fn update_prescription(
    conn: &Connection,
    proposed: &Prescription,
    actor_id: &Uuid,
) -> Result<Prescription, WorkflowError> {
    let tx = begin(conn)?;
    let actor = authorize(&tx, actor_id, Table::Prescriptions, Operation::Update)?;

    let existing = repository::get_prescription(&tx, &proposed.id)?
        .ok_or(WorkflowError::not_found("Prescription", &proposed.id))?;

    let stored = write_guarded_update(&tx, &existing, proposed, &actor)?;
    commit(tx)?;
    Ok(stored)
}

fn write_guarded_update(
    conn: &Connection,
    existing: &Prescription,
    proposed: &Prescription,
    actor: &Profile,
) -> Result<Prescription, WorkflowError> {
    let at = now();
    let stored = guard_prescription_update(existing, proposed, actor, at)?;
    if &stored == existing {
        tracing::debug!(prescription_id = %existing.id, "Prescription update is a no-op");
        return Ok(stored);
    }

    repository::update_prescription_fulfillment(conn, &stored)?;
    repository::insert_audit_entry(
        conn,
        &at,
        &actor.id,
        "update",
        Table::Prescriptions.as_str(),
        &stored.id,
        Some(&json!({ "fulfilled": stored.fulfilled })),
    )?;
    tracing::info!(
        prescription_id = %stored.id,
        pharmacist_id = %actor.id,
        "Prescription fulfilled"
    );
    Ok(stored)
}

// ═══════════════════════════════════════════════════════════
// Reads
// ═══════════════════════════════════════════════════════════

pub fn get_patient(
    conn: &Connection,
    patient_id: &Uuid,
    actor_id: &Uuid,
) -> Result<Patient, WorkflowError> {
    authorize(conn, actor_id, Table::Patients, Operation::Select)?;
    repository::get_patient(conn, patient_id)?
        .ok_or(WorkflowError::not_found("Patient", patient_id))
}

pub fn list_patients(
    conn: &Connection,
    actor_id: &Uuid,
) -> Result<Vec<PatientListing>, WorkflowError> {
    authorize(conn, actor_id, Table::Patients, Operation::Select)?;
    Ok(repository::list_patient_rows(conn)?)
}

pub fn list_checkups(
    conn: &Connection,
    actor_id: &Uuid,
) -> Result<Vec<CheckupListing>, WorkflowError> {
    authorize(conn, actor_id, Table::Checkups, Operation::Select)?;
    Ok(repository::list_checkup_rows(conn)?)
}

pub fn list_diagnoses(
    conn: &Connection,
    actor_id: &Uuid,
) -> Result<Vec<DiagnosisListing>, WorkflowError> {
    authorize(conn, actor_id, Table::Diagnoses, Operation::Select)?;
    Ok(repository::list_diagnosis_rows(conn)?)
}

pub fn list_prescriptions(
    conn: &Connection,
    actor_id: &Uuid,
) -> Result<Vec<PrescriptionListing>, WorkflowError> {
    authorize(conn, actor_id, Table::Prescriptions, Operation::Select)?;
    Ok(repository::list_prescription_rows(conn)?)
}

pub fn status_summary(
    conn: &Connection,
    actor_id: &Uuid,
) -> Result<Vec<StatusCount>, WorkflowError> {
    authorize(conn, actor_id, Table::Patients, Operation::Select)?;
    Ok(repository::count_patients_by_status(conn)?)
}

/// Audit entries written by `subject_id`, newest first. Any authenticated
/// actor may read them.
pub fn audit_trail_for_actor(
    conn: &Connection,
    actor_id: &Uuid,
    subject_id: &Uuid,
) -> Result<Vec<AuditEntry>, WorkflowError> {
    repository::get_profile(conn, actor_id)?.ok_or(WorkflowError::UnknownActor(*actor_id))?;
    Ok(repository::query_audit_by_actor(conn, subject_id)?)
}

// ═══════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════
