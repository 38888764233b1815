//! Patient pipeline status.
//!
//! Status is never written by clients. After each downstream insert the
//! workflow calls [`advance_patient_status`], which feeds the patient's
//! latest records through [`derive_status`] inside the same transaction.

use rusqlite::Connection;
use uuid::Uuid;

use crate::db::repository::{
    get_patient, latest_checkup_for_patient, latest_diagnosis_for_patient,
    latest_prescription_for_patient, update_patient_status,
};
use crate::db::DatabaseError;
use crate::models::enums::PatientStatus;
use crate::models::{Checkup, Diagnosis, Prescription};

impl PatientStatus {
    /// Position in the pipeline, starting at 0 for `Registered`.
    pub fn rank(self) -> u8 {
        match self {
            Self::Registered => 0,
            Self::Checked => 1,
            Self::Diagnosed => 2,
            Self::Prescribed => 3,
        }
    }

    /// The stage directly after this one; `None` at the terminal stage.
    pub fn next(self) -> Option<Self> {
        match self {
            Self::Registered => Some(Self::Checked),
            Self::Checked => Some(Self::Diagnosed),
            Self::Diagnosed => Some(Self::Prescribed),
            Self::Prescribed => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        self.next().is_none()
    }
}

/// Stage evidenced by the furthest record present.
fn evidenced_stage(
    checkup: Option<&Checkup>,
    diagnosis: Option<&Diagnosis>,
    prescription: Option<&Prescription>,
) -> PatientStatus {
    if prescription.is_some() {
        PatientStatus::Prescribed
    } else if diagnosis.is_some() {
        PatientStatus::Diagnosed
    } else if checkup.is_some() {
        PatientStatus::Checked
    } else {
        PatientStatus::Registered
    }
}

/// Compute a patient's status from its current value and latest records.
///
/// Moves exactly one step, and only when the records show the stage right
/// after `current`. Anything else (repeat records, missing records after a
/// cascade delete) leaves `current` as it is, so status never regresses.
pub fn derive_status(
    current: PatientStatus,
    latest_checkup: Option<&Checkup>,
    latest_diagnosis: Option<&Diagnosis>,
    latest_prescription: Option<&Prescription>,
) -> PatientStatus {
    let reached = evidenced_stage(latest_checkup, latest_diagnosis, latest_prescription);
    if current.next() == Some(reached) {
        reached
    } else {
        current
    }
}

/// Re-derive and persist the status of `patient_id`. Returns the status
/// after the call. Must run on the connection (or transaction) that made
/// the triggering insert.
pub fn advance_patient_status(
    conn: &Connection,
    patient_id: &Uuid,
) -> Result<PatientStatus, DatabaseError> {
    let patient = get_patient(conn, patient_id)?.ok_or_else(|| DatabaseError::NotFound {
        entity_type: "Patient".into(),
        id: patient_id.to_string(),
    })?;

    let checkup = latest_checkup_for_patient(conn, patient_id)?;
    let diagnosis = latest_diagnosis_for_patient(conn, patient_id)?;
    let prescription = latest_prescription_for_patient(conn, patient_id)?;

    let next = derive_status(
        patient.status,
        checkup.as_ref(),
        diagnosis.as_ref(),
        prescription.as_ref(),
    );

    if next == patient.status {
        tracing::debug!(patient_id = %patient_id, status = %patient.status, "Status unchanged");
        return Ok(next);
    }

    update_patient_status(conn, patient_id, next)?;
    tracing::info!(
        patient_id = %patient_id,
        from = %patient.status,
        to = %next,
        "Patient status advanced"
    );
    Ok(next)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repository::fixtures::*;
    use crate::db::sqlite::open_memory_database;
    use crate::models::enums::Role;

    fn checkup() -> Checkup {
        Checkup {
            id: Uuid::new_v4(),
            patient_id: Uuid::new_v4(),
            description: "fever".into(),
            checkup_date: ts("2024-03-01 09:00:00"),
            created_by: Uuid::new_v4(),
            created_at: ts("2024-03-01 09:00:00"),
        }
    }

    fn diagnosis() -> Diagnosis {
        Diagnosis {
            id: Uuid::new_v4(),
            checkup_id: Uuid::new_v4(),
            description: "viral infection".into(),
            created_by: Uuid::new_v4(),
            created_at: ts("2024-03-01 10:00:00"),
        }
    }

    fn prescription() -> Prescription {
        Prescription {
            id: Uuid::new_v4(),
            diagnosis_id: Uuid::new_v4(),
            prescription_details: "paracetamol 500mg".into(),
            fulfilled: false,
            fulfilled_datetime: None,
            fulfilled_by: None,
            created_by: Uuid::new_v4(),
            created_at: ts("2024-03-01 11:00:00"),
        }
    }

    #[test]
    fn ordering_helpers() {
        assert_eq!(PatientStatus::Registered.rank(), 0);
        assert_eq!(PatientStatus::Prescribed.rank(), 3);
        assert_eq!(PatientStatus::Checked.next(), Some(PatientStatus::Diagnosed));
        assert!(PatientStatus::Prescribed.is_terminal());
        assert!(!PatientStatus::Diagnosed.is_terminal());
    }

    #[test]
    fn no_records_stays_registered() {
        assert_eq!(
            derive_status(PatientStatus::Registered, None, None, None),
            PatientStatus::Registered
        );
    }

    #[test]
    fn each_stage_advances_one_step() {
        let (c, d, p) = (checkup(), diagnosis(), prescription());
        assert_eq!(
            derive_status(PatientStatus::Registered, Some(&c), None, None),
            PatientStatus::Checked
        );
        assert_eq!(
            derive_status(PatientStatus::Checked, Some(&c), Some(&d), None),
            PatientStatus::Diagnosed
        );
        assert_eq!(
            derive_status(PatientStatus::Diagnosed, Some(&c), Some(&d), Some(&p)),
            PatientStatus::Prescribed
        );
    }

    #[test]
    fn repeat_checkup_is_a_no_op() {
        let c = checkup();
        assert_eq!(
            derive_status(PatientStatus::Checked, Some(&c), None, None),
            PatientStatus::Checked
        );
        let d = diagnosis();
        assert_eq!(
            derive_status(PatientStatus::Diagnosed, Some(&c), Some(&d), None),
            PatientStatus::Diagnosed
        );
    }

    #[test]
    fn never_skips_a_stage() {
        let (c, d) = (checkup(), diagnosis());
        assert_eq!(
            derive_status(PatientStatus::Registered, Some(&c), Some(&d), None),
            PatientStatus::Registered
        );
    }

    #[test]
    fn never_regresses_when_records_disappear() {
        for &status in PatientStatus::all() {
            assert_eq!(derive_status(status, None, None, None), status);
        }
        let c = checkup();
        assert_eq!(
            derive_status(PatientStatus::Prescribed, Some(&c), None, None),
            PatientStatus::Prescribed
        );
    }

    #[test]
    fn advance_persists_transition() {
        let conn = open_memory_database().unwrap();
        let ops = make_profile(&conn, "Front Desk", Role::Operations);
        let patient = make_patient(&conn, ops, "Asha Rao", "2024-03-01 08:00:00");
        assert_eq!(advance_patient_status(&conn, &patient).unwrap(), PatientStatus::Registered);

        make_checkup(&conn, ops, patient, 1);
        assert_eq!(advance_patient_status(&conn, &patient).unwrap(), PatientStatus::Checked);
        assert_eq!(get_patient(&conn, &patient).unwrap().unwrap().status, PatientStatus::Checked);
    }

    #[test]
    fn advance_on_missing_patient_is_not_found() {
        let conn = open_memory_database().unwrap();
        let err = advance_patient_status(&conn, &Uuid::new_v4()).unwrap_err();
        assert!(matches!(err, DatabaseError::NotFound { .. }));
    }
}
