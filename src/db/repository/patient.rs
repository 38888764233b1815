use std::str::FromStr;

use rusqlite::{params, Connection};
use uuid::Uuid;

use super::{format_datetime, parse_datetime, parse_uuid};
use crate::db::DatabaseError;
use crate::models::enums::*;
use crate::models::*;

const PATIENT_COLUMNS: &str = "p.id, p.name, p.gender, p.age, p.status, p.created_by, p.created_at";

pub fn insert_patient(conn: &Connection, patient: &Patient) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO patients (id, name, gender, age, status, created_by, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            patient.id.to_string(),
            patient.name,
            patient.gender.as_str(),
            patient.age,
            patient.status.as_str(),
            patient.created_by.to_string(),
            format_datetime(&patient.created_at),
        ],
    )?;
    Ok(())
}

pub fn get_patient(conn: &Connection, id: &Uuid) -> Result<Option<Patient>, DatabaseError> {
    let sql = format!("SELECT {PATIENT_COLUMNS} FROM patients p WHERE p.id = ?1");
    match conn.query_row(&sql, params![id.to_string()], read_patient_row) {
        Ok(row) => Ok(Some(row.into_patient()?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Persist a derived status. Regressions are refused by the schema trigger.
pub fn update_patient_status(
    conn: &Connection,
    id: &Uuid,
    status: PatientStatus,
) -> Result<(), DatabaseError> {
    let updated = conn.execute(
        "UPDATE patients SET status = ?1 WHERE id = ?2",
        params![status.as_str(), id.to_string()],
    )?;
    if updated == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "Patient".into(),
            id: id.to_string(),
        });
    }
    Ok(())
}

/// All patients, newest first, with the creator's display name.
pub fn list_patient_rows(conn: &Connection) -> Result<Vec<PatientListing>, DatabaseError> {
    let sql = format!(
        "SELECT {PATIENT_COLUMNS}, pr.name
         FROM patients p
         JOIN profiles pr ON pr.id = p.created_by
         ORDER BY p.created_at DESC, p.rowid DESC"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map([], |row| Ok((read_patient_row(row)?, row.get::<_, String>(7)?)))?;

    let mut listings = Vec::new();
    for row in rows {
        let (patient, created_by_name) = row?;
        listings.push(PatientListing {
            patient: patient.into_patient()?,
            created_by_name,
        });
    }
    Ok(listings)
}

/// Patient count per status. Every status appears, zero-filled.
pub fn count_patients_by_status(conn: &Connection) -> Result<Vec<StatusCount>, DatabaseError> {
    let mut stmt = conn.prepare("SELECT status, COUNT(*) FROM patients GROUP BY status")?;
    let counted = stmt
        .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))?
        .collect::<Result<Vec<_>, _>>()?;

    let mut counts: Vec<StatusCount> = PatientStatus::all()
        .iter()
        .map(|&status| StatusCount { status, count: 0 })
        .collect();
    for (status, count) in counted {
        let status = PatientStatus::from_str(&status)?;
        if let Some(slot) = counts.iter_mut().find(|c| c.status == status) {
            slot.count = count;
        }
    }
    Ok(counts)
}

struct PatientRow {
    id: String,
    name: String,
    gender: String,
    age: i32,
    status: String,
    created_by: String,
    created_at: String,
}

/// Reads the seven `PATIENT_COLUMNS` starting at index 0.
fn read_patient_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<PatientRow> {
    Ok(PatientRow {
        id: row.get(0)?,
        name: row.get(1)?,
        gender: row.get(2)?,
        age: row.get(3)?,
        status: row.get(4)?,
        created_by: row.get(5)?,
        created_at: row.get(6)?,
    })
}

impl PatientRow {
    fn into_patient(self) -> Result<Patient, DatabaseError> {
        Ok(Patient {
            id: parse_uuid(&self.id)?,
            name: self.name,
            gender: Gender::from_str(&self.gender)?,
            age: self.age,
            status: PatientStatus::from_str(&self.status)?,
            created_by: parse_uuid(&self.created_by)?,
            created_at: parse_datetime(&self.created_at)?,
        })
    }
}
