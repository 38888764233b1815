use rusqlite::{params, Connection};
use uuid::Uuid;

use super::{format_datetime, parse_datetime, parse_uuid};
use crate::db::DatabaseError;
use crate::models::*;

pub fn insert_diagnosis(conn: &Connection, diag: &Diagnosis) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO diagnoses (id, checkup_id, description, created_by, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            diag.id.to_string(),
            diag.checkup_id.to_string(),
            diag.description,
            diag.created_by.to_string(),
            format_datetime(&diag.created_at),
        ],
    )?;
    Ok(())
}

pub fn get_diagnosis(conn: &Connection, id: &Uuid) -> Result<Option<Diagnosis>, DatabaseError> {
    query_one_diagnosis(
        conn,
        "SELECT id, checkup_id, description, created_by, created_at
         FROM diagnoses WHERE id = ?1",
        id,
    )
}

/// The diagnosis attached to a checkup, if any (the relation is 1:1).
pub fn get_diagnosis_for_checkup(
    conn: &Connection,
    checkup_id: &Uuid,
) -> Result<Option<Diagnosis>, DatabaseError> {
    query_one_diagnosis(
        conn,
        "SELECT id, checkup_id, description, created_by, created_at
         FROM diagnoses WHERE checkup_id = ?1",
        checkup_id,
    )
}

/// Newest diagnosis across all of a patient's checkups.
pub fn latest_diagnosis_for_patient(
    conn: &Connection,
    patient_id: &Uuid,
) -> Result<Option<Diagnosis>, DatabaseError> {
    query_one_diagnosis(
        conn,
        "SELECT d.id, d.checkup_id, d.description, d.created_by, d.created_at
         FROM diagnoses d
         JOIN checkups c ON c.id = d.checkup_id
         WHERE c.patient_id = ?1
         ORDER BY d.created_at DESC, d.rowid DESC LIMIT 1",
        patient_id,
    )
}

/// Resolve the owning patient of a diagnosis (diagnosis → checkup → patient).
pub fn patient_id_for_diagnosis(
    conn: &Connection,
    diagnosis_id: &Uuid,
) -> Result<Option<Uuid>, DatabaseError> {
    let result = conn.query_row(
        "SELECT c.patient_id FROM diagnoses d
         JOIN checkups c ON c.id = d.checkup_id
         WHERE d.id = ?1",
        params![diagnosis_id.to_string()],
        |row| row.get::<_, String>(0),
    );
    match result {
        Ok(id) => Ok(Some(parse_uuid(&id)?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// All diagnoses, newest first, joined with checkup, patient and creator.
pub fn list_diagnosis_rows(conn: &Connection) -> Result<Vec<DiagnosisListing>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT d.id, d.checkup_id, d.description, d.created_by, d.created_at,
                c.description, c.checkup_date, p.id, p.name, pr.name
         FROM diagnoses d
         JOIN checkups c ON c.id = d.checkup_id
         JOIN patients p ON p.id = c.patient_id
         JOIN profiles pr ON pr.id = d.created_by
         ORDER BY d.created_at DESC, d.rowid DESC",
    )?;

    let rows = stmt.query_map([], |row| {
        Ok((
            read_diagnosis_row(row)?,
            row.get::<_, String>(5)?,
            row.get::<_, String>(6)?,
            row.get::<_, String>(7)?,
            row.get::<_, String>(8)?,
            row.get::<_, String>(9)?,
        ))
    })?;

    let mut listings = Vec::new();
    for row in rows {
        let (diag, checkup_description, checkup_date, patient_id, patient_name, created_by_name) =
            row?;
        listings.push(DiagnosisListing {
            diagnosis: diagnosis_from_row(diag)?,
            checkup_description,
            checkup_date: parse_datetime(&checkup_date)?,
            patient_id: parse_uuid(&patient_id)?,
            patient_name,
            created_by_name,
        });
    }
    Ok(listings)
}

type DiagnosisRow = (String, String, String, String, String);

fn read_diagnosis_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<DiagnosisRow> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?))
}

fn diagnosis_from_row(row: DiagnosisRow) -> Result<Diagnosis, DatabaseError> {
    let (id, checkup_id, description, created_by, created_at) = row;
    Ok(Diagnosis {
        id: parse_uuid(&id)?,
        checkup_id: parse_uuid(&checkup_id)?,
        description,
        created_by: parse_uuid(&created_by)?,
        created_at: parse_datetime(&created_at)?,
    })
}

fn query_one_diagnosis(
    conn: &Connection,
    sql: &str,
    key: &Uuid,
) -> Result<Option<Diagnosis>, DatabaseError> {
    match conn.query_row(sql, params![key.to_string()], read_diagnosis_row) {
        Ok(row) => Ok(Some(diagnosis_from_row(row)?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}
