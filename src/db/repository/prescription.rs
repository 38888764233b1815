use rusqlite::{params, Connection};
use uuid::Uuid;

use super::{format_datetime, parse_datetime, parse_uuid};
use crate::db::DatabaseError;
use crate::models::*;

const PRESCRIPTION_COLUMNS: &str = "rx.id, rx.diagnosis_id, rx.prescription_details, rx.fulfilled,
    rx.fulfilled_datetime, rx.fulfilled_by, rx.created_by, rx.created_at";

pub fn insert_prescription(conn: &Connection, rx: &Prescription) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO prescriptions (id, diagnosis_id, prescription_details, fulfilled,
         fulfilled_datetime, fulfilled_by, created_by, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            rx.id.to_string(),
            rx.diagnosis_id.to_string(),
            rx.prescription_details,
            rx.fulfilled as i32,
            rx.fulfilled_datetime.as_ref().map(format_datetime),
            rx.fulfilled_by.map(|id| id.to_string()),
            rx.created_by.to_string(),
            format_datetime(&rx.created_at),
        ],
    )?;
    Ok(())
}

pub fn get_prescription(
    conn: &Connection,
    id: &Uuid,
) -> Result<Option<Prescription>, DatabaseError> {
    let sql = format!("SELECT {PRESCRIPTION_COLUMNS} FROM prescriptions rx WHERE rx.id = ?1");
    query_one_prescription(conn, &sql, id)
}

/// The prescription attached to a diagnosis, if any (the relation is 1:1).
pub fn get_prescription_for_diagnosis(
    conn: &Connection,
    diagnosis_id: &Uuid,
) -> Result<Option<Prescription>, DatabaseError> {
    let sql =
        format!("SELECT {PRESCRIPTION_COLUMNS} FROM prescriptions rx WHERE rx.diagnosis_id = ?1");
    query_one_prescription(conn, &sql, diagnosis_id)
}

/// Newest prescription across the patient's diagnoses.
pub fn latest_prescription_for_patient(
    conn: &Connection,
    patient_id: &Uuid,
) -> Result<Option<Prescription>, DatabaseError> {
    let sql = format!(
        "SELECT {PRESCRIPTION_COLUMNS}
         FROM prescriptions rx
         JOIN diagnoses d ON d.id = rx.diagnosis_id
         JOIN checkups c ON c.id = d.checkup_id
         WHERE c.patient_id = ?1
         ORDER BY rx.created_at DESC, rx.rowid DESC LIMIT 1"
    );
    query_one_prescription(conn, &sql, patient_id)
}

/// Write the fulfillment columns. Every other column is left untouched.
pub fn update_prescription_fulfillment(
    conn: &Connection,
    rx: &Prescription,
) -> Result<(), DatabaseError> {
    let updated = conn.execute(
        "UPDATE prescriptions SET fulfilled = ?1, fulfilled_datetime = ?2, fulfilled_by = ?3
         WHERE id = ?4",
        params![
            rx.fulfilled as i32,
            rx.fulfilled_datetime.as_ref().map(format_datetime),
            rx.fulfilled_by.map(|id| id.to_string()),
            rx.id.to_string(),
        ],
    )?;
    if updated == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "Prescription".into(),
            id: rx.id.to_string(),
        });
    }
    Ok(())
}

/// All prescriptions, newest first, joined up to the patient.
pub fn list_prescription_rows(
    conn: &Connection,
) -> Result<Vec<PrescriptionListing>, DatabaseError> {
    let sql = format!(
        "SELECT {PRESCRIPTION_COLUMNS}, d.description, p.id, p.name, creator.name, fulfiller.name
         FROM prescriptions rx
         JOIN diagnoses d ON d.id = rx.diagnosis_id
         JOIN checkups c ON c.id = d.checkup_id
         JOIN patients p ON p.id = c.patient_id
         JOIN profiles creator ON creator.id = rx.created_by
         LEFT JOIN profiles fulfiller ON fulfiller.id = rx.fulfilled_by
         ORDER BY rx.created_at DESC, rx.rowid DESC"
    );
    let mut stmt = conn.prepare(&sql)?;

    let rows = stmt.query_map([], |row| {
        Ok((
            read_prescription_row(row)?,
            row.get::<_, String>(8)?,
            row.get::<_, String>(9)?,
            row.get::<_, String>(10)?,
            row.get::<_, String>(11)?,
            row.get::<_, Option<String>>(12)?,
        ))
    })?;

    let mut listings = Vec::new();
    for row in rows {
        let (
            rx,
            diagnosis_description,
            patient_id,
            patient_name,
            created_by_name,
            fulfilled_by_name,
        ) = row?;
        listings.push(PrescriptionListing {
            prescription: rx.into_prescription()?,
            diagnosis_description,
            patient_id: parse_uuid(&patient_id)?,
            patient_name,
            created_by_name,
            fulfilled_by_name,
        });
    }
    Ok(listings)
}

struct PrescriptionRow {
    id: String,
    diagnosis_id: String,
    details: String,
    fulfilled: bool,
    fulfilled_datetime: Option<String>,
    fulfilled_by: Option<String>,
    created_by: String,
    created_at: String,
}

fn read_prescription_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<PrescriptionRow> {
    Ok(PrescriptionRow {
        id: row.get(0)?,
        diagnosis_id: row.get(1)?,
        details: row.get(2)?,
        fulfilled: row.get::<_, i32>(3)? != 0,
        fulfilled_datetime: row.get(4)?,
        fulfilled_by: row.get(5)?,
        created_by: row.get(6)?,
        created_at: row.get(7)?,
    })
}

impl PrescriptionRow {
    fn into_prescription(self) -> Result<Prescription, DatabaseError> {
        Ok(Prescription {
            id: parse_uuid(&self.id)?,
            diagnosis_id: parse_uuid(&self.diagnosis_id)?,
            prescription_details: self.details,
            fulfilled: self.fulfilled,
            fulfilled_datetime: self.fulfilled_datetime.as_deref().map(parse_datetime).transpose()?,
            fulfilled_by: self.fulfilled_by.as_deref().map(parse_uuid).transpose()?,
            created_by: parse_uuid(&self.created_by)?,
            created_at: parse_datetime(&self.created_at)?,
        })
    }
}

fn query_one_prescription(
    conn: &Connection,
    sql: &str,
    key: &Uuid,
) -> Result<Option<Prescription>, DatabaseError> {
    match conn.query_row(sql, params![key.to_string()], read_prescription_row) {
        Ok(row) => Ok(Some(row.into_prescription()?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}
