use std::str::FromStr;

use chrono::NaiveDateTime;
use rusqlite::{params, Connection};
use uuid::Uuid;

use super::{format_datetime, parse_datetime, parse_uuid};
use crate::db::DatabaseError;
use crate::models::enums::PatientStatus;
use crate::models::*;

pub fn insert_checkup(conn: &Connection, checkup: &Checkup) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO checkups (id, patient_id, description, checkup_date, created_by, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            checkup.id.to_string(),
            checkup.patient_id.to_string(),
            checkup.description,
            format_datetime(&checkup.checkup_date),
            checkup.created_by.to_string(),
            format_datetime(&checkup.created_at),
        ],
    )?;
    Ok(())
}

pub fn get_checkup(conn: &Connection, id: &Uuid) -> Result<Option<Checkup>, DatabaseError> {
    query_one_checkup(
        conn,
        "SELECT id, patient_id, description, checkup_date, created_by, created_at
         FROM checkups WHERE id = ?1",
        &id.to_string(),
    )
}

/// Whether the patient already has a checkup recorded at exactly `taken_at`.
pub fn checkup_exists_at(
    conn: &Connection,
    patient_id: &Uuid,
    taken_at: &NaiveDateTime,
) -> Result<bool, DatabaseError> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM checkups WHERE patient_id = ?1 AND checkup_date = ?2",
        params![patient_id.to_string(), format_datetime(taken_at)],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

pub fn latest_checkup_for_patient(
    conn: &Connection,
    patient_id: &Uuid,
) -> Result<Option<Checkup>, DatabaseError> {
    query_one_checkup(
        conn,
        "SELECT id, patient_id, description, checkup_date, created_by, created_at
         FROM checkups WHERE patient_id = ?1
         ORDER BY created_at DESC, rowid DESC LIMIT 1",
        &patient_id.to_string(),
    )
}

/// All checkups, newest first, joined with the patient and creator.
pub fn list_checkup_rows(conn: &Connection) -> Result<Vec<CheckupListing>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT c.id, c.patient_id, c.description, c.checkup_date, c.created_by, c.created_at,
                p.name, p.status, pr.name
         FROM checkups c
         JOIN patients p ON p.id = c.patient_id
         JOIN profiles pr ON pr.id = c.created_by
         ORDER BY c.created_at DESC, c.rowid DESC",
    )?;

    let rows = stmt.query_map([], |row| {
        Ok((
            read_checkup_row(row)?,
            row.get::<_, String>(6)?,
            row.get::<_, String>(7)?,
            row.get::<_, String>(8)?,
        ))
    })?;

    let mut listings = Vec::new();
    for row in rows {
        let (checkup, patient_name, patient_status, created_by_name) = row?;
        listings.push(CheckupListing {
            checkup: checkup_from_row(checkup)?,
            patient_name,
            patient_status: PatientStatus::from_str(&patient_status)?,
            created_by_name,
        });
    }
    Ok(listings)
}

type CheckupRow = (String, String, String, String, String, String);

fn read_checkup_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<CheckupRow> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
    ))
}

fn checkup_from_row(row: CheckupRow) -> Result<Checkup, DatabaseError> {
    let (id, patient_id, description, checkup_date, created_by, created_at) = row;
    Ok(Checkup {
        id: parse_uuid(&id)?,
        patient_id: parse_uuid(&patient_id)?,
        description,
        checkup_date: parse_datetime(&checkup_date)?,
        created_by: parse_uuid(&created_by)?,
        created_at: parse_datetime(&created_at)?,
    })
}

fn query_one_checkup(
    conn: &Connection,
    sql: &str,
    key: &str,
) -> Result<Option<Checkup>, DatabaseError> {
    match conn.query_row(sql, params![key], read_checkup_row) {
        Ok(row) => Ok(Some(checkup_from_row(row)?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repository::fixtures::*;
    use crate::db::sqlite::open_memory_database;
    use crate::models::enums::Role;

    #[test]
    fn checkup_insert_and_retrieve() {
        let conn = open_memory_database().unwrap();
        let ops = make_profile(&conn, "Front Desk", Role::Operations);
        let patient = make_patient(&conn, ops, "Asha Rao", "2024-03-01 08:00:00");
        let id = make_checkup(&conn, ops, patient, 1);

        let checkup = get_checkup(&conn, &id).unwrap().unwrap();
        assert_eq!(checkup.patient_id, patient);
        assert_eq!(checkup.description, "fever, headache");
        assert_eq!(checkup.checkup_date, ts("2024-03-01 09:00:00"));
    }

    #[test]
    fn one_checkup_per_patient_per_instant() {
        let conn = open_memory_database().unwrap();
        let ops = make_profile(&conn, "Front Desk", Role::Operations);
        let patient = make_patient(&conn, ops, "Asha Rao", "2024-03-01 08:00:00");
        make_checkup(&conn, ops, patient, 1);

        let taken = ts("2024-03-01 09:00:00");
        assert!(checkup_exists_at(&conn, &patient, &taken).unwrap());

        let mut follow_up = Checkup {
            id: Uuid::new_v4(),
            patient_id: patient,
            description: "follow-up".into(),
            checkup_date: taken,
            created_by: ops,
            created_at: ts("2024-03-01 15:00:00"),
        };
        let err = insert_checkup(&conn, &follow_up).unwrap_err();
        assert!(err.is_unique_violation());

        // Later the same day is a separate checkup.
        follow_up.checkup_date = ts("2024-03-01 15:00:00");
        insert_checkup(&conn, &follow_up).unwrap();
        assert!(!checkup_exists_at(&conn, &patient, &ts("2024-03-01 12:00:00")).unwrap());
    }

    #[test]
    fn latest_checkup_picks_newest() {
        let conn = open_memory_database().unwrap();
        let ops = make_profile(&conn, "Front Desk", Role::Operations);
        let patient = make_patient(&conn, ops, "Asha Rao", "2024-03-01 08:00:00");
        make_checkup(&conn, ops, patient, 1);
        let newer = make_checkup(&conn, ops, patient, 5);

        let latest = latest_checkup_for_patient(&conn, &patient).unwrap().unwrap();
        assert_eq!(latest.id, newer);
        let other = make_patient(&conn, ops, "Nobody", "2024-03-01 08:00:00");
        assert!(latest_checkup_for_patient(&conn, &other).unwrap().is_none());
    }

    #[test]
    fn deleting_patient_cascades_to_checkups() {
        let conn = open_memory_database().unwrap();
        let ops = make_profile(&conn, "Front Desk", Role::Operations);
        let patient = make_patient(&conn, ops, "Asha Rao", "2024-03-01 08:00:00");
        let checkup = make_checkup(&conn, ops, patient, 1);

        conn.execute("DELETE FROM patients WHERE id = ?1", params![patient.to_string()])
            .unwrap();
        assert!(get_checkup(&conn, &checkup).unwrap().is_none());
    }

    #[test]
    fn listing_joins_patient() {
        let conn = open_memory_database().unwrap();
        let ops = make_profile(&conn, "Front Desk", Role::Operations);
        let patient = make_patient(&conn, ops, "Asha Rao", "2024-03-01 08:00:00");
        make_checkup(&conn, ops, patient, 1);
        make_checkup(&conn, ops, patient, 2);

        let rows = list_checkup_rows(&conn).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].checkup.checkup_date, ts("2024-03-02 09:00:00"));
        assert_eq!(rows[0].patient_name, "Asha Rao");
        assert_eq!(rows[0].patient_status, PatientStatus::Registered);
        assert_eq!(rows[1].created_by_name, "Front Desk");
    }
}
