use std::str::FromStr;

use rusqlite::{params, Connection};
use uuid::Uuid;

use super::{format_datetime, parse_datetime, parse_uuid};
use crate::db::DatabaseError;
use crate::models::enums::Role;
use crate::models::*;

pub fn insert_profile(conn: &Connection, profile: &Profile) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO profiles (id, name, role, created_at) VALUES (?1, ?2, ?3, ?4)",
        params![
            profile.id.to_string(),
            profile.name,
            profile.role.as_str(),
            format_datetime(&profile.created_at),
        ],
    )?;
    Ok(())
}

pub fn get_profile(conn: &Connection, id: &Uuid) -> Result<Option<Profile>, DatabaseError> {
    let result = conn.query_row(
        "SELECT id, name, role, created_at FROM profiles WHERE id = ?1",
        params![id.to_string()],
        |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
            ))
        },
    );

    match result {
        Ok((id, name, role, created_at)) => Ok(Some(Profile {
            id: parse_uuid(&id)?,
            name,
            role: Role::from_str(&role)?,
            created_at: parse_datetime(&created_at)?,
        })),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Role is the only mutable profile column.
pub fn update_profile_role(conn: &Connection, id: &Uuid, role: Role) -> Result<(), DatabaseError> {
    let updated = conn.execute(
        "UPDATE profiles SET role = ?1 WHERE id = ?2",
        params![role.as_str(), id.to_string()],
    )?;
    if updated == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "Profile".into(),
            id: id.to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repository::fixtures::*;
    use crate::db::sqlite::open_memory_database;

    #[test]
    fn profile_insert_and_retrieve() {
        let conn = open_memory_database().unwrap();
        let id = make_profile(&conn, "Dr. Mehta", Role::Doctor);
        let profile = get_profile(&conn, &id).unwrap().unwrap();
        assert_eq!(profile.name, "Dr. Mehta");
        assert_eq!(profile.role, Role::Doctor);
    }

    #[test]
    fn missing_profile_is_none() {
        let conn = open_memory_database().unwrap();
        assert!(get_profile(&conn, &Uuid::new_v4()).unwrap().is_none());
    }

    #[test]
    fn role_update_persists() {
        let conn = open_memory_database().unwrap();
        let id = make_profile(&conn, "Sam", Role::Operations);
        update_profile_role(&conn, &id, Role::Pharmacist).unwrap();
        assert_eq!(get_profile(&conn, &id).unwrap().unwrap().role, Role::Pharmacist);
    }

    #[test]
    fn role_update_on_missing_profile_is_not_found() {
        let conn = open_memory_database().unwrap();
        let err = update_profile_role(&conn, &Uuid::new_v4(), Role::Doctor).unwrap_err();
        assert!(matches!(err, DatabaseError::NotFound { .. }));
    }

    #[test]
    fn unknown_role_rejected_by_schema() {
        let conn = open_memory_database().unwrap();
        let result = conn.execute(
            "INSERT INTO profiles (id, name, role, created_at)
             VALUES ('x', 'X', 'admin', '2024-01-01 00:00:00.000000')",
            [],
        );
        assert!(result.is_err());
    }
}
