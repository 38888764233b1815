use chrono::NaiveDateTime;
use rusqlite::{params, Connection};
use uuid::Uuid;

use super::{format_datetime, parse_datetime, parse_uuid};
use crate::db::DatabaseError;
use crate::models::AuditEntry;

/// Append one audit row. Called inside the write's transaction so the
/// entry exists exactly when the write does.
pub fn insert_audit_entry(
    conn: &Connection,
    timestamp: &NaiveDateTime,
    actor_id: &Uuid,
    action: &str,
    entity: &str,
    entity_id: &Uuid,
    detail: Option<&serde_json::Value>,
) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO audit_log (timestamp, actor_id, action, entity, entity_id, detail)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            format_datetime(timestamp),
            actor_id.to_string(),
            action,
            entity,
            entity_id.to_string(),
            detail.map(|d| d.to_string()),
        ],
    )?;
    Ok(())
}

/// Audit entries written by one actor, newest first.
pub fn query_audit_by_actor(
    conn: &Connection,
    actor_id: &Uuid,
) -> Result<Vec<AuditEntry>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, timestamp, actor_id, action, entity, entity_id, detail FROM audit_log
         WHERE actor_id = ?1
         ORDER BY timestamp DESC, id DESC",
    )?;
    let rows = stmt
        .query_map(params![actor_id.to_string()], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
                row.get::<_, String>(5)?,
                row.get::<_, Option<String>>(6)?,
            ))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    rows.into_iter()
        .map(|(id, timestamp, actor_id, action, entity, entity_id, detail)| {
            Ok(AuditEntry {
                id,
                timestamp: parse_datetime(&timestamp)?,
                actor_id: parse_uuid(&actor_id)?,
                action,
                entity,
                entity_id,
                detail: detail
                    .map(|d| serde_json::from_str::<serde_json::Value>(&d))
                    .transpose()
                    .map_err(|e| DatabaseError::ConstraintViolation(e.to_string()))?,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repository::fixtures::ts;
    use crate::db::sqlite::open_memory_database;

    #[test]
    fn audit_entries_filtered_by_actor_newest_first() {
        let conn = open_memory_database().unwrap();
        let actor = Uuid::new_v4();
        let other = Uuid::new_v4();
        let detail = serde_json::json!({ "name": "Asha Rao" });

        let record = |at: &str, who: &Uuid, entity: &str, detail: Option<&serde_json::Value>| {
            insert_audit_entry(&conn, &ts(at), who, "insert", entity, &Uuid::new_v4(), detail)
                .unwrap();
        };
        record("2024-03-01 09:00:00", &actor, "patients", Some(&detail));
        record("2024-03-01 10:00:00", &actor, "checkups", None);
        record("2024-03-01 11:00:00", &other, "diagnoses", None);

        let entries = query_audit_by_actor(&conn, &actor).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].entity, "checkups");
        assert_eq!(entries[1].detail, Some(detail));
    }
}
