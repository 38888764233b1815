use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: i64,
    pub timestamp: NaiveDateTime,
    pub actor_id: Uuid,
    pub action: String,
    pub entity: String,
    pub entity_id: String,
    pub detail: Option<serde_json::Value>,
}
