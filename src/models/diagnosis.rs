use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnosis {
    pub id: Uuid,
    pub checkup_id: Uuid,
    pub description: String,
    pub created_by: Uuid,
    pub created_at: NaiveDateTime,
}
