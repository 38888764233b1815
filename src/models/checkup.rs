use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkup {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub description: String,
    pub checkup_date: NaiveDateTime,
    pub created_by: Uuid,
    pub created_at: NaiveDateTime,
}
