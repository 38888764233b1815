use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Prescription {
    pub id: Uuid,
    pub diagnosis_id: Uuid,
    pub prescription_details: String,
    pub fulfilled: bool,
    pub fulfilled_datetime: Option<NaiveDateTime>,
    pub fulfilled_by: Option<Uuid>,
    pub created_by: Uuid,
    pub created_at: NaiveDateTime,
}
