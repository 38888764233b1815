use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::{Gender, PatientStatus};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Patient {
    pub id: Uuid,
    pub name: String,
    pub gender: Gender,
    pub age: i32,
    pub status: PatientStatus,
    pub created_by: Uuid,
    pub created_at: NaiveDateTime,
}
