//! Repository layer: entity-scoped database operations.
//!
//! Every function takes a plain `&Connection`; callers that need atomicity
//! pass a `Transaction` (which derefs to `Connection`).

mod audit;
mod checkup;
mod diagnosis;
mod patient;
mod prescription;
mod profile;

use chrono::NaiveDateTime;
use uuid::Uuid;

use super::DatabaseError;

pub use audit::*;
pub use checkup::*;
pub use diagnosis::*;
pub use patient::*;
pub use prescription::*;
pub use profile::*;

/// Stored timestamp layout. Fixed-width fraction keeps text ordering
/// identical to chronological ordering.
pub const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";
const DATETIME_PARSE_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

pub fn format_datetime(dt: &NaiveDateTime) -> String {
    dt.format(DATETIME_FORMAT).to_string()
}

pub(crate) fn parse_datetime(s: &str) -> Result<NaiveDateTime, DatabaseError> {
    NaiveDateTime::parse_from_str(s, DATETIME_PARSE_FORMAT)
        .map_err(|e| DatabaseError::ConstraintViolation(format!("bad timestamp {s:?}: {e}")))
}

pub(crate) fn parse_uuid(s: &str) -> Result<Uuid, DatabaseError> {
    Uuid::parse_str(s).map_err(|e| DatabaseError::ConstraintViolation(e.to_string()))
}


#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn datetime_text_round_trips_with_fraction() {
        let dt = NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_micro_opt(9, 30, 5, 120_000)
            .unwrap();
        let text = format_datetime(&dt);
        assert_eq!(text, "2024-03-01 09:30:05.120000");
        assert_eq!(parse_datetime(&text).unwrap(), dt);
    }

    #[test]
    fn datetime_text_orders_chronologically() {
        let day = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let earlier = day.and_hms_micro_opt(9, 0, 0, 999_999).unwrap();
        let later = day.and_hms_micro_opt(9, 0, 1, 0).unwrap();
        assert!(format_datetime(&earlier) < format_datetime(&later));
    }

    #[test]
    fn malformed_values_are_constraint_errors() {
        assert!(matches!(
            parse_datetime("03/01/2024"),
            Err(DatabaseError::ConstraintViolation(_))
        ));
        assert!(matches!(
            parse_uuid("not-a-uuid"),
            Err(DatabaseError::ConstraintViolation(_))
        ));
    }
}
