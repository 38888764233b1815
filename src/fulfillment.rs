//! Prescription update guard.
//!
//! A prescription is write-once except for its fulfillment columns. The
//! guard takes the stored row and the proposed row and either returns the
//! row to persist or explains why the update is refused.

use chrono::NaiveDateTime;
use uuid::Uuid;

use crate::models::enums::Role;
use crate::models::{Prescription, Profile};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GuardError {
    #[error("Role {0} may not update prescriptions")]
    NotPharmacist(Role),
    #[error("Prescription field {0} is immutable")]
    ImmutableField(&'static str),
    #[error("Prescription {0} is already fulfilled")]
    AlreadyFulfilled(Uuid),
    #[error("A fulfilled prescription cannot be marked unfulfilled")]
    FulfillmentRevert,
}

/// Check a proposed prescription update and return the row to store.
///
/// On a false→true flip the stamp columns are overwritten with `now` and
/// the acting pharmacist, whatever the proposal carried. A fulfilled row
/// accepts no further update. An unfulfilled row proposed unchanged comes
/// back as is.
pub fn guard_prescription_update(
    existing: &Prescription,
    proposed: &Prescription,
    actor: &Profile,
    now: NaiveDateTime,
) -> Result<Prescription, GuardError> {
    if actor.role != Role::Pharmacist {
        return Err(GuardError::NotPharmacist(actor.role));
    }

    if let Some(field) = changed_immutable_field(existing, proposed) {
        return Err(GuardError::ImmutableField(field));
    }

    match (existing.fulfilled, proposed.fulfilled) {
        (false, true) => Ok(Prescription {
            fulfilled: true,
            fulfilled_datetime: Some(now),
            fulfilled_by: Some(actor.id),
            ..existing.clone()
        }),
        (true, false) => Err(GuardError::FulfillmentRevert),
        (true, true) => Err(GuardError::AlreadyFulfilled(existing.id)),
        (false, false) => {
            if proposed.fulfilled_datetime != existing.fulfilled_datetime {
                return Err(GuardError::ImmutableField("fulfilled_datetime"));
            }
            if proposed.fulfilled_by != existing.fulfilled_by {
                return Err(GuardError::ImmutableField("fulfilled_by"));
            }
            Ok(existing.clone())
        }
    }
}

fn changed_immutable_field(
    existing: &Prescription,
    proposed: &Prescription,
) -> Option<&'static str> {
    if proposed.id != existing.id {
        Some("id")
    } else if proposed.diagnosis_id != existing.diagnosis_id {
        Some("diagnosis_id")
    } else if proposed.prescription_details != existing.prescription_details {
        Some("prescription_details")
    } else if proposed.created_by != existing.created_by {
        Some("created_by")
    } else if proposed.created_at != existing.created_at {
        Some("created_at")
    } else {
        None
    }
}
