//! Row-level write authorization.
//!
//! One declarative policy table maps (table, operation) to the roles allowed
//! to perform it. Every workflow operation consults it the same way:
//! 1. Resolve the actor id to a profile (unknown → reject)
//! 2. Find a rule for (table, operation) listing the actor's role → ALLOW
//! 3. Default → DENY

use rusqlite::Connection;
use uuid::Uuid;

use crate::db::repository::get_profile;
use crate::db::DatabaseError;
use crate::models::enums::Role;
use crate::models::Profile;

// ═══════════════════════════════════════════════════════════
// Types
// ═══════════════════════════════════════════════════════════

/// Tables guarded by the policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Table {
    Patients,
    Checkups,
    Diagnoses,
    Prescriptions,
}

impl Table {
    /// Database table name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Patients => "patients",
            Self::Checkups => "checkups",
            Self::Diagnoses => "diagnoses",
            Self::Prescriptions => "prescriptions",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Select,
    Insert,
    Update,
    Delete,
}

impl Operation {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Select => "select",
            Self::Insert => "insert",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }
}

/// One row of the policy table.
#[derive(Debug, Clone, Copy)]
pub struct PolicyRule {
    pub table: Table,
    pub operation: Operation,
    pub roles: &'static [Role],
}

/// Why access was granted (or denied).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessReason {
    /// A policy rule lists the actor's role.
    MatchedRule,
    /// No matching rule; access denied.
    Denied,
}

/// Result of an authorization check.
#[derive(Debug, Clone, Copy)]
pub struct AccessDecision {
    pub allowed: bool,
    pub reason: AccessReason,
}

impl AccessDecision {
    fn allow() -> Self {
        Self {
            allowed: true,
            reason: AccessReason::MatchedRule,
        }
    }

    fn deny() -> Self {
        Self {
            allowed: false,
            reason: AccessReason::Denied,
        }
    }
}

// ═══════════════════════════════════════════════════════════
// Policy
// ═══════════════════════════════════════════════════════════

const ALL_ROLES: &[Role] = &[Role::Doctor, Role::Operations, Role::Pharmacist];
const FRONT_DESK: &[Role] = &[Role::Operations, Role::Doctor];
const DOCTOR: &[Role] = &[Role::Doctor];
const PHARMACIST: &[Role] = &[Role::Pharmacist];

/// Anything not listed here is denied, including every delete.
#[rustfmt::skip]
pub const POLICY: &[PolicyRule] = &[
    PolicyRule { table: Table::Patients, operation: Operation::Select, roles: ALL_ROLES },
    PolicyRule { table: Table::Patients, operation: Operation::Insert, roles: FRONT_DESK },
    PolicyRule { table: Table::Checkups, operation: Operation::Select, roles: ALL_ROLES },
    PolicyRule { table: Table::Checkups, operation: Operation::Insert, roles: FRONT_DESK },
    PolicyRule { table: Table::Diagnoses, operation: Operation::Select, roles: ALL_ROLES },
    PolicyRule { table: Table::Diagnoses, operation: Operation::Insert, roles: DOCTOR },
    PolicyRule { table: Table::Prescriptions, operation: Operation::Select, roles: ALL_ROLES },
    PolicyRule { table: Table::Prescriptions, operation: Operation::Insert, roles: DOCTOR },
    PolicyRule { table: Table::Prescriptions, operation: Operation::Update, roles: PHARMACIST },
];

// ═══════════════════════════════════════════════════════════
// Error type
// ═══════════════════════════════════════════════════════════

/// Errors from authorization checks.
#[derive(Debug, thiserror::Error)]
pub enum AuthorizationError {
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
    #[error("Unknown actor {0}")]
    UnknownActor(Uuid),
    #[error("Role {role} may not {operation} {table}")]
    Forbidden {
        role: Role,
        table: &'static str,
        operation: &'static str,
    },
}

// ═══════════════════════════════════════════════════════════
// Authorization check
// ═══════════════════════════════════════════════════════════

/// Pure policy lookup: does `role` hold `operation` on `table`?
pub fn check_access(role: Role, table: Table, operation: Operation) -> AccessDecision {
    let granted = POLICY
        .iter()
        .any(|rule| {
            rule.table == table && rule.operation == operation && rule.roles.contains(&role)
        });
    if granted {
        AccessDecision::allow()
    } else {
        AccessDecision::deny()
    }
}

/// Resolve `actor_id` and require the policy to allow the operation.
///
/// Returns the actor's profile so callers can stamp rows with it.
pub fn authorize(
    conn: &Connection,
    actor_id: &Uuid,
    table: Table,
    operation: Operation,
) -> Result<Profile, AuthorizationError> {
    let actor = get_profile(conn, actor_id)?.ok_or(AuthorizationError::UnknownActor(*actor_id))?;

    let decision = check_access(actor.role, table, operation);
    if !decision.allowed {
        tracing::warn!(
            actor_id = %actor.id,
            role = actor.role.as_str(),
            table = table.as_str(),
            operation = operation.as_str(),
            "Authorization denied"
        );
        return Err(AuthorizationError::Forbidden {
            role: actor.role,
            table: table.as_str(),
            operation: operation.as_str(),
        });
    }
    Ok(actor)
}

// ═══════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repository::fixtures::make_profile;
    use crate::db::sqlite::open_memory_database;

    const TABLES: [Table; 4] = [
        Table::Patients,
        Table::Checkups,
        Table::Diagnoses,
        Table::Prescriptions,
    ];

    // ── Reads ────────────────────────────────────────────

    #[test]
    fn every_role_can_read_every_table() {
        for &role in Role::all() {
            for table in TABLES {
                let decision = check_access(role, table, Operation::Select);
                assert!(decision.allowed, "{role} should read {}", table.as_str());
            }
        }
    }

    // ── Inserts ──────────────────────────────────────────

    #[test]
    fn front_desk_tables_allow_operations_and_doctor() {
        for table in [Table::Patients, Table::Checkups] {
            assert!(check_access(Role::Operations, table, Operation::Insert).allowed);
            assert!(check_access(Role::Doctor, table, Operation::Insert).allowed);
            assert!(!check_access(Role::Pharmacist, table, Operation::Insert).allowed);
        }
    }

    #[test]
    fn clinical_tables_are_doctor_only() {
        for table in [Table::Diagnoses, Table::Prescriptions] {
            assert!(check_access(Role::Doctor, table, Operation::Insert).allowed);
            let denied = check_access(Role::Operations, table, Operation::Insert);
            assert!(!denied.allowed);
            assert_eq!(denied.reason, AccessReason::Denied);
            assert!(!check_access(Role::Pharmacist, table, Operation::Insert).allowed);
        }
    }

    // ── Updates and deletes ──────────────────────────────

    #[test]
    fn only_pharmacist_updates_prescriptions() {
        let decision = check_access(Role::Pharmacist, Table::Prescriptions, Operation::Update);
        assert!(decision.allowed);
        assert_eq!(decision.reason, AccessReason::MatchedRule);
        assert!(!check_access(Role::Doctor, Table::Prescriptions, Operation::Update).allowed);
        assert!(!check_access(Role::Operations, Table::Prescriptions, Operation::Update).allowed);
    }

    #[test]
    fn nothing_else_is_updatable_or_deletable() {
        for &role in Role::all() {
            for table in TABLES {
                assert!(!check_access(role, table, Operation::Delete).allowed);
                if table != Table::Prescriptions {
                    assert!(!check_access(role, table, Operation::Update).allowed);
                }
            }
        }
    }

    // ── Actor resolution ─────────────────────────────────

    #[test]
    fn authorize_returns_actor_profile() {
        let conn = open_memory_database().unwrap();
        let doctor = make_profile(&conn, "Dr. Mehta", Role::Doctor);
        let actor = authorize(&conn, &doctor, Table::Diagnoses, Operation::Insert).unwrap();
        assert_eq!(actor.id, doctor);
        assert_eq!(actor.role, Role::Doctor);
    }

    #[test]
    fn authorize_rejects_forbidden_role() {
        let conn = open_memory_database().unwrap();
        let ops = make_profile(&conn, "Front Desk", Role::Operations);
        let err = authorize(&conn, &ops, Table::Diagnoses, Operation::Insert).unwrap_err();
        assert!(matches!(err, AuthorizationError::Forbidden { role: Role::Operations, .. }));
    }

    #[test]
    fn authorize_rejects_unknown_actor() {
        let conn = open_memory_database().unwrap();
        let ghost = Uuid::new_v4();
        let err = authorize(&conn, &ghost, Table::Patients, Operation::Select).unwrap_err();
        assert!(matches!(err, AuthorizationError::UnknownActor(id) if id == ghost));
    }
}
