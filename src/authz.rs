//! Per-request authorization decisions.
//!
//! A static role→permission table, fixed at build time, consulted once per
//! incoming register-access request. Absent roles and roles outside the table
//! resolve to the empty permission set — deny by default, and a caller cannot
//! distinguish "unknown role" from "wrong role": both surface as
//! [`Verdict::NotAuthorized`].
//!
//! The policy is immutable after construction, so it is safe to share across
//! connection handlers without synchronization.

use std::collections::HashMap;
use std::fmt;

use tracing::info;

/// Role granted read access only.
pub const ROLE_READ_ONLY: &str = "ReadOnly";
/// Role granted read and write access.
pub const ROLE_READ_WRITE: &str = "ReadWrite";

// ─────────────────────────────────────────────────────────────────────────────
// Public types
// ─────────────────────────────────────────────────────────────────────────────

/// Register operation kinds subject to authorization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// Register read.
    Read,
    /// Register write.
    Write,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Read => f.write_str("read"),
            Self::Write => f.write_str("write"),
        }
    }
}

/// Outcome of an authorization check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// The operation is permitted.
    Authorized,
    /// The operation is denied. A normal outcome, not an error.
    NotAuthorized,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
struct Permissions {
    read: bool,
    write: bool,
}

// ─────────────────────────────────────────────────────────────────────────────
// Access policy
// ─────────────────────────────────────────────────────────────────────────────

/// The role→permission table.
///
/// `ReadOnly → {read}`, `ReadWrite → {read, write}`, anything else → `{}`.
#[derive(Debug, Clone)]
pub struct AccessPolicy {
    table: HashMap<&'static str, Permissions>,
}

impl Default for AccessPolicy {
    fn default() -> Self {
        let mut table = HashMap::new();
        table.insert(
            ROLE_READ_ONLY,
            Permissions {
                read: true,
                write: false,
            },
        );
        table.insert(
            ROLE_READ_WRITE,
            Permissions {
                read: true,
                write: true,
            },
        );
        Self { table }
    }
}

impl AccessPolicy {
    /// Decide whether `role` may perform `operation`.
    ///
    /// Pure apart from one audit log line per call. Invoked once per incoming
    /// request; verdicts are never cached across requests.
    pub fn authorize(&self, operation: Operation, role: Option<&str>) -> Verdict {
        let permissions = role
            .and_then(|r| self.table.get(r))
            .copied()
            .unwrap_or_default();

        let allowed = match operation {
            Operation::Read => permissions.read,
            Operation::Write => permissions.write,
        };
        let verdict = if allowed {
            Verdict::Authorized
        } else {
            Verdict::NotAuthorized
        };

        info!(
            operation = %operation,
            role = role.unwrap_or("<none>"),
            verdict = ?verdict,
            "authorize"
        );

        verdict
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_only_may_read() {
        let policy = AccessPolicy::default();
        assert_eq!(
            policy.authorize(Operation::Read, Some(ROLE_READ_ONLY)),
            Verdict::Authorized
        );
    }

    #[test]
    fn read_only_may_not_write() {
        let policy = AccessPolicy::default();
        assert_eq!(
            policy.authorize(Operation::Write, Some(ROLE_READ_ONLY)),
            Verdict::NotAuthorized
        );
    }

    #[test]
    fn read_write_may_read_and_write() {
        let policy = AccessPolicy::default();
        assert_eq!(
            policy.authorize(Operation::Read, Some(ROLE_READ_WRITE)),
            Verdict::Authorized
        );
        assert_eq!(
            policy.authorize(Operation::Write, Some(ROLE_READ_WRITE)),
            Verdict::Authorized
        );
    }

    #[test]
    fn absent_role_is_denied_everything() {
        let policy = AccessPolicy::default();
        assert_eq!(
            policy.authorize(Operation::Read, None),
            Verdict::NotAuthorized
        );
        assert_eq!(
            policy.authorize(Operation::Write, None),
            Verdict::NotAuthorized
        );
    }

    #[test]
    fn unknown_role_is_denied_not_an_error() {
        let policy = AccessPolicy::default();
        assert_eq!(
            policy.authorize(Operation::Read, Some("Bogus")),
            Verdict::NotAuthorized
        );
    }

    #[test]
    fn role_lookup_is_case_sensitive() {
        let policy = AccessPolicy::default();
        assert_eq!(
            policy.authorize(Operation::Read, Some("readonly")),
            Verdict::NotAuthorized
        );
    }

    #[test]
    fn verdicts_are_deterministic() {
        let policy = AccessPolicy::default();
        for _ in 0..10 {
            assert_eq!(
                policy.authorize(Operation::Write, Some(ROLE_READ_WRITE)),
                Verdict::Authorized
            );
        }
    }
}
