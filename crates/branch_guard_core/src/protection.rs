//! Shared shape of branch, file and tag protection rules.
//!
//! Every rule pairs a pattern with a review appointment expression. The
//! [`Protection`] trait exposes that pair so identity propagation can treat
//! all three rule kinds the same way.

use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use tracing::warn;

use crate::{MembershipDirectory, ReviewAppointment};

#[cfg(test)]
#[path = "protection_tests.rs"]
mod tests;

/// A stored appointment expression and its resolved form.
///
/// The resolved appointment is computed at most once per assigned expression
/// (concurrent first readers race safely through `OnceLock`). Assigning a new
/// expression requires `&mut self` and discards the resolved value in the
/// same step, so the two never disagree.
///
/// Serializes as the bare expression string.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(from = "Option<String>", into = "Option<String>")]
pub struct AppointmentCell {
    expr: Option<String>,
    resolved: OnceLock<ReviewAppointment>,
}

/// Result of editing a stored appointment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditOutcome {
    /// Nothing referenced the affected identity
    Unchanged,

    /// The expression was re-serialized
    Rewritten,

    /// The edit left nothing to require; the expression is now unset
    Emptied,
}

impl AppointmentCell {
    /// Create a cell. Blank expressions are stored as unset.
    pub fn new(expr: Option<String>) -> Self {
        Self {
            expr: expr.filter(|e| !e.trim().is_empty()),
            resolved: OnceLock::new(),
        }
    }

    pub fn expr(&self) -> Option<&str> {
        self.expr.as_deref()
    }

    pub fn is_unset(&self) -> bool {
        self.expr.is_none()
    }

    /// Replace the expression and drop the resolved appointment.
    pub fn set_expr(&mut self, expr: Option<String>) {
        *self = Self::new(expr);
    }

    /// Whether the resolved appointment has been computed.
    pub fn is_resolved(&self) -> bool {
        self.resolved.get().is_some()
    }

    /// The resolved appointment, or `None` when no expression is set.
    ///
    /// A stored expression that no longer parses resolves to an empty
    /// appointment; such expressions are rejected when rules are authored.
    pub fn get(&self, directory: &dyn MembershipDirectory) -> Option<&ReviewAppointment> {
        let expr = self.expr.as_deref()?;
        Some(self.resolved.get_or_init(|| {
            ReviewAppointment::parse(expr, directory).unwrap_or_else(|e| {
                warn!(expression = expr, error = %e, "Stored review appointment does not parse");
                ReviewAppointment::new()
            })
        }))
    }

    /// Drop the resolved appointment so the next read resolves again.
    pub(crate) fn invalidate(&mut self) {
        self.resolved = OnceLock::new();
    }

    /// Apply `edit` to the key-level appointment and store the result.
    ///
    /// Bare tokens keep the meaning they had when the appointment was last
    /// resolved; `is_team` only classifies names the resolved appointment
    /// does not hold. The expression is only rewritten when `edit` reports a
    /// change, so unrelated expressions keep their authored formatting.
    pub(crate) fn edit(
        &mut self,
        is_team: impl Fn(&str) -> bool,
        edit: impl FnOnce(&mut ReviewAppointment) -> bool,
    ) -> EditOutcome {
        let Some(expr) = self.expr.as_deref() else {
            return EditOutcome::Unchanged;
        };

        let resolved = self.resolved.get();
        let classify = |name: &str| match resolved {
            Some(known) if known.contains_team(name) => true,
            Some(known) if known.contains_user(name) => false,
            _ => is_team(name),
        };

        let mut appointment = match ReviewAppointment::from_expr_with(expr, classify) {
            Ok(appointment) => appointment,
            Err(e) => {
                warn!(expression = expr, error = %e, "Skipping unparsable review appointment");
                return EditOutcome::Unchanged;
            }
        };

        if !edit(&mut appointment) {
            return EditOutcome::Unchanged;
        }

        match appointment.to_expr() {
            Some(expr) => {
                self.set_expr(Some(expr));
                EditOutcome::Rewritten
            }
            None => {
                self.set_expr(None);
                EditOutcome::Emptied
            }
        }
    }
}

impl PartialEq for AppointmentCell {
    fn eq(&self, other: &Self) -> bool {
        self.expr == other.expr
    }
}

impl Eq for AppointmentCell {}

impl From<Option<String>> for AppointmentCell {
    fn from(expr: Option<String>) -> Self {
        Self::new(expr)
    }
}

impl From<&str> for AppointmentCell {
    fn from(expr: &str) -> Self {
        Self::new(Some(expr.to_string()))
    }
}

impl From<AppointmentCell> for Option<String> {
    fn from(cell: AppointmentCell) -> Self {
        cell.expr
    }
}

/// A pattern-scoped rule carrying a review appointment.
pub trait Protection {
    /// The pattern as authored.
    fn pattern(&self) -> &str;

    /// Whether the rule applies to `candidate` (a ref name or file path).
    fn matches(&self, candidate: &str) -> bool;

    fn appointment(&self) -> &AppointmentCell;

    fn appointment_mut(&mut self) -> &mut AppointmentCell;

    fn appointment_expr(&self) -> Option<&str> {
        self.appointment().expr()
    }

    fn set_appointment_expr(&mut self, expr: Option<String>) {
        self.appointment_mut().set_expr(expr);
    }

    /// The resolved appointment, computed on first use.
    fn review_appointment(
        &self,
        directory: &dyn MembershipDirectory,
    ) -> Option<&ReviewAppointment> {
        self.appointment().get(directory)
    }
}
