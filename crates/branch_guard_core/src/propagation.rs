//! Identity change propagation.
//!
//! When the directory renames or deletes a team or account, or the
//! repository moves to a new owner, every appointment in the repository's
//! rules is rewritten to match. Branch-level reviewers, each file-level
//! sub-rule and tag creators are all handled through [`Protection`], so the
//! rule kinds share one traversal.
//!
//! Emptied appointments are handled per rule kind:
//! - file protections are dropped from their branch rule,
//! - branch rules and tag rules stay, with the expression unset.
//!
//! Bare tokens are classified the way the rule last resolved them. Tokens
//! that were never resolved are classified against `directory`, which should
//! still describe the state before the event; [`RepositoryPolicy`] guarantees
//! this by holding the directory under the same lock as the rules.
//!
//! [`RepositoryPolicy`]: crate::RepositoryPolicy

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::{EditOutcome, MembershipDirectory, Protection, ProtectionRules};

#[cfg(test)]
#[path = "propagation_tests.rs"]
mod tests;

/// A change reported by the external identity directory.
///
/// Serialized with a `kind` discriminator:
///
/// ```json
/// { "kind": "team_renamed", "old_name": "core", "new_name": "platform" }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum IdentityEvent {
    TeamRenamed { old_name: String, new_name: String },
    TeamDeleted { name: String },
    AccountRenamed { old_name: String, new_name: String },
    AccountDeleted { name: String },
    OwnershipTransferred { new_owner: String },
}

impl IdentityEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            IdentityEvent::TeamRenamed { .. } => "team_renamed",
            IdentityEvent::TeamDeleted { .. } => "team_deleted",
            IdentityEvent::AccountRenamed { .. } => "account_renamed",
            IdentityEvent::AccountDeleted { .. } => "account_deleted",
            IdentityEvent::OwnershipTransferred { .. } => "ownership_transferred",
        }
    }

    /// Classify a bare expression token, given the directory before the event.
    fn is_team(&self, name: &str, directory: &dyn MembershipDirectory) -> bool {
        match self {
            IdentityEvent::TeamRenamed { old_name, .. }
            | IdentityEvent::TeamDeleted { name: old_name } => {
                name == old_name.as_str() || directory.has_team(name)
            }
            IdentityEvent::AccountRenamed { .. }
            | IdentityEvent::AccountDeleted { .. }
            | IdentityEvent::OwnershipTransferred { .. } => directory.has_team(name),
        }
    }

    fn apply_to<P: Protection>(
        &self,
        rule: &mut P,
        directory: &dyn MembershipDirectory,
    ) -> EditOutcome {
        rule.appointment_mut().edit(
            |name| self.is_team(name, directory),
            |appointment| match self {
                IdentityEvent::TeamRenamed { old_name, new_name } => {
                    appointment.rename_team(old_name, new_name)
                }
                IdentityEvent::TeamDeleted { name } => appointment.remove_team(name),
                IdentityEvent::AccountRenamed { old_name, new_name } => {
                    appointment.rename_user(old_name, new_name)
                }
                IdentityEvent::AccountDeleted { name } => appointment.remove_user(name),
                IdentityEvent::OwnershipTransferred { .. } => appointment.clear_teams(),
            },
        )
    }
}

/// Summary of one propagation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PropagationReport {
    /// Branch, file and tag rules examined
    pub rules_visited: usize,

    /// Rules whose expression was re-serialized
    pub rewritten: usize,

    /// Branch or tag rules whose expression became unset
    pub cleared: usize,

    /// File protections dropped because nothing was left to require
    pub removed: usize,
}

impl PropagationReport {
    pub fn is_noop(&self) -> bool {
        self.rewritten == 0 && self.cleared == 0 && self.removed == 0
    }

    fn record_kept(&mut self, outcome: EditOutcome) {
        self.rules_visited += 1;
        match outcome {
            EditOutcome::Unchanged => {}
            EditOutcome::Rewritten => self.rewritten += 1,
            EditOutcome::Emptied => self.cleared += 1,
        }
    }
}

/// Apply an identity event to every appointment in `rules`.
///
/// Safe to repeat: a second pass for the same event finds nothing to change.
pub fn propagate(
    rules: &mut ProtectionRules,
    event: &IdentityEvent,
    directory: &dyn MembershipDirectory,
) -> PropagationReport {
    let mut report = PropagationReport::default();

    for branch_rule in &mut rules.branch_protections {
        let outcome = event.apply_to(branch_rule, directory);
        report.record_kept(outcome);
        if outcome != EditOutcome::Unchanged {
            debug!(
                branch = %branch_rule.branch,
                reviewers = branch_rule.appointment_expr(),
                "Rewrote branch reviewers"
            );
        }

        let file_protections = std::mem::take(&mut branch_rule.file_protections);
        let mut kept = Vec::with_capacity(file_protections.len());
        for mut file_rule in file_protections {
            report.rules_visited += 1;
            match event.apply_to(&mut file_rule, directory) {
                EditOutcome::Unchanged => kept.push(file_rule),
                EditOutcome::Rewritten => {
                    report.rewritten += 1;
                    kept.push(file_rule);
                }
                EditOutcome::Emptied => {
                    report.removed += 1;
                    debug!(
                        branch = %branch_rule.branch,
                        path = %file_rule.path,
                        "Removed file protection without reviewers"
                    );
                }
            }
        }
        branch_rule.file_protections = kept;
    }

    for tag_rule in &mut rules.tag_protections {
        let outcome = event.apply_to(tag_rule, directory);
        report.record_kept(outcome);
        if outcome != EditOutcome::Unchanged {
            debug!(
                tag = %tag_rule.tag,
                tag_creator = tag_rule.appointment_expr(),
                "Rewrote tag creator"
            );
        }
    }

    info!(
        event = event.kind(),
        owner = directory.owner(),
        rules_visited = report.rules_visited,
        rewritten = report.rewritten,
        cleared = report.cleared,
        removed = report.removed,
        "Propagated identity change"
    );

    report
}
