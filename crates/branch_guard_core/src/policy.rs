//! Per-repository policy facade.
//!
//! [`RepositoryPolicy`] is what the enforcement layer and the configuration
//! layer talk to. The rules and the membership directory they resolve against
//! sit behind one lock. Evaluation takes the read lock; identity events and
//! rule or directory replacement take the write lock, so readers never observe
//! a half-propagated rule set or rules paired with the wrong directory.

use serde::Serialize;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, info};

use crate::{
    can_delete_branch, can_force_push, propagate, IdentityEvent, MembershipDirectory,
    PolicyResult, PropagationReport, Protection, ProtectionRules, ReviewAppointment,
};

#[cfg(test)]
#[path = "policy_tests.rs"]
mod tests;

/// Branch-level decision for the enforcement layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BranchPolicy {
    /// Pattern of the rule that applied, if any
    pub matched_pattern: Option<String>,

    pub forced_push_allowed: bool,

    pub deletion_allowed: bool,

    /// Reviewers required for any change to the branch
    #[serde(serialize_with = "serialize_appointment")]
    pub required_approval: ReviewAppointment,
}

/// Tag-level decision for the enforcement layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TagPolicy {
    /// Pattern of the rule that applied, if any
    pub matched_pattern: Option<String>,

    pub creation_allowed: bool,

    /// Why creation is refused
    pub reason: Option<String>,

    pub update_allowed: bool,

    pub deletion_allowed: bool,
}

fn serialize_appointment<S: serde::Serializer>(
    appointment: &ReviewAppointment,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    appointment.to_expr().serialize(serializer)
}

/// Protection rules of one repository together with its membership
/// directory.
///
/// # Examples
///
/// ```
/// use branch_guard_core::{
///     BranchProtection, IdentityEvent, ProtectionRules, RepositoryPolicy, StaticDirectory,
/// };
/// use std::sync::Arc;
///
/// let directory = StaticDirectory::new("acme").with_team("core", ["alice", "bob"]);
/// let rules = ProtectionRules::new(
///     vec![BranchProtection::new("main")?.with_reviewers("core:2")],
///     vec![],
/// );
/// let policy = RepositoryPolicy::new(rules, Arc::new(directory.clone()))?;
///
/// let main = policy.resolve_branch_policy("main");
/// assert!(!main.forced_push_allowed);
/// assert_eq!(main.required_approval.team_count("core"), Some(2));
///
/// let event = IdentityEvent::TeamRenamed {
///     old_name: "core".to_string(),
///     new_name: "platform".to_string(),
/// };
/// let mut renamed = directory;
/// renamed.apply(&event);
/// policy.on_identity_event(&event, Arc::new(renamed));
///
/// let main = policy.resolve_branch_policy("main");
/// assert_eq!(main.required_approval.team_count("platform"), Some(2));
/// # Ok::<(), branch_guard_core::PolicyError>(())
/// ```
pub struct RepositoryPolicy {
    state: RwLock<PolicyState>,
}

/// Rules and the directory they resolve against, swapped together.
struct PolicyState {
    rules: ProtectionRules,
    directory: Arc<dyn MembershipDirectory>,
}

impl RepositoryPolicy {
    /// Wrap a validated rule set.
    ///
    /// # Errors
    ///
    /// Returns the first `PolicyError` reported by
    /// [`ProtectionRules::validate`].
    pub fn new(
        rules: ProtectionRules,
        directory: Arc<dyn MembershipDirectory>,
    ) -> PolicyResult<Self> {
        rules.validate(directory.as_ref())?;
        Ok(Self {
            state: RwLock::new(PolicyState { rules, directory }),
        })
    }

    fn read(&self) -> RwLockReadGuard<'_, PolicyState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, PolicyState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// The directory decisions are currently resolved against.
    pub fn directory(&self) -> Arc<dyn MembershipDirectory> {
        Arc::clone(&self.read().directory)
    }

    /// Forced push, deletion and reviewer requirements for `branch`.
    ///
    /// Without a matching rule everything is allowed and nobody needs to
    /// approve.
    pub fn resolve_branch_policy(&self, branch: &str) -> BranchPolicy {
        let state = self.read();
        let directory = state.directory.as_ref();

        match state.rules.find_branch_protection(branch) {
            Some(rule) => BranchPolicy {
                matched_pattern: Some(rule.pattern().to_string()),
                forced_push_allowed: can_force_push(rule, branch),
                deletion_allowed: can_delete_branch(rule, branch),
                required_approval: rule
                    .review_appointment(directory)
                    .cloned()
                    .unwrap_or_default(),
            },
            None => BranchPolicy {
                matched_pattern: None,
                forced_push_allowed: true,
                deletion_allowed: true,
                required_approval: ReviewAppointment::new(),
            },
        }
    }

    /// Reviewers required by the first file protection covering `file` on
    /// `branch`.
    ///
    /// This does not include the branch-level requirement; callers wanting
    /// both combine them with [`Self::resolve_branch_policy`].
    pub fn resolve_file_override(&self, branch: &str, file: &str) -> Option<ReviewAppointment> {
        let state = self.read();
        let rule = state.rules.find_branch_protection(branch)?;
        let file_rule = rule.find_file_protection(file)?;
        file_rule
            .review_appointment(state.directory.as_ref())
            .cloned()
    }

    /// Whether `user` may create `tag`, and what may happen to it afterwards.
    pub fn resolve_tag_policy(&self, tag: &str, user: &str) -> TagPolicy {
        let state = self.read();

        match state.rules.find_tag_protection(tag) {
            Some(rule) => {
                let reason = rule.creation_denied_reason(user, state.directory.as_ref());
                debug!(
                    tag = tag,
                    user = user,
                    reason = reason.as_deref(),
                    "Resolved tag policy"
                );
                TagPolicy {
                    matched_pattern: Some(rule.pattern().to_string()),
                    creation_allowed: reason.is_none(),
                    reason,
                    update_allowed: !rule.no_update,
                    deletion_allowed: !rule.no_deletion,
                }
            }
            None => TagPolicy {
                matched_pattern: None,
                creation_allowed: true,
                reason: None,
                update_allowed: true,
                deletion_allowed: true,
            },
        }
    }

    /// Positions of branch rules targeting a branch that was just deleted.
    pub fn rules_for_deleted_branch(&self, branch: &str) -> Vec<usize> {
        self.read().rules.rules_for_deleted_branch(branch)
    }

    /// Rewrite every appointment after an identity change, then move on to
    /// `directory`, the directory as it is after the event.
    ///
    /// Propagation classifies names against the directory held until now, so
    /// it does not matter whether the caller's directory service has already
    /// applied the event. Readers see either the old rules and directory or
    /// the new ones, never a mix.
    pub fn on_identity_event(
        &self,
        event: &IdentityEvent,
        directory: Arc<dyn MembershipDirectory>,
    ) -> PropagationReport {
        let mut state = self.write();
        let PolicyState {
            rules,
            directory: current,
        } = &mut *state;

        let report = propagate(rules, event, current.as_ref());
        rules.invalidate_resolved();
        *current = directory;
        report
    }

    /// Resolve against a new directory, e.g. after team membership changed.
    pub fn replace_directory(&self, directory: Arc<dyn MembershipDirectory>) {
        let mut state = self.write();
        info!(owner = directory.owner(), "Replacing membership directory");
        state.rules.invalidate_resolved();
        state.directory = directory;
    }

    /// Swap in a new rule set authored by the configuration layer.
    ///
    /// # Errors
    ///
    /// Leaves the current rules in place and returns the validation error if
    /// the new rules are rejected.
    pub fn replace_rules(&self, rules: ProtectionRules) -> PolicyResult<()> {
        let mut state = self.write();
        rules.validate(state.directory.as_ref())?;
        info!(
            branch_rules = rules.branch_protections.len(),
            tag_rules = rules.tag_protections.len(),
            "Replacing protection rules"
        );
        state.rules = rules;
        Ok(())
    }

    /// A copy of the current rules, e.g. for persisting after propagation.
    pub fn snapshot(&self) -> ProtectionRules {
        self.read().rules.clone()
    }
}
