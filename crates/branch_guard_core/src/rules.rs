//! Ordered protection rule store for one repository.
//!
//! Lookups are first-match-wins over declaration order. A later rule is never
//! consulted once an earlier one matches, however specific it is.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    BranchProtection, FileProtection, MembershipDirectory, PolicyResult, Protection,
    TagProtection,
};

#[cfg(test)]
#[path = "rules_tests.rs"]
mod tests;

/// A repository's branch and tag protection rules.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtectionRules {
    #[serde(default)]
    pub branch_protections: Vec<BranchProtection>,

    #[serde(default)]
    pub tag_protections: Vec<TagProtection>,
}

impl ProtectionRules {
    pub fn new(
        branch_protections: Vec<BranchProtection>,
        tag_protections: Vec<TagProtection>,
    ) -> Self {
        Self {
            branch_protections,
            tag_protections,
        }
    }

    pub fn find_branch_protection(&self, branch: &str) -> Option<&BranchProtection> {
        find_branch_protection(&self.branch_protections, branch)
    }

    pub fn find_tag_protection(&self, tag: &str) -> Option<&TagProtection> {
        find_tag_protection(&self.tag_protections, tag)
    }

    /// Positions of branch rules whose pattern covers a deleted branch.
    ///
    /// Nothing is removed; the caller decides whether these rules are dead
    /// configuration.
    pub fn rules_for_deleted_branch(&self, branch: &str) -> Vec<usize> {
        self.branch_protections
            .iter()
            .enumerate()
            .filter(|(_, rule)| rule.on_branch_delete(branch))
            .map(|(index, _)| index)
            .collect()
    }

    /// Forget every resolved appointment, e.g. after the directory changed.
    pub(crate) fn invalidate_resolved(&mut self) {
        for rule in &mut self.branch_protections {
            rule.review_appointment.invalidate();
            for file_rule in &mut rule.file_protections {
                file_rule.review_appointment.invalidate();
            }
        }
        for rule in &mut self.tag_protections {
            rule.tag_creator.invalidate();
        }
    }

    /// Authoring-time validation of every rule.
    ///
    /// Patterns are already validated when rules are constructed or
    /// deserialized; this checks the reviewer and tag creator expressions.
    ///
    /// # Errors
    ///
    /// Returns the first `PolicyError` found, in declaration order.
    pub fn validate(&self, directory: &dyn MembershipDirectory) -> PolicyResult<()> {
        for rule in &self.branch_protections {
            rule.validate(directory)?;
        }
        for rule in &self.tag_protections {
            rule.validate(directory)?;
        }
        Ok(())
    }
}

fn first_match<'a, P: Protection>(rules: &'a [P], candidate: &str) -> Option<&'a P> {
    rules.iter().find(|rule| rule.matches(candidate))
}

/// First branch rule whose pattern matches `branch`.
pub fn find_branch_protection<'a>(
    rules: &'a [BranchProtection],
    branch: &str,
) -> Option<&'a BranchProtection> {
    let found = first_match(rules, branch);
    debug!(
        branch = branch,
        pattern = found.map(|rule| rule.pattern()),
        "Resolved branch protection"
    );
    found
}

/// First file protection of `rule` whose path covers `file`.
pub fn find_file_protection<'a>(
    rule: &'a BranchProtection,
    file: &str,
) -> Option<&'a FileProtection> {
    rule.find_file_protection(file)
}

/// First tag rule whose pattern matches `tag`.
pub fn find_tag_protection<'a>(rules: &'a [TagProtection], tag: &str) -> Option<&'a TagProtection> {
    let found = first_match(rules, tag);
    debug!(
        tag = tag,
        pattern = found.map(|rule| rule.pattern()),
        "Resolved tag protection"
    );
    found
}

/// Whether `rule` permits deleting `branch`.
pub fn can_delete_branch(rule: &BranchProtection, branch: &str) -> bool {
    !(rule.no_deletion && rule.matches(branch))
}

/// Whether `rule` permits a forced push to `branch`.
pub fn can_force_push(rule: &BranchProtection, branch: &str) -> bool {
    !(rule.no_forced_push && rule.matches(branch))
}
