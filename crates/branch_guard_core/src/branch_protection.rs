//! Branch protection rules and their file-level sub-rules.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    AppointmentCell, MembershipDirectory, PathPattern, PolicyError, PolicyResult, Protection,
    RefPattern, ReviewAppointment,
};

#[cfg(test)]
#[path = "branch_protection_tests.rs"]
mod tests;

fn default_true() -> bool {
    true
}

/// Protection rule for branches matching a pattern.
///
/// # Examples
///
/// ```toml
/// [[branch_protections]]
/// branch = "release-*"
/// no_forced_push = true
/// no_deletion = true
/// reviewers = "core:2"
///
/// [[branch_protections.file_protections]]
/// path = "docs"
/// reviewers = "docs:1, carol"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchProtection {
    /// Branches covered by this rule
    pub branch: RefPattern,

    /// Reject forced pushes to matching branches
    #[serde(default = "default_true")]
    pub no_forced_push: bool,

    /// Reject deletion of matching branches
    #[serde(default = "default_true")]
    pub no_deletion: bool,

    /// Reviewers required for every change to matching branches
    #[serde(
        default,
        rename = "reviewers",
        skip_serializing_if = "AppointmentCell::is_unset"
    )]
    pub review_appointment: AppointmentCell,

    /// Additional reviewers for particular paths. For each changed file the
    /// first matching entry applies.
    #[serde(default)]
    pub file_protections: Vec<FileProtection>,
}

impl BranchProtection {
    /// Create a rule with forced push and deletion blocked and no reviewers.
    ///
    /// # Errors
    ///
    /// Returns `PolicyError::PatternSyntax` for a malformed branch pattern.
    pub fn new(branch: &str) -> PolicyResult<Self> {
        Ok(Self {
            branch: RefPattern::try_new(branch)?,
            no_forced_push: true,
            no_deletion: true,
            review_appointment: AppointmentCell::default(),
            file_protections: Vec::new(),
        })
    }

    pub fn with_reviewers(mut self, expr: &str) -> Self {
        self.review_appointment.set_expr(Some(expr.to_string()));
        self
    }

    pub fn with_file_protection(mut self, file_protection: FileProtection) -> Self {
        self.file_protections.push(file_protection);
        self
    }

    /// First file protection, in declaration order, whose path covers `file`.
    ///
    /// A later entry is never consulted once an earlier one matches, even if
    /// the later one is more specific.
    pub fn find_file_protection(&self, file: &str) -> Option<&FileProtection> {
        let found = self.file_protections.iter().find(|p| p.matches(file));
        debug!(
            branch = %self.branch,
            file = file,
            path = found.map(|p| p.pattern()),
            "Resolved file protection"
        );
        found
    }

    /// Whether deleting `branch_name` leaves this rule without a target.
    pub fn on_branch_delete(&self, branch_name: &str) -> bool {
        self.matches(branch_name)
    }

    /// Authoring-time checks for this rule and its file protections.
    ///
    /// # Errors
    ///
    /// Returns `PolicyError::ExpressionSyntax` for a malformed reviewer
    /// expression and `PolicyError::InvalidConfiguration` for a file
    /// protection without reviewers.
    pub fn validate(&self, directory: &dyn MembershipDirectory) -> PolicyResult<()> {
        if let Some(expr) = self.review_appointment.expr() {
            ReviewAppointment::from_expr(expr, directory)?;
        }

        for file_protection in &self.file_protections {
            file_protection.validate(directory)?;
        }

        Ok(())
    }
}

impl Protection for BranchProtection {
    fn pattern(&self) -> &str {
        self.branch.as_str()
    }

    fn matches(&self, candidate: &str) -> bool {
        self.branch.matches(candidate)
    }

    fn appointment(&self) -> &AppointmentCell {
        &self.review_appointment
    }

    fn appointment_mut(&mut self) -> &mut AppointmentCell {
        &mut self.review_appointment
    }
}

/// Reviewer requirement for changes touching particular paths.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileProtection {
    /// Path pattern; covers matching directories and everything below them
    pub path: PathPattern,

    /// Reviewers required for changes to matching files
    #[serde(
        default,
        rename = "reviewers",
        skip_serializing_if = "AppointmentCell::is_unset"
    )]
    pub review_appointment: AppointmentCell,
}

impl FileProtection {
    /// # Errors
    ///
    /// Returns `PolicyError::PatternSyntax` for a malformed path pattern.
    pub fn new(path: &str, reviewers: &str) -> PolicyResult<Self> {
        Ok(Self {
            path: PathPattern::try_new(path)?,
            review_appointment: AppointmentCell::from(reviewers),
        })
    }

    /// # Errors
    ///
    /// A file protection exists only to add reviewers, so an unset expression
    /// is `PolicyError::InvalidConfiguration`.
    pub fn validate(&self, directory: &dyn MembershipDirectory) -> PolicyResult<()> {
        match self.review_appointment.expr() {
            Some(expr) => ReviewAppointment::from_expr(expr, directory).map(|_| ()),
            None => Err(PolicyError::InvalidConfiguration {
                field: format!("file protection '{}'", self.path),
                reason: "Reviewers are required".to_string(),
            }),
        }
    }
}

impl Protection for FileProtection {
    fn pattern(&self) -> &str {
        self.path.as_str()
    }

    fn matches(&self, candidate: &str) -> bool {
        self.path.matches(candidate)
    }

    fn appointment(&self) -> &AppointmentCell {
        &self.review_appointment
    }

    fn appointment_mut(&mut self) -> &mut AppointmentCell {
        &mut self.review_appointment
    }
}
