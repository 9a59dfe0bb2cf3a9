//! Tag protection rules.

use serde::{Deserialize, Serialize};

use crate::{
    AppointmentCell, MembershipDirectory, PolicyError, PolicyResult, Protection, RefPattern,
    ReviewAppointment,
};

#[cfg(test)]
#[path = "tag_protection_tests.rs"]
mod tests;

fn default_true() -> bool {
    true
}

/// Protection rule for tags matching a pattern.
///
/// The tag creator uses the review appointment grammar: a user may create a
/// matching tag if they are listed, or belong to a listed team. Approval
/// counts are irrelevant here. A rule whose tag creator is unset lets nobody
/// create matching tags.
///
/// # Examples
///
/// ```toml
/// [[tag_protections]]
/// tag = "v*"
/// tag_creator = "release-managers, alice"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagProtection {
    /// Tags covered by this rule
    pub tag: RefPattern,

    /// Reject moving matching tags to another commit
    #[serde(default = "default_true")]
    pub no_update: bool,

    /// Reject deletion of matching tags
    #[serde(default = "default_true")]
    pub no_deletion: bool,

    /// Who may create matching tags
    #[serde(default, skip_serializing_if = "AppointmentCell::is_unset")]
    pub tag_creator: AppointmentCell,
}

impl TagProtection {
    /// # Errors
    ///
    /// Returns `PolicyError::PatternSyntax` for a malformed tag pattern.
    pub fn new(tag: &str, tag_creator: &str) -> PolicyResult<Self> {
        Ok(Self {
            tag: RefPattern::try_new(tag)?,
            no_update: true,
            no_deletion: true,
            tag_creator: AppointmentCell::from(tag_creator),
        })
    }

    /// Why `user` may not create a tag covered by this rule, or `None` if
    /// they may.
    pub fn creation_denied_reason(
        &self,
        user: &str,
        directory: &dyn MembershipDirectory,
    ) -> Option<String> {
        match self.tag_creator.get(directory) {
            Some(creators) => creators.not_match_message(user, directory),
            None => Some(format!(
                "No user is allowed to create tags matching '{}'",
                self.tag
            )),
        }
    }

    /// # Errors
    ///
    /// Returns `PolicyError::InvalidConfiguration` when no tag creator is set
    /// and `PolicyError::ExpressionSyntax` when it is malformed.
    pub fn validate(&self, directory: &dyn MembershipDirectory) -> PolicyResult<()> {
        match self.tag_creator.expr() {
            Some(expr) => ReviewAppointment::from_expr(expr, directory).map(|_| ()),
            None => Err(PolicyError::InvalidConfiguration {
                field: format!("tag protection '{}'", self.tag),
                reason: "Tag creator is required".to_string(),
            }),
        }
    }
}

impl Protection for TagProtection {
    fn pattern(&self) -> &str {
        self.tag.as_str()
    }

    fn matches(&self, candidate: &str) -> bool {
        self.tag.matches(candidate)
    }

    fn appointment(&self) -> &AppointmentCell {
        &self.tag_creator
    }

    fn appointment_mut(&mut self) -> &mut AppointmentCell {
        &mut self.tag_creator
    }
}
