//! Review appointment expressions.
//!
//! A review appointment says who must approve a change: teams, each with a
//! required number of approvals, and individual accounts who must each
//! approve. It is authored as a compact expression:
//!
//! ```text
//! core:2, docs, carol
//! ```
//!
//! Tokens are separated by `,`. A `name:count` token is always a team. A bare
//! `name` is a team (requiring one approval) when the repository owner has a
//! team of that name, and an account otherwise.
//!
//! The canonical form lists teams first, each with an explicit count, then
//! accounts, both in declaration order and without whitespace
//! (`core:2,docs:1,carol`).
//!
//! Identities are held by name. Renames are key updates and deletes are key
//! removals; nothing here points back into the directory.

use indexmap::{IndexMap, IndexSet};
use regex::Regex;
use std::sync::LazyLock;
use tracing::warn;

use crate::{MembershipDirectory, PolicyError, PolicyResult};

#[cfg(test)]
#[path = "review_appointment_tests.rs"]
mod tests;

/// Token separator in appointment expressions.
pub const TOKEN_SEPARATOR: char = ',';

static TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<name>[A-Za-z0-9][A-Za-z0-9._-]*)(?::(?P<count>[0-9]+))?$")
        .expect("token regex is valid")
});

/// Who must approve a change.
///
/// # Examples
///
/// ```
/// use branch_guard_core::{ReviewAppointment, StaticDirectory};
///
/// let directory = StaticDirectory::new("acme")
///     .with_team("core", ["alice", "bob", "carol"])
///     .with_account("dave");
///
/// let appointment = ReviewAppointment::parse("core:2, dave", &directory).unwrap();
/// assert_eq!(appointment.team_count("core"), Some(2));
/// assert!(appointment.contains_user("dave"));
/// assert_eq!(appointment.to_expr().as_deref(), Some("core:2,dave"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReviewAppointment {
    teams: IndexMap<String, u32>,
    users: IndexSet<String>,
}

/// Outcome of comparing submitted approvals with an appointment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApprovalCheck {
    /// Whether every requirement is met
    pub satisfied: bool,

    /// Human-readable description of each unmet requirement
    pub unmet: Vec<String>,
}

impl ReviewAppointment {
    /// Create an empty appointment.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse an expression and resolve it against the repository directory.
    ///
    /// Blank expressions yield an empty appointment. Teams and accounts the
    /// directory does not know are dropped, and team counts are capped at the
    /// team's size.
    ///
    /// # Errors
    ///
    /// Returns `PolicyError::ExpressionSyntax` if a token is malformed or a
    /// count is zero.
    pub fn parse(expr: &str, directory: &dyn MembershipDirectory) -> PolicyResult<Self> {
        Ok(Self::from_expr(expr, directory)?.resolve(directory))
    }

    /// Parse an expression without dropping unresolved names.
    ///
    /// The directory is consulted only to decide whether a bare token names a
    /// team or an account.
    ///
    /// # Errors
    ///
    /// Returns `PolicyError::ExpressionSyntax` on malformed input.
    pub fn from_expr(expr: &str, directory: &dyn MembershipDirectory) -> PolicyResult<Self> {
        Self::from_expr_with(expr, |name| directory.has_team(name))
    }

    /// Parse an expression using `is_team` to classify bare tokens.
    pub(crate) fn from_expr_with(expr: &str, is_team: impl Fn(&str) -> bool) -> PolicyResult<Self> {
        let mut appointment = Self::new();
        if expr.trim().is_empty() {
            return Ok(appointment);
        }

        for token in expr.split(TOKEN_SEPARATOR).map(str::trim) {
            if token.is_empty() {
                return Err(PolicyError::ExpressionSyntax {
                    expression: expr.to_string(),
                    reason: "Empty reviewer entry".to_string(),
                });
            }

            let captures = TOKEN.captures(token).ok_or_else(|| PolicyError::ExpressionSyntax {
                expression: expr.to_string(),
                reason: format!("'{}' is not a valid team or account reference", token),
            })?;
            let name = &captures["name"];

            match captures.name("count") {
                Some(count) => {
                    let count = count.as_str().parse::<u32>().map_err(|_| {
                        PolicyError::ExpressionSyntax {
                            expression: expr.to_string(),
                            reason: format!("Approval count for team '{}' is out of range", name),
                        }
                    })?;
                    if count == 0 {
                        return Err(PolicyError::ExpressionSyntax {
                            expression: expr.to_string(),
                            reason: format!(
                                "Approval count for team '{}' must be at least 1",
                                name
                            ),
                        });
                    }
                    appointment.add_team(name, count);
                }
                None if is_team(name) => appointment.add_team(name, 1),
                None => appointment.add_user(name),
            }
        }

        Ok(appointment)
    }

    /// Drop references the directory cannot resolve and cap team counts at
    /// team size. A team without members keeps a count of 1.
    pub fn resolve(&self, directory: &dyn MembershipDirectory) -> Self {
        let mut resolved = Self::new();

        for (team, &count) in &self.teams {
            match directory.team_members(team) {
                Some(members) => {
                    let size = u32::try_from(members.len()).unwrap_or(u32::MAX);
                    let capped = count.min(size).max(1);
                    resolved.teams.insert(team.clone(), capped);
                }
                None => warn!(
                    team = %team,
                    owner = directory.owner(),
                    "Dropping reference to unknown team from review appointment"
                ),
            }
        }

        for user in &self.users {
            if directory.has_account(user) {
                resolved.users.insert(user.clone());
            } else {
                warn!(
                    account = %user,
                    owner = directory.owner(),
                    "Dropping reference to unknown account from review appointment"
                );
            }
        }

        resolved
    }

    /// Canonical expression, or `None` once nothing is left to require.
    pub fn to_expr(&self) -> Option<String> {
        if self.is_empty() {
            return None;
        }

        let tokens: Vec<String> = self
            .teams
            .iter()
            .map(|(team, count)| format!("{}:{}", team, count))
            .chain(self.users.iter().cloned())
            .collect();

        Some(tokens.join(&TOKEN_SEPARATOR.to_string()))
    }

    pub fn is_empty(&self) -> bool {
        self.teams.is_empty() && self.users.is_empty()
    }

    /// Teams with their required approval counts, in declaration order.
    pub fn teams(&self) -> impl Iterator<Item = (&str, u32)> {
        self.teams.iter().map(|(team, count)| (team.as_str(), *count))
    }

    /// Accounts that must approve, in declaration order.
    pub fn users(&self) -> impl Iterator<Item = &str> {
        self.users.iter().map(String::as_str)
    }

    pub fn team_count(&self, team: &str) -> Option<u32> {
        self.teams.get(team).copied()
    }

    pub fn contains_team(&self, team: &str) -> bool {
        self.teams.contains_key(team)
    }

    pub fn contains_user(&self, user: &str) -> bool {
        self.users.contains(user)
    }

    /// Require `count` approvals from a team. A team listed twice keeps the
    /// larger count.
    pub fn add_team(&mut self, team: impl Into<String>, count: u32) {
        let entry = self.teams.entry(team.into()).or_insert(count);
        *entry = (*entry).max(count);
    }

    /// Require approval from an account.
    pub fn add_user(&mut self, user: impl Into<String>) {
        self.users.insert(user.into());
    }

    /// Rename a team in place, keeping its position and count.
    ///
    /// Returns `true` if the appointment changed.
    pub fn rename_team(&mut self, old_name: &str, new_name: &str) -> bool {
        if old_name == new_name || !self.teams.contains_key(old_name) {
            return false;
        }

        let merged_count = self.teams.get(new_name).copied();
        self.teams = std::mem::take(&mut self.teams)
            .into_iter()
            .filter(|(team, _)| team != new_name)
            .map(|(team, count)| {
                if team == old_name {
                    (new_name.to_string(), count.max(merged_count.unwrap_or(0)))
                } else {
                    (team, count)
                }
            })
            .collect();
        true
    }

    /// Returns `true` if the team was present.
    pub fn remove_team(&mut self, team: &str) -> bool {
        self.teams.shift_remove(team).is_some()
    }

    /// Drop every team requirement, keeping account requirements.
    ///
    /// Returns `true` if any team was present.
    pub fn clear_teams(&mut self) -> bool {
        let changed = !self.teams.is_empty();
        self.teams.clear();
        changed
    }

    /// Rename an account in place, keeping its position.
    ///
    /// Returns `true` if the appointment changed.
    pub fn rename_user(&mut self, old_name: &str, new_name: &str) -> bool {
        if old_name == new_name || !self.users.contains(old_name) {
            return false;
        }

        self.users = std::mem::take(&mut self.users)
            .into_iter()
            .filter(|user| user != new_name)
            .map(|user| {
                if user == old_name {
                    new_name.to_string()
                } else {
                    user
                }
            })
            .collect();
        true
    }

    /// Returns `true` if the account was present.
    pub fn remove_user(&mut self, user: &str) -> bool {
        self.users.shift_remove(user)
    }

    /// Compare submitted approvals with this appointment.
    ///
    /// `approvers` should include the submitter of the change, who counts as
    /// having reviewed it.
    pub fn check_approvals<S: AsRef<str>>(
        &self,
        approvers: &[S],
        directory: &dyn MembershipDirectory,
    ) -> ApprovalCheck {
        let approved: IndexSet<&str> = approvers.iter().map(|a| a.as_ref()).collect();
        let mut unmet = Vec::new();

        for (team, &required) in &self.teams {
            let received = approved
                .iter()
                .filter(|approver| directory.is_team_member(team, approver))
                .count() as u32;
            if received < required {
                unmet.push(format!(
                    "{} approval(s) from team '{}' ({} received)",
                    required, team, received
                ));
            }
        }

        for user in &self.users {
            if !approved.contains(user.as_str()) {
                unmet.push(format!("approval from user '{}'", user));
            }
        }

        ApprovalCheck {
            satisfied: unmet.is_empty(),
            unmet,
        }
    }

    /// Explain why `user` is not covered by this appointment, or `None` if the
    /// user is listed directly or belongs to a listed team.
    pub fn not_match_message(
        &self,
        user: &str,
        directory: &dyn MembershipDirectory,
    ) -> Option<String> {
        if self.users.contains(user)
            || self
                .teams
                .keys()
                .any(|team| directory.is_team_member(team, user))
        {
            return None;
        }

        Some(match self.to_expr() {
            Some(expr) => format!("User '{}' is not one of: {}", user, expr),
            None => format!("No user is allowed, including '{}'", user),
        })
    }
}
