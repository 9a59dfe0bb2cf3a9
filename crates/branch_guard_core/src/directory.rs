//! Repository membership directory.
//!
//! Review appointments reference teams and accounts by name. Whether a name
//! still refers to a live identity is answered by a [`MembershipDirectory`]
//! scoped to the repository that owns the rules. The directory is an external
//! collaborator; [`StaticDirectory`] is the in-memory implementation used by
//! the CLI and by tests.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

use crate::IdentityEvent;

#[cfg(test)]
#[path = "directory_tests.rs"]
mod tests;

/// Lookup of the teams and accounts visible to one repository.
pub trait MembershipDirectory: Send + Sync {
    /// Name of the account or organization owning the repository.
    fn owner(&self) -> &str;

    /// Members of the named team, or `None` if the owner has no such team.
    fn team_members(&self, team: &str) -> Option<Vec<String>>;

    /// Whether the named account exists.
    fn has_account(&self, account: &str) -> bool;

    /// Whether the owner has a team with this name.
    fn has_team(&self, team: &str) -> bool {
        self.team_members(team).is_some()
    }

    /// Whether `account` belongs to the named team.
    fn is_team_member(&self, team: &str, account: &str) -> bool {
        self.team_members(team)
            .is_some_and(|members| members.iter().any(|m| m == account))
    }
}

/// In-memory directory snapshot.
///
/// # TOML Format
///
/// ```toml
/// [directory]
/// owner = "acme"
/// accounts = ["alice", "bob", "carol"]
///
/// [directory.teams]
/// core = ["alice", "bob"]
/// docs = ["carol"]
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaticDirectory {
    /// Owning account or organization
    #[serde(default)]
    pub owner: String,

    /// Known accounts
    #[serde(default)]
    pub accounts: BTreeSet<String>,

    /// Teams of the owner, keyed by team name
    #[serde(default)]
    pub teams: BTreeMap<String, BTreeSet<String>>,
}

impl StaticDirectory {
    /// Create an empty directory for the given owner.
    pub fn new(owner: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            ..Self::default()
        }
    }

    /// Add an account.
    pub fn with_account(mut self, account: impl Into<String>) -> Self {
        self.accounts.insert(account.into());
        self
    }

    /// Add a team. Members are registered as accounts as well.
    pub fn with_team<I, S>(mut self, team: impl Into<String>, members: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let members: BTreeSet<String> = members.into_iter().map(Into::into).collect();
        self.accounts.extend(members.iter().cloned());
        self.teams.insert(team.into(), members);
        self
    }

    /// Follow an identity event so the snapshot stays in step with the rules
    /// that reference it.
    pub fn apply(&mut self, event: &IdentityEvent) {
        debug!(event = ?event, owner = %self.owner, "Applying identity event to directory");

        match event {
            IdentityEvent::TeamRenamed { old_name, new_name } => {
                if let Some(members) = self.teams.remove(old_name) {
                    self.teams.insert(new_name.clone(), members);
                }
            }
            IdentityEvent::TeamDeleted { name } => {
                self.teams.remove(name);
            }
            IdentityEvent::AccountRenamed { old_name, new_name } => {
                if self.accounts.remove(old_name) {
                    self.accounts.insert(new_name.clone());
                }
                for members in self.teams.values_mut() {
                    if members.remove(old_name) {
                        members.insert(new_name.clone());
                    }
                }
            }
            IdentityEvent::AccountDeleted { name } => {
                self.accounts.remove(name);
                for members in self.teams.values_mut() {
                    members.remove(name);
                }
            }
            IdentityEvent::OwnershipTransferred { new_owner } => {
                self.owner = new_owner.clone();
                self.teams.clear();
            }
        }
    }
}

impl MembershipDirectory for StaticDirectory {
    fn owner(&self) -> &str {
        &self.owner
    }

    fn team_members(&self, team: &str) -> Option<Vec<String>> {
        self.teams
            .get(team)
            .map(|members| members.iter().cloned().collect())
    }

    fn has_account(&self, account: &str) -> bool {
        self.accounts.contains(account)
            || self.teams.values().any(|members| members.contains(account))
    }

    fn has_team(&self, team: &str) -> bool {
        self.teams.contains_key(team)
    }

    fn is_team_member(&self, team: &str, account: &str) -> bool {
        self.teams
            .get(team)
            .is_some_and(|members| members.contains(account))
    }
}
