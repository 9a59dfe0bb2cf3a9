//! Policy decisions for the enforcement layer.
//!
//! Every function evaluates an already loaded rule file and returns the
//! decision as pretty JSON.

use branch_guard_core::{Protection, RepositoryPolicy};
use serde::Serialize;
use tracing::{debug, instrument};

use crate::commands::render_json;
use crate::config::AppConfig;
use crate::errors::Error;

#[cfg(test)]
#[path = "check_cmd_tests.rs"]
mod tests;

/// Branch-level and file-level reviewers for one changed file.
///
/// Both are reported; how they combine is up to the enforcement layer.
#[derive(Debug, Serialize)]
pub struct FileDecision {
    pub branch: String,
    pub file: String,
    pub branch_approval: Option<String>,
    pub file_approval: Option<String>,
}

/// A branch rule left without a target by a branch deletion.
#[derive(Debug, Serialize)]
pub struct DeadRule {
    pub index: usize,
    pub pattern: String,
}

#[derive(Debug, Serialize)]
pub struct DeletedBranchReport {
    pub branch: String,
    pub rules: Vec<DeadRule>,
}

/// Forced push, deletion and reviewer decision for a branch.
#[instrument(skip(config))]
pub fn check_branch(config: &AppConfig, branch: &str) -> Result<String, Error> {
    let policy = config.to_policy()?;
    let decision = policy.resolve_branch_policy(branch);
    debug!(message = "Resolved branch policy", branch = branch, decision = ?decision);
    render_json(&decision)
}

/// Reviewers required for a file changed on a branch.
#[instrument(skip(config))]
pub fn check_file(config: &AppConfig, branch: &str, file: &str) -> Result<String, Error> {
    let policy = config.to_policy()?;
    let decision = file_decision(&policy, branch, file);
    debug!(message = "Resolved file policy", decision = ?decision);
    render_json(&decision)
}

fn file_decision(policy: &RepositoryPolicy, branch: &str, file: &str) -> FileDecision {
    FileDecision {
        branch: branch.to_string(),
        file: file.to_string(),
        branch_approval: policy
            .resolve_branch_policy(branch)
            .required_approval
            .to_expr(),
        file_approval: policy
            .resolve_file_override(branch, file)
            .and_then(|appointment| appointment.to_expr()),
    }
}

/// Whether `user` may create `tag`.
#[instrument(skip(config))]
pub fn check_tag(config: &AppConfig, tag: &str, user: &str) -> Result<String, Error> {
    let policy = config.to_policy()?;
    let decision = policy.resolve_tag_policy(tag, user);
    debug!(message = "Resolved tag policy", decision = ?decision);
    render_json(&decision)
}

/// Branch rules whose pattern covers a deleted branch.
#[instrument(skip(config))]
pub fn check_deleted_branch(config: &AppConfig, branch: &str) -> Result<String, Error> {
    let policy = config.to_policy()?;
    let rules = policy.snapshot();
    let dead = policy
        .rules_for_deleted_branch(branch)
        .into_iter()
        .filter_map(|index| {
            rules.branch_protections.get(index).map(|rule| DeadRule {
                index,
                pattern: rule.pattern().to_string(),
            })
        })
        .collect();

    render_json(&DeletedBranchReport {
        branch: branch.to_string(),
        rules: dead,
    })
}
