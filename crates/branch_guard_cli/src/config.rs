//! Rule file handling for the BranchGuard CLI.
//!
//! A rule file holds one repository's membership directory snapshot together
//! with its branch and tag protection rules, in TOML. The file is loaded from
//! the path given with `--config`, or from `branch-guard.toml` in the current
//! directory.

use std::{
    fs,
    path::{Path, PathBuf},
    sync::Arc,
};

use branch_guard_core::{ProtectionRules, RepositoryPolicy, StaticDirectory};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::errors::Error;

/// Default rule file name
pub const DEFAULT_CONFIG_FILENAME: &str = "branch-guard.toml";

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;

/// Contents of a rule file.
///
/// # Example TOML Configuration
///
/// ```toml
/// [directory]
/// owner = "acme"
/// accounts = ["alice", "bob", "carol"]
///
/// [directory.teams]
/// core = ["alice", "bob"]
///
/// [[branch_protections]]
/// branch = "main"
/// reviewers = "core:2"
///
/// [[branch_protections.file_protections]]
/// path = "docs"
/// reviewers = "carol"
///
/// [[tag_protections]]
/// tag = "v*"
/// tag_creator = "core"
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Teams and accounts the rules may reference
    #[serde(default)]
    pub directory: StaticDirectory,

    /// Branch and tag protection rules
    #[serde(flatten)]
    pub rules: ProtectionRules,
}

impl AppConfig {
    /// Loads a rule file from the specified path.
    ///
    /// Malformed patterns are rejected while parsing. Reviewer expressions
    /// are checked separately by [`AppConfig::to_policy`].
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if the file doesn't exist, can't be read, or
    /// contains invalid TOML or an invalid pattern.
    pub fn load(path: &Path) -> Result<Self, Error> {
        debug!("Loading rule file from {:?}", path);

        if !path.exists() {
            return Err(Error::Config(format!(
                "Configuration file not found: {:?}",
                path
            )));
        }

        let content = fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read configuration file: {}", e)))?;

        let config: AppConfig = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("Failed to parse configuration file: {}", e)))?;

        Ok(config)
    }

    /// Saves the rule file, creating parent directories as needed.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if serialization fails or the file cannot be
    /// written.
    pub fn save(&self, path: &Path) -> Result<(), Error> {
        debug!("Saving rule file to {:?}", path);

        let content = self.to_toml()?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| Error::Config(format!("Failed to create directory: {}", e)))?;
        }

        fs::write(path, content)
            .map_err(|e| Error::Config(format!("Failed to write configuration file: {}", e)))?;

        info!("Rule file saved to {:?}", path);
        Ok(())
    }

    /// Pretty TOML rendering of the rule file.
    pub fn to_toml(&self) -> Result<String, Error> {
        toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Failed to serialize configuration: {}", e)))
    }

    /// Validate the rules against the directory and wrap them for evaluation.
    ///
    /// # Errors
    ///
    /// Returns `Error::Policy` when a reviewer expression or tag creator is
    /// rejected.
    pub fn to_policy(&self) -> Result<RepositoryPolicy, Error> {
        let policy = RepositoryPolicy::new(self.rules.clone(), Arc::new(self.directory.clone()))?;
        Ok(policy)
    }
}

/// Resolves the path to the rule file.
///
/// Uses `config_path` when given, otherwise `branch-guard.toml` in the
/// current directory.
pub fn get_config_path(config_path: Option<&str>) -> PathBuf {
    if let Some(path) = config_path {
        PathBuf::from(path)
    } else {
        let current_dir = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        current_dir.join(DEFAULT_CONFIG_FILENAME)
    }
}
