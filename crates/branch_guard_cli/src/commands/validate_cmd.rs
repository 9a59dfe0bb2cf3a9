use std::path::Path;

use tracing::{debug, error, info, instrument};

use crate::config::AppConfig;
use crate::errors::Error;

#[cfg(test)]
#[path = "validate_cmd_tests.rs"]
mod tests;

/// Check that a rule file parses and that every appointment is well formed.
///
/// Returns a one-line summary for stdout.
#[instrument]
pub fn validate_rules(config_path: &Path) -> Result<String, Error> {
    debug!(message = "Validating rule file", path = ?config_path);

    let config = AppConfig::load(config_path)?;
    if let Err(e) = config.to_policy() {
        error!(
            message = "Rule file is invalid",
            path = ?config_path,
            error = ?e
        );
        return Err(e);
    }

    info!(message = "Rule file is valid", path = ?config_path);
    Ok(format!(
        "Configuration is valid: {} branch protection(s), {} tag protection(s)",
        config.rules.branch_protections.len(),
        config.rules.tag_protections.len()
    ))
}
