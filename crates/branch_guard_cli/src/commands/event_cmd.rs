//! Identity event propagation into a rule file.
//!
//! The external directory service reports renames, deletions and ownership
//! transfers as JSON. Applying one rewrites every appointment in the rule
//! file and then updates the file's directory snapshot, in that order, so
//! that bare tokens naming the affected team are still recognised.

use std::{fs, path::Path};

use branch_guard_core::{propagate, IdentityEvent, PropagationReport};
use tracing::{debug, info, instrument};

use crate::config::AppConfig;
use crate::errors::Error;

#[cfg(test)]
#[path = "event_cmd_tests.rs"]
mod tests;

/// Parse an event given inline as JSON, or as `@path` to a JSON file.
pub fn parse_event(arg: &str) -> Result<IdentityEvent, Error> {
    let json = match arg.strip_prefix('@') {
        Some(path) => fs::read_to_string(path).map_err(Error::LoadFile)?,
        None => arg.to_string(),
    };

    serde_json::from_str(&json)
        .map_err(|e| Error::InvalidArguments(format!("Invalid identity event: {}", e)))
}

/// Apply `event` to the rules, then to the directory snapshot.
pub fn apply_event(config: &mut AppConfig, event: &IdentityEvent) -> PropagationReport {
    let report = propagate(&mut config.rules, event, &config.directory);
    config.directory.apply(event);
    report
}

/// Load the rule file, apply the event and either write the file back or
/// return the migrated TOML.
///
/// With `write` the propagation report is returned as JSON instead.
#[instrument]
pub fn execute(config_path: &Path, event_arg: &str, write: bool) -> Result<String, Error> {
    let event = parse_event(event_arg)?;
    debug!(message = "Applying identity event", path = ?config_path, event = ?event);

    let mut config = AppConfig::load(config_path)?;
    let report = apply_event(&mut config, &event);

    if report.is_noop() {
        info!(message = "Identity event changed no rule", event = event.kind());
    }

    if write {
        config.save(config_path)?;
        info!(message = "Rule file updated", path = ?config_path);
        crate::commands::render_json(&report)
    } else {
        config.to_toml()
    }
}
