//! Command modules for the BranchGuard CLI.
//!
//! - `check_cmd`: branch, file, tag and deleted-branch decisions
//! - `event_cmd`: identity event propagation into a rule file
//! - `validate_cmd`: authoring-time validation of a rule file

pub mod check_cmd;
pub mod event_cmd;
pub mod validate_cmd;

use serde::Serialize;

use crate::errors::Error;

/// Render a decision as pretty JSON for stdout.
pub fn render_json<T: Serialize>(value: &T) -> Result<String, Error> {
    serde_json::to_string_pretty(value).map_err(|e| Error::Output(e.to_string()))
}
