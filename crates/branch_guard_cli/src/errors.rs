use std::io;

use branch_guard_core::PolicyError;
use thiserror::Error;

#[cfg(test)]
#[path = "errors_tests.rs"]
mod tests;

/// Errors that can occur in the BranchGuard CLI application.
#[derive(Error, Debug)]
pub enum Error {
    /// The rule file could not be found, read, parsed or written.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The rules were loaded but rejected by the policy engine.
    #[error("Policy error: {0}")]
    Policy(#[from] PolicyError),

    /// Invalid command-line arguments were provided.
    ///
    /// Returned, for example, when an identity event argument is not valid
    /// JSON.
    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),

    /// Failed to load a file from the filesystem.
    #[error("Failed to load file.")]
    LoadFile(io::Error),

    /// A decision could not be rendered for output.
    #[error("Failed to render output: {0}")]
    Output(String),
}
