//! Policy engine error types.
//!
//! Errors raised while authoring protection rules. Evaluation of rules that
//! were accepted at authoring time never fails; references to identities that
//! have since disappeared degrade silently instead of surfacing here.

use thiserror::Error;

#[cfg(test)]
#[path = "errors_tests.rs"]
mod tests;

/// Policy engine errors.
///
/// Every variant describes input that must be rejected before it becomes part
/// of a repository's stored protection rules.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PolicyError {
    /// A branch, tag or path pattern could not be compiled.
    #[error("Invalid pattern '{pattern}': {reason}")]
    PatternSyntax { pattern: String, reason: String },

    /// A review appointment expression does not follow the token grammar.
    #[error("Invalid review appointment expression '{expression}': {reason}")]
    ExpressionSyntax { expression: String, reason: String },

    /// A rule is well formed but cannot be stored as configured.
    #[error("Invalid configuration: {field} - {reason}")]
    InvalidConfiguration { field: String, reason: String },
}

/// Result type alias for policy operations.
pub type PolicyResult<T> = Result<T, PolicyError>;
