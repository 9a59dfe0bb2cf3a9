//! Wildcard matching for branch names, tag names and file paths.
//!
//! Ref patterns (branches and tags) use glob syntax (`*`, `?`, `[...]`) over
//! the full name. `*` never crosses a `/`, so `release-*` covers
//! `release-1.0` but not `release/1.0`.
//!
//! Path patterns use the same syntax but match child-aware: a pattern that
//! matches a directory also covers every file beneath it.

use glob::{MatchOptions, Pattern};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{PolicyError, PolicyResult};

#[cfg(test)]
#[path = "pattern_tests.rs"]
mod tests;

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

/// Compile `text`, reporting failures against the pattern as authored.
fn compile(authored: &str, text: &str) -> PolicyResult<Pattern> {
    if text.trim().is_empty() {
        return Err(PolicyError::PatternSyntax {
            pattern: authored.to_string(),
            reason: "Pattern cannot be empty".to_string(),
        });
    }

    Pattern::new(text).map_err(|e| PolicyError::PatternSyntax {
        pattern: authored.to_string(),
        reason: e.to_string(),
    })
}

/// A validated branch or tag name pattern.
///
/// # Examples
///
/// ```
/// use branch_guard_core::RefPattern;
///
/// let pattern = RefPattern::try_new("release-*").unwrap();
/// assert!(pattern.matches("release-1.0"));
/// assert!(!pattern.matches("release/1.0"));
/// assert!(RefPattern::try_new("release-[").is_err());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RefPattern {
    source: String,
    compiled: Pattern,
}

impl RefPattern {
    /// Compile a ref pattern.
    ///
    /// # Errors
    ///
    /// Returns `PolicyError::PatternSyntax` if the pattern is empty or is not
    /// valid glob syntax.
    pub fn try_new(pattern: impl Into<String>) -> PolicyResult<Self> {
        let source = pattern.into();
        let compiled = compile(&source, &source)?;
        Ok(Self { source, compiled })
    }

    /// Check the full ref name against this pattern.
    pub fn matches(&self, name: &str) -> bool {
        self.compiled.matches_with(name, MATCH_OPTIONS)
    }

    /// The pattern text as authored.
    pub fn as_str(&self) -> &str {
        &self.source
    }
}

impl PartialEq for RefPattern {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

impl Eq for RefPattern {}

impl fmt::Display for RefPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.source)
    }
}

impl TryFrom<String> for RefPattern {
    type Error = PolicyError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::try_new(value)
    }
}

impl From<RefPattern> for String {
    fn from(pattern: RefPattern) -> String {
        pattern.source
    }
}

/// A validated, child-aware file path pattern.
///
/// A trailing `/` on the authored pattern is ignored, so `docs/` and `docs`
/// protect the same files.
///
/// # Examples
///
/// ```
/// use branch_guard_core::PathPattern;
///
/// let docs = PathPattern::try_new("docs").unwrap();
/// assert!(docs.matches("docs"));
/// assert!(docs.matches("docs/readme.md"));
/// assert!(!docs.matches("docsmisc/file.md"));
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PathPattern {
    source: String,
    compiled: Pattern,
}

impl PathPattern {
    /// Compile a path pattern.
    ///
    /// # Errors
    ///
    /// Returns `PolicyError::PatternSyntax` if the pattern is empty (after
    /// trailing separators are removed) or is not valid glob syntax.
    pub fn try_new(pattern: impl Into<String>) -> PolicyResult<Self> {
        let source = pattern.into();
        let compiled = compile(&source, source.trim_end_matches('/'))?;
        Ok(Self { source, compiled })
    }

    /// True if `path` matches the pattern or lies beneath a directory that
    /// matches it.
    ///
    /// Paths are repository-relative; leading and trailing `/` are ignored.
    pub fn matches(&self, path: &str) -> bool {
        let path = path.trim_matches('/');
        if self.compiled.matches_with(path, MATCH_OPTIONS) {
            return true;
        }

        path.match_indices('/')
            .map(|(index, _)| &path[..index])
            .filter(|ancestor| !ancestor.is_empty())
            .any(|ancestor| self.compiled.matches_with(ancestor, MATCH_OPTIONS))
    }

    /// The pattern text as authored.
    pub fn as_str(&self) -> &str {
        &self.source
    }
}

impl PartialEq for PathPattern {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

impl Eq for PathPattern {}

impl fmt::Display for PathPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.source)
    }
}

impl TryFrom<String> for PathPattern {
    type Error = PolicyError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::try_new(value)
    }
}

impl From<PathPattern> for String {
    fn from(pattern: PathPattern) -> String {
        pattern.source
    }
}

/// Match a branch name against an uncompiled pattern.
///
/// # Errors
///
/// Returns `PolicyError::PatternSyntax` for a malformed pattern.
pub fn matches_branch(pattern: &str, branch_name: &str) -> PolicyResult<bool> {
    Ok(RefPattern::try_new(pattern)?.matches(branch_name))
}

/// Child-aware match of a candidate path against an uncompiled rule path.
///
/// # Errors
///
/// Returns `PolicyError::PatternSyntax` for a malformed rule path.
pub fn matches_path_child_aware(rule_path: &str, candidate_path: &str) -> PolicyResult<bool> {
    Ok(PathPattern::try_new(rule_path)?.matches(candidate_path))
}
