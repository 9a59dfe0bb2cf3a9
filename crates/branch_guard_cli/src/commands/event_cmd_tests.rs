//! Tests for identity event propagation into rule files.

use super::*;
use branch_guard_core::{MembershipDirectory, Protection};
use tempfile::TempDir;

const RULE_FILE: &str = r#"
[directory]
owner = "acme"
accounts = ["alice", "bob", "carol"]

[directory.teams]
core = ["alice", "bob"]
docs = ["carol"]

[[branch_protections]]
branch = "main"
reviewers = "core:2, carol"

[[branch_protections.file_protections]]
path = "docs"
reviewers = "docs"

[[tag_protections]]
tag = "v*"
tag_creator = "core"
"#;

fn write_rules(dir: &TempDir) -> std::path::PathBuf {
    let path = dir.path().join("branch-guard.toml");
    fs::write(&path, RULE_FILE).expect("Failed to write rule file");
    path
}

// ============================================================================
// Event parsing
// ============================================================================

#[test]
fn test_parse_inline_event() {
    let event = parse_event(r#"{"kind":"account_deleted","name":"carol"}"#).expect("valid");

    assert_eq!(
        event,
        IdentityEvent::AccountDeleted {
            name: "carol".to_string()
        }
    );
}

#[test]
fn test_parse_event_from_file() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let path = temp_dir.path().join("event.json");
    fs::write(&path, r#"{"kind":"ownership_transferred","new_owner":"globex"}"#)
        .expect("Failed to write event");

    let event = parse_event(&format!("@{}", path.display())).expect("valid");

    assert_eq!(event.kind(), "ownership_transferred");
}

#[test]
fn test_parse_invalid_event() {
    let result = parse_event(r#"{"kind":"team_exploded"}"#);

    assert!(matches!(result, Err(Error::InvalidArguments(_))));
}

#[test]
fn test_parse_missing_event_file() {
    let result = parse_event("@/nonexistent/event.json");

    assert!(matches!(result, Err(Error::LoadFile(_))));
}

// ============================================================================
// Propagation
// ============================================================================

#[test]
fn test_apply_event_updates_rules_and_directory() {
    let mut config: AppConfig = toml::from_str(RULE_FILE).expect("Failed to parse");

    let report = apply_event(
        &mut config,
        &IdentityEvent::TeamRenamed {
            old_name: "core".to_string(),
            new_name: "platform".to_string(),
        },
    );

    assert_eq!(report.rewritten, 2);
    assert_eq!(
        config.rules.branch_protections[0].appointment_expr(),
        Some("platform:2,carol")
    );
    assert_eq!(
        config.rules.tag_protections[0].appointment_expr(),
        Some("platform:1")
    );
    assert!(config.directory.has_team("platform"));
    assert!(!config.directory.has_team("core"));
}

#[test]
fn test_apply_bare_team_delete() {
    let mut config: AppConfig = toml::from_str(RULE_FILE).expect("Failed to parse");

    let report = apply_event(
        &mut config,
        &IdentityEvent::TeamDeleted {
            name: "docs".to_string(),
        },
    );

    assert_eq!(report.removed, 1);
    assert!(config.rules.branch_protections[0].file_protections.is_empty());
}

#[test]
fn test_execute_prints_migrated_rules_without_writing() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let path = write_rules(&temp_dir);

    let output = execute(
        &path,
        r#"{"kind":"account_renamed","old_name":"carol","new_name":"caroline"}"#,
        false,
    )
    .expect("event applied");

    let migrated: AppConfig = toml::from_str(&output).expect("output is a rule file");
    assert_eq!(
        migrated.rules.branch_protections[0].appointment_expr(),
        Some("core:2,caroline")
    );
    let on_disk = fs::read_to_string(&path).expect("rule file still present");
    assert_eq!(on_disk, RULE_FILE);
}

#[test]
fn test_execute_write_updates_rule_file() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let path = write_rules(&temp_dir);

    let output = execute(
        &path,
        r#"{"kind":"ownership_transferred","new_owner":"globex"}"#,
        true,
    )
    .expect("event applied");

    let report: serde_json::Value = serde_json::from_str(&output).expect("report is JSON");
    assert_eq!(report["removed"], 1);

    let saved = AppConfig::load(&path).expect("rule file still loads");
    assert_eq!(saved.directory.owner, "globex");
    assert!(saved.directory.teams.is_empty());
    assert_eq!(
        saved.rules.branch_protections[0].appointment_expr(),
        Some("carol")
    );
    assert!(saved.rules.tag_protections[0].appointment_expr().is_none());
}
