//! End-to-end behaviour of the policy engine through its public API.

use branch_guard_core::{
    can_delete_branch, find_branch_protection, find_file_protection, matches_branch,
    matches_path_child_aware, propagate, BranchProtection, FileProtection, IdentityEvent,
    Protection, ProtectionRules, RepositoryPolicy, ReviewAppointment, StaticDirectory,
    TagProtection,
};
use std::sync::Arc;

fn directory() -> StaticDirectory {
    StaticDirectory::new("acme")
        .with_team("teamA", ["alice", "bob", "carol"])
        .with_team("teamB", ["dave", "erin"])
        .with_account("bob")
        .with_account("frank")
}

fn directory_after(event: &IdentityEvent) -> StaticDirectory {
    let mut next = directory();
    next.apply(event);
    next
}

// ============================================================================
// Expression round trips
// ============================================================================

#[test]
fn canonical_expression_survives_parse_and_serialize() {
    let directory = directory();

    for expr in ["teamA:2,bob", "teamA:1,teamB:2", "frank", "teamB:1,bob,frank"] {
        let appointment = ReviewAppointment::parse(expr, &directory).expect("valid expression");
        assert_eq!(appointment.to_expr().as_deref(), Some(expr));
    }
}

#[test]
fn deleting_absent_team_leaves_expression_untouched() {
    let directory = directory();
    let mut appointment =
        ReviewAppointment::parse("teamA:2,bob", &directory).expect("valid expression");

    assert!(!appointment.remove_team("teamQ"));
    assert_eq!(appointment.to_expr().as_deref(), Some("teamA:2,bob"));
}

// ============================================================================
// Pattern matching
// ============================================================================

#[test]
fn release_wildcard_matches_only_flat_names() {
    assert!(matches_branch("release-*", "release-1.0").expect("valid pattern"));
    assert!(matches_branch("release-*", "release-x").expect("valid pattern"));
    assert!(!matches_branch("release-*", "release/1.0").expect("valid pattern"));
    assert!(!matches_branch("release-*", "prerelease-1").expect("valid pattern"));
}

#[test]
fn directory_rule_covers_its_children_only() {
    assert!(matches_path_child_aware("docs", "docs/readme.md").expect("valid pattern"));
    assert!(matches_path_child_aware("docs", "docs").expect("valid pattern"));
    assert!(!matches_path_child_aware("docs", "docsmisc/file.md").expect("valid pattern"));
}

// ============================================================================
// Rule selection
// ============================================================================

#[test]
fn first_declared_branch_rule_applies() {
    let rules = vec![
        BranchProtection::new("main").expect("valid"),
        BranchProtection::new("feature-*").expect("valid"),
    ];

    assert_eq!(
        find_branch_protection(&rules, "feature-x").map(|r| r.pattern()),
        Some("feature-*")
    );
    assert_eq!(
        find_branch_protection(&rules, "main").map(|r| r.pattern()),
        Some("main")
    );
    assert!(find_branch_protection(&rules, "hotfix-1").is_none());
}

#[test]
fn first_declared_file_rule_applies_over_more_specific_one() {
    let rule = BranchProtection::new("main")
        .expect("valid")
        .with_file_protection(FileProtection::new("src", "teamA:2").expect("valid"))
        .with_file_protection(FileProtection::new("src/gen", "bob").expect("valid"));

    let found = find_file_protection(&rule, "src/gen/file.go").expect("src covers the file");

    assert_eq!(found.pattern(), "src");
    assert_eq!(found.appointment_expr(), Some("teamA:2"));
}

#[test]
fn protected_branch_cannot_be_deleted() {
    let rule = BranchProtection::new("release-*").expect("valid");

    assert!(!can_delete_branch(&rule, "release-1"));
    assert!(can_delete_branch(&rule, "main"));
}

// ============================================================================
// Identity propagation
// ============================================================================

#[test]
fn team_rename_keeps_count_and_unrelated_entries() {
    let mut rules = ProtectionRules::new(
        vec![BranchProtection::new("main")
            .expect("valid")
            .with_reviewers("teamA:2,bob")],
        vec![],
    );

    propagate(
        &mut rules,
        &IdentityEvent::TeamRenamed {
            old_name: "teamA".to_string(),
            new_name: "teamX".to_string(),
        },
        &directory(),
    );

    assert_eq!(rules.branch_protections[0].appointment_expr(), Some("teamX:2,bob"));
}

#[test]
fn deleting_last_entry_removes_file_rule_and_clears_branch_rule() {
    let mut rules = ProtectionRules::new(
        vec![BranchProtection::new("main")
            .expect("valid")
            .with_reviewers("frank")
            .with_file_protection(FileProtection::new("docs", "frank").expect("valid"))],
        vec![],
    );

    propagate(
        &mut rules,
        &IdentityEvent::AccountDeleted {
            name: "frank".to_string(),
        },
        &directory(),
    );

    let main = &rules.branch_protections[0];
    assert_eq!(rules.branch_protections.len(), 1);
    assert!(main.appointment_expr().is_none());
    assert!(main.file_protections.is_empty());
    assert!(main
        .review_appointment(&directory())
        .map_or(true, ReviewAppointment::is_empty));
}

#[test]
fn ownership_transfer_removes_teams_and_keeps_user() {
    let mut rules = ProtectionRules::new(
        vec![BranchProtection::new("main")
            .expect("valid")
            .with_reviewers("teamA:2,teamB:1,bob")],
        vec![TagProtection::new("v*", "teamB,bob").expect("valid")],
    );

    let report = propagate(
        &mut rules,
        &IdentityEvent::OwnershipTransferred {
            new_owner: "globex".to_string(),
        },
        &directory(),
    );

    assert_eq!(rules.branch_protections[0].appointment_expr(), Some("bob"));
    assert_eq!(rules.tag_protections[0].appointment_expr(), Some("bob"));
    assert_eq!(report.rewritten, 2);
}

// ============================================================================
// Repository policy
// ============================================================================

#[test]
fn rules_loaded_from_toml_drive_decisions() {
    let toml = r#"
        [[branch_protections]]
        branch = "main"
        reviewers = "teamA:2, bob"

        [[branch_protections.file_protections]]
        path = "docs"
        reviewers = "teamB"

        [[branch_protections]]
        branch = "feature-*"
        no_forced_push = false
        no_deletion = false

        [[tag_protections]]
        tag = "v*"
        tag_creator = "teamB"
    "#;
    let rules: ProtectionRules = toml::from_str(toml).expect("Failed to parse");
    let policy = RepositoryPolicy::new(rules, Arc::new(directory())).expect("valid rules");

    let main = policy.resolve_branch_policy("main");
    assert!(!main.forced_push_allowed);
    assert_eq!(main.required_approval.to_expr().as_deref(), Some("teamA:2,bob"));

    let docs = policy
        .resolve_file_override("main", "docs/guide.md")
        .expect("docs rule applies");
    assert_eq!(docs.to_expr().as_deref(), Some("teamB:1"));

    assert!(policy.resolve_branch_policy("feature-x").deletion_allowed);
    assert!(policy.resolve_tag_policy("v2", "erin").creation_allowed);
    assert!(!policy.resolve_tag_policy("v2", "alice").creation_allowed);

    let event = IdentityEvent::TeamDeleted {
        name: "teamB".to_string(),
    };
    policy.on_identity_event(&event, Arc::new(directory_after(&event)));

    let snapshot = policy.snapshot();
    assert!(snapshot.branch_protections[0].file_protections.is_empty());
    assert!(snapshot.tag_protections[0].appointment_expr().is_none());
    let denied = policy.resolve_tag_policy("v2", "erin");
    assert!(!denied.creation_allowed);
    assert!(denied.reason.is_some());
}

#[test]
fn team_rename_is_visible_through_repository_policy() {
    let rules = ProtectionRules::new(
        vec![BranchProtection::new("main")
            .expect("valid")
            .with_reviewers("teamA:2,bob")],
        vec![],
    );
    let policy = RepositoryPolicy::new(rules, Arc::new(directory())).expect("valid rules");
    let event = IdentityEvent::TeamRenamed {
        old_name: "teamA".to_string(),
        new_name: "teamX".to_string(),
    };

    policy.on_identity_event(&event, Arc::new(directory_after(&event)));

    let main = policy.resolve_branch_policy("main");
    assert_eq!(main.required_approval.to_expr().as_deref(), Some("teamX:2,bob"));
}
