//! Tests for the repository policy facade.

use super::*;
use crate::{BranchProtection, FileProtection, PolicyError, StaticDirectory, TagProtection};
use std::thread;

fn directory() -> StaticDirectory {
    StaticDirectory::new("acme")
        .with_team("teamA", ["alice", "bob"])
        .with_team("release", ["carol"])
        .with_account("bob")
        .with_account("erin")
}

fn policy() -> RepositoryPolicy {
    let mut feature = BranchProtection::new("feature-*").expect("valid");
    feature.no_forced_push = false;
    feature.no_deletion = false;

    let rules = ProtectionRules::new(
        vec![
            BranchProtection::new("main")
                .expect("valid")
                .with_reviewers("teamA:2")
                .with_file_protection(FileProtection::new("src", "teamA:1").expect("valid"))
                .with_file_protection(FileProtection::new("src/gen", "bob").expect("valid")),
            feature,
        ],
        vec![TagProtection::new("v*", "release").expect("valid")],
    );

    RepositoryPolicy::new(rules, Arc::new(directory())).expect("valid rules")
}

#[test]
fn test_new_rejects_invalid_rules() {
    let rules = ProtectionRules::new(
        vec![BranchProtection::new("main")
            .expect("valid")
            .with_reviewers("teamA:0")],
        vec![],
    );

    let result = RepositoryPolicy::new(rules, Arc::new(directory()));
    assert!(matches!(result, Err(PolicyError::ExpressionSyntax { .. })));
}

#[test]
fn test_resolve_protected_branch() {
    let decision = policy().resolve_branch_policy("main");

    assert_eq!(decision.matched_pattern.as_deref(), Some("main"));
    assert!(!decision.forced_push_allowed);
    assert!(!decision.deletion_allowed);
    assert_eq!(decision.required_approval.team_count("teamA"), Some(2));
}

#[test]
fn test_resolve_relaxed_branch() {
    let decision = policy().resolve_branch_policy("feature-x");

    assert_eq!(decision.matched_pattern.as_deref(), Some("feature-*"));
    assert!(decision.forced_push_allowed);
    assert!(decision.deletion_allowed);
    assert!(decision.required_approval.is_empty());
}

#[test]
fn test_resolve_unprotected_branch() {
    let decision = policy().resolve_branch_policy("hotfix-1");

    assert_eq!(decision.matched_pattern, None);
    assert!(decision.forced_push_allowed);
    assert!(decision.deletion_allowed);
    assert!(decision.required_approval.is_empty());
}

#[test]
fn test_resolve_file_override_first_match() {
    let policy = policy();

    let appointment = policy
        .resolve_file_override("main", "src/gen/file.go")
        .expect("src covers the file");
    assert_eq!(appointment.to_expr().as_deref(), Some("teamA:1"));

    assert!(policy.resolve_file_override("main", "README.md").is_none());
    assert!(policy.resolve_file_override("hotfix-1", "src/lib.rs").is_none());
}

#[test]
fn test_resolve_tag_policy() {
    let policy = policy();

    let allowed = policy.resolve_tag_policy("v1.0", "carol");
    assert!(allowed.creation_allowed);
    assert!(allowed.reason.is_none());
    assert!(!allowed.update_allowed);

    let denied = policy.resolve_tag_policy("v1.0", "bob");
    assert!(!denied.creation_allowed);
    assert!(denied.reason.expect("reason given").contains("bob"));

    let unprotected = policy.resolve_tag_policy("nightly", "bob");
    assert!(unprotected.creation_allowed);
    assert_eq!(unprotected.matched_pattern, None);
}

fn directory_after(event: &IdentityEvent) -> Arc<dyn MembershipDirectory> {
    let mut next = directory();
    next.apply(event);
    Arc::new(next)
}

fn on_event(policy: &RepositoryPolicy, event: IdentityEvent) -> PropagationReport {
    policy.on_identity_event(&event, directory_after(&event))
}

// ============================================================================
// Identity events
// ============================================================================

#[test]
fn test_identity_event_updates_decisions() {
    let policy = policy();

    let report = on_event(
        &policy,
        IdentityEvent::TeamDeleted {
            name: "teamA".to_string(),
        },
    );

    assert_eq!(report.cleared, 1);
    assert_eq!(report.removed, 1);
    assert!(policy.resolve_branch_policy("main").required_approval.is_empty());
    let override_ = policy
        .resolve_file_override("main", "src/gen/file.go")
        .expect("src/gen still covers the file");
    assert!(override_.contains_user("bob"));
}

/// A renamed team keeps its requirement once the directory knows the new name.
#[test]
fn test_team_rename_keeps_requirements() {
    let policy = policy();
    assert!(policy.resolve_tag_policy("v1.0", "carol").creation_allowed);

    on_event(
        &policy,
        IdentityEvent::TeamRenamed {
            old_name: "teamA".to_string(),
            new_name: "teamX".to_string(),
        },
    );

    assert_eq!(
        policy
            .resolve_branch_policy("main")
            .required_approval
            .to_expr()
            .as_deref(),
        Some("teamX:2")
    );
    let override_ = policy
        .resolve_file_override("main", "src/lib.rs")
        .expect("src covers the file");
    assert_eq!(override_.to_expr().as_deref(), Some("teamX:1"));
    assert!(policy.directory().has_team("teamX"));
}

#[test]
fn test_bare_tag_creator_team_rename() {
    let policy = policy();

    on_event(
        &policy,
        IdentityEvent::TeamRenamed {
            old_name: "release".to_string(),
            new_name: "shipit".to_string(),
        },
    );

    let decision = policy.resolve_tag_policy("v1.0", "carol");
    assert!(decision.creation_allowed);
    assert_eq!(
        policy.snapshot().tag_protections[0].appointment_expr(),
        Some("shipit:1")
    );
}

#[test]
fn test_account_rename_keeps_requirements() {
    let policy = policy();

    on_event(
        &policy,
        IdentityEvent::AccountRenamed {
            old_name: "bob".to_string(),
            new_name: "robert".to_string(),
        },
    );

    let override_ = policy
        .resolve_file_override("main", "src/gen/file.go")
        .expect("src covers the file");
    assert_eq!(override_.to_expr().as_deref(), Some("teamA:1"));

    let snapshot = policy.snapshot();
    assert_eq!(
        snapshot.branch_protections[0].file_protections[1].appointment_expr(),
        Some("robert")
    );
    let main = policy.resolve_branch_policy("main");
    assert_eq!(main.required_approval.team_count("teamA"), Some(2));
}

/// Names are classified against the directory held before the event, even
/// when the caller's directory has already moved to the new owner.
#[test]
fn test_ownership_transfer_with_directory_already_switched() {
    let policy = policy();
    let event = IdentityEvent::OwnershipTransferred {
        new_owner: "globex".to_string(),
    };
    let transferred = directory_after(&event);
    assert!(!transferred.has_team("release"));

    let report = policy.on_identity_event(&event, transferred);

    assert_eq!(report.removed, 1);
    assert!(policy.resolve_branch_policy("main").required_approval.is_empty());
    assert!(policy.resolve_file_override("main", "src/lib.rs").is_none());
    let override_ = policy
        .resolve_file_override("main", "src/gen/file.go")
        .expect("src/gen still covers the file");
    assert_eq!(override_.to_expr().as_deref(), Some("bob"));

    let tag = policy.resolve_tag_policy("v1.0", "carol");
    assert!(!tag.creation_allowed);
    assert!(tag.reason.is_some());
    assert!(policy.snapshot().tag_protections[0].appointment_expr().is_none());
    assert_eq!(policy.directory().owner(), "globex");
}

#[test]
fn test_replace_directory_refreshes_resolved_appointments() {
    let policy = policy();
    assert_eq!(
        policy.resolve_branch_policy("main").required_approval.team_count("teamA"),
        Some(2)
    );

    policy.replace_directory(Arc::new(
        StaticDirectory::new("acme").with_team("teamA", ["alice"]),
    ));

    assert_eq!(
        policy.resolve_branch_policy("main").required_approval.team_count("teamA"),
        Some(1)
    );
}

#[test]
fn test_replace_rules_keeps_old_rules_on_error() {
    let policy = policy();
    let invalid = ProtectionRules::new(
        vec![],
        vec![TagProtection::new("v*", "release,").expect("valid pattern")],
    );

    assert!(policy.replace_rules(invalid).is_err());
    assert_eq!(policy.snapshot().branch_protections.len(), 2);

    policy
        .replace_rules(ProtectionRules::default())
        .expect("empty rules are valid");
    assert!(policy.snapshot().branch_protections.is_empty());
}

#[test]
fn test_rules_for_deleted_branch() {
    assert_eq!(policy().rules_for_deleted_branch("feature-x"), vec![1]);
    assert!(policy().rules_for_deleted_branch("hotfix").is_empty());
}

#[test]
fn test_branch_policy_serializes_expression() {
    let json = serde_json::to_value(policy().resolve_branch_policy("main")).expect("serialize");

    assert_eq!(json["required_approval"], "teamA:2");
    assert_eq!(json["forced_push_allowed"], false);
}

/// Readers see either the rules before or after an event, never a mix.
#[test]
fn test_concurrent_reads_during_propagation() {
    let policy = policy();

    thread::scope(|scope| {
        for _ in 0..4 {
            scope.spawn(|| {
                for _ in 0..100 {
                    let decision = policy.resolve_branch_policy("main");
                    let expr = decision.required_approval.to_expr();
                    assert!(
                        expr.as_deref() == Some("teamA:2") || expr.as_deref() == Some("teamX:2"),
                        "unexpected reviewers {:?}",
                        expr
                    );
                }
            });
        }

        scope.spawn(|| {
            on_event(
                &policy,
                IdentityEvent::TeamRenamed {
                    old_name: "teamA".to_string(),
                    new_name: "teamX".to_string(),
                },
            );
        });
    });

    let snapshot = policy.snapshot();
    assert_eq!(snapshot.branch_protections[0].appointment_expr(), Some("teamX:2"));
}
