//! # BranchGuard Core
//!
//! Branch and tag protection policy engine.
//!
//! A repository owns an ordered list of branch protection rules, each with
//! optional file-level sub-rules, and an ordered list of tag protection rules.
//! Every rule names its reviewers or tag creators with a review appointment
//! expression such as `core:2, alice`, where `core:2` asks for two approvals
//! from the `core` team and `alice` asks for one specific account.
//!
//! The crate answers three questions:
//!
//! - which rule governs a branch, a file on a branch or a tag (first declared
//!   match wins),
//! - who has to approve a change, or may create a tag,
//! - what the rules look like after a team or account is renamed or deleted,
//!   or the repository changes owner.
//!
//! Identities are looked up through a [`MembershipDirectory`]. References the
//! directory no longer knows are dropped silently when an appointment is
//! resolved, and [`propagate`] rewrites the stored expressions when the
//! directory reports a change.

pub mod branch_protection;
pub mod directory;
pub mod errors;
pub mod pattern;
pub mod policy;
pub mod propagation;
pub mod protection;
pub mod review_appointment;
pub mod rules;
pub mod tag_protection;

pub use branch_protection::{BranchProtection, FileProtection};
pub use directory::{MembershipDirectory, StaticDirectory};
pub use errors::{PolicyError, PolicyResult};
pub use pattern::{matches_branch, matches_path_child_aware, PathPattern, RefPattern};
pub use policy::{BranchPolicy, RepositoryPolicy, TagPolicy};
pub use propagation::{propagate, IdentityEvent, PropagationReport};
pub use protection::{AppointmentCell, EditOutcome, Protection};
pub use review_appointment::{ApprovalCheck, ReviewAppointment, TOKEN_SEPARATOR};
pub use rules::{
    can_delete_branch, can_force_push, find_branch_protection, find_file_protection,
    find_tag_protection, ProtectionRules,
};
pub use tag_protection::TagProtection;
