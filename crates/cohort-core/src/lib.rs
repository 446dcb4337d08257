//! Core domain model for LMS roster reconciliation.
//!
//! This crate holds everything the sync engine shares with its
//! collaborators: type-safe identifiers, the group/membership/roster
//! data model, the configurable role classification table, the pure
//! membership diff engine, and the trait seams for the membership
//! store, user directory, audit log, and secret storage.
//!
//! The diff engine is deliberately free of I/O: given the current
//! members of a group and one OU's roster snapshot it computes the
//! minimal change set, and applying that change set belongs to
//! `cohort-sync`.

pub mod diff;
pub mod ids;
pub mod role;
pub mod secret;
pub mod store;
pub mod types;

pub use diff::{reconcile, Enrollment, MemberUpdate, MembershipDelta};
pub use ids::{GroupId, OrgUnitId, UserId};
pub use role::RoleMap;
pub use secret::{EnvSecretProvider, SecretError, SecretProvider, SecretValue, StaticSecretProvider};
pub use store::{
    new_membership, AuditSink, MembershipStore, MemoryAuditSink, MemoryDirectory,
    MemoryMembershipStore, StoreError, StoreResult, UserDirectory,
};
pub use types::{AuditEntry, Group, GroupRole, Membership, RoleClass, RosterEntry, User};
