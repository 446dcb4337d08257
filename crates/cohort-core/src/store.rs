//! Store seams consumed by the sync engine.
//!
//! The membership store, user directory, and audit sink are external
//! collaborators (the hosting CMS owns them). The engine only ever sees
//! these traits; the in-memory implementations below back the test
//! suites and the snapshot tooling.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use thiserror::Error;
use tokio::sync::RwLock;

use crate::ids::{GroupId, OrgUnitId, UserId};
use crate::types::{AuditEntry, Group, GroupRole, Membership, User};

/// Errors surfaced by store collaborators.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Requested entity does not exist.
    #[error("not found: {entity}")]
    NotFound { entity: String },

    /// Write conflicted with existing state.
    #[error("conflict: {message}")]
    Conflict { message: String },

    /// Backend failure (database down, save failed).
    #[error("store backend error: {message}")]
    Backend {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl StoreError {
    /// Create a not-found error.
    pub fn not_found(entity: impl Into<String>) -> Self {
        StoreError::NotFound {
            entity: entity.into(),
        }
    }

    /// Create a backend error.
    pub fn backend(message: impl Into<String>) -> Self {
        StoreError::Backend {
            message: message.into(),
            source: None,
        }
    }
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Group/membership persistence owned by the hosting CMS.
#[async_trait]
pub trait MembershipStore: Send + Sync {
    /// Groups eligible for sync: enabled, OU list non-empty, sorted
    /// most-recently-changed first.
    async fn list_eligible_groups(&self) -> StoreResult<Vec<Group>>;

    /// Current members of a group.
    async fn members(&self, group_id: GroupId) -> StoreResult<Vec<Membership>>;

    /// Add a member. At most one membership exists per (group, user);
    /// adding an existing member is a conflict.
    async fn add_member(&self, membership: Membership) -> StoreResult<()>;

    /// Remove a member.
    async fn remove_member(&self, group_id: GroupId, user_id: UserId) -> StoreResult<()>;

    /// Update a member's role in place.
    async fn set_member_role(
        &self,
        group_id: GroupId,
        user_id: UserId,
        role: GroupRole,
    ) -> StoreResult<()>;

    /// Update the OU recorded as the membership's provenance.
    async fn set_member_org_unit(
        &self,
        group_id: GroupId,
        user_id: UserId,
        org_unit: OrgUnitId,
    ) -> StoreResult<()>;
}

/// User account lookup and provisioning.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Find a user by login name.
    async fn find_by_username(&self, username: &str) -> StoreResult<Option<User>>;

    /// Find a user by email address.
    async fn find_by_email(&self, email: &str) -> StoreResult<Option<User>>;

    /// Create a user account. Called when a roster entry maps to no
    /// existing account.
    async fn create_user(&self, username: &str, email: &str) -> StoreResult<User>;
}

/// Append-only audit log of enroll/unenroll decisions.
///
/// A failure to record must never roll back the membership mutation
/// that triggered it; callers log sink errors independently.
#[async_trait]
pub trait AuditSink: Send + Sync {
    /// Append one entry.
    async fn record(&self, entry: AuditEntry) -> StoreResult<()>;
}

// ── In-memory implementations ────────────────────────────────────────────

/// In-memory membership store for tests and snapshot tooling.
#[derive(Debug, Default)]
pub struct MemoryMembershipStore {
    groups: RwLock<Vec<Group>>,
    members: RwLock<HashMap<GroupId, Vec<Membership>>>,
}

impl MemoryMembershipStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a group.
    pub async fn insert_group(&self, group: Group) {
        self.groups.write().await.push(group);
    }

    /// Seed a membership directly, bypassing the add-member conflict check.
    pub async fn seed_member(&self, membership: Membership) {
        self.members
            .write()
            .await
            .entry(membership.group_id)
            .or_default()
            .push(membership);
    }
}

#[async_trait]
impl MembershipStore for MemoryMembershipStore {
    async fn list_eligible_groups(&self) -> StoreResult<Vec<Group>> {
        let mut eligible: Vec<Group> = self
            .groups
            .read()
            .await
            .iter()
            .filter(|g| g.is_eligible())
            .cloned()
            .collect();
        eligible.sort_by(|a, b| b.changed_at.cmp(&a.changed_at));
        Ok(eligible)
    }

    async fn members(&self, group_id: GroupId) -> StoreResult<Vec<Membership>> {
        Ok(self
            .members
            .read()
            .await
            .get(&group_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn add_member(&self, membership: Membership) -> StoreResult<()> {
        let mut members = self.members.write().await;
        let rows = members.entry(membership.group_id).or_default();
        if rows.iter().any(|m| m.user_id == membership.user_id) {
            return Err(StoreError::Conflict {
                message: format!(
                    "user {} is already a member of group {}",
                    membership.user_id, membership.group_id
                ),
            });
        }
        rows.push(membership);
        Ok(())
    }

    async fn remove_member(&self, group_id: GroupId, user_id: UserId) -> StoreResult<()> {
        let mut members = self.members.write().await;
        let rows = members
            .get_mut(&group_id)
            .ok_or_else(|| StoreError::not_found(format!("group {group_id}")))?;
        let before = rows.len();
        rows.retain(|m| m.user_id != user_id);
        if rows.len() == before {
            return Err(StoreError::not_found(format!("membership {user_id}")));
        }
        Ok(())
    }

    async fn set_member_role(
        &self,
        group_id: GroupId,
        user_id: UserId,
        role: GroupRole,
    ) -> StoreResult<()> {
        let mut members = self.members.write().await;
        let row = members
            .get_mut(&group_id)
            .and_then(|rows| rows.iter_mut().find(|m| m.user_id == user_id))
            .ok_or_else(|| StoreError::not_found(format!("membership {user_id}")))?;
        row.role = role;
        Ok(())
    }

    async fn set_member_org_unit(
        &self,
        group_id: GroupId,
        user_id: UserId,
        org_unit: OrgUnitId,
    ) -> StoreResult<()> {
        let mut members = self.members.write().await;
        let row = members
            .get_mut(&group_id)
            .and_then(|rows| rows.iter_mut().find(|m| m.user_id == user_id))
            .ok_or_else(|| StoreError::not_found(format!("membership {user_id}")))?;
        row.org_unit = org_unit;
        Ok(())
    }
}

/// In-memory user directory.
#[derive(Debug, Default)]
pub struct MemoryDirectory {
    users: RwLock<Vec<User>>,
}

impl MemoryDirectory {
    /// Create an empty directory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an existing user.
    pub async fn insert_user(&self, user: User) {
        self.users.write().await.push(user);
    }
}

#[async_trait]
impl UserDirectory for MemoryDirectory {
    async fn find_by_username(&self, username: &str) -> StoreResult<Option<User>> {
        Ok(self
            .users
            .read()
            .await
            .iter()
            .find(|u| u.username == username)
            .cloned())
    }

    async fn find_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        Ok(self
            .users
            .read()
            .await
            .iter()
            .find(|u| u.email == email)
            .cloned())
    }

    async fn create_user(&self, username: &str, email: &str) -> StoreResult<User> {
        let user = User {
            id: UserId::new(),
            username: username.to_string(),
            email: email.to_string(),
        };
        self.users.write().await.push(user.clone());
        Ok(user)
    }
}

/// In-memory audit sink that retains entries in append order.
#[derive(Debug, Default)]
pub struct MemoryAuditSink {
    entries: RwLock<Vec<AuditEntry>>,
}

impl MemoryAuditSink {
    /// Create an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of recorded entries, in append order.
    pub async fn entries(&self) -> Vec<AuditEntry> {
        self.entries.read().await.clone()
    }
}

#[async_trait]
impl AuditSink for MemoryAuditSink {
    async fn record(&self, entry: AuditEntry) -> StoreResult<()> {
        self.entries.write().await.push(entry);
        Ok(())
    }
}

/// Build a membership row for an enrollment decision.
#[must_use]
pub fn new_membership(
    group_id: GroupId,
    user_id: UserId,
    username: impl Into<String>,
    org_unit: OrgUnitId,
    role: GroupRole,
) -> Membership {
    Membership {
        group_id,
        user_id,
        username: username.into(),
        org_unit,
        role,
        enrolled_at: Utc::now(),
    }
}
