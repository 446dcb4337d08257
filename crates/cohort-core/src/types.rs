//! Core domain types for roster synchronization.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::ids::{GroupId, OrgUnitId, UserId};

/// A roster-synchronized cohort.
///
/// Groups are created and edited externally (CMS UI); the sync engine
/// only ever reads them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Group {
    /// Group ID.
    pub id: GroupId,
    /// Human-readable group name.
    pub name: String,
    /// Whether this group participates in roster sync.
    pub sync_enabled: bool,
    /// Ordered list of OUs whose rosters feed this group. May be empty,
    /// in which case the group is not eligible for sync.
    pub org_units: Vec<OrgUnitId>,
    /// Last time the group was changed. Eligible groups are processed
    /// most-recently-changed first so an interrupted batch run revisits
    /// active groups soonest.
    pub changed_at: DateTime<Utc>,
}

impl Group {
    /// Whether the group is eligible for roster sync.
    #[must_use]
    pub fn is_eligible(&self) -> bool {
        self.sync_enabled && !self.org_units.is_empty()
    }
}

/// One row of an external roster feed.
///
/// Ephemeral: exists only for the duration of one fetch-reconcile cycle
/// and is never persisted directly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosterEntry {
    /// Identifier of the account in the external LMS.
    pub external_id: String,
    /// Login name; the correlation key against local memberships.
    pub username: String,
    /// Email address, used as a secondary correlation key.
    pub email: Option<String>,
    /// Display name as reported by the feed.
    pub display_name: Option<String>,
    /// Given name.
    pub first_name: Option<String>,
    /// Family name.
    pub last_name: Option<String>,
    /// External role code, classified by [`crate::role::RoleMap`].
    pub role_id: i64,
}

/// Local role a member holds within a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupRole {
    /// Full control over the group.
    Creator,
    /// Can edit group content.
    Editor,
    /// Ordinary member (students).
    Member,
}

impl GroupRole {
    /// Convert to string representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            GroupRole::Creator => "creator",
            GroupRole::Editor => "editor",
            GroupRole::Member => "member",
        }
    }
}

impl fmt::Display for GroupRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for GroupRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "creator" => Ok(GroupRole::Creator),
            "editor" => Ok(GroupRole::Editor),
            "member" => Ok(GroupRole::Member),
            _ => Err(format!("Unknown group role: {s}")),
        }
    }
}

/// Outcome of classifying an external role code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoleClass {
    /// Entry maps to a local role.
    Role(GroupRole),
    /// Entry is skipped entirely: no enroll, no unenroll side effect.
    Ignored,
}

impl RoleClass {
    /// The mapped role, if the entry is not ignored.
    #[must_use]
    pub fn role(&self) -> Option<GroupRole> {
        match self {
            RoleClass::Role(role) => Some(*role),
            RoleClass::Ignored => None,
        }
    }

    /// Whether the entry should be excluded from reconciliation.
    #[must_use]
    pub fn is_ignored(&self) -> bool {
        matches!(self, RoleClass::Ignored)
    }
}

/// The relation between a user and a group.
///
/// At most one membership exists per (group, user) pair. The `org_unit`
/// field records the OU under which the membership was established and
/// is mutable on re-sync; a member is only unenrolled by a pass over the
/// OU currently recorded here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Membership {
    /// Group the user belongs to.
    pub group_id: GroupId,
    /// Local user account.
    pub user_id: UserId,
    /// Login name, denormalized for roster correlation.
    pub username: String,
    /// OU that justified the membership (provenance).
    pub org_unit: OrgUnitId,
    /// Role the member holds.
    pub role: GroupRole,
    /// When the membership was established.
    pub enrolled_at: DateTime<Utc>,
}

/// Immutable record of one enroll/unenroll decision.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    /// Entry ID.
    pub id: Uuid,
    /// Name of the group at the time of the event.
    pub group_name: String,
    /// OU under which the decision was made.
    pub group_ou: OrgUnitId,
    /// Affected user's login name.
    pub username: String,
    /// `true` for enroll, `false` for unenroll.
    pub enrolled: bool,
    /// When the decision was recorded.
    pub created_at: DateTime<Utc>,
}

impl AuditEntry {
    /// Create an audit entry for an enroll or unenroll decision.
    #[must_use]
    pub fn new(
        group_name: impl Into<String>,
        group_ou: OrgUnitId,
        username: impl Into<String>,
        enrolled: bool,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            group_name: group_name.into(),
            group_ou,
            username: username.into(),
            enrolled,
            created_at: Utc::now(),
        }
    }
}

/// A local user account as seen through the user directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// User ID.
    pub id: UserId,
    /// Login name.
    pub username: String,
    /// Email address.
    pub email: String,
}
