//! Membership diff engine.
//!
//! Computes, for one group and one roster snapshot, the set of members
//! to add, members to remove, and roles/OUs to reconcile. Pure with
//! respect to its inputs: it never touches the membership store or the
//! audit log, which keeps the logic testable in isolation. Applying the
//! resulting delta is the orchestrator's job.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use crate::ids::{OrgUnitId, UserId};
use crate::role::RoleMap;
use crate::types::{GroupRole, Membership, RosterEntry};

/// A roster entry that should become a new membership.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Enrollment {
    /// The feed entry backing the enrollment.
    pub entry: RosterEntry,
    /// Role mapped from the entry's external role code.
    pub role: GroupRole,
    /// OU under which the membership is established.
    pub org_unit: OrgUnitId,
}

/// An advisory change to an existing membership.
///
/// Either field may be the reason the update was emitted; `None` means
/// that aspect already matches the roster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberUpdate {
    /// The member to update.
    pub user_id: UserId,
    /// Login name, for logging.
    pub username: String,
    /// New role, when the mapped role differs from the stored one.
    pub role: Option<GroupRole>,
    /// New provenance OU, when the member surfaced under a different OU
    /// than the one recorded.
    pub org_unit: Option<OrgUnitId>,
}

/// The minimal set of membership changes for one (group, OU) pair.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MembershipDelta {
    /// Roster entries with no membership row.
    pub to_enroll: Vec<Enrollment>,
    /// Members recorded under this OU and absent from the roster.
    pub to_unenroll: Vec<Membership>,
    /// Existing members whose role or recorded OU drifted.
    pub to_update: Vec<MemberUpdate>,
}

impl MembershipDelta {
    /// Whether the delta is a no-op.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.to_enroll.is_empty() && self.to_unenroll.is_empty() && self.to_update.is_empty()
    }
}

/// Reconcile the current members of a group against one OU's roster.
///
/// Rules:
/// - Ignored-classified entries are skipped entirely: they neither
///   enroll nor shield-then-unenroll the user. A current member whose
///   only roster appearance carries an ignored role code is left alone.
/// - Only members whose recorded OU equals `ou` can be unenrolled here;
///   a membership established under a different OU is out of scope for
///   this pass.
/// - Duplicate usernames in the roster: the last-seen entry wins. A
///   duplicate never produces a double enroll.
/// - An empty roster unenrolls every member recorded under `ou`. This is
///   intentional: it represents "the OU no longer contains this person".
#[must_use]
pub fn reconcile(
    ou: &OrgUnitId,
    current: &[Membership],
    roster: &[RosterEntry],
    roles: &RoleMap,
) -> MembershipDelta {
    // Dedup the roster by username, last entry wins. Ignored entries are
    // collected separately so they can be exempted from unenrollment.
    let mut classified: Vec<(RosterEntry, GroupRole)> = Vec::new();
    let mut position: HashMap<String, usize> = HashMap::new();
    let mut ignored_names: HashSet<String> = HashSet::new();

    for entry in roster {
        match roles.classify(entry.role_id).role() {
            Some(role) => {
                ignored_names.remove(&entry.username);
                if let Some(&idx) = position.get(&entry.username) {
                    classified[idx] = (entry.clone(), role);
                } else {
                    position.insert(entry.username.clone(), classified.len());
                    classified.push((entry.clone(), role));
                }
            }
            None => {
                // Last-seen wins for the ignored marker as well.
                if let Some(idx) = position.remove(&entry.username) {
                    classified.remove(idx);
                    for pos in position.values_mut() {
                        if *pos > idx {
                            *pos -= 1;
                        }
                    }
                }
                ignored_names.insert(entry.username.clone());
            }
        }
    }

    let roster_names: HashSet<&str> = classified
        .iter()
        .map(|(entry, _)| entry.username.as_str())
        .collect();

    let mut delta = MembershipDelta::default();

    // Members recorded under this OU that the roster no longer lists.
    for member in current {
        if member.org_unit == *ou
            && !roster_names.contains(member.username.as_str())
            && !ignored_names.contains(member.username.as_str())
        {
            delta.to_unenroll.push(member.clone());
        }
    }

    let by_username: HashMap<&str, &Membership> = current
        .iter()
        .map(|m| (m.username.as_str(), m))
        .collect();

    for (entry, role) in classified {
        match by_username.get(entry.username.as_str()) {
            None => delta.to_enroll.push(Enrollment {
                entry,
                role,
                org_unit: ou.clone(),
            }),
            Some(member) => {
                let new_role = (member.role != role).then_some(role);
                let new_ou = (member.org_unit != *ou).then(|| ou.clone());
                if new_role.is_some() || new_ou.is_some() {
                    delta.to_update.push(MemberUpdate {
                        user_id: member.user_id,
                        username: member.username.clone(),
                        role: new_role,
                        org_unit: new_ou,
                    });
                }
            }
        }
    }

    delta
}
