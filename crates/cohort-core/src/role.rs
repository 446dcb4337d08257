//! External role code classification.
//!
//! The LMS reports a numeric role code per roster entry. The mapping
//! from those codes to local group roles is a deployment concern: the
//! external taxonomy changes without notice, so the table is data, not
//! code. Classification is total; it never fails.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::types::{GroupRole, RoleClass};

/// Deployment defaults for LMS role codes (D2L-style taxonomy).
///
/// Course Manager / Course Editor.
const DEFAULT_CREATOR_ROLES: &[i64] = &[109, 110];
/// TA level 4 / staff.
const DEFAULT_EDITOR_ROLES: &[i64] = &[117, 120];
/// Guest, observer, withdrawn. These entries are skipped entirely.
const DEFAULT_IGNORED_ROLES: &[i64] = &[129, 131, 136];

/// Configurable mapping from external role codes to local roles.
///
/// Any code not listed in one of the sets falls back to
/// [`GroupRole::Member`]: an unrecognized but plausible code (a new
/// student-type role, say) must not block enrollment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoleMap {
    /// Codes classified as [`GroupRole::Creator`].
    #[serde(default = "default_creator_roles")]
    pub creator_roles: HashSet<i64>,
    /// Codes classified as [`GroupRole::Editor`].
    #[serde(default = "default_editor_roles")]
    pub editor_roles: HashSet<i64>,
    /// Codes excluded from reconciliation entirely.
    #[serde(default = "default_ignored_roles")]
    pub ignored_roles: HashSet<i64>,
}

fn default_creator_roles() -> HashSet<i64> {
    DEFAULT_CREATOR_ROLES.iter().copied().collect()
}

fn default_editor_roles() -> HashSet<i64> {
    DEFAULT_EDITOR_ROLES.iter().copied().collect()
}

fn default_ignored_roles() -> HashSet<i64> {
    DEFAULT_IGNORED_ROLES.iter().copied().collect()
}

impl Default for RoleMap {
    fn default() -> Self {
        Self {
            creator_roles: default_creator_roles(),
            editor_roles: default_editor_roles(),
            ignored_roles: default_ignored_roles(),
        }
    }
}

impl RoleMap {
    /// Classify an external role code.
    ///
    /// Deterministic table lookup. Ignored codes win over everything
    /// else; unknown codes default to [`GroupRole::Member`].
    #[must_use]
    pub fn classify(&self, role_id: i64) -> RoleClass {
        if self.ignored_roles.contains(&role_id) {
            RoleClass::Ignored
        } else if self.creator_roles.contains(&role_id) {
            RoleClass::Role(GroupRole::Creator)
        } else if self.editor_roles.contains(&role_id) {
            RoleClass::Role(GroupRole::Editor)
        } else {
            RoleClass::Role(GroupRole::Member)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_table_classification() {
        let map = RoleMap::default();
        assert_eq!(map.classify(109), RoleClass::Role(GroupRole::Creator));
        assert_eq!(map.classify(110), RoleClass::Role(GroupRole::Creator));
        assert_eq!(map.classify(117), RoleClass::Role(GroupRole::Editor));
        assert_eq!(map.classify(120), RoleClass::Role(GroupRole::Editor));
        assert_eq!(map.classify(129), RoleClass::Ignored);
        assert_eq!(map.classify(131), RoleClass::Ignored);
        assert_eq!(map.classify(136), RoleClass::Ignored);
    }

    #[test]
    fn test_student_code_maps_to_member() {
        let map = RoleMap::default();
        assert_eq!(map.classify(107), RoleClass::Role(GroupRole::Member));
    }

    #[test]
    fn test_unknown_codes_fall_back_to_member() {
        // Totality: every input maps to exactly one class, never an error.
        let map = RoleMap::default();
        for code in [0, -1, 42, 9999, i64::MAX, i64::MIN] {
            assert_eq!(map.classify(code), RoleClass::Role(GroupRole::Member));
        }
    }

    #[test]
    fn test_table_is_overridable() {
        let map: RoleMap = serde_json::from_str(
            r#"{"creator_roles": [1], "editor_roles": [2], "ignored_roles": [3]}"#,
        )
        .unwrap();
        assert_eq!(map.classify(1), RoleClass::Role(GroupRole::Creator));
        assert_eq!(map.classify(2), RoleClass::Role(GroupRole::Editor));
        assert_eq!(map.classify(3), RoleClass::Ignored);
        // Codes from the shipped defaults no longer apply once overridden.
        assert_eq!(map.classify(129), RoleClass::Role(GroupRole::Member));
    }

    #[test]
    fn test_empty_json_yields_defaults() {
        let map: RoleMap = serde_json::from_str("{}").unwrap();
        assert_eq!(map.classify(129), RoleClass::Ignored);
        assert_eq!(map.classify(109), RoleClass::Role(GroupRole::Creator));
    }
}
