use serde::{Deserialize, Serialize};

use rolegate_core::{PrincipalId, RoleId};

/// A signed-in principal as handed over by the identity layer.
///
/// `assigned_role_ids` is authoritative when non-empty; `legacy_role` is the
/// single-role field older accounts still carry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Principal {
    pub id: PrincipalId,
    pub display_name: String,
    #[serde(default, rename = "roleIds")]
    pub assigned_role_ids: Vec<RoleId>,
    #[serde(default, rename = "role")]
    pub legacy_role: Option<RoleId>,
}

impl Principal {
    pub fn new(id: impl Into<PrincipalId>, display_name: impl Into<String>, assigned_role_ids: Vec<RoleId>) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            assigned_role_ids,
            legacy_role: None,
        }
    }

    /// Account that predates multi-role assignment.
    pub fn legacy(id: impl Into<PrincipalId>, display_name: impl Into<String>, role: impl Into<RoleId>) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            assigned_role_ids: Vec::new(),
            legacy_role: Some(role.into()),
        }
    }

    pub fn actual_role_ids(&self) -> Vec<RoleId> {
        actual_role_ids(self)
    }
}

/// The role ids genuinely assigned to `principal`.
///
/// Precedence: the assigned list when non-empty (order preserved), then the
/// legacy single role, then nothing. Never cache the result across principal
/// changes.
pub fn actual_role_ids(principal: &Principal) -> Vec<RoleId> {
    if !principal.assigned_role_ids.is_empty() {
        return principal.assigned_role_ids.clone();
    }

    if let Some(legacy) = &principal.legacy_role {
        if !legacy.as_str().trim().is_empty() {
            return vec![legacy.clone()];
        }
    }

    Vec::new()
}
