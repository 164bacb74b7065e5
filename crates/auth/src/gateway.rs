//! The single source of the role set used for authorization decisions.

use rolegate_core::RoleId;

use crate::Principal;
use crate::preview::PreviewState;
use crate::principal::actual_role_ids;

/// Role ids in effect for `principal`.
///
/// Returns the previewed role alone when a preview is enabled, otherwise the
/// principal's actual roles. The preview is trusted as-is: the preview engine
/// revalidates it on every change before this is consulted.
///
/// Application code passes only this set to `can`; actual roles are read
/// directly only for preview eligibility.
pub fn effective_role_ids(principal: &Principal, preview: &PreviewState) -> Vec<RoleId> {
    if let Some(role_id) = preview.active_role() {
        return vec![role_id.clone()];
    }
    actual_role_ids(principal)
}
