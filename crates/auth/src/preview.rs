//! Role preview: temporarily view the application as a single other role.
//!
//! # Invariants
//! - An enabled preview always names a role.
//! - A preview is only ever started, or kept, for a role whose hierarchy
//!   position is equal to or weaker than the actor's strongest *actual* role.
//! - The actor must actually hold the role-management permission.
//!
//! Any failure of these conditions silently disables the preview; nothing is
//! surfaced to the permission check itself.

use serde::{Deserialize, Serialize};

use rolegate_core::RoleId;

use crate::directory::RoleDirectory;
use crate::resolver::{EffectivePermissionTable, can};
use crate::roles::{Role, is_developer};
use crate::PermissionKey;

/// Preview state as held in memory and persisted to session storage.
///
/// Serialised as `{"enabled": bool, "previewRoleId": string | null}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewState {
    pub enabled: bool,
    #[serde(default)]
    pub preview_role_id: Option<RoleId>,
}

impl PreviewState {
    pub fn enabled(role_id: RoleId) -> Self {
        Self {
            enabled: true,
            preview_role_id: Some(role_id),
        }
    }

    /// The previewed role when the preview is actually in effect.
    pub fn active_role(&self) -> Option<&RoleId> {
        if !self.enabled {
            return None;
        }
        self.preview_role_id.as_ref().filter(|id| !id.as_str().trim().is_empty())
    }

    /// Nothing worth persisting: disabled and no remembered role.
    pub fn is_blank(&self) -> bool {
        !self.enabled && self.preview_role_id.as_ref().is_none_or(|id| id.is_empty())
    }

    /// Drop an `enabled` flag that has no role to go with it.
    fn sanitized(self) -> Self {
        if self.enabled && self.active_role().is_none() {
            return Self::default();
        }
        self
    }
}

/// Externally observable preview status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PreviewStatus {
    Disabled,
    Enabled(RoleId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PreviewPhase {
    /// Stored snapshot not read back yet; no validation, no persistence.
    Hydrating,
    Ready,
}

/// Outcome of a revalidation pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Revalidation {
    /// Roles still loading (or snapshot not hydrated); nothing was checked.
    Skipped,
    Unchanged,
    /// The active preview failed eligibility and was cleared.
    Cleared,
}

/// Everything the eligibility predicate looks at.
///
/// `actual_role_ids` must be the principal's real roles, never the effective
/// (previewed) set.
#[derive(Debug, Clone, Copy)]
pub struct EligibilityContext<'a> {
    pub actual_role_ids: &'a [RoleId],
    pub directory: &'a RoleDirectory,
    pub table: &'a EffectivePermissionTable,
    pub manage_permission: &'a PermissionKey,
}

impl EligibilityContext<'_> {
    /// Strongest actual position; `None` means no authority at all.
    pub fn top_position(&self) -> Option<i64> {
        self.directory.top_position(self.actual_role_ids)
    }

    pub fn can_manage_roles(&self) -> bool {
        let keys = self.directory.lookup_keys(self.actual_role_ids);
        can(&keys, self.manage_permission, self.table)
    }

    fn holds_developer(&self) -> bool {
        self.actual_role_ids.iter().any(|id| is_developer(id.as_str()))
    }
}

/// Non-escalation predicate: may the actor preview `candidate`?
pub fn is_eligible(candidate: &RoleId, ctx: &EligibilityContext<'_>) -> bool {
    let Some(top) = ctx.top_position() else {
        return false;
    };

    if !ctx.can_manage_roles() {
        return false;
    }

    let candidate_position = if is_developer(candidate.as_str()) {
        // Only a holder may preview it.
        if !ctx.holds_developer() {
            return false;
        }
        0
    } else {
        match ctx.directory.get(candidate) {
            Some(role) => role.effective_position(),
            None => return false,
        }
    };

    candidate_position >= top
}

/// Roles the actor may preview, strongest first.
pub fn eligible_roles<'a>(ctx: &EligibilityContext<'a>) -> Vec<&'a Role> {
    let mut roles: Vec<&Role> = ctx
        .directory
        .roles()
        .iter()
        .filter(|role| is_eligible(&role.id, ctx))
        .collect();
    roles.sort_by(|a, b| {
        a.effective_position()
            .cmp(&b.effective_position())
            .then_with(|| a.display_name.cmp(&b.display_name))
    });
    roles
}

/// Guarded preview state machine.
#[derive(Debug, Clone)]
pub struct PreviewEngine {
    phase: PreviewPhase,
    state: PreviewState,
}

impl Default for PreviewEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl PreviewEngine {
    pub fn new() -> Self {
        Self {
            phase: PreviewPhase::Hydrating,
            state: PreviewState::default(),
        }
    }

    /// Restore the stored snapshot. Only the first call has an effect.
    ///
    /// The restored preview is not trusted until the next revalidation.
    pub fn hydrate(&mut self, snapshot: Option<PreviewState>) {
        if self.phase == PreviewPhase::Ready {
            tracing::debug!("preview already hydrated; ignoring snapshot");
            return;
        }
        self.state = snapshot.map(PreviewState::sanitized).unwrap_or_default();
        self.phase = PreviewPhase::Ready;
    }

    pub fn is_hydrated(&self) -> bool {
        self.phase == PreviewPhase::Ready
    }

    pub fn state(&self) -> &PreviewState {
        &self.state
    }

    pub fn status(&self) -> PreviewStatus {
        match self.state.active_role() {
            Some(id) => PreviewStatus::Enabled(id.clone()),
            None => PreviewStatus::Disabled,
        }
    }

    /// Switch the preview to `role_id`.
    ///
    /// Ineligible roles leave the current state untouched. Returns whether the
    /// preview is now on `role_id`.
    pub fn start(&mut self, role_id: RoleId, ctx: &EligibilityContext<'_>) -> bool {
        if self.phase == PreviewPhase::Hydrating {
            tracing::debug!(role_id = %role_id, "preview start before hydration; ignoring");
            return false;
        }

        if !is_eligible(&role_id, ctx) {
            tracing::info!(role_id = %role_id, "refusing preview of ineligible role");
            return false;
        }

        self.state = PreviewState::enabled(role_id);
        true
    }

    /// Turn the preview off. The last role id is kept as an inactive value.
    pub fn stop(&mut self) {
        self.state.enabled = false;
    }

    /// Forget everything (logout or invariant violation).
    pub fn reset(&mut self) {
        self.state = PreviewState::default();
    }

    /// Re-check the active preview against current data.
    ///
    /// Skipped until hydration has happened and the role directory finished
    /// loading, to avoid clearing a valid preview against partial data.
    pub fn revalidate(&mut self, ctx: &EligibilityContext<'_>) -> Revalidation {
        if self.phase == PreviewPhase::Hydrating || !ctx.directory.is_loaded() {
            return Revalidation::Skipped;
        }

        let Some(role_id) = self.state.active_role() else {
            return Revalidation::Unchanged;
        };

        if is_eligible(role_id, ctx) {
            return Revalidation::Unchanged;
        }

        tracing::info!(role_id = %role_id, "preview no longer eligible; clearing");
        self.reset();
        Revalidation::Cleared
    }
}
