//! Session configuration (collection names, storage keys).

use rolegate_core::{DomainError, DomainResult};

use crate::PermissionKey;
use crate::permissions::ROLES_VIEW;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthzConfig {
    /// Document-store collection holding role documents.
    pub roles_collection: String,
    /// Collection holding per-role permission overrides, keyed by role name.
    pub overrides_collection: String,
    /// Session-storage key of the preview snapshot.
    pub preview_storage_key: String,
    /// Storage key of the persisted principal (both tiers).
    pub identity_storage_key: String,
    /// Permission an actor must actually hold to preview roles.
    pub manage_permission: PermissionKey,
}

impl Default for AuthzConfig {
    fn default() -> Self {
        Self {
            roles_collection: "roles".to_string(),
            overrides_collection: "role_permissions".to_string(),
            preview_storage_key: "rolegate.role_preview".to_string(),
            identity_storage_key: "rolegate.principal".to_string(),
            manage_permission: ROLES_VIEW,
        }
    }
}

impl AuthzConfig {
    /// Read overrides from `ROLEGATE_*` environment variables.
    pub fn from_env() -> DomainResult<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable lookup; unset variables keep defaults.
    pub fn from_lookup<F>(lookup: F) -> DomainResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let read = |name: &str, fallback: String| -> DomainResult<String> {
            match lookup(name) {
                None => Ok(fallback),
                Some(value) if value.trim().is_empty() => {
                    Err(DomainError::validation(format!("{name} must not be blank")))
                }
                Some(value) => Ok(value.trim().to_string()),
            }
        };

        Ok(Self {
            roles_collection: read("ROLEGATE_ROLES_COLLECTION", defaults.roles_collection)?,
            overrides_collection: read("ROLEGATE_OVERRIDES_COLLECTION", defaults.overrides_collection)?,
            preview_storage_key: read("ROLEGATE_PREVIEW_KEY", defaults.preview_storage_key)?,
            identity_storage_key: read("ROLEGATE_IDENTITY_KEY", defaults.identity_storage_key)?,
            manage_permission: PermissionKey::new(read(
                "ROLEGATE_MANAGE_PERMISSION",
                defaults.manage_permission.to_string(),
            )?),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn unset_variables_keep_defaults() {
        let config = AuthzConfig::from_lookup(|_| None).unwrap();
        assert_eq!(config, AuthzConfig::default());
    }

    #[test]
    fn variables_override_defaults() {
        let vars = HashMap::from([
            ("ROLEGATE_ROLES_COLLECTION", "shop_roles"),
            ("ROLEGATE_MANAGE_PERMISSION", " roles.manage "),
        ]);
        let config = AuthzConfig::from_lookup(|name| vars.get(name).map(|v| v.to_string())).unwrap();

        assert_eq!(config.roles_collection, "shop_roles");
        assert_eq!(config.manage_permission.as_str(), "roles.manage");
        assert_eq!(config.overrides_collection, "role_permissions");
    }

    #[test]
    fn blank_variable_is_rejected() {
        let err = AuthzConfig::from_lookup(|name| (name == "ROLEGATE_PREVIEW_KEY").then(|| " ".to_string())).unwrap_err();
        assert!(matches!(err, DomainError::Validation(msg) if msg.contains("ROLEGATE_PREVIEW_KEY")));
    }
}
