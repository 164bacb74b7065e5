//! Compiled-in default permission grants.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::{PermissionKey, RoleName};

/// Default grants: permission key → role names holding it out of the box.
const DEFAULT_GRANTS: &[(&str, &[&str])] = &[
    // Page access
    ("page.dashboard.view", &["admin", "manager", "employee", "mechanic"]),
    ("page.inventory.view", &["admin", "manager", "employee", "mechanic"]),
    ("page.sales.view", &["admin", "manager", "employee"]),
    ("page.returns.view", &["admin", "manager", "employee", "mechanic"]),
    ("page.customers.view", &["admin", "manager", "employee"]),
    ("page.reports.view", &["admin", "manager"]),
    ("page.users.view", &["admin"]),
    ("page.settings.view", &["admin"]),
    // Inventory
    ("inventory.create", &["admin", "manager"]),
    ("inventory.edit", &["admin", "manager", "mechanic"]),
    ("inventory.delete", &["admin"]),
    ("inventory.export", &["admin", "manager"]),
    // Sales & returns
    ("sales.create", &["admin", "manager", "employee"]),
    ("sales.refund", &["admin", "manager"]),
    ("returns.process", &["admin", "manager", "mechanic"]),
    ("returns.approve", &["admin", "manager"]),
    // Administration
    ("reports.export", &["admin", "manager"]),
    ("users.manage", &["admin"]),
    ("roles.view", &["admin", "manager"]),
    ("roles.manage", &["admin"]),
    ("settings.edit", &["admin"]),
];

/// Immutable permission → role-name mapping.
///
/// Role lists keep insertion order and never contain duplicates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PermissionCatalog {
    grants: BTreeMap<PermissionKey, Vec<RoleName>>,
}

impl PermissionCatalog {
    /// The catalog shipped with the application.
    pub fn defaults() -> Self {
        Self::from_entries(DEFAULT_GRANTS.iter().map(|(key, roles)| {
            (
                PermissionKey::from_static(*key),
                roles.iter().map(|r| RoleName::new(r)).collect::<Vec<_>>(),
            )
        }))
    }

    pub fn from_entries<I, R>(entries: I) -> Self
    where
        I: IntoIterator<Item = (PermissionKey, R)>,
        R: IntoIterator<Item = RoleName>,
    {
        let mut grants: BTreeMap<PermissionKey, Vec<RoleName>> = BTreeMap::new();
        for (key, roles) in entries {
            let slot = grants.entry(key).or_default();
            for role in roles {
                if !slot.contains(&role) {
                    slot.push(role);
                }
            }
        }
        Self { grants }
    }

    pub fn contains(&self, key: &PermissionKey) -> bool {
        self.grants.contains_key(key)
    }

    pub fn roles_for(&self, key: &PermissionKey) -> Option<&[RoleName]> {
        self.grants.get(key).map(Vec::as_slice)
    }

    pub fn keys(&self) -> impl Iterator<Item = &PermissionKey> {
        self.grants.keys()
    }

    pub fn len(&self) -> usize {
        self.grants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.grants.is_empty()
    }

    pub(crate) fn grants(&self) -> &BTreeMap<PermissionKey, Vec<RoleName>> {
        &self.grants
    }
}

impl Default for PermissionCatalog {
    fn default() -> Self {
        Self::defaults()
    }
}
