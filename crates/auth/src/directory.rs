//! Session-scoped cache of role documents.

use rolegate_core::RoleId;

use crate::roles::{Role, is_developer};
use crate::store::Document;

/// The role directory as loaded for the current session.
///
/// `loaded` is an explicit signal: an empty directory that finished loading is
/// a valid state and differs from one that is still loading.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoleDirectory {
    roles: Vec<Role>,
    loaded: bool,
}

impl RoleDirectory {
    /// Directory whose initial fetch has not completed yet.
    pub fn loading() -> Self {
        Self::default()
    }

    pub fn loaded(roles: Vec<Role>) -> Self {
        Self { roles, loaded: true }
    }

    /// Decode role documents, skipping (and logging) malformed ones.
    pub fn from_documents(docs: &[Document]) -> Self {
        let roles = docs
            .iter()
            .filter_map(|doc| match Role::from_document(doc) {
                Ok(role) => Some(role),
                Err(err) => {
                    tracing::warn!(role_id = %doc.id, error = %err, "skipping malformed role document");
                    None
                }
            })
            .collect();

        Self::loaded(roles)
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    pub fn roles(&self) -> &[Role] {
        &self.roles
    }

    pub fn get(&self, role_id: &RoleId) -> Option<&Role> {
        self.roles.iter().find(|r| &r.id == role_id)
    }

    /// Hierarchy position of a role id: 0 for Developer, `None` when unknown.
    pub fn position_of(&self, role_id: &RoleId) -> Option<i64> {
        if is_developer(role_id.as_str()) {
            return Some(0);
        }
        self.get(role_id).map(Role::effective_position)
    }

    /// Best (lowest) position among `role_ids`; `None` stands for +infinity.
    pub fn top_position(&self, role_ids: &[RoleId]) -> Option<i64> {
        role_ids.iter().filter_map(|id| self.position_of(id)).min()
    }

    /// Identifiers to match against the permission table for `role_ids`.
    ///
    /// Each id is kept as-is, followed by the catalog name of the matching
    /// role when the directory knows it.
    pub fn lookup_keys(&self, role_ids: &[RoleId]) -> Vec<String> {
        let mut keys = Vec::with_capacity(role_ids.len() * 2);
        for id in role_ids {
            keys.push(id.as_str().to_string());
            if let Some(role) = self.get(id) {
                keys.push(role.name().as_str().to_string());
            }
        }
        keys
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::roles::DEVELOPER_ROLE_ID;
    use serde_json::json;

    fn directory() -> RoleDirectory {
        RoleDirectory::loaded(vec![
            Role::new("r-admin", "Admin", 1),
            Role::new("r-manager", "Manager", 10),
            Role::new("r-employee", "Employee", 50),
        ])
    }

    #[test]
    fn loading_and_empty_loaded_are_distinct() {
        assert!(!RoleDirectory::loading().is_loaded());
        assert!(RoleDirectory::loaded(Vec::new()).is_loaded());
    }

    #[test]
    fn top_position_ignores_unknown_ids() {
        let dir = directory();
        let ids = vec![RoleId::new("r-employee"), RoleId::new("ghost"), RoleId::new("r-manager")];
        assert_eq!(dir.top_position(&ids), Some(10));
        assert_eq!(dir.top_position(&[RoleId::new("ghost")]), None);
        assert_eq!(dir.top_position(&[]), None);
    }

    #[test]
    fn developer_is_top_even_when_absent_from_directory() {
        let dir = directory();
        assert_eq!(dir.top_position(&[RoleId::new(DEVELOPER_ROLE_ID)]), Some(0));
    }

    #[test]
    fn lookup_keys_include_catalog_names() {
        let dir = directory();
        let keys = dir.lookup_keys(&[RoleId::new("r-manager"), RoleId::new("employee")]);
        assert_eq!(keys, vec!["r-manager", "manager", "employee"]);
    }

    #[test]
    fn malformed_documents_are_skipped() {
        let docs = vec![
            Document::new("r-ok", json!({ "name": "Cashier", "position": 60 })),
            Document::new("r-bad", json!({ "position": 5 })),
        ];
        let dir = RoleDirectory::from_documents(&docs);
        assert!(dir.is_loaded());
        assert_eq!(dir.roles().len(), 1);
        assert_eq!(dir.roles()[0].id.as_str(), "r-ok");
    }
}
