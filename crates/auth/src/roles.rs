use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use rolegate_core::{DomainError, DomainResult, RoleId};

use crate::PermissionKey;
use crate::store::Document;

/// Storage id of the distinguished Developer role.
///
/// The Developer role sits at hierarchy position 0 whatever its stored value,
/// and bypasses every permission check.
pub const DEVELOPER_ROLE_ID: &str = "developer";

/// Hierarchy position used for a role document that carries none.
pub const UNRANKED_POSITION: i64 = i64::MAX;

pub fn is_developer(role_id: &str) -> bool {
    role_id == DEVELOPER_ROLE_ID
}

/// Catalog lookup key for a role (`"admin"`, `"employee"`).
///
/// Always stored lower-cased, so comparisons against it are case-insensitive.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct RoleName(String);

impl RoleName {
    pub fn new(name: impl AsRef<str>) -> Self {
        Self(name.as_ref().trim().to_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Case-insensitive comparison against a role id or name.
    pub fn matches(&self, candidate: &str) -> bool {
        self.0 == candidate.trim().to_lowercase()
    }
}

impl AsRef<str> for RoleName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<String> for RoleName {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl From<&str> for RoleName {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<RoleName> for String {
    fn from(value: RoleName) -> Self {
        value.0
    }
}

impl core::fmt::Display for RoleName {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A role as held in the role directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub id: RoleId,
    pub display_name: String,
    /// Authority ranking; lower means more authority.
    pub hierarchy_position: i64,
    pub is_default_assignment: bool,
    pub is_protected: bool,
    pub override_permissions: BTreeMap<PermissionKey, bool>,
}

/// Wire shape of a role document.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RoleRecord {
    #[serde(alias = "name")]
    display_name: String,
    #[serde(default, alias = "hierarchyPosition")]
    position: Option<i64>,
    #[serde(default, alias = "isDefaultAssignment")]
    is_default: bool,
    #[serde(default)]
    is_protected: bool,
    #[serde(default)]
    permissions: BTreeMap<String, bool>,
}

impl Role {
    pub fn new(id: impl Into<RoleId>, display_name: impl Into<String>, hierarchy_position: i64) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            hierarchy_position,
            is_default_assignment: false,
            is_protected: false,
            override_permissions: BTreeMap::new(),
        }
    }

    /// Decode a role from its store document.
    pub fn from_document(doc: &Document) -> DomainResult<Self> {
        if doc.id.trim().is_empty() {
            return Err(DomainError::invalid_id("role document without id"));
        }

        let record: RoleRecord = serde_json::from_value(doc.data.clone())
            .map_err(|e| DomainError::malformed(&doc.id, e.to_string()))?;

        if record.display_name.trim().is_empty() {
            return Err(DomainError::malformed(&doc.id, "display name is empty"));
        }

        Ok(Self {
            id: RoleId::new(doc.id.trim()),
            display_name: record.display_name.trim().to_string(),
            hierarchy_position: record.position.unwrap_or(UNRANKED_POSITION),
            is_default_assignment: record.is_default,
            is_protected: record.is_protected,
            override_permissions: record
                .permissions
                .into_iter()
                .map(|(key, granted)| (PermissionKey::new(key), granted))
                .collect(),
        })
    }

    /// Catalog lookup key derived from the display name.
    pub fn name(&self) -> RoleName {
        RoleName::new(&self.display_name)
    }

    /// Position used for hierarchy comparisons (Developer pinned to 0).
    pub fn effective_position(&self) -> i64 {
        if is_developer(self.id.as_str()) {
            0
        } else {
            self.hierarchy_position
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn role_name_is_case_insensitive() {
        let name = RoleName::new(" Mechanic ");
        assert_eq!(name.as_str(), "mechanic");
        assert!(name.matches("MECHANIC"));
        assert!(!name.matches("manager"));
    }

    #[test]
    fn role_name_normalizes_on_deserialize() {
        let name: RoleName = serde_json::from_str("\"Admin\"").unwrap();
        assert_eq!(name.as_str(), "admin");
    }

    #[test]
    fn decode_role_document() {
        let doc = Document::new(
            "r-mech",
            json!({
                "name": "Mechanic",
                "position": 40,
                "isDefault": true,
                "permissions": { "returns.process": false }
            }),
        );

        let role = Role::from_document(&doc).unwrap();
        assert_eq!(role.id.as_str(), "r-mech");
        assert_eq!(role.name().as_str(), "mechanic");
        assert_eq!(role.hierarchy_position, 40);
        assert!(role.is_default_assignment);
        assert!(!role.is_protected);
        assert_eq!(
            role.override_permissions.get(&PermissionKey::from_static("returns.process")),
            Some(&false)
        );
    }

    #[test]
    fn missing_position_is_unranked() {
        let doc = Document::new("r-temp", json!({ "displayName": "Temp" }));
        let role = Role::from_document(&doc).unwrap();
        assert_eq!(role.hierarchy_position, UNRANKED_POSITION);
    }

    #[test]
    fn negative_position_is_kept() {
        let doc = Document::new("r-root", json!({ "name": "Root", "position": -3 }));
        let role = Role::from_document(&doc).unwrap();
        assert_eq!(role.hierarchy_position, -3);
        assert_eq!(role.effective_position(), -3);
    }

    #[test]
    fn developer_position_is_pinned_to_zero() {
        let role = Role::new(DEVELOPER_ROLE_ID, "Developer", 99);
        assert_eq!(role.effective_position(), 0);
    }

    #[test]
    fn malformed_role_document_is_rejected() {
        let doc = Document::new("r-bad", json!({ "position": "high" }));
        let err = Role::from_document(&doc).unwrap_err();
        assert!(matches!(err, DomainError::MalformedRecord { id, .. } if id == "r-bad"));
    }
}
