//! Permission resolution: catalog + per-role overrides → effective table.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value as JsonValue;

use rolegate_core::{DomainError, DomainResult};

use crate::catalog::PermissionCatalog;
use crate::roles::is_developer;
use crate::store::Document;
use crate::{PermissionKey, RoleName};

/// Per-role delta applied on top of the catalog.
///
/// A key absent from `permissions` means "no override, keep the default".
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OverrideDocument {
    pub role: RoleName,
    pub permissions: BTreeMap<PermissionKey, bool>,
}

impl OverrideDocument {
    pub fn new<I>(role: impl Into<RoleName>, permissions: I) -> Self
    where
        I: IntoIterator<Item = (PermissionKey, bool)>,
    {
        Self {
            role: role.into(),
            permissions: permissions.into_iter().collect(),
        }
    }

    /// Decode an override document (keyed by role name).
    ///
    /// Accepts either `{ "permissions": { key: bool } }` or a flat
    /// `{ key: bool }` map; non-boolean entries are ignored.
    pub fn from_document(doc: &Document) -> DomainResult<Self> {
        if doc.id.trim().is_empty() {
            return Err(DomainError::invalid_id("override document without role name"));
        }

        let JsonValue::Object(fields) = &doc.data else {
            return Err(DomainError::malformed(&doc.id, "expected an object"));
        };

        let source = match fields.get("permissions") {
            Some(JsonValue::Object(nested)) => nested,
            Some(_) => return Err(DomainError::malformed(&doc.id, "'permissions' is not an object")),
            None => fields,
        };

        let permissions = source
            .iter()
            .filter_map(|(key, value)| value.as_bool().map(|granted| (PermissionKey::new(key.clone()), granted)))
            .collect();

        Ok(Self {
            role: RoleName::new(&doc.id),
            permissions,
        })
    }
}

/// Decode override documents, skipping (and logging) malformed ones.
pub fn overrides_from_documents(docs: &[Document]) -> Vec<OverrideDocument> {
    docs.iter()
        .filter_map(|doc| match OverrideDocument::from_document(doc) {
            Ok(o) => Some(o),
            Err(err) => {
                tracing::warn!(role = %doc.id, error = %err, "skipping malformed override document");
                None
            }
        })
        .collect()
}

/// The catalog after all override documents have been applied.
///
/// Produced whole by [`build_effective_table`] and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EffectivePermissionTable {
    grants: BTreeMap<PermissionKey, Vec<RoleName>>,
}

impl EffectivePermissionTable {
    pub fn roles_for(&self, key: &PermissionKey) -> Option<&[RoleName]> {
        self.grants.get(key).map(Vec::as_slice)
    }

    /// Keys granted to `role` (matched case-insensitively).
    pub fn permissions_for(&self, role: &str) -> Vec<&PermissionKey> {
        self.grants
            .iter()
            .filter(|(_, roles)| roles.iter().any(|r| r.matches(role)))
            .map(|(key, _)| key)
            .collect()
    }

    pub fn keys(&self) -> impl Iterator<Item = &PermissionKey> {
        self.grants.keys()
    }
}

/// Merge the catalog with override documents.
///
/// Overrides are applied in the order given; keys outside the catalog are
/// ignored. With no overrides the result equals the catalog.
pub fn build_effective_table(catalog: &PermissionCatalog, overrides: &[OverrideDocument]) -> EffectivePermissionTable {
    let mut grants = catalog.grants().clone();

    for doc in overrides {
        for (key, granted) in &doc.permissions {
            let Some(roles) = grants.get_mut(key) else {
                tracing::trace!(role = %doc.role, permission = %key, "ignoring override for unknown permission");
                continue;
            };

            let present = roles.iter().position(|r| r == &doc.role);
            match (*granted, present) {
                (true, None) => roles.push(doc.role.clone()),
                (false, Some(idx)) => {
                    roles.remove(idx);
                }
                _ => {}
            }
        }
    }

    EffectivePermissionTable { grants }
}

/// Whether any of `role_ids` holds `key` in `table`.
///
/// - The Developer id bypasses the table entirely.
/// - Unknown keys resolve to `false`.
/// - Role ids are compared case-insensitively against stored role names.
pub fn can<R: AsRef<str>>(role_ids: &[R], key: &PermissionKey, table: &EffectivePermissionTable) -> bool {
    if role_ids.iter().any(|id| is_developer(id.as_ref())) {
        return true;
    }

    let Some(granted) = table.roles_for(key) else {
        tracing::debug!(permission = %key, "permission key not in catalog; denying");
        return false;
    };

    role_ids
        .iter()
        .any(|id| granted.iter().any(|role| role.matches(id.as_ref())))
}

// ─────────────────────────────────────────────────────────────────────────────
// Decision explanation (audit trail)
// ─────────────────────────────────────────────────────────────────────────────

/// Detailed explanation of a single `can` decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthorizationExplanation {
    pub permission: String,
    pub granted: bool,
    pub reason: String,
    pub role_ids: Vec<String>,
    /// The role id that satisfied the check, when granted.
    pub matched_role: Option<String>,
    pub denial: Option<DenialReason>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DenialReason {
    pub kind: DenialKind,
    pub message: String,
    pub suggestions: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DenialKind {
    UnknownPermission,
    NoRoles,
    MissingRole,
}

/// Explain the decision [`can`] makes for the same inputs.
pub fn explain<R: AsRef<str>>(
    role_ids: &[R],
    key: &PermissionKey,
    table: &EffectivePermissionTable,
) -> AuthorizationExplanation {
    let ids: Vec<String> = role_ids.iter().map(|r| r.as_ref().to_string()).collect();

    let deny = |kind: DenialKind, reason: String, message: String, suggestions: Vec<String>| AuthorizationExplanation {
        permission: key.to_string(),
        granted: false,
        reason,
        role_ids: ids.clone(),
        matched_role: None,
        denial: Some(DenialReason {
            kind,
            message,
            suggestions,
        }),
    };

    if let Some(dev) = ids.iter().find(|id| is_developer(id)) {
        return AuthorizationExplanation {
            permission: key.to_string(),
            granted: true,
            reason: "Developer role bypasses all permission checks".to_string(),
            role_ids: ids.clone(),
            matched_role: Some(dev.clone()),
            denial: None,
        };
    }

    let Some(granted) = table.roles_for(key) else {
        return deny(
            DenialKind::UnknownPermission,
            format!("Permission '{key}' is not defined in the catalog"),
            format!("Unknown permission key: '{key}'"),
            vec!["Check the permission key for typos at the call site".to_string()],
        );
    };

    if ids.is_empty() {
        return deny(
            DenialKind::NoRoles,
            "Principal has no roles".to_string(),
            "No roles to evaluate".to_string(),
            vec!["Assign at least one role to the principal".to_string()],
        );
    }

    if let Some(hit) = ids.iter().find(|id| granted.iter().any(|r| r.matches(id))) {
        return AuthorizationExplanation {
            permission: key.to_string(),
            granted: true,
            reason: format!("Role '{hit}' is granted '{key}'"),
            role_ids: ids.clone(),
            matched_role: Some(hit.clone()),
            denial: None,
        };
    }

    let granting: Vec<&str> = granted.iter().map(RoleName::as_str).collect();
    let mut suggestions = vec![format!("Add an override granting '{key}' to one of the principal's roles")];
    if !granting.is_empty() {
        suggestions.insert(0, format!("Roles currently granted '{key}': {granting:?}"));
    }

    deny(
        DenialKind::MissingRole,
        format!("None of the roles {ids:?} is granted '{key}'"),
        format!("Missing required permission: '{key}'"),
        suggestions,
    )
}

/// The session's current effective table plus its provenance.
///
/// Cloning shares the table; a rebuild swaps in a new `Arc` so readers never
/// observe a partially merged table.
#[derive(Debug, Clone)]
pub struct PermissionResolver {
    table: Arc<EffectivePermissionTable>,
    using_defaults: bool,
}

impl PermissionResolver {
    pub fn from_defaults(catalog: &PermissionCatalog) -> Self {
        Self {
            table: Arc::new(build_effective_table(catalog, &[])),
            using_defaults: true,
        }
    }

    pub fn rebuild(catalog: &PermissionCatalog, overrides: &[OverrideDocument]) -> Self {
        Self {
            table: Arc::new(build_effective_table(catalog, overrides)),
            using_defaults: overrides.is_empty(),
        }
    }

    pub fn table(&self) -> &EffectivePermissionTable {
        &self.table
    }

    pub fn snapshot(&self) -> Arc<EffectivePermissionTable> {
        Arc::clone(&self.table)
    }

    /// True when no override documents contributed to the table.
    pub fn using_defaults(&self) -> bool {
        self.using_defaults
    }

    pub fn can<R: AsRef<str>>(&self, role_ids: &[R], key: &PermissionKey) -> bool {
        can(role_ids, key, &self.table)
    }

    pub fn explain<R: AsRef<str>>(&self, role_ids: &[R], key: &PermissionKey) -> AuthorizationExplanation {
        explain(role_ids, key, &self.table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::roles::DEVELOPER_ROLE_ID;
    use proptest::prelude::*;
    use serde_json::json;

    fn key(k: &'static str) -> PermissionKey {
        PermissionKey::from_static(k)
    }

    fn returns_catalog() -> PermissionCatalog {
        PermissionCatalog::from_entries([
            (key("returns.process"), vec![RoleName::new("admin"), RoleName::new("mechanic")]),
            (key("sales.create"), vec![RoleName::new("employee")]),
        ])
    }

    #[test]
    fn defaults_cover_every_catalog_grant() {
        let catalog = PermissionCatalog::defaults();
        let table = build_effective_table(&catalog, &[]);
        for k in catalog.keys() {
            for role in catalog.roles_for(k).unwrap() {
                assert!(can(&[role.as_str()], k, &table), "{role} should hold {k}");
            }
        }
    }

    #[test]
    fn unknown_key_fails_closed() {
        let table = build_effective_table(&PermissionCatalog::defaults(), &[]);
        assert!(!can(&["admin", "manager"], &key("not.a.real.key"), &table));
    }

    #[test]
    fn empty_roles_deny_every_key() {
        let catalog = PermissionCatalog::defaults();
        let table = build_effective_table(&catalog, &[]);
        let none: [&str; 0] = [];
        for k in catalog.keys() {
            assert!(!can(&none, k, &table));
        }
    }

    #[test]
    fn override_removes_and_keeps_other_roles() {
        let overrides = vec![OverrideDocument::new("mechanic", [(key("returns.process"), false)])];
        let table = build_effective_table(&returns_catalog(), &overrides);
        let roles = table.roles_for(&key("returns.process")).unwrap();
        assert!(!roles.contains(&RoleName::new("mechanic")));
        assert!(roles.contains(&RoleName::new("admin")));
    }

    #[test]
    fn override_adds_role_once() {
        let overrides = vec![
            OverrideDocument::new("employee", [(key("returns.process"), true)]),
            OverrideDocument::new("Employee", [(key("returns.process"), true)]),
        ];
        let table = build_effective_table(&returns_catalog(), &overrides);
        let roles = table.roles_for(&key("returns.process")).unwrap();
        assert_eq!(roles.iter().filter(|r| r.as_str() == "employee").count(), 1);
    }

    #[test]
    fn override_for_unknown_key_is_ignored() {
        let overrides = vec![OverrideDocument::new("mechanic", [(key("future.feature"), true)])];
        let table = build_effective_table(&returns_catalog(), &overrides);
        assert!(table.roles_for(&key("future.feature")).is_none());
        assert!(!can(&["mechanic"], &key("future.feature"), &table));
    }

    #[test]
    fn any_role_suffices() {
        let table = build_effective_table(&returns_catalog(), &[]);
        assert!(can(&["employee", "mechanic"], &key("sales.create"), &table));
        assert!(can(&["EMPLOYEE"], &key("sales.create"), &table));
    }

    /// Assumption: the Developer id is an unconditional bypass, even for keys
    /// the catalog does not define.
    #[test]
    fn developer_bypasses_table() {
        let table = build_effective_table(&returns_catalog(), &[]);
        assert!(can(&[DEVELOPER_ROLE_ID], &key("returns.process"), &table));
        assert!(can(&[DEVELOPER_ROLE_ID], &key("not.a.real.key"), &table));
    }

    #[test]
    fn permissions_for_lists_granted_keys() {
        let table = build_effective_table(&returns_catalog(), &[]);
        let keys: Vec<&str> = table.permissions_for("Mechanic").iter().map(|k| k.as_str()).collect();
        assert_eq!(keys, vec!["returns.process"]);
    }

    #[test]
    fn override_document_accepts_nested_and_flat_shapes() {
        let nested = Document::new("Mechanic", json!({ "permissions": { "returns.process": false } }));
        let flat = Document::new("mechanic", json!({ "returns.process": false, "updatedBy": "u-1" }));

        let a = OverrideDocument::from_document(&nested).unwrap();
        let b = OverrideDocument::from_document(&flat).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.role.as_str(), "mechanic");
    }

    #[test]
    fn malformed_override_documents_are_skipped() {
        let docs = vec![
            Document::new("mechanic", json!({ "permissions": { "returns.process": false } })),
            Document::new("admin", json!({ "permissions": "all" })),
            Document::new("employee", json!(["returns.process"])),
        ];
        let overrides = overrides_from_documents(&docs);
        assert_eq!(overrides.len(), 1);
        assert_eq!(overrides[0].role.as_str(), "mechanic");
    }

    #[test]
    fn resolver_tracks_default_provenance() {
        let catalog = returns_catalog();
        assert!(PermissionResolver::from_defaults(&catalog).using_defaults());
        assert!(PermissionResolver::rebuild(&catalog, &[]).using_defaults());

        let overrides = vec![OverrideDocument::new("mechanic", [(key("returns.process"), false)])];
        let resolver = PermissionResolver::rebuild(&catalog, &overrides);
        assert!(!resolver.using_defaults());
        assert!(!resolver.can(&["mechanic"], &key("returns.process")));
    }

    #[test]
    fn explain_reports_missing_role_with_suggestions() {
        let table = build_effective_table(&returns_catalog(), &[]);
        let explanation = explain(&["employee"], &key("returns.process"), &table);
        assert!(!explanation.granted);
        let denial = explanation.denial.unwrap();
        assert_eq!(denial.kind, DenialKind::MissingRole);
        assert!(denial.suggestions[0].contains("mechanic"));
    }

    #[test]
    fn explain_agrees_with_can() {
        let table = build_effective_table(&returns_catalog(), &[]);
        let cases: [(&[&str], &str); 4] = [
            (&["mechanic"], "returns.process"),
            (&["employee"], "returns.process"),
            (&[], "sales.create"),
            (&["admin"], "bogus.key"),
        ];
        for (roles, k) in cases {
            let k = PermissionKey::new(k);
            assert_eq!(explain(roles, &k, &table).granted, can(roles, &k, &table));
        }

        let unknown = explain(&["admin"], &key("bogus.key"), &table);
        assert_eq!(unknown.denial.unwrap().kind, DenialKind::UnknownPermission);
    }

    fn arb_override() -> impl Strategy<Value = OverrideDocument> {
        let roles = prop::sample::select(vec!["admin", "manager", "employee", "mechanic"]);
        let keys = prop::sample::select(vec!["returns.process", "sales.create", "roles.view", "unknown.key"]);
        (roles, prop::collection::vec((keys, any::<bool>()), 0..6)).prop_map(|(role, perms)| {
            OverrideDocument::new(role, perms.into_iter().map(|(k, g)| (PermissionKey::from_static(k), g)))
        })
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 128,
            ..ProptestConfig::default()
        })]

        /// Property: the merge is a pure function of its inputs.
        #[test]
        fn merge_is_idempotent(overrides in prop::collection::vec(arb_override(), 0..5)) {
            let catalog = PermissionCatalog::defaults();
            let first = build_effective_table(&catalog, &overrides);
            let second = build_effective_table(&catalog, &overrides);
            prop_assert_eq!(first, second);
        }

        /// Property: overrides never introduce keys outside the catalog.
        #[test]
        fn merge_preserves_key_space(overrides in prop::collection::vec(arb_override(), 0..5)) {
            let catalog = PermissionCatalog::defaults();
            let table = build_effective_table(&catalog, &overrides);
            let merged: Vec<_> = table.keys().cloned().collect();
            let original: Vec<_> = catalog.keys().cloned().collect();
            prop_assert_eq!(merged, original);
        }
    }
}
