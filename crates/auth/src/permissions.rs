use std::borrow::Cow;

use serde::{Deserialize, Serialize};

/// Permission identifier.
///
/// Permissions are modeled as opaque strings (e.g. `"returns.process"` or
/// `"page.settings.view"`). The vocabulary is closed by the compiled catalog:
/// a key the catalog does not know is a configuration error and always
/// resolves to deny.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PermissionKey(Cow<'static, str>);

impl PermissionKey {
    pub const fn from_static(name: &'static str) -> Self {
        Self(Cow::Borrowed(name))
    }

    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Leading segment of the key (`"page"` for `"page.settings.view"`).
    pub fn category(&self) -> &str {
        self.as_str().split('.').next().unwrap_or_default()
    }

    /// Page-access keys follow the `page.<area>.view` convention.
    pub fn is_page_access(&self) -> bool {
        self.category() == "page"
    }
}

impl core::fmt::Display for PermissionKey {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&'static str> for PermissionKey {
    fn from(value: &'static str) -> Self {
        Self::from_static(value)
    }
}

/// Permission required to open the role-management screens.
///
/// Holding it is also the precondition for previewing another role.
pub const ROLES_VIEW: PermissionKey = PermissionKey::from_static("roles.view");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_is_leading_segment() {
        assert_eq!(PermissionKey::from_static("page.settings.view").category(), "page");
        assert_eq!(PermissionKey::from_static("returns.process").category(), "returns");
        assert!(PermissionKey::from_static("page.sales.view").is_page_access());
        assert!(!ROLES_VIEW.is_page_access());
    }

    #[test]
    fn owned_and_static_keys_compare_equal() {
        let owned = PermissionKey::new(String::from("roles.view"));
        assert_eq!(owned, ROLES_VIEW);
    }
}
