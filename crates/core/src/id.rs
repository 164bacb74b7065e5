//! Strongly-typed identifiers used across the domain.
//!
//! Identifiers are document-store keys, so they are opaque strings rather than
//! UUIDs. Construction through `FromStr` rejects blank values; `new` trusts the
//! caller (used for compiled-in constants and test fixtures).

use core::str::FromStr;
use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// Identifier of a principal (signed-in user).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PrincipalId(String);

/// Storage identifier of a role document.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoleId(String);

macro_rules! impl_string_newtype {
    ($t:ty, $name:literal) => {
        impl $t {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            pub fn is_empty(&self) -> bool {
                self.0.is_empty()
            }
        }

        impl core::fmt::Display for $t {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl AsRef<str> for $t {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl From<&str> for $t {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl From<String> for $t {
            fn from(value: String) -> Self {
                Self(value)
            }
        }

        impl From<$t> for String {
            fn from(value: $t) -> Self {
                value.0
            }
        }

        impl FromStr for $t {
            type Err = DomainError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    return Err(DomainError::invalid_id(format!("{}: empty value", $name)));
                }
                Ok(Self(trimmed.to_string()))
            }
        }
    };
}

impl_string_newtype!(PrincipalId, "PrincipalId");
impl_string_newtype!(RoleId, "RoleId");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_rejects_blank_identifiers() {
        let err = RoleId::from_str("   ").unwrap_err();
        assert!(matches!(err, DomainError::InvalidId(msg) if msg.contains("RoleId")));
    }

    #[test]
    fn parse_trims_whitespace() {
        let id = PrincipalId::from_str("  u-42 ").unwrap();
        assert_eq!(id.as_str(), "u-42");
    }

    #[test]
    fn serializes_as_plain_string() {
        let json = serde_json::to_string(&RoleId::new("mechanic")).unwrap();
        assert_eq!(json, "\"mechanic\"");
    }
}
