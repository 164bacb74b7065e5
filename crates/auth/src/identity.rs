//! Identity adapter: persistence of the signed-in principal.
//!
//! Two tiers are used: durable storage for "remember me" sign-ins and
//! session-scoped storage otherwise. A principal lives in exactly one tier.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::Principal;
use crate::store::{IdentityProvider, KeyValueStorage};

/// Where a sign-in should be kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Durability {
    /// Survives browser/app restarts.
    Remember,
    /// Dropped when the session ends.
    #[default]
    SessionOnly,
}

/// Record written to storage for a signed-in principal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredIdentity {
    pub principal: Principal,
    pub durability: Durability,
    pub saved_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct IdentityAdapter {
    durable: Arc<dyn KeyValueStorage>,
    session: Arc<dyn KeyValueStorage>,
    key: String,
}

impl core::fmt::Debug for IdentityAdapter {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("IdentityAdapter").field("key", &self.key).finish_non_exhaustive()
    }
}

impl IdentityAdapter {
    pub fn new(durable: Arc<dyn KeyValueStorage>, session: Arc<dyn KeyValueStorage>, key: impl Into<String>) -> Self {
        Self {
            durable,
            session,
            key: key.into(),
        }
    }

    fn tier(&self, durability: Durability) -> &dyn KeyValueStorage {
        match durability {
            Durability::Remember => self.durable.as_ref(),
            Durability::SessionOnly => self.session.as_ref(),
        }
    }

    /// Store `principal` in the chosen tier and remove it from the other.
    pub fn persist(&self, principal: &Principal, durability: Durability) {
        let record = StoredIdentity {
            principal: principal.clone(),
            durability,
            saved_at: Utc::now(),
        };

        let payload = match serde_json::to_string(&record) {
            Ok(payload) => payload,
            Err(err) => {
                tracing::error!(error = %err, "failed to serialize principal");
                return;
            }
        };

        if let Err(err) = self.tier(durability).set(&self.key, &payload) {
            tracing::warn!(principal_id = %principal.id, ?durability, error = %err, "failed to persist principal");
        }

        let other = match durability {
            Durability::Remember => Durability::SessionOnly,
            Durability::SessionOnly => Durability::Remember,
        };
        if let Err(err) = self.tier(other).remove(&self.key) {
            tracing::warn!(?other, error = %err, "failed to clear principal from other tier");
        }
    }

    /// The persisted principal, session tier first.
    ///
    /// Unreadable or corrupt records are purged and treated as absent.
    pub fn restore(&self) -> Option<StoredIdentity> {
        [Durability::SessionOnly, Durability::Remember]
            .into_iter()
            .find_map(|durability| self.read_tier(durability))
    }

    fn read_tier(&self, durability: Durability) -> Option<StoredIdentity> {
        let storage = self.tier(durability);
        let raw = match storage.get(&self.key) {
            Ok(raw) => raw?,
            Err(err) => {
                tracing::warn!(?durability, error = %err, "failed to read persisted principal");
                return None;
            }
        };

        match serde_json::from_str::<StoredIdentity>(&raw) {
            Ok(record) => Some(record),
            Err(err) => {
                tracing::warn!(?durability, error = %err, "discarding corrupt persisted principal");
                if let Err(err) = storage.remove(&self.key) {
                    tracing::warn!(?durability, error = %err, "failed to purge corrupt principal");
                }
                None
            }
        }
    }

    pub fn clear(&self) {
        for durability in [Durability::SessionOnly, Durability::Remember] {
            if let Err(err) = self.tier(durability).remove(&self.key) {
                tracing::warn!(?durability, error = %err, "failed to clear persisted principal");
            }
        }
    }
}

/// Sign out with the identity layer; failures are logged, never returned.
pub async fn sign_out_quietly(provider: &dyn IdentityProvider) {
    if let Err(err) = provider.sign_out().await {
        tracing::warn!(error = %err, "sign-out failed");
    }
}
