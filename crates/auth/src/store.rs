//! Collaborator contracts (document store, key/value storage, identity layer).
//!
//! The engine is decoupled from transport and storage: these traits are the
//! whole boundary. Concrete implementations live in `rolegate-infra`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use thiserror::Error;

use crate::Principal;

/// A document as returned by the remote store: its key plus the raw fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub data: JsonValue,
}

impl Document {
    pub fn new(id: impl Into<String>, data: JsonValue) -> Self {
        Self { id: id.into(), data }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("collection '{collection}' unavailable: {reason}")]
    Unavailable { collection: String, reason: String },

    #[error("read of collection '{0}' was denied")]
    PermissionDenied(String),
}

/// Read-only view of the remote document store.
///
/// Fetches may suspend; callers must keep answering queries from whatever
/// state they already hold while a fetch is in flight.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Fetch every document in `collection`.
    async fn list(&self, collection: &str) -> Result<Vec<Document>, StoreError>;
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StorageError {
    #[error("storage unavailable: {0}")]
    Unavailable(String),

    #[error("storage quota exceeded")]
    QuotaExceeded,

    #[error("storage i/o failed: {0}")]
    Io(String),
}

/// Synchronous string key/value storage (one instance per persistence tier).
pub trait KeyValueStorage: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    fn remove(&self, key: &str) -> Result<(), StorageError>;
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IdentityError {
    #[error("identity provider unreachable: {0}")]
    Unreachable(String),

    #[error("sign-out rejected: {0}")]
    Rejected(String),
}

/// The sign-in layer. Hands over verified principals; never consulted for
/// authorization decisions.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// The principal currently signed in with the provider, if any.
    fn current_principal(&self) -> Option<Principal>;

    async fn sign_out(&self) -> Result<(), IdentityError>;
}
