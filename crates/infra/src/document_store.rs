//! In-memory document store for tests, demos and offline development.

use std::collections::HashMap;
use std::path::Path;
use std::sync::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::Context;
use async_trait::async_trait;
use serde_json::Value as JsonValue;

use rolegate_auth::{Document, DocumentStore, StoreError};

/// Collections of documents kept in insertion order, keyed by document id.
#[derive(Debug, Default)]
pub struct InMemoryDocumentStore {
    collections: RwLock<HashMap<String, Vec<Document>>>,
    offline: AtomicBool,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load collections from a fixture file shaped like
    /// `{ "<collection>": { "<doc id>": { ...fields } } }`.
    pub fn from_json_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read document fixture at {:?}", path))?;
        Self::from_json_str(&raw).with_context(|| format!("invalid document fixture at {:?}", path))
    }

    pub fn from_json_str(raw: &str) -> anyhow::Result<Self> {
        let value: JsonValue = serde_json::from_str(raw).context("fixture is not valid JSON")?;
        let JsonValue::Object(collections) = value else {
            anyhow::bail!("fixture root must be an object of collections");
        };

        let store = Self::new();
        for (collection, docs) in collections {
            let JsonValue::Object(docs) = docs else {
                anyhow::bail!("collection '{collection}' must be an object keyed by document id");
            };
            for (id, data) in docs {
                store.upsert(&collection, Document::new(id, data));
            }
        }
        Ok(store)
    }

    /// Insert or replace a document by id.
    pub fn upsert(&self, collection: &str, doc: Document) {
        if let Ok(mut map) = self.collections.write() {
            let docs = map.entry(collection.to_string()).or_default();
            match docs.iter_mut().find(|existing| existing.id == doc.id) {
                Some(existing) => *existing = doc,
                None => docs.push(doc),
            }
        }
    }

    pub fn remove(&self, collection: &str, id: &str) -> bool {
        let Ok(mut map) = self.collections.write() else {
            return false;
        };
        let Some(docs) = map.get_mut(collection) else {
            return false;
        };
        let before = docs.len();
        docs.retain(|doc| doc.id != id);
        docs.len() != before
    }

    /// Simulate the store being unreachable.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn is_offline(&self) -> bool {
        self.offline.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn list(&self, collection: &str) -> Result<Vec<Document>, StoreError> {
        if self.is_offline() {
            return Err(StoreError::Unavailable {
                collection: collection.to_string(),
                reason: "store is offline".to_string(),
            });
        }

        let map = self.collections.read().map_err(|_| StoreError::Unavailable {
            collection: collection.to_string(),
            reason: "store lock poisoned".to_string(),
        })?;

        let docs = map.get(collection).cloned().unwrap_or_default();
        tracing::debug!(collection, count = docs.len(), "listed documents");
        Ok(docs)
    }
}
