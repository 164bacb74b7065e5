//! Session-storage persistence of the preview state.

use std::sync::Arc;

use crate::preview::PreviewState;
use crate::store::KeyValueStorage;

/// Reads and writes the single persisted preview record.
///
/// Storage failures and corrupt records never escape: they are logged and
/// treated as "nothing stored".
#[derive(Clone)]
pub struct PreviewSnapshotStore {
    storage: Arc<dyn KeyValueStorage>,
    key: String,
}

impl core::fmt::Debug for PreviewSnapshotStore {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("PreviewSnapshotStore").field("key", &self.key).finish_non_exhaustive()
    }
}

impl PreviewSnapshotStore {
    pub fn new(storage: Arc<dyn KeyValueStorage>, key: impl Into<String>) -> Self {
        Self {
            storage,
            key: key.into(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn load(&self) -> Option<PreviewState> {
        let raw = match self.storage.get(&self.key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(err) => {
                tracing::warn!(key = %self.key, error = %err, "failed to read preview snapshot");
                return None;
            }
        };

        match serde_json::from_str::<PreviewState>(&raw) {
            Ok(state) => Some(state),
            Err(err) => {
                tracing::warn!(key = %self.key, error = %err, "discarding corrupt preview snapshot");
                self.purge();
                None
            }
        }
    }

    /// Persist `state`, or remove the record when there is nothing to keep.
    pub fn save(&self, state: &PreviewState) {
        if state.is_blank() {
            self.purge();
            return;
        }

        let payload = match serde_json::to_string(state) {
            Ok(payload) => payload,
            Err(err) => {
                tracing::error!(error = %err, "failed to serialize preview snapshot");
                return;
            }
        };

        if let Err(err) = self.storage.set(&self.key, &payload) {
            tracing::warn!(key = %self.key, error = %err, "failed to write preview snapshot");
        }
    }

    pub fn purge(&self) {
        if let Err(err) = self.storage.remove(&self.key) {
            tracing::warn!(key = %self.key, error = %err, "failed to remove preview snapshot");
        }
    }
}


#[cfg(test)]
mod tests {
    use super::testing::MemoryStorage;
    use super::*;
    use rolegate_core::RoleId;

    const KEY: &str = "test.preview";

    fn store() -> (Arc<MemoryStorage>, PreviewSnapshotStore) {
        let storage = Arc::new(MemoryStorage::default());
        let snapshots = PreviewSnapshotStore::new(storage.clone(), KEY);
        (storage, snapshots)
    }

    #[test]
    fn enabled_state_round_trips() {
        let (storage, snapshots) = store();
        let state = PreviewState::enabled(RoleId::new("x"));
        snapshots.save(&state);

        assert_eq!(storage.raw(KEY).unwrap(), r#"{"enabled":true,"previewRoleId":"x"}"#);
        assert_eq!(snapshots.load(), Some(state));
    }

    #[test]
    fn blank_state_removes_the_record() {
        let (storage, snapshots) = store();
        snapshots.save(&PreviewState::enabled(RoleId::new("x")));
        snapshots.save(&PreviewState::default());

        assert!(storage.raw(KEY).is_none());
        assert_eq!(snapshots.load(), None);
    }

    #[test]
    fn stale_role_is_persisted_while_disabled() {
        let (_, snapshots) = store();
        let state = PreviewState {
            enabled: false,
            preview_role_id: Some(RoleId::new("x")),
        };
        snapshots.save(&state);
        assert_eq!(snapshots.load(), Some(state));
    }

    #[test]
    fn null_role_id_decodes() {
        let (storage, snapshots) = store();
        storage.set(KEY, r#"{"enabled":false,"previewRoleId":null}"#).unwrap();
        assert_eq!(snapshots.load(), Some(PreviewState::default()));
    }

    #[test]
    fn corrupt_record_is_purged() {
        let (storage, snapshots) = store();
        storage.set(KEY, "{not json").unwrap();

        assert_eq!(snapshots.load(), None);
        assert!(storage.raw(KEY).is_none());
    }

    #[test]
    fn storage_failure_degrades_to_nothing_stored() {
        let snapshots = PreviewSnapshotStore::new(Arc::new(MemoryStorage::failing()), KEY);
        snapshots.save(&PreviewState::enabled(RoleId::new("x")));
        assert_eq!(snapshots.load(), None);
        snapshots.purge();
    }
}
