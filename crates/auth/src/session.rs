//! Authorization session: the one owner of mutable authorization state.
//!
//! A session is created for a signed-in principal and torn down at logout.
//! It holds the effective permission table, the role directory and the
//! preview engine, each with a single writer path:
//!
//! - table: [`AuthzSession::refresh_overrides`] / [`AuthzSession::bootstrap`]
//! - directory: [`AuthzSession::reload_roles`] / [`AuthzSession::bootstrap`]
//! - preview: [`AuthzSession::start_preview`], [`AuthzSession::stop_preview`]
//!   and revalidation
//!
//! Every change goes through [`AuthzSession::notify`], which revalidates the
//! preview, persists its snapshot and fans the event out to subscribers.
//!
//! Fetch results are tagged with the generation current when the fetch began;
//! a login or logout in between bumps the generation and the late result is
//! dropped.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Mutex, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use rolegate_core::RoleId;

use crate::catalog::PermissionCatalog;
use crate::config::AuthzConfig;
use crate::directory::RoleDirectory;
use crate::gateway::effective_role_ids;
use crate::identity::{Durability, IdentityAdapter, sign_out_quietly};
use crate::preview::{EligibilityContext, PreviewEngine, PreviewState, PreviewStatus, Revalidation, eligible_roles};
use crate::resolver::{AuthorizationExplanation, EffectivePermissionTable, PermissionResolver, overrides_from_documents};
use crate::roles::Role;
use crate::snapshot::PreviewSnapshotStore;
use crate::store::{Document, DocumentStore, IdentityProvider, KeyValueStorage, StoreError};
use crate::{PermissionKey, Principal};

/// External collaborators a session is wired to.
#[derive(Clone)]
pub struct Collaborators {
    pub documents: Arc<dyn DocumentStore>,
    pub identity: Arc<dyn IdentityProvider>,
    pub durable_storage: Arc<dyn KeyValueStorage>,
    pub session_storage: Arc<dyn KeyValueStorage>,
}

/// Changes that trigger preview revalidation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    PrincipalChanged,
    OverridesLoaded { using_defaults: bool },
    RolesLoaded { count: usize },
    PreviewChanged,
    /// Revalidation found the active preview ineligible and cleared it.
    PreviewCleared,
    LoggedOut,
}

#[derive(Debug)]
struct SessionState {
    principal: Option<Principal>,
    resolver: PermissionResolver,
    directory: Arc<RoleDirectory>,
    preview: PreviewEngine,
}

impl SessionState {
    fn signed_out(catalog: &PermissionCatalog) -> Self {
        Self {
            principal: None,
            resolver: PermissionResolver::from_defaults(catalog),
            directory: Arc::new(RoleDirectory::loading()),
            preview: PreviewEngine::new(),
        }
    }

    fn revalidate_preview(&mut self, manage_permission: &PermissionKey) -> Revalidation {
        let Some(principal) = &self.principal else {
            self.preview.reset();
            return Revalidation::Skipped;
        };

        let actual = principal.actual_role_ids();
        let ctx = EligibilityContext {
            actual_role_ids: &actual,
            directory: &self.directory,
            table: self.resolver.table(),
            manage_permission,
        };
        self.preview.revalidate(&ctx)
    }

    /// A preview only takes effect once the role directory has loaded and
    /// the preview has been revalidated against it.
    fn effective_role_ids(&self) -> Vec<RoleId> {
        match &self.principal {
            Some(principal) if self.directory.is_loaded() => effective_role_ids(principal, self.preview.state()),
            Some(principal) => principal.actual_role_ids(),
            None => Vec::new(),
        }
    }
}

pub struct AuthzSession {
    config: AuthzConfig,
    catalog: Arc<PermissionCatalog>,
    documents: Arc<dyn DocumentStore>,
    identity_provider: Arc<dyn IdentityProvider>,
    identity: IdentityAdapter,
    snapshots: PreviewSnapshotStore,
    generation: AtomicU64,
    state: RwLock<SessionState>,
    subscribers: Mutex<Vec<mpsc::Sender<SessionEvent>>>,
}

impl core::fmt::Debug for AuthzSession {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("AuthzSession")
            .field("config", &self.config)
            .field("generation", &self.generation())
            .finish_non_exhaustive()
    }
}

impl AuthzSession {
    pub fn new(config: AuthzConfig, collaborators: Collaborators) -> Self {
        Self::with_catalog(config, PermissionCatalog::defaults(), collaborators)
    }

    pub fn with_catalog(config: AuthzConfig, catalog: PermissionCatalog, collaborators: Collaborators) -> Self {
        let identity = IdentityAdapter::new(
            collaborators.durable_storage,
            collaborators.session_storage.clone(),
            config.identity_storage_key.clone(),
        );
        let snapshots = PreviewSnapshotStore::new(collaborators.session_storage, config.preview_storage_key.clone());
        let state = SessionState::signed_out(&catalog);

        Self {
            config,
            catalog: Arc::new(catalog),
            documents: collaborators.documents,
            identity_provider: collaborators.identity,
            identity,
            snapshots,
            generation: AtomicU64::new(0),
            state: RwLock::new(state),
            subscribers: Mutex::new(Vec::new()),
        }
    }

    fn read_state(&self) -> RwLockReadGuard<'_, SessionState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, SessionState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn config(&self) -> &AuthzConfig {
        &self.config
    }

    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    fn next_generation(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    // ─────────────────────────────────────────────────────────────────────
    // Lifecycle
    // ─────────────────────────────────────────────────────────────────────

    /// Start a session for a freshly signed-in principal.
    ///
    /// Any stored preview belongs to whoever was signed in before and is
    /// discarded.
    pub fn login(&self, principal: Principal, durability: Durability) {
        self.identity.persist(&principal, durability);
        self.snapshots.purge();
        self.install(principal, None);
    }

    /// Resume after a reload: persisted principal first, then the identity
    /// provider's current sign-in. Returns whether a principal was found.
    pub fn resume(&self) -> bool {
        if let Some(stored) = self.identity.restore() {
            tracing::debug!(principal_id = %stored.principal.id, durability = ?stored.durability, "resuming persisted session");
            self.install(stored.principal, self.snapshots.load());
            return true;
        }

        match self.identity_provider.current_principal() {
            Some(principal) => {
                self.login(principal, Durability::SessionOnly);
                true
            }
            None => false,
        }
    }

    fn install(&self, principal: Principal, snapshot: Option<PreviewState>) {
        let generation = self.next_generation();
        tracing::info!(principal_id = %principal.id, generation, "authorization session started");

        {
            let mut state = self.write_state();
            *state = SessionState::signed_out(&self.catalog);
            state.principal = Some(principal);
            state.preview.hydrate(snapshot);
        }

        self.notify(SessionEvent::PrincipalChanged);
    }

    /// Tear the session down: forget the principal and preview, purge what
    /// was persisted, and sign out with the identity layer.
    pub async fn logout(&self) {
        let generation = self.next_generation();
        tracing::info!(generation, "authorization session ended");

        *self.write_state() = SessionState::signed_out(&self.catalog);
        self.identity.clear();
        self.snapshots.purge();
        self.emit(SessionEvent::LoggedOut);

        sign_out_quietly(self.identity_provider.as_ref()).await;
    }

    /// Load overrides and roles for the current principal.
    ///
    /// Queries keep answering from compiled defaults while this is in flight.
    pub async fn bootstrap(&self) {
        if self.read_state().principal.is_none() {
            tracing::debug!("bootstrap without a principal; nothing to load");
            return;
        }

        let generation = self.generation();
        let (overrides, roles) = tokio::join!(
            self.fetch(&self.config.overrides_collection),
            self.fetch(&self.config.roles_collection),
        );

        self.apply_overrides(generation, overrides);
        self.apply_roles(generation, roles);
    }

    /// Refetch override documents and rebuild the effective table.
    pub async fn refresh_overrides(&self) -> bool {
        let generation = self.generation();
        let result = self.fetch(&self.config.overrides_collection).await;
        self.apply_overrides(generation, result)
    }

    /// Refetch the whole role directory.
    pub async fn reload_roles(&self) -> bool {
        let generation = self.generation();
        let result = self.fetch(&self.config.roles_collection).await;
        self.apply_roles(generation, result)
    }

    async fn fetch(&self, collection: &str) -> Result<Vec<Document>, StoreError> {
        self.documents.list(collection).await
    }

    fn is_current(&self, generation: u64, what: &str) -> bool {
        let current = self.generation();
        if current != generation {
            tracing::debug!(what, generation, current, "discarding result from superseded session");
            return false;
        }
        true
    }

    fn apply_overrides(&self, generation: u64, result: Result<Vec<Document>, StoreError>) -> bool {
        if !self.is_current(generation, "overrides") {
            return false;
        }

        let overrides = match result {
            Ok(docs) => overrides_from_documents(&docs),
            Err(err) => {
                tracing::warn!(error = %err, "permission overrides unavailable; using compiled defaults");
                Vec::new()
            }
        };

        let resolver = PermissionResolver::rebuild(&self.catalog, &overrides);
        let using_defaults = resolver.using_defaults();
        self.write_state().resolver = resolver;

        tracing::debug!(overrides = overrides.len(), using_defaults, "effective permission table rebuilt");
        self.notify(SessionEvent::OverridesLoaded { using_defaults });
        true
    }

    fn apply_roles(&self, generation: u64, result: Result<Vec<Document>, StoreError>) -> bool {
        if !self.is_current(generation, "roles") {
            return false;
        }

        let directory = match result {
            Ok(docs) => RoleDirectory::from_documents(&docs),
            Err(err) => {
                tracing::warn!(error = %err, "role directory unavailable; continuing with no roles");
                RoleDirectory::loaded(Vec::new())
            }
        };

        let count = directory.roles().len();
        self.write_state().directory = Arc::new(directory);

        tracing::debug!(count, "role directory loaded");
        self.notify(SessionEvent::RolesLoaded { count });
        true
    }

    // ─────────────────────────────────────────────────────────────────────
    // Change propagation
    // ─────────────────────────────────────────────────────────────────────

    /// React to a change: revalidate the preview, then tell subscribers.
    pub fn notify(&self, event: SessionEvent) {
        let outcome = self.revalidate();
        self.emit(event);
        if outcome == Revalidation::Cleared {
            self.emit(SessionEvent::PreviewCleared);
        }
    }

    /// Revalidate the active preview and persist the resulting snapshot.
    pub fn revalidate(&self) -> Revalidation {
        let (outcome, snapshot) = {
            let mut state = self.write_state();
            let outcome = state.revalidate_preview(&self.config.manage_permission);
            let snapshot = state.preview.is_hydrated().then(|| state.preview.state().clone());
            (outcome, snapshot)
        };

        if let Some(snapshot) = snapshot {
            self.snapshots.save(&snapshot);
        }
        outcome
    }

    pub fn subscribe(&self) -> mpsc::Receiver<SessionEvent> {
        let (tx, rx) = mpsc::channel();
        self.subscribers.lock().unwrap_or_else(PoisonError::into_inner).push(tx);
        rx
    }

    fn emit(&self, event: SessionEvent) {
        tracing::trace!(?event, "session event");
        let mut subs = self.subscribers.lock().unwrap_or_else(PoisonError::into_inner);
        // Drop any dead subscribers while publishing.
        subs.retain(|tx| tx.send(event.clone()).is_ok());
    }

    // ─────────────────────────────────────────────────────────────────────
    // Preview
    // ─────────────────────────────────────────────────────────────────────

    /// Preview the application as `role_id`. Ineligible roles are refused
    /// without changing the current preview.
    pub fn start_preview(&self, role_id: RoleId) -> bool {
        let started = {
            let mut state = self.write_state();
            let state = &mut *state;
            let Some(principal) = &state.principal else {
                return false;
            };

            let actual = principal.actual_role_ids();
            let ctx = EligibilityContext {
                actual_role_ids: &actual,
                directory: &state.directory,
                table: state.resolver.table(),
                manage_permission: &self.config.manage_permission,
            };
            state.preview.start(role_id, &ctx)
        };

        if started {
            self.notify(SessionEvent::PreviewChanged);
        }
        started
    }

    pub fn stop_preview(&self) {
        self.write_state().preview.stop();
        self.notify(SessionEvent::PreviewChanged);
    }

    /// Roles the signed-in principal may preview, strongest first.
    pub fn eligible_preview_roles(&self) -> Vec<Role> {
        let state = self.read_state();
        let Some(principal) = &state.principal else {
            return Vec::new();
        };

        let actual = principal.actual_role_ids();
        let ctx = EligibilityContext {
            actual_role_ids: &actual,
            directory: &state.directory,
            table: state.resolver.table(),
            manage_permission: &self.config.manage_permission,
        };
        eligible_roles(&ctx).into_iter().cloned().collect()
    }

    pub fn preview_status(&self) -> PreviewStatus {
        self.read_state().preview.status()
    }

    pub fn preview_state(&self) -> PreviewState {
        self.read_state().preview.state().clone()
    }

    // ─────────────────────────────────────────────────────────────────────
    // Queries
    // ─────────────────────────────────────────────────────────────────────

    /// Whether the role set in effect holds `key`.
    pub fn can(&self, key: &PermissionKey) -> bool {
        let state = self.read_state();
        let keys = state.directory.lookup_keys(&state.effective_role_ids());
        state.resolver.can(&keys, key)
    }

    pub fn explain(&self, key: &PermissionKey) -> AuthorizationExplanation {
        let state = self.read_state();
        let keys = state.directory.lookup_keys(&state.effective_role_ids());
        state.resolver.explain(&keys, key)
    }

    /// Role ids in effect (the previewed role while a preview is active).
    pub fn effective_role_ids(&self) -> Vec<RoleId> {
        self.read_state().effective_role_ids()
    }

    /// Role ids genuinely assigned to the principal. Not for authorization.
    pub fn actual_role_ids(&self) -> Vec<RoleId> {
        self.read_state()
            .principal
            .as_ref()
            .map(Principal::actual_role_ids)
            .unwrap_or_default()
    }

    pub fn principal(&self) -> Option<Principal> {
        self.read_state().principal.clone()
    }

    pub fn permission_table(&self) -> Arc<EffectivePermissionTable> {
        self.read_state().resolver.snapshot()
    }

    pub fn using_default_permissions(&self) -> bool {
        self.read_state().resolver.using_defaults()
    }

    pub fn roles_loaded(&self) -> bool {
        self.read_state().directory.is_loaded()
    }
}
