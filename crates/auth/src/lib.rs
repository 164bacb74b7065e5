//! `rolegate-auth`: role-based authorization with supervised role preview.
//!
//! This crate is decoupled from transport and storage; the collaborator
//! traits in [`store`] are the whole boundary.

pub mod catalog;
pub mod config;
pub mod directory;
pub mod gateway;
pub mod identity;
pub mod permissions;
pub mod preview;
pub mod principal;
pub mod resolver;
pub mod roles;
pub mod session;
pub mod snapshot;
pub mod store;

pub use catalog::PermissionCatalog;
pub use config::AuthzConfig;
pub use directory::RoleDirectory;
pub use gateway::effective_role_ids;
pub use identity::{Durability, IdentityAdapter, StoredIdentity};
pub use permissions::PermissionKey;
pub use preview::{PreviewEngine, PreviewState, PreviewStatus, Revalidation};
pub use principal::{Principal, actual_role_ids};
pub use resolver::{
    AuthorizationExplanation, DenialKind, EffectivePermissionTable, OverrideDocument, PermissionResolver,
    build_effective_table, can, explain,
};
pub use roles::{DEVELOPER_ROLE_ID, Role, RoleName};
pub use session::{AuthzSession, Collaborators, SessionEvent};
pub use snapshot::PreviewSnapshotStore;
pub use store::{Document, DocumentStore, IdentityError, IdentityProvider, KeyValueStorage, StorageError, StoreError};
