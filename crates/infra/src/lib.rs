//! Infrastructure layer: concrete collaborators for the authorization engine.

pub mod document_store;
pub mod identity;
pub mod storage;


pub use document_store::InMemoryDocumentStore;
pub use identity::InMemoryIdentityProvider;
pub use storage::{InMemoryStorage, JsonFileStorage};
