//! Authentication session: credential storage and lifecycle events.

pub mod events;
pub mod storage;
pub mod store;

pub use events::{ClearReason, SessionEvent, SessionEvents};
pub use storage::{FileStore, KeyValueStore, KeyringStore, MemoryStore, StorageError};
pub use store::{Credential, CredentialStore};
