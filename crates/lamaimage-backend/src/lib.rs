//! LamaImage Backend Facade
//!
//! A thin abstraction over the hosted backend service's three capabilities:
//! session/auth state, object storage, and record storage. The pipeline and
//! collection views depend only on the traits in this crate; the hosted
//! service is reached through [`RestBackend`], and tests and offline
//! development use [`MemoryBackend`].
//!
//! # Object path format
//!
//! Object paths are owner-scoped: `{owner_id}/{unix_millis}_{tag}_{name}.{ext}`
//! with the filename sanitized. Path generation and parsing are centralized in
//! the `keys` module so saving and deletion stay consistent.

pub mod keys;
pub mod memory;
pub mod rest;
pub mod session;
pub mod traits;

// Re-export commonly used types
pub use memory::MemoryBackend;
pub use rest::RestBackend;
pub use session::SessionHub;
pub use traits::{
    AuthError, AuthService, BackendService, ObjectStorage, RecordError, RecordQuery, RecordStore,
    StorageError,
};
