//! Backend facade traits
//!
//! All backend implementations must provide these three capabilities. The
//! traits are object-safe so consumers can hold `Arc<dyn BackendService>`.

use async_trait::async_trait;
use bytes::Bytes;
use serde_json::Value as JsonValue;
use thiserror::Error;

use lamaimage_core::{AppError, Session};

use crate::session::SessionHub;

/// Auth operation errors
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Sign-up failed: {0}")]
    SignUpFailed(String),

    #[error("Auth backend error: {0}")]
    Backend(String),
}

/// Storage operation errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Object already exists: {0}")]
    Conflict(String),

    #[error("Bucket not found: {0}")]
    MissingBucket(String),

    #[error("Storage quota exceeded: {0}")]
    QuotaExceeded(String),

    #[error("Storage backend error: {0}")]
    Backend(String),
}

/// Record operation error, carrying a message.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct RecordError(pub String);

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InvalidCredentials => {
                AppError::NotAuthenticated("Invalid credentials".to_string())
            }
            other => AppError::Internal(other.to_string()),
        }
    }
}

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        AppError::Storage(err.to_string())
    }
}

impl From<RecordError> for AppError {
    fn from(err: RecordError) -> Self {
        AppError::Record(err.0)
    }
}

/// Session/auth capability.
///
/// Session changes are observed through the process-wide [`SessionHub`]
/// rather than per-consumer callbacks; dropping the watch receiver is the
/// unsubscribe.
#[async_trait]
pub trait AuthService: Send + Sync {
    /// Current identity, or `None` when signed out.
    async fn get_session(&self) -> Result<Option<Session>, AuthError>;

    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        display_name: &str,
    ) -> Result<Session, AuthError>;

    async fn sign_in_with_password(&self, email: &str, password: &str)
        -> Result<Session, AuthError>;

    async fn sign_out(&self) -> Result<(), AuthError>;

    /// The shared session observable for this backend instance.
    fn session_hub(&self) -> &SessionHub;
}

/// Object storage capability.
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        data: Bytes,
        content_type: &str,
    ) -> Result<(), StorageError>;

    /// Deterministic public locator for an object. No network call.
    fn public_url(&self, bucket: &str, path: &str) -> String;

    /// Remove an object. Callers treat failures as best-effort where the
    /// contract allows (deletion cleanup).
    async fn remove(&self, bucket: &str, path: &str) -> Result<(), StorageError>;
}

/// Equality filter, descending order, and limit for a record select.
#[derive(Debug, Clone, Default)]
pub struct RecordQuery {
    pub filters: Vec<(String, JsonValue)>,
    pub order_desc: Option<String>,
    pub limit: Option<usize>,
}

impl RecordQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(mut self, column: impl Into<String>, value: impl Into<JsonValue>) -> Self {
        self.filters.push((column.into(), value.into()));
        self
    }

    pub fn order_desc(mut self, column: impl Into<String>) -> Self {
        self.order_desc = Some(column.into());
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Record storage capability (CRUD over named tables).
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Insert a row; returns the stored representation (with generated id).
    async fn insert(&self, table: &str, row: JsonValue) -> Result<JsonValue, RecordError>;

    async fn select(&self, table: &str, query: RecordQuery) -> Result<Vec<JsonValue>, RecordError>;

    async fn update(&self, table: &str, id: &str, patch: JsonValue) -> Result<(), RecordError>;

    async fn delete(&self, table: &str, id: &str) -> Result<(), RecordError>;
}

/// Full backend service: auth + object storage + records.
pub trait BackendService: AuthService + ObjectStorage + RecordStore {}

impl<T: AuthService + ObjectStorage + RecordStore> BackendService for T {}
