//! In-memory backend implementation.
//!
//! Used by tests and offline development. Mirrors the hosted service's
//! observable behavior: generated row ids, bucket existence checks, and a
//! deterministic public URL scheme. Operation counters and failure switches
//! let tests assert idempotence and error-path policies.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use bytes::Bytes;
use serde_json::Value as JsonValue;
use uuid::Uuid;

use lamaimage_core::constants::DEFAULT_IMAGES_BUCKET;
use lamaimage_core::Session;

use crate::session::SessionHub;
use crate::traits::{
    AuthError, AuthService, ObjectStorage, RecordError, RecordQuery, RecordStore, StorageError,
};

struct UserEntry {
    password: String,
    session: Session,
}

struct StoredObject {
    data: Bytes,
    content_type: String,
}

#[derive(Default)]
struct Inner {
    users: HashMap<String, UserEntry>,
    buckets: HashSet<String>,
    objects: HashMap<String, StoredObject>,
    tables: HashMap<String, Vec<JsonValue>>,
}

/// In-memory backend with the default `images` bucket pre-created.
pub struct MemoryBackend {
    hub: SessionHub,
    inner: Mutex<Inner>,
    base_url: String,
    upload_count: AtomicUsize,
    insert_count: AtomicUsize,
    fail_uploads: AtomicBool,
    fail_inserts: AtomicBool,
    fail_updates: AtomicBool,
    fail_deletes: AtomicBool,
    fail_removes: AtomicBool,
}

impl MemoryBackend {
    pub fn new() -> Self {
        let mut inner = Inner::default();
        inner.buckets.insert(DEFAULT_IMAGES_BUCKET.to_string());
        MemoryBackend {
            hub: SessionHub::new(),
            inner: Mutex::new(inner),
            base_url: "https://backend.test".to_string(),
            upload_count: AtomicUsize::new(0),
            insert_count: AtomicUsize::new(0),
            fail_uploads: AtomicBool::new(false),
            fail_inserts: AtomicBool::new(false),
            fail_updates: AtomicBool::new(false),
            fail_deletes: AtomicBool::new(false),
            fail_removes: AtomicBool::new(false),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn object_key(bucket: &str, path: &str) -> String {
        format!("{}/{}", bucket, path)
    }

    /// Register a user without signing in.
    pub fn register_user(&self, email: &str, password: &str, session: Session) {
        self.lock().users.insert(
            email.to_string(),
            UserEntry {
                password: password.to_string(),
                session,
            },
        );
    }

    /// Force the current session. Test helper; bypasses credentials.
    pub fn set_session(&self, session: Option<Session>) {
        self.hub.set(session);
    }

    pub fn upload_count(&self) -> usize {
        self.upload_count.load(Ordering::SeqCst)
    }

    pub fn insert_count(&self) -> usize {
        self.insert_count.load(Ordering::SeqCst)
    }

    pub fn has_object(&self, bucket: &str, path: &str) -> bool {
        self.lock().objects.contains_key(&Self::object_key(bucket, path))
    }

    pub fn object_count(&self) -> usize {
        self.lock().objects.len()
    }

    /// Snapshot of a table's rows, in insertion order.
    pub fn records(&self, table: &str) -> Vec<JsonValue> {
        self.lock().tables.get(table).cloned().unwrap_or_default()
    }

    pub fn set_fail_uploads(&self, fail: bool) {
        self.fail_uploads.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_inserts(&self, fail: bool) {
        self.fail_inserts.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_updates(&self, fail: bool) {
        self.fail_updates.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_deletes(&self, fail: bool) {
        self.fail_deletes.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_removes(&self, fail: bool) {
        self.fail_removes.store(fail, Ordering::SeqCst);
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AuthService for MemoryBackend {
    async fn get_session(&self) -> Result<Option<Session>, AuthError> {
        Ok(self.hub.current())
    }

    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        display_name: &str,
    ) -> Result<Session, AuthError> {
        let session = Session::new(Uuid::new_v4().to_string(), email);
        let mut inner = self.lock();
        if inner.users.contains_key(email) {
            return Err(AuthError::SignUpFailed(format!(
                "User already registered: {}",
                email
            )));
        }
        tracing::debug!(email, display_name, "registered user");
        inner.users.insert(
            email.to_string(),
            UserEntry {
                password: password.to_string(),
                session: session.clone(),
            },
        );
        drop(inner);
        self.hub.set(Some(session.clone()));
        Ok(session)
    }

    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Session, AuthError> {
        let session = {
            let inner = self.lock();
            let entry = inner.users.get(email).ok_or(AuthError::InvalidCredentials)?;
            if entry.password != password {
                return Err(AuthError::InvalidCredentials);
            }
            entry.session.clone()
        };
        self.hub.set(Some(session.clone()));
        Ok(session)
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        self.hub.set(None);
        Ok(())
    }

    fn session_hub(&self) -> &SessionHub {
        &self.hub
    }
}

#[async_trait]
impl ObjectStorage for MemoryBackend {
    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        data: Bytes,
        content_type: &str,
    ) -> Result<(), StorageError> {
        if self.fail_uploads.load(Ordering::SeqCst) {
            return Err(StorageError::Backend("injected upload failure".to_string()));
        }
        let mut inner = self.lock();
        if !inner.buckets.contains(bucket) {
            return Err(StorageError::MissingBucket(bucket.to_string()));
        }
        let key = Self::object_key(bucket, path);
        if inner.objects.contains_key(&key) {
            return Err(StorageError::Conflict(path.to_string()));
        }
        inner.objects.insert(
            key,
            StoredObject {
                data,
                content_type: content_type.to_string(),
            },
        );
        self.upload_count.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn public_url(&self, bucket: &str, path: &str) -> String {
        format!(
            "{}/storage/v1/object/public/{}/{}",
            self.base_url, bucket, path
        )
    }

    async fn remove(&self, bucket: &str, path: &str) -> Result<(), StorageError> {
        if self.fail_removes.load(Ordering::SeqCst) {
            return Err(StorageError::Backend("injected remove failure".to_string()));
        }
        let mut inner = self.lock();
        let key = Self::object_key(bucket, path);
        let removed = inner.objects.remove(&key);
        if removed.is_none() {
            return Err(StorageError::Backend(format!("Object not found: {}", key)));
        }
        Ok(())
    }
}

/// Descending comparison used for `order_desc`. ISO8601 strings compare
/// correctly as plain strings.
fn cmp_desc(a: &JsonValue, b: &JsonValue) -> std::cmp::Ordering {
    use std::cmp::Ordering as O;
    match (a, b) {
        (JsonValue::String(x), JsonValue::String(y)) => y.cmp(x),
        (JsonValue::Number(x), JsonValue::Number(y)) => y
            .as_f64()
            .partial_cmp(&x.as_f64())
            .unwrap_or(O::Equal),
        _ => O::Equal,
    }
}

#[async_trait]
impl RecordStore for MemoryBackend {
    async fn insert(&self, table: &str, row: JsonValue) -> Result<JsonValue, RecordError> {
        if self.fail_inserts.load(Ordering::SeqCst) {
            return Err(RecordError("injected insert failure".to_string()));
        }
        let mut row = row;
        let obj = row
            .as_object_mut()
            .ok_or_else(|| RecordError("Row must be a JSON object".to_string()))?;
        obj.entry("id")
            .or_insert_with(|| JsonValue::String(Uuid::new_v4().to_string()));

        let mut inner = self.lock();
        inner
            .tables
            .entry(table.to_string())
            .or_default()
            .push(row.clone());
        self.insert_count.fetch_add(1, Ordering::SeqCst);
        Ok(row)
    }

    async fn select(&self, table: &str, query: RecordQuery) -> Result<Vec<JsonValue>, RecordError> {
        let inner = self.lock();
        let mut rows: Vec<JsonValue> = inner
            .tables
            .get(table)
            .map(|rows| {
                rows.iter()
                    .filter(|row| {
                        query
                            .filters
                            .iter()
                            .all(|(col, value)| row.get(col) == Some(value))
                    })
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        if let Some(col) = &query.order_desc {
            rows.sort_by(|a, b| {
                cmp_desc(
                    a.get(col).unwrap_or(&JsonValue::Null),
                    b.get(col).unwrap_or(&JsonValue::Null),
                )
            });
        }
        if let Some(limit) = query.limit {
            rows.truncate(limit);
        }
        Ok(rows)
    }

    async fn update(&self, table: &str, id: &str, patch: JsonValue) -> Result<(), RecordError> {
        if self.fail_updates.load(Ordering::SeqCst) {
            return Err(RecordError("injected update failure".to_string()));
        }
        let patch_obj = patch
            .as_object()
            .ok_or_else(|| RecordError("Patch must be a JSON object".to_string()))?;

        let mut inner = self.lock();
        let rows = inner
            .tables
            .get_mut(table)
            .ok_or_else(|| RecordError(format!("Table not found: {}", table)))?;
        let row = rows
            .iter_mut()
            .find(|row| row.get("id").and_then(|v| v.as_str()) == Some(id))
            .ok_or_else(|| RecordError(format!("Row not found: {}", id)))?;
        let obj = row
            .as_object_mut()
            .ok_or_else(|| RecordError("Stored row is not an object".to_string()))?;
        for (key, value) in patch_obj {
            obj.insert(key.clone(), value.clone());
        }
        Ok(())
    }

    async fn delete(&self, table: &str, id: &str) -> Result<(), RecordError> {
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(RecordError("injected delete failure".to_string()));
        }
        let mut inner = self.lock();
        let rows = inner
            .tables
            .get_mut(table)
            .ok_or_else(|| RecordError(format!("Table not found: {}", table)))?;
        let before = rows.len();
        rows.retain(|row| row.get("id").and_then(|v| v.as_str()) != Some(id));
        if rows.len() == before {
            return Err(RecordError(format!("Row not found: {}", id)));
        }
        Ok(())
    }
}
