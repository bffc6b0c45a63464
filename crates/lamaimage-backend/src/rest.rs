//! Hosted backend implementation over HTTP.
//!
//! Talks to a Supabase-compatible service: auth under `/auth/v1`, object
//! storage under `/storage/v1/object`, and rows under `/rest/v1` (PostgREST
//! conventions). The session is held client-side and published through the
//! [`SessionHub`].

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use serde::Deserialize;
use serde_json::{json, Value as JsonValue};
use tokio::sync::RwLock;

use lamaimage_core::{BackendConfig, Session};

use crate::session::SessionHub;
use crate::traits::{
    AuthError, AuthService, ObjectStorage, RecordError, RecordQuery, RecordStore, StorageError,
};

const HTTP_TIMEOUT_SECS: u64 = 60;

#[derive(Debug, Deserialize)]
struct AuthUser {
    id: String,
    email: Option<String>,
    #[serde(default)]
    app_metadata: JsonValue,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    user: AuthUser,
}

impl AuthUser {
    fn into_session(self) -> Session {
        let is_admin = self.app_metadata.get("role").and_then(|v| v.as_str()) == Some("admin");
        Session {
            user_id: self.id,
            email: self.email.unwrap_or_default(),
            is_admin,
        }
    }
}

/// HTTP client for the hosted backend service.
pub struct RestBackend {
    http: reqwest::Client,
    base_url: String,
    anon_key: String,
    hub: SessionHub,
    access_token: RwLock<Option<String>>,
}

impl RestBackend {
    pub fn new(config: &BackendConfig) -> Result<Self, anyhow::Error> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(HTTP_TIMEOUT_SECS))
            .build()?;
        Ok(RestBackend {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            anon_key: config.anon_key.clone(),
            hub: SessionHub::new(),
            access_token: RwLock::new(None),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Attach the apikey header plus the strongest available bearer token.
    async fn apply_auth(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        let token = self.access_token.read().await.clone();
        let bearer = token.unwrap_or_else(|| self.anon_key.clone());
        request
            .header("apikey", &self.anon_key)
            .header("Authorization", format!("Bearer {}", bearer))
    }

    async fn store_session(&self, token: TokenResponse) -> Session {
        let session = token.user.into_session();
        *self.access_token.write().await = Some(token.access_token);
        self.hub.set(Some(session.clone()));
        session
    }

    async fn error_text(response: reqwest::Response) -> String {
        let status = response.status();
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        format!("{}: {}", status, body)
    }
}

#[async_trait]
impl AuthService for RestBackend {
    async fn get_session(&self) -> Result<Option<Session>, AuthError> {
        Ok(self.hub.current())
    }

    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        display_name: &str,
    ) -> Result<Session, AuthError> {
        let body = json!({
            "email": email,
            "password": password,
            "data": { "display_name": display_name },
        });
        let response = self
            .http
            .post(self.url("/auth/v1/signup"))
            .header("apikey", &self.anon_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| AuthError::Backend(e.to_string()))?;

        if !response.status().is_success() {
            return Err(AuthError::SignUpFailed(Self::error_text(response).await));
        }
        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| AuthError::Backend(e.to_string()))?;
        Ok(self.store_session(token).await)
    }

    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Session, AuthError> {
        let response = self
            .http
            .post(self.url("/auth/v1/token?grant_type=password"))
            .header("apikey", &self.anon_key)
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await
            .map_err(|e| AuthError::Backend(e.to_string()))?;

        let status = response.status();
        if status == reqwest::StatusCode::BAD_REQUEST || status == reqwest::StatusCode::UNAUTHORIZED
        {
            return Err(AuthError::InvalidCredentials);
        }
        if !status.is_success() {
            return Err(AuthError::Backend(Self::error_text(response).await));
        }
        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| AuthError::Backend(e.to_string()))?;
        Ok(self.store_session(token).await)
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        let request = self.http.post(self.url("/auth/v1/logout"));
        let request = self.apply_auth(request).await;
        // Best-effort server-side revocation; local state is cleared regardless.
        if let Err(e) = request.send().await {
            tracing::warn!(error = %e, "logout request failed");
        }
        *self.access_token.write().await = None;
        self.hub.set(None);
        Ok(())
    }

    fn session_hub(&self) -> &SessionHub {
        &self.hub
    }
}

#[async_trait]
impl ObjectStorage for RestBackend {
    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        data: Bytes,
        content_type: &str,
    ) -> Result<(), StorageError> {
        let request = self
            .http
            .post(self.url(&format!("/storage/v1/object/{}/{}", bucket, path)))
            .header("Content-Type", content_type)
            .header("Cache-Control", "3600")
            .body(data);
        let request = self.apply_auth(request).await;

        let response = request
            .send()
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;

        let status = response.status();
        match status {
            s if s.is_success() => Ok(()),
            reqwest::StatusCode::CONFLICT => Err(StorageError::Conflict(path.to_string())),
            reqwest::StatusCode::NOT_FOUND => Err(StorageError::MissingBucket(bucket.to_string())),
            reqwest::StatusCode::PAYLOAD_TOO_LARGE => {
                Err(StorageError::QuotaExceeded(path.to_string()))
            }
            _ => Err(StorageError::Backend(Self::error_text(response).await)),
        }
    }

    fn public_url(&self, bucket: &str, path: &str) -> String {
        format!(
            "{}/storage/v1/object/public/{}/{}",
            self.base_url, bucket, path
        )
    }

    async fn remove(&self, bucket: &str, path: &str) -> Result<(), StorageError> {
        let request = self
            .http
            .delete(self.url(&format!("/storage/v1/object/{}/{}", bucket, path)));
        let request = self.apply_auth(request).await;

        let response = request
            .send()
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;
        if !response.status().is_success() {
            return Err(StorageError::Backend(Self::error_text(response).await));
        }
        Ok(())
    }
}

#[async_trait]
impl RecordStore for RestBackend {
    async fn insert(&self, table: &str, row: JsonValue) -> Result<JsonValue, RecordError> {
        let request = self
            .http
            .post(self.url(&format!("/rest/v1/{}", table)))
            .header("Prefer", "return=representation")
            .json(&row);
        let request = self.apply_auth(request).await;

        let response = request
            .send()
            .await
            .map_err(|e| RecordError(e.to_string()))?;
        if !response.status().is_success() {
            return Err(RecordError(Self::error_text(response).await));
        }
        // PostgREST returns an array of inserted rows.
        let mut rows: Vec<JsonValue> = response
            .json()
            .await
            .map_err(|e| RecordError(e.to_string()))?;
        rows.pop()
            .ok_or_else(|| RecordError("Insert returned no representation".to_string()))
    }

    async fn select(&self, table: &str, query: RecordQuery) -> Result<Vec<JsonValue>, RecordError> {
        let mut params: Vec<(String, String)> = vec![("select".to_string(), "*".to_string())];
        for (col, value) in &query.filters {
            let literal = match value {
                JsonValue::String(s) => s.clone(),
                other => other.to_string(),
            };
            params.push((col.clone(), format!("eq.{}", literal)));
        }
        if let Some(col) = &query.order_desc {
            params.push(("order".to_string(), format!("{}.desc", col)));
        }
        if let Some(limit) = query.limit {
            params.push(("limit".to_string(), limit.to_string()));
        }

        let request = self
            .http
            .get(self.url(&format!("/rest/v1/{}", table)))
            .query(&params);
        let request = self.apply_auth(request).await;

        let response = request
            .send()
            .await
            .map_err(|e| RecordError(e.to_string()))?;
        if !response.status().is_success() {
            return Err(RecordError(Self::error_text(response).await));
        }
        response.json().await.map_err(|e| RecordError(e.to_string()))
    }

    async fn update(&self, table: &str, id: &str, patch: JsonValue) -> Result<(), RecordError> {
        let request = self
            .http
            .patch(self.url(&format!("/rest/v1/{}", table)))
            .query(&[("id", format!("eq.{}", id))])
            .json(&patch);
        let request = self.apply_auth(request).await;

        let response = request
            .send()
            .await
            .map_err(|e| RecordError(e.to_string()))?;
        if !response.status().is_success() {
            return Err(RecordError(Self::error_text(response).await));
        }
        Ok(())
    }

    async fn delete(&self, table: &str, id: &str) -> Result<(), RecordError> {
        let request = self
            .http
            .delete(self.url(&format!("/rest/v1/{}", table)))
            .query(&[("id", format!("eq.{}", id))]);
        let request = self.apply_auth(request).await;

        let response = request
            .send()
            .await
            .map_err(|e| RecordError(e.to_string()))?;
        if !response.status().is_success() {
            return Err(RecordError(Self::error_text(response).await));
        }
        Ok(())
    }
}
