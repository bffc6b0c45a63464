//! Configuration module
//!
//! Environment-driven configuration for the backend facade and the remote
//! transform endpoint. Values are read once at startup with `from_env()`.

use std::env;

use crate::constants::DEFAULT_IMAGES_BUCKET;

const DEFAULT_TRANSFORM_TIMEOUT_SECS: u64 = 45;
const DEFAULT_TRANSFORM_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Backend service configuration (auth, object storage, records).
#[derive(Clone, Debug)]
pub struct BackendConfig {
    /// Base URL of the hosted backend service.
    pub base_url: String,
    /// Anonymous/publishable API key sent with every request.
    pub anon_key: String,
    /// Storage bucket holding saved images.
    pub bucket: String,
}

/// Remote transform endpoint configuration.
#[derive(Clone, Debug)]
pub struct TransformConfig {
    /// API credential for the generative image endpoint.
    pub api_key: String,
    /// Base URL of the generative image endpoint.
    pub base_url: String,
    /// Bounded timeout for a single transform call.
    pub timeout_secs: u64,
}

/// Application configuration.
#[derive(Clone, Debug)]
pub struct AppConfig {
    pub backend: BackendConfig,
    pub transform: TransformConfig,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();

        let backend = BackendConfig {
            base_url: env::var("LAMAIMAGE_BACKEND_URL").unwrap_or_default(),
            anon_key: env::var("LAMAIMAGE_BACKEND_ANON_KEY").unwrap_or_default(),
            bucket: env::var("LAMAIMAGE_STORAGE_BUCKET")
                .unwrap_or_else(|_| DEFAULT_IMAGES_BUCKET.to_string()),
        };

        let transform = TransformConfig {
            api_key: env::var("LAMAIMAGE_API_KEY")
                .or_else(|_| env::var("API_KEY"))
                .unwrap_or_default(),
            base_url: env::var("LAMAIMAGE_TRANSFORM_URL")
                .unwrap_or_else(|_| DEFAULT_TRANSFORM_BASE_URL.to_string()),
            timeout_secs: env::var("LAMAIMAGE_TRANSFORM_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_TRANSFORM_TIMEOUT_SECS),
        };

        Ok(AppConfig { backend, transform })
    }

    /// Validate that the configuration is usable for networked operation.
    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.backend.base_url.is_empty() {
            anyhow::bail!("LAMAIMAGE_BACKEND_URL is required");
        }
        if self.backend.anon_key.is_empty() {
            anyhow::bail!("LAMAIMAGE_BACKEND_ANON_KEY is required");
        }
        if self.backend.bucket.is_empty() {
            anyhow::bail!("Storage bucket name must not be empty");
        }
        if self.transform.timeout_secs == 0 {
            anyhow::bail!("Transform timeout must be greater than zero");
        }
        Ok(())
    }
}
