//! Remote transform client.
//!
//! Wraps exactly one external generative-image call per invocation: encode
//! the payload as base64, issue the request, scan the response for the first
//! embedded image payload, and decode it back into a blob. No automatic
//! retries; failure classification goes through the `classify` module.

use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use bytes::Bytes;
use serde::Deserialize;
use serde_json::json;

use lamaimage_core::{TransformConfig, TransformOutput};

use crate::classify::{classify_status, TransformError};
use crate::profile::ToolProfile;

/// Remote transform seam: one image in, one image out.
#[async_trait]
pub trait RemoteTransform: Send + Sync {
    async fn transform(
        &self,
        data: Bytes,
        content_type: &str,
        directive: &str,
    ) -> Result<TransformOutput, TransformError>;
}

#[derive(Debug, Deserialize)]
struct InlineData {
    #[serde(alias = "mimeType", alias = "mime_type")]
    mime_type: String,
    data: String,
}

#[derive(Debug, Deserialize)]
struct Part {
    #[serde(default, alias = "inlineData", alias = "inline_data")]
    inline_data: Option<InlineData>,
    #[serde(default)]
    #[allow(dead_code)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

/// First embedded image payload in the response, if any. First match wins
/// and the scan stops; no partial results are ever exposed.
fn first_inline_image(response: GenerateContentResponse) -> Option<(String, String)> {
    let candidate = response.candidates.into_iter().next()?;
    let content = candidate.content?;
    content
        .parts
        .into_iter()
        .find_map(|part| part.inline_data)
        .map(|inline| (inline.mime_type, inline.data))
}

/// Client for a generateContent-shaped generative image endpoint.
pub struct GenerativeImageClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    aspect_ratio: Option<String>,
}

impl GenerativeImageClient {
    pub fn new(config: &TransformConfig, profile: &ToolProfile) -> Result<Self, anyhow::Error> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(GenerativeImageClient {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            model: profile.model.clone(),
            aspect_ratio: profile.aspect_ratio.clone(),
        })
    }
}

#[async_trait]
impl RemoteTransform for GenerativeImageClient {
    async fn transform(
        &self,
        data: Bytes,
        content_type: &str,
        directive: &str,
    ) -> Result<TransformOutput, TransformError> {
        let encoded = base64::engine::general_purpose::STANDARD.encode(&data);
        let mut body = json!({
            "contents": [{
                "parts": [
                    { "inline_data": { "mime_type": content_type, "data": encoded } },
                    { "text": directive },
                ],
            }],
        });
        if let Some(ratio) = &self.aspect_ratio {
            body["generationConfig"] = json!({ "imageConfig": { "aspectRatio": ratio } });
        }

        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        );
        let response = self
            .http
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    TransformError::transient("Transform request timed out".to_string())
                } else {
                    TransformError::from_message(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let message = format!("{}: {}", status, text);
            return Err(match classify_status(status.as_u16()) {
                Some(kind) => TransformError { kind, message },
                None => TransformError::from_message(message),
            });
        }

        let parsed: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| TransformError::transient(format!("Malformed response: {}", e)))?;

        let (mime_type, payload) = first_inline_image(parsed).ok_or_else(|| {
            TransformError::no_result("No image payload found in transform response".to_string())
        })?;

        let bytes = base64::engine::general_purpose::STANDARD
            .decode(payload.as_bytes())
            .map_err(|e| TransformError::transient(format!("Invalid image payload: {}", e)))?;

        tracing::debug!(model = %self.model, result_bytes = bytes.len(), "remote transform succeeded");
        Ok(TransformOutput::new(bytes, mime_type))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::TransformErrorKind;

    fn parse(json: serde_json::Value) -> GenerateContentResponse {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn test_first_inline_image_wins() {
        let response = parse(serde_json::json!({
            "candidates": [{
                "content": {
                    "parts": [
                        { "text": "Here is your image" },
                        { "inlineData": { "mimeType": "image/png", "data": "Zmlyc3Q=" } },
                        { "inlineData": { "mimeType": "image/jpeg", "data": "c2Vjb25k" } },
                    ],
                },
            }],
        }));

        let (mime, data) = first_inline_image(response).unwrap();
        assert_eq!(mime, "image/png");
        assert_eq!(data, "Zmlyc3Q=");
    }

    #[test]
    fn test_no_image_parts() {
        let response = parse(serde_json::json!({
            "candidates": [{ "content": { "parts": [{ "text": "sorry" }] } }],
        }));
        assert!(first_inline_image(response).is_none());

        let empty = parse(serde_json::json!({}));
        assert!(first_inline_image(empty).is_none());
    }

    #[test]
    fn test_snake_case_inline_data_accepted() {
        let response = parse(serde_json::json!({
            "candidates": [{
                "content": {
                    "parts": [
                        { "inline_data": { "mime_type": "image/webp", "data": "eA==" } },
                    ],
                },
            }],
        }));
        let (mime, _) = first_inline_image(response).unwrap();
        assert_eq!(mime, "image/webp");
    }

    #[test]
    fn test_auth_failure_message_classification() {
        let err =
            TransformError::from_message("Permission denied: requested entity was not found");
        assert_eq!(err.kind, TransformErrorKind::AuthRequired);
    }
}
