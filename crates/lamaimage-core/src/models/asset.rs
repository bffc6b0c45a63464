//! In-memory asset types flowing through a pipeline instance.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use base64::Engine;
use bytes::Bytes;

use crate::error::AppError;

/// Tool kind, one per pipeline instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolKind {
    Compress,
    Enhance,
    RemoveBackground,
}

impl ToolKind {
    /// Tag string persisted in the `images` table `type` column.
    pub fn tag(self) -> &'static str {
        match self {
            ToolKind::Compress => "compressed",
            ToolKind::Enhance => "enhanced",
            ToolKind::RemoveBackground => "bg-removed",
        }
    }

    pub fn parse(s: &str) -> Result<Self, AppError> {
        match s {
            "compressed" | "compress" => Ok(ToolKind::Compress),
            "enhanced" | "enhance" => Ok(ToolKind::Enhance),
            "bg-removed" | "remove-bg" => Ok(ToolKind::RemoveBackground),
            _ => Err(AppError::Validation(format!("Unknown tool kind: {}", s))),
        }
    }

    /// Whether this tool runs against the remote generative endpoint.
    pub fn is_remote(self) -> bool {
        !matches!(self, ToolKind::Compress)
    }
}

impl fmt::Display for ToolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// A releasable preview reference (the in-process analog of an object URL).
///
/// Cloning shares the release flag: releasing any clone marks all clones
/// released, which lets tests assert the pipeline revoked what it handed out.
#[derive(Debug, Clone)]
pub struct PreviewRef {
    url: String,
    released: Arc<AtomicBool>,
}

impl PreviewRef {
    /// Build a data-URL preview reference for the given payload.
    pub fn data_url(content_type: &str, data: &[u8]) -> Self {
        let encoded = base64::engine::general_purpose::STANDARD.encode(data);
        PreviewRef {
            url: format!("data:{};base64,{}", content_type, encoded),
            released: Arc::new(AtomicBool::new(false)),
        }
    }

    /// The preview locator. Returns `None` once released.
    pub fn url(&self) -> Option<&str> {
        if self.is_released() {
            None
        } else {
            Some(&self.url)
        }
    }

    /// Release the reference. Idempotent.
    pub fn release(&self) {
        self.released.store(true, Ordering::SeqCst);
    }

    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::SeqCst)
    }
}

/// A user-supplied image held by exactly one pipeline instance.
#[derive(Debug, Clone)]
pub struct SourceAsset {
    pub data: Bytes,
    pub content_type: String,
    pub filename: String,
    pub preview: PreviewRef,
}

impl SourceAsset {
    pub fn new(data: impl Into<Bytes>, content_type: impl Into<String>, filename: impl Into<String>) -> Self {
        let data = data.into();
        let content_type = content_type.into();
        let preview = PreviewRef::data_url(&content_type, &data);
        SourceAsset {
            data,
            content_type,
            filename: filename.into(),
            preview,
        }
    }

    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }
}

/// Immutable description of one transform run. Constructed fresh per run.
#[derive(Debug, Clone)]
pub struct TransformRequest {
    pub tool: ToolKind,
    pub data: Bytes,
    pub content_type: String,
    /// Quality percentage for compression, restoration intensity for
    /// enhancement, `None` for background removal.
    pub param: Option<u8>,
}

/// Size metrics for a local re-encode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompressionMetrics {
    pub original_size: u64,
    pub result_size: u64,
    /// `floor((1 - result/original) * 100)`. May be negative when the
    /// re-encode grows the file; callers treat that as "no gain".
    pub reduction_ratio: i32,
}

impl CompressionMetrics {
    pub fn compute(original_size: u64, result_size: u64) -> Self {
        let ratio = if original_size == 0 {
            0
        } else {
            ((1.0 - result_size as f64 / original_size as f64) * 100.0).floor() as i32
        };
        CompressionMetrics {
            original_size,
            result_size,
            reduction_ratio: ratio,
        }
    }
}

/// Successful outcome of a transform run.
#[derive(Debug, Clone)]
pub struct TransformOutput {
    pub data: Bytes,
    pub content_type: String,
    pub preview: PreviewRef,
    pub metrics: Option<CompressionMetrics>,
}

impl TransformOutput {
    pub fn new(data: impl Into<Bytes>, content_type: impl Into<String>) -> Self {
        let data = data.into();
        let content_type = content_type.into();
        let preview = PreviewRef::data_url(&content_type, &data);
        TransformOutput {
            data,
            content_type,
            preview,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: CompressionMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_kind_tags() {
        assert_eq!(ToolKind::Compress.tag(), "compressed");
        assert_eq!(ToolKind::Enhance.tag(), "enhanced");
        assert_eq!(ToolKind::RemoveBackground.tag(), "bg-removed");
    }

    #[test]
    fn test_tool_kind_parse_roundtrip() {
        for kind in [ToolKind::Compress, ToolKind::Enhance, ToolKind::RemoveBackground] {
            assert_eq!(ToolKind::parse(kind.tag()).unwrap(), kind);
        }
        assert!(ToolKind::parse("upscaled").is_err());
    }

    #[test]
    fn test_preview_ref_release() {
        let preview = PreviewRef::data_url("image/png", b"abc");
        let clone = preview.clone();
        assert!(preview.url().unwrap().starts_with("data:image/png;base64,"));

        clone.release();
        assert!(preview.is_released());
        assert!(preview.url().is_none());
    }

    #[test]
    fn test_reduction_ratio_floored() {
        let m = CompressionMetrics::compute(4_000_000, 1_000_000);
        assert_eq!(m.reduction_ratio, 75);

        // Growth yields a negative ratio, not an error.
        let grown = CompressionMetrics::compute(100, 150);
        assert_eq!(grown.reduction_ratio, -50);

        // 1/3 reduction floors down.
        let third = CompressionMetrics::compute(3, 2);
        assert_eq!(third.reduction_ratio, 33);
    }

    #[test]
    fn test_reduction_ratio_zero_original() {
        assert_eq!(CompressionMetrics::compute(0, 10).reduction_ratio, 0);
    }
}
