//! LamaImage Core Library
//!
//! This crate provides the domain models, error types, configuration, and
//! constants shared across all LamaImage components.

pub mod config;
pub mod constants;
pub mod error;
pub mod models;

// Re-export commonly used types
pub use config::{AppConfig, BackendConfig, TransformConfig};
pub use error::{AppError, ErrorMetadata, LogLevel};
pub use models::{
    CompressionMetrics, PreviewRef, Review, ReviewSubmission, SavedImage, Session, SourceAsset,
    ToolKind, TransformOutput, TransformRequest,
};
