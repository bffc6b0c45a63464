//! Domain models shared across the pipeline, facade, and services.

pub mod asset;
pub mod review;
pub mod saved_image;
pub mod session;

pub use asset::{
    CompressionMetrics, PreviewRef, SourceAsset, ToolKind, TransformOutput, TransformRequest,
};
pub use review::{Review, ReviewSubmission};
pub use saved_image::SavedImage;
pub use session::Session;
