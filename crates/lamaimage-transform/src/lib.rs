//! LamaImage Transform Library
//!
//! Two transform paths feed the asset pipeline: the offline
//! [`CompressEngine`] (deterministic JPEG re-encode at a quality setting)
//! and the [`GenerativeImageClient`] (one remote generative call per
//! invocation). Failure classification is centralized in the `classify`
//! module; per-tool prompts and models live in `profile`.

pub mod classify;
pub mod local;
pub mod profile;
pub mod remote;

// Re-export commonly used types
pub use classify::{classify_message, TransformError, TransformErrorKind};
pub use local::CompressEngine;
pub use profile::ToolProfile;
pub use remote::{GenerativeImageClient, RemoteTransform};
