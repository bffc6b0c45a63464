//! LamaImage Asset Pipeline
//!
//! The shared lifecycle every tool instance runs through:
//! `Empty → Selected → Previewing(param) → Processing → {Succeeded |
//! Failed(kind)} → Saved`, with an explicit clear back to `Empty` from any
//! state. One pipeline instance owns at most one in-flight image; instances
//! are independent.

pub mod executor;
pub mod pipeline;
pub mod state;

// Re-export commonly used types
pub use executor::{LocalCompressExecutor, RemoteExecutor, TransformExecutor};
pub use pipeline::AssetPipeline;
pub use state::PipelineState;
