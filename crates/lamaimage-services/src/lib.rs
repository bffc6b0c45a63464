//! LamaImage Collection Views
//!
//! Read/write views over the backend's record tables: the per-user saved
//! image library, the public review feed with its curated fallback, and the
//! admin-only review moderation view.

pub mod library;
pub mod reviews;

// Re-export commonly used types
pub use library::LibraryView;
pub use reviews::{ModerationView, ReviewService};
