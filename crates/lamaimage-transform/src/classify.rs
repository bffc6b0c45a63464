//! Transform failure classification.
//!
//! The remote endpoint reports failures through an opaque error channel, so
//! recoverable auth failures have to be told apart from everything else by
//! message inspection. The pattern table lives here and nowhere else; every
//! transform path funnels its failures through this module.

use std::fmt;

/// Failure classification for a transform attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransformErrorKind {
    /// Missing/invalid credential or permission denial. The UI offers a
    /// re-authentication path and one automatic retry after recovery.
    AuthRequired,
    /// The call succeeded but no image payload was found. Terminal for this
    /// attempt; the user must retry manually.
    NoResult,
    /// Any other failure, surfaced as a generic message.
    Transient,
}

impl fmt::Display for TransformErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TransformErrorKind::AuthRequired => "auth-required",
            TransformErrorKind::NoResult => "no-result",
            TransformErrorKind::Transient => "transient",
        };
        f.write_str(s)
    }
}

/// A classified transform failure.
#[derive(Debug, Clone, thiserror::Error)]
#[error("Transform failed ({kind}): {message}")]
pub struct TransformError {
    pub kind: TransformErrorKind,
    pub message: String,
}

impl TransformError {
    pub fn auth_required(message: impl Into<String>) -> Self {
        TransformError {
            kind: TransformErrorKind::AuthRequired,
            message: message.into(),
        }
    }

    pub fn no_result(message: impl Into<String>) -> Self {
        TransformError {
            kind: TransformErrorKind::NoResult,
            message: message.into(),
        }
    }

    pub fn transient(message: impl Into<String>) -> Self {
        TransformError {
            kind: TransformErrorKind::Transient,
            message: message.into(),
        }
    }

    /// Classify an opaque failure message.
    pub fn from_message(message: impl Into<String>) -> Self {
        let message = message.into();
        TransformError {
            kind: classify_message(&message),
            message,
        }
    }
}

/// Case-insensitive substrings indicating a recoverable auth failure.
const AUTH_PATTERNS: &[&str] = &[
    "permission denied",
    "api key",
    "403",
    "entity was not found",
];

/// Classify an opaque error message into a [`TransformErrorKind`].
///
/// Substring matching is a last resort for endpoints without structured
/// error codes; HTTP status classification (401/403) takes precedence where
/// a status is available.
pub fn classify_message(message: &str) -> TransformErrorKind {
    let lowered = message.to_lowercase();
    if AUTH_PATTERNS.iter().any(|p| lowered.contains(p)) {
        TransformErrorKind::AuthRequired
    } else {
        TransformErrorKind::Transient
    }
}

/// Classify an HTTP status where one is available.
pub fn classify_status(status: u16) -> Option<TransformErrorKind> {
    match status {
        401 | 403 => Some(TransformErrorKind::AuthRequired),
        _ => None,
    }
}
