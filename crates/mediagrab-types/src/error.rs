//! Error types for mediagrab.

use crate::format::FormatParseError;
use crate::platform::{Platform, PlatformParseError};
use thiserror::Error;

/// Result type alias for mediagrab operations.
pub type Result<T> = std::result::Result<T, MediagrabError>;

/// Errors that can occur while validating and preparing download requests.
#[derive(Error, Debug)]
pub enum MediagrabError {
    /// The submitted URL could not be accepted.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// The URL belongs to a different platform than the one requested.
    #[error("This appears to be a {detected} URL, not {expected}")]
    PlatformMismatch {
        /// The platform the caller asked for.
        expected: Platform,
        /// The platform detected from the URL's hostname.
        detected: Platform,
    },

    /// Unknown platform identifier.
    #[error(transparent)]
    Platform(#[from] PlatformParseError),

    /// Unknown format identifier.
    #[error(transparent)]
    Format(#[from] FormatParseError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
