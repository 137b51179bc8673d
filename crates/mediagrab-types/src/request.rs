//! Validated download requests.

use crate::{MediaFormat, MediagrabError, Platform, Result};
use serde::{Deserialize, Serialize};
use url::Url;

/// Maximum accepted URL length.
pub const MAX_URL_LENGTH: usize = 4096;

/// A validated request for a media download.
///
/// Construction validates the URL (scheme, length) and cross-checks the
/// requested platform against the one detected from the hostname, so a
/// request that reaches the job manager is already well-formed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadRequest {
    /// The media URL to download.
    pub url: String,
    /// The platform the URL belongs to.
    pub platform: Platform,
    /// The requested output format.
    pub format: MediaFormat,
}

impl DownloadRequest {
    /// Creates a request for an explicitly named platform.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is malformed or belongs to a
    /// different platform than the one given.
    pub fn new(url: &str, platform: Platform, format: MediaFormat) -> Result<Self> {
        let parsed = validate_url(url)?;

        if let Some(detected) = Platform::detect(&parsed) {
            if detected != platform {
                return Err(MediagrabError::PlatformMismatch {
                    expected: platform,
                    detected,
                });
            }
        }

        Ok(Self {
            url: url.to_string(),
            platform,
            format,
        })
    }

    /// Creates a request, inferring the platform from the URL's hostname.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is malformed or its hostname doesn't
    /// match any supported platform.
    pub fn detect(url: &str, format: MediaFormat) -> Result<Self> {
        let parsed = validate_url(url)?;

        let platform = Platform::detect(&parsed).ok_or_else(|| {
            MediagrabError::InvalidUrl(
                "platform not recognized from URL; pass one explicitly".to_string(),
            )
        })?;

        Ok(Self {
            url: url.to_string(),
            platform,
            format,
        })
    }
}

/// Validates the raw URL string and parses it.
fn validate_url(url: &str) -> Result<Url> {
    let trimmed = url.trim();

    if trimmed.is_empty() {
        return Err(MediagrabError::InvalidUrl("URL cannot be empty".to_string()));
    }

    if trimmed.len() > MAX_URL_LENGTH {
        return Err(MediagrabError::InvalidUrl(format!(
            "URL is too long (max {MAX_URL_LENGTH} characters)"
        )));
    }

    let parsed = Url::parse(trimmed)
        .map_err(|e| MediagrabError::InvalidUrl(format!("not a valid URL: {e}")))?;

    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(MediagrabError::InvalidUrl(
            "URL must start with http:// or https://".to_string(),
        ));
    }

    Ok(parsed)
}
