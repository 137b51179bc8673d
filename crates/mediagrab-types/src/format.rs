//! Requested media formats and container mappings.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::str::FromStr;

/// A media container recognized in fetcher output.
///
/// These are the extensions the job manager accepts when scanning the
/// work directory for a produced file after a zero exit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Container {
    /// MP4 video.
    Mp4,
    /// MP3 audio.
    Mp3,
    /// M4A audio.
    M4a,
    /// WebM video.
    Webm,
    /// Opus audio.
    Opus,
    /// AAC audio.
    Aac,
    /// Flash video.
    Flv,
    /// Matroska video.
    Mkv,
}

impl Container {
    /// Returns the file extension without the leading dot.
    #[must_use]
    pub const fn extension(&self) -> &'static str {
        match self {
            Self::Mp4 => "mp4",
            Self::Mp3 => "mp3",
            Self::M4a => "m4a",
            Self::Webm => "webm",
            Self::Opus => "opus",
            Self::Aac => "aac",
            Self::Flv => "flv",
            Self::Mkv => "mkv",
        }
    }

    /// Parses a container from a file extension (without the dot).
    #[must_use]
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "mp4" => Some(Self::Mp4),
            "mp3" => Some(Self::Mp3),
            "m4a" => Some(Self::M4a),
            "webm" => Some(Self::Webm),
            "opus" => Some(Self::Opus),
            "aac" => Some(Self::Aac),
            "flv" => Some(Self::Flv),
            "mkv" => Some(Self::Mkv),
            _ => None,
        }
    }

    /// Returns true for video containers.
    #[must_use]
    pub const fn is_video(&self) -> bool {
        matches!(self, Self::Mp4 | Self::Webm | Self::Flv | Self::Mkv)
    }

    /// Returns the container this one should be repackaged into when a
    /// widely-playable file was requested, or `None` if it already is one.
    ///
    /// Video containers convert to mp4, audio containers to mp3.
    #[must_use]
    pub const fn remux_target(&self) -> Option<Self> {
        match self {
            Self::Webm | Self::Mkv | Self::Flv => Some(Self::Mp4),
            Self::M4a | Self::Opus | Self::Aac => Some(Self::Mp3),
            Self::Mp4 | Self::Mp3 => None,
        }
    }

    /// Returns all containers accepted in fetcher output.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[
            Self::Mp4,
            Self::Mp3,
            Self::M4a,
            Self::Webm,
            Self::Opus,
            Self::Aac,
            Self::Flv,
            Self::Mkv,
        ]
    }
}

impl std::fmt::Display for Container {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.extension())
    }
}

/// The format a user requested for a download.
///
/// Parsed from identifiers like `mp4`, `mp4-720p`, or `mp3`. The format
/// determines both the fetcher's stream selection and the container the
/// finished file should end up in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaFormat {
    /// Video in an mp4 container, optionally capped at a pixel height.
    Video {
        /// Maximum video height in pixels (e.g. 720 for `mp4-720p`).
        max_height: Option<u32>,
    },
    /// Audio extracted to mp3.
    Audio,
}

impl MediaFormat {
    /// The container the finished file should end up in.
    #[must_use]
    pub const fn container(&self) -> Container {
        match self {
            Self::Video { .. } => Container::Mp4,
            Self::Audio => Container::Mp3,
        }
    }

    /// Returns true if this format extracts audio only.
    #[must_use]
    pub const fn is_audio(&self) -> bool {
        matches!(self, Self::Audio)
    }
}

impl Default for MediaFormat {
    fn default() -> Self {
        Self::Video { max_height: None }
    }
}

impl std::fmt::Display for MediaFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Video { max_height: Some(h) } => write!(f, "mp4-{h}p"),
            Self::Video { max_height: None } => write!(f, "mp4"),
            Self::Audio => write!(f, "mp3"),
        }
    }
}

impl FromStr for MediaFormat {
    type Err = FormatParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.to_lowercase();
        match lower.as_str() {
            "mp4" | "best" | "mp4-nowm" => return Ok(Self::Video { max_height: None }),
            "mp3" => return Ok(Self::Audio),
            _ => {}
        }

        // Height-capped video: "mp4-720p", "mp4-1080p", ...
        if let Some(rest) = lower.strip_prefix("mp4-") {
            let height = rest.strip_suffix('p').unwrap_or(rest);
            if let Ok(h) = height.parse::<u32>() {
                return Ok(Self::Video { max_height: Some(h) });
            }
        }

        Err(FormatParseError(s.to_string()))
    }
}

impl Serialize for MediaFormat {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for MediaFormat {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Error returned when parsing an unknown format identifier.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown format '{0}', expected mp4, mp4-<height>p, or mp3")]
pub struct FormatParseError(String);
