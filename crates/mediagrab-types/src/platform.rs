//! Supported media platforms and URL-based detection.

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use url::Url;

/// A media platform the external fetcher knows how to pull from.
///
/// The platform drives format-selector construction: YouTube gets the
/// height-capped mp4 ladder, SoundCloud gets audio extraction, and the
/// short-video platforms get a single `best` stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    /// YouTube (youtube.com, youtu.be).
    Youtube,
    /// Instagram reels and posts.
    Instagram,
    /// Twitter/X video posts.
    Twitter,
    /// TikTok clips.
    Tiktok,
    /// Facebook video (facebook.com, fb.watch).
    Facebook,
    /// SoundCloud tracks (audio only).
    Soundcloud,
    /// Vimeo video.
    Vimeo,
    /// Twitch VODs and clips.
    Twitch,
    /// Reddit-hosted video.
    Reddit,
    /// Dailymotion video.
    Dailymotion,
}

impl Platform {
    /// Returns the platform as a string identifier.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Youtube => "youtube",
            Self::Instagram => "instagram",
            Self::Twitter => "twitter",
            Self::Tiktok => "tiktok",
            Self::Facebook => "facebook",
            Self::Soundcloud => "soundcloud",
            Self::Vimeo => "vimeo",
            Self::Twitch => "twitch",
            Self::Reddit => "reddit",
            Self::Dailymotion => "dailymotion",
        }
    }

    /// Returns true if the platform serves audio-only media.
    #[must_use]
    pub const fn is_audio_only(&self) -> bool {
        matches!(self, Self::Soundcloud)
    }

    /// Returns all supported platforms.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[
            Self::Youtube,
            Self::Instagram,
            Self::Twitter,
            Self::Tiktok,
            Self::Facebook,
            Self::Soundcloud,
            Self::Vimeo,
            Self::Twitch,
            Self::Reddit,
            Self::Dailymotion,
        ]
    }

    /// Detects the platform from a parsed URL's hostname.
    ///
    /// Returns `None` for hosts that don't match any known platform;
    /// unknown hosts are not an error at this level since the fetcher
    /// has extractors far beyond this list.
    #[must_use]
    pub fn detect(url: &Url) -> Option<Self> {
        let host = url.host_str()?.to_lowercase();

        if host.contains("youtube.com") || host.contains("youtu.be") {
            Some(Self::Youtube)
        } else if host.contains("instagram.com") {
            Some(Self::Instagram)
        } else if host.contains("twitter.com") || host.contains("x.com") {
            Some(Self::Twitter)
        } else if host.contains("tiktok.com") {
            Some(Self::Tiktok)
        } else if host.contains("facebook.com") || host.contains("fb.watch") {
            Some(Self::Facebook)
        } else if host.contains("soundcloud.com") {
            Some(Self::Soundcloud)
        } else if host.contains("vimeo.com") {
            Some(Self::Vimeo)
        } else if host.contains("twitch.tv") {
            Some(Self::Twitch)
        } else if host.contains("reddit.com") {
            Some(Self::Reddit)
        } else if host.contains("dailymotion.com") {
            Some(Self::Dailymotion)
        } else {
            None
        }
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Platform {
    type Err = PlatformParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "youtube" | "yt" => Ok(Self::Youtube),
            "instagram" | "ig" => Ok(Self::Instagram),
            "twitter" | "x" => Ok(Self::Twitter),
            "tiktok" => Ok(Self::Tiktok),
            "facebook" | "fb" => Ok(Self::Facebook),
            "soundcloud" => Ok(Self::Soundcloud),
            "vimeo" => Ok(Self::Vimeo),
            "twitch" => Ok(Self::Twitch),
            "reddit" => Ok(Self::Reddit),
            "dailymotion" => Ok(Self::Dailymotion),
            _ => Err(PlatformParseError(s.to_string())),
        }
    }
}

/// Error returned when parsing an unknown platform identifier.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown platform '{0}', expected one of: youtube, instagram, twitter, tiktok, facebook, soundcloud, vimeo, twitch, reddit, dailymotion")]
pub struct PlatformParseError(String);
