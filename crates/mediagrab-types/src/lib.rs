//! Core types for the mediagrab media download service.
//!
//! This crate provides the fundamental data structures used throughout mediagrab:
//!
//! - [`Platform`] - A supported media platform, detectable from a URL
//! - [`MediaFormat`] - The format a user requested (e.g. `mp4-720p`, `mp3`)
//! - [`Container`] - A media container recognized in fetcher output
//! - [`DownloadRequest`] - A validated request entering the job manager

#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/mediagrab/mediagrab/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod error;
mod format;
mod platform;
mod request;

pub use error::{MediagrabError, Result};
pub use format::{Container, FormatParseError, MediaFormat};
pub use platform::{Platform, PlatformParseError};
pub use request::{DownloadRequest, MAX_URL_LENGTH};
