//! Fetcher binary discovery.

use std::path::{Path, PathBuf};

/// Name of the media fetcher binary looked up on `PATH`.
pub const FETCHER_PROGRAM: &str = "yt-dlp";

/// Locates the fetcher binary.
///
/// An explicit override is returned verbatim without an existence check:
/// if it is wrong, the spawn fails and the job manager's retry/failure
/// path reports it. Without an override the binary is looked up on
/// `PATH`.
#[must_use]
pub fn locate_fetcher(override_path: Option<&Path>) -> Option<PathBuf> {
    match override_path {
        Some(path) => Some(path.to_path_buf()),
        None => which::which(FETCHER_PROGRAM).ok(),
    }
}
