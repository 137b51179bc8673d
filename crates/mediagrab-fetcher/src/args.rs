//! Fetcher argument construction.
//!
//! The mapping from `(platform, requested format)` to a fetcher argument
//! vector is pure: the same request always produces the same arguments,
//! which keeps the fragile flag knowledge independently testable.

use mediagrab_types::{DownloadRequest, MediaFormat, Platform};
use std::path::Path;

/// Browser user agent sent by the fetcher; some extractors refuse the
/// tool's default agent.
const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Flags appended for the single permissive retry after a spawn failure.
pub const RELAXED_FLAGS: &[&str] = &["--no-check-certificate", "--force-generic-extractor"];

/// Builds the fetcher argument vector for a request.
///
/// `output_template` is the fetcher's output path template (may contain
/// `%(title)s.%(ext)s` placeholders). `remuxer_location` is passed as
/// `--ffmpeg-location` when the remuxer lives outside `PATH`, so the
/// fetcher's own merge/recode steps can find it.
#[must_use]
pub fn fetcher_args(
    request: &DownloadRequest,
    output_template: &Path,
    remuxer_location: Option<&Path>,
) -> Vec<String> {
    let mut args = vec![
        request.url.clone(),
        "-o".to_string(),
        output_template.to_string_lossy().into_owned(),
        "--no-playlist".to_string(),
        "--no-warnings".to_string(),
        "--newline".to_string(),
        "--user-agent".to_string(),
        USER_AGENT.to_string(),
    ];

    if request.format.is_audio() || request.platform.is_audio_only() {
        args.push("-f".to_string());
        args.push("bestaudio/best".to_string());
        args.push("-x".to_string());
        args.push("--audio-format".to_string());
        args.push("mp3".to_string());
        // Explicit mp3 requests ask for the best VBR quality; an
        // audio-only platform serving a video-format request just
        // extracts with the tool's defaults.
        if request.format.is_audio() {
            args.push("--audio-quality".to_string());
            args.push("0".to_string());
        }
    } else {
        args.push("-f".to_string());
        args.push(video_selector(request.platform, request.format));

        if request.platform == Platform::Youtube {
            args.push("--merge-output-format".to_string());
            args.push("mp4".to_string());
        }

        // Recode covers the cases where no merge happened or a single
        // WebM file was downloaded; the fetcher skips it when the file
        // is already mp4.
        args.push("--recode-video".to_string());
        args.push("mp4".to_string());
    }

    if let Some(location) = remuxer_location {
        args.push("--ffmpeg-location".to_string());
        args.push(location.to_string_lossy().into_owned());
    }

    args
}

/// Builds the permissive argument vector used for the single spawn retry.
#[must_use]
pub fn relaxed_fetcher_args(
    request: &DownloadRequest,
    output_template: &Path,
    remuxer_location: Option<&Path>,
) -> Vec<String> {
    let mut args = fetcher_args(request, output_template, remuxer_location);
    args.extend(RELAXED_FLAGS.iter().map(|f| (*f).to_string()));
    args
}

/// Builds the stream selector for a video request.
///
/// YouTube gets the full preference ladder: mp4 video + m4a audio
/// (merge), any video + any audio (merge + recode), best single mp4,
/// best single file (recode). Other platforms serve pre-muxed files, so
/// a plain `best` plus the recode flag is enough.
fn video_selector(platform: Platform, format: MediaFormat) -> String {
    if platform != Platform::Youtube {
        return "best".to_string();
    }

    match format {
        MediaFormat::Video {
            max_height: Some(h),
        } => format!(
            "bestvideo[height<={h}][ext=mp4]+bestaudio[ext=m4a]/bestvideo[height<={h}]+bestaudio/best[height<={h}][ext=mp4]/best[height<={h}]"
        ),
        MediaFormat::Video { max_height: None } => {
            "bestvideo[ext=mp4]+bestaudio[ext=m4a]/best[ext=mp4]/best".to_string()
        }
        MediaFormat::Audio => "bestaudio/best".to_string(),
    }
}
