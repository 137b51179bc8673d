//! Pure parsers for the fetcher's unstructured text output.
//!
//! The fetcher communicates progress only as free-form text on its
//! standard streams. All the fragile pattern knowledge lives here, in
//! side-effect-free functions testable against captured output lines.
//! Output that matches no known pattern is noise, never a parse error.

use regex::Regex;
use std::sync::LazyLock;

/// Percentage values, possibly fractional: `42.5%`. A chunk may carry
/// several; only the last one is current.
static PERCENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d{1,3}(?:\.\d+)?)%").expect("valid regex"));

/// Transfer rate token: `at 1.2MiB/s`.
static SPEED_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)at\s+([\d.]+\s*[KMG]iB/s)").expect("valid regex"));

/// Estimated time remaining token: `ETA 00:10`.
static ETA_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)ETA\s+(\d{2}:\d{2})").expect("valid regex"));

/// A structured progress sample parsed from one output chunk.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressUpdate {
    /// Percentage complete, clamped into `[0, 100]`.
    pub percent: f64,
    /// Transfer rate as reported (e.g. `1.2MiB/s`), if present.
    pub speed: Option<String>,
    /// Estimated time remaining as reported (e.g. `00:10`), if present.
    pub eta: Option<String>,
}

/// Parses a progress sample out of a raw output chunk.
///
/// Returns the **last** percentage found in the chunk (the tool may emit
/// several updates per flush; only the most recent is meaningful), along
/// with rate and ETA tokens when present. Chunks without a percentage
/// pattern yield `None`.
#[must_use]
pub fn parse_progress(chunk: &str) -> Option<ProgressUpdate> {
    let last = PERCENT_RE.captures_iter(chunk).last()?;
    let percent: f64 = last[1].parse().ok()?;

    Some(ProgressUpdate {
        percent: percent.clamp(0.0, 100.0),
        speed: SPEED_RE.captures(chunk).map(|c| c[1].to_string()),
        eta: ETA_RE.captures(chunk).map(|c| c[1].to_string()),
    })
}

/// Classifies a fetcher failure into a human-readable message.
///
/// Known fatal patterns in stderr take precedence over the bare exit
/// code: rights-protected content and access-denied responses get
/// actionable messages, everything else reports the code.
#[must_use]
pub fn classify_failure(exit_code: Option<i32>, stderr: &str) -> String {
    let lower = stderr.to_lowercase();

    if lower.contains("drm") {
        return "This media appears to be DRM-protected and cannot be downloaded. \
                Try another source."
            .to_string();
    }

    if lower.contains("forbidden") || lower.contains("401") || lower.contains("403") {
        return "Access denied to the media (HTTP 401/403). \
                The resource may require authentication."
            .to_string();
    }

    match exit_code {
        Some(code) => format!("Process exited with code {code}"),
        None => "Process was terminated by a signal".to_string(),
    }
}
