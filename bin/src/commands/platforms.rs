//! Supported platform listing.

use anyhow::Result;
use mediagrab_lib::prelude::*;

/// List the platforms the fetcher arguments are tuned for.
pub(crate) fn list_platforms() -> Result<()> {
    println!("{:<15} {:<10}", "PLATFORM", "MEDIA");
    println!("{}", "-".repeat(25));

    for platform in Platform::all() {
        let media = if platform.is_audio_only() {
            "audio"
        } else {
            "video"
        };
        println!("{:<15} {:<10}", platform.as_str(), media);
    }

    println!("\nTotal: {} platforms", Platform::all().len());
    Ok(())
}
