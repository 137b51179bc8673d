//! Download history listing.

use anyhow::{Context, Result};
use mediagrab_lib::prelude::*;

/// Show recent downloads, newest first.
pub(crate) fn show_history(limit: usize) -> Result<()> {
    let store = JsonHistoryStore::with_default_path().context("Failed to open history store")?;
    let entries = store.list_recent(limit)?;

    if entries.is_empty() {
        println!("No downloads recorded yet.");
        return Ok(());
    }

    println!(
        "{:<17} {:<12} {:<10} {:>10}  {}",
        "DATE", "PLATFORM", "FORMAT", "SIZE", "TITLE"
    );
    println!("{}", "-".repeat(80));

    for entry in &entries {
        println!(
            "{:<17} {:<12} {:<10} {:>10}  {}",
            entry.recorded_at.format("%Y-%m-%d %H:%M"),
            entry.platform,
            entry.format,
            format_size(entry.file_size),
            entry.title,
        );
    }

    println!("\nTotal: {} downloads", entries.len());
    Ok(())
}

/// Human-readable byte count.
fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KiB", "MiB", "GiB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{:.1} {}", value, UNITS[unit])
    }
}
