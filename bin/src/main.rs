//! mediagrab CLI - media downloads driven by an external fetcher.

use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use std::path::PathBuf;

mod commands;

#[derive(Parser)]
#[command(name = "mediagrab")]
#[command(about = "Download media URLs via an external fetcher", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Quiet mode (suppress progress output)
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Download a media URL
    Download {
        /// The media URL
        url: String,

        /// Platform (inferred from the URL when omitted)
        #[arg(short, long)]
        platform: Option<String>,

        /// Requested format: mp4, mp4-<height>p, or mp3
        #[arg(short, long, default_value = "mp4")]
        format: String,

        /// Directory downloaded files land in
        #[arg(short, long, default_value = ".")]
        output_dir: PathBuf,

        /// Explicit fetcher binary (yt-dlp is found on PATH otherwise)
        #[arg(long)]
        fetcher: Option<PathBuf>,

        /// Explicit remuxer binary (ffmpeg is found on PATH otherwise)
        #[arg(long)]
        remuxer: Option<PathBuf>,
    },

    /// List supported platforms
    Platforms,

    /// Show recent download history
    History {
        /// Maximum number of entries to show
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();

    // Show help if no command provided
    let Some(command) = cli.command else {
        Cli::command().print_help()?;
        return Ok(());
    };

    match command {
        Commands::Download {
            url,
            platform,
            format,
            output_dir,
            fetcher,
            remuxer,
        } => {
            commands::download::download(
                &url,
                platform.as_deref(),
                &format,
                output_dir,
                fetcher,
                remuxer,
                cli.quiet,
            )
            .await
        }
        Commands::Platforms => commands::platforms::list_platforms(),
        Commands::History { limit } => commands::history::show_history(limit),
    }
}
