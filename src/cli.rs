use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::time::Duration;

use cf_core::{Height, OutputKind};

#[derive(Parser)]
#[command(name = "clipforge")]
#[command(author, version, about = "Fetch remote media and convert it into size-limited clips, loops and audio")]
pub struct Cli {
    /// Path to config file (JSON)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Fetch a URL and convert it
    Run {
        /// Source URL
        #[arg(required = true)]
        url: String,

        /// Output format: mp4, gif or mp3
        #[arg(short, long, default_value = "mp4", value_parser = parse_kind)]
        format: OutputKind,

        /// Clip start (seconds or [HH:]MM:SS[.ms])
        #[arg(long, value_parser = parse_timestamp)]
        start: Option<Duration>,

        /// Clip end (seconds or [HH:]MM:SS[.ms])
        #[arg(long, value_parser = parse_timestamp)]
        end: Option<Duration>,

        /// Output width in pixels
        #[arg(long)]
        width: Option<u32>,

        /// Output height in pixels, or "auto"
        #[arg(long, value_parser = parse_height)]
        height: Option<Height>,

        /// Output frame rate
        #[arg(long)]
        framerate: Option<u32>,

        /// Base name for the output file (generated if omitted)
        #[arg(short, long)]
        name: Option<String>,

        /// How to retrieve the source
        #[arg(long, value_enum, default_value_t = FetcherChoice::Auto)]
        fetcher: FetcherChoice,
    },

    /// Probe a local media file
    Probe {
        /// File to probe
        #[arg(required = true)]
        file: PathBuf,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Check that required external tools are available
    CheckTools,

    /// Remove leftover artifacts from the working directory
    Clean,

    /// Validate configuration file
    Validate {
        /// Config file to validate (uses default if not specified)
        config: Option<PathBuf>,
    },

    /// Display version information
    Version,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum FetcherChoice {
    /// Direct download for URLs ending in a media extension, yt-dlp otherwise
    Auto,
    /// Site extraction through yt-dlp
    Ytdlp,
    /// Plain HTTP download
    Http,
}

fn parse_kind(s: &str) -> Result<OutputKind, String> {
    s.parse()
}

/// Accepts `90`, `90.5`, `1:30` and `00:01:30.250`.
pub fn parse_timestamp(s: &str) -> Result<Duration, String> {
    let invalid = || format!("invalid timestamp '{s}' (expected seconds or [HH:]MM:SS)");
    let parts: Vec<&str> = s.trim().split(':').collect();
    if parts.len() > 3 || parts.iter().any(|p| p.is_empty()) {
        return Err(invalid());
    }

    let (seconds, whole) = parts.split_last().ok_or_else(invalid)?;
    let mut total: f64 = seconds.parse().map_err(|_| invalid())?;
    if !total.is_finite() || total < 0.0 || (!whole.is_empty() && total >= 60.0) {
        return Err(invalid());
    }

    let mut multiplier = 60.0;
    for part in whole.iter().rev() {
        let value: u32 = part.parse().map_err(|_| invalid())?;
        total += f64::from(value) * multiplier;
        multiplier *= 60.0;
    }
    Ok(Duration::from_secs_f64(total))
}

/// Accepts a pixel count, or `auto` / `-1` for aspect-preserving.
pub fn parse_height(s: &str) -> Result<Height, String> {
    match s.trim().to_ascii_lowercase().as_str() {
        "auto" | "-1" => Ok(Height::Auto),
        other => other
            .parse::<u32>()
            .ok()
            .filter(|px| *px > 0)
            .map(Height::Pixels)
            .ok_or_else(|| format!("invalid height '{s}' (expected pixels or 'auto')")),
    }
}
