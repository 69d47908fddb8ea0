use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "bucket-audio",
    about = "Bucket Audio - Watch an S3 prefix for new videos and publish their audio",
    version,
    long_about = "Polls an S3 bucket for newly uploaded videos, extracts the audio track with ffmpeg and uploads the result to a primary and a backup prefix. Runs until interrupted with Ctrl+C."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Configuration file (defaults to ./config.yaml, then the user config dir)
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub json_logs: bool,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Commands {
    /// Poll the bucket until interrupted (default)
    Watch {
        /// Seconds between scans (overrides the configured interval)
        #[arg(short, long, value_name = "SECS", env = "BUCKET_AUDIO_INTERVAL")]
        interval: Option<u64>,
    },

    /// Run a single scan and exit
    Once,

    /// Show the effective configuration
    Config {
        /// Write a default config file instead of showing the current one
        #[arg(long)]
        init: bool,
    },
}

impl Cli {
    /// Subcommand to run, `watch` with the configured interval when none was given
    pub fn command(&self) -> Commands {
        self.command
            .clone()
            .unwrap_or(Commands::Watch { interval: None })
    }
}
