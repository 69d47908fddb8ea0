//! Bucket Audio - watches an S3 prefix for newly uploaded videos and publishes their audio
//!
//! Each scan lists the video prefix, skips anything already seen by this process, and runs
//! every new video through download, container probing, ffmpeg audio extraction and two
//! uploads (primary archive and backup archive). A failing video never stops the loop.

pub mod cli;
pub mod config;
pub mod media;
pub mod pipeline;
pub mod storage;
pub mod tracker;
pub mod utils;

pub use cli::{Cli, Commands};
pub use config::Config;
pub use media::{ContainerFormat, FormatProber, Transcoder};
pub use pipeline::watcher::{WatchSummary, Watcher};
pub use pipeline::{KeyOutcome, Pipeline, PipelineSettings, ScanReport};
pub use storage::{ObjectStore, RemoteObject};
pub use tracker::DedupTracker;

/// Result type used throughout the application layer
pub type Result<T> = anyhow::Result<T>;

/// Error types raised by the pipeline collaborators
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum BucketAudioError {
    #[error("Object not found: {0}")]
    NotFound(String),

    #[error("Transfer failed: {0}")]
    Transfer(String),

    #[error("Listing failed: {0}")]
    Listing(String),

    #[error("Transcoding failed: {0}")]
    TranscodeFailed(String),

    #[error("Configuration error: {0}")]
    Config(String),
}
