use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

pub mod ffmpeg;

use crate::BucketAudioError;

pub use ffmpeg::{FfmpegTranscoder, FfprobeProber};

/// Container format reported by the inspection tool
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContainerFormat {
    /// Format name as reported, e.g. `mov,mp4,m4a,3gp,3g2,mj2`
    Known(String),
    /// The file could not be identified as a media container
    Unknown,
}

impl ContainerFormat {
    pub fn is_known(&self) -> bool {
        matches!(self, ContainerFormat::Known(_))
    }
}

impl fmt::Display for ContainerFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContainerFormat::Known(name) => write!(f, "{}", name),
            ContainerFormat::Unknown => write!(f, "unknown"),
        }
    }
}

/// Identifies the container format of a local file
///
/// Probing never fails: anything that prevents identification is reported as
/// [`ContainerFormat::Unknown`].
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait FormatProber: Send + Sync {
    async fn probe(&self, path: &Path) -> ContainerFormat;
}

/// Extracts the audio track of a local video file
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Transcoder: Send + Sync {
    /// Produce the audio file for `video` and return its path
    ///
    /// Implementations return an existing output without redoing the work.
    async fn transcode(&self, video: &Path) -> Result<PathBuf, BucketAudioError>;
}

/// Deterministic audio path for a video: same location and stem, audio extension
pub fn audio_output_path(video: &Path, audio_extension: &str) -> PathBuf {
    video.with_extension(audio_extension.trim_start_matches('.'))
}
