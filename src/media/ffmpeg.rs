use async_trait::async_trait;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;

use super::{audio_output_path, ContainerFormat, FormatProber, Transcoder};
use crate::config::MediaConfig;
use crate::BucketAudioError;

/// Subset of `ffprobe -of json` output that is read
#[derive(Debug, Deserialize)]
struct ProbeOutput {
    format: Option<ProbeFormat>,
}

#[derive(Debug, Deserialize)]
struct ProbeFormat {
    format_name: Option<String>,
}

/// Parse the container format out of ffprobe's JSON summary
pub fn parse_probe_output(stdout: &[u8]) -> ContainerFormat {
    let parsed: ProbeOutput = match serde_json::from_slice(stdout) {
        Ok(parsed) => parsed,
        Err(e) => {
            tracing::debug!(error = %e, "Unparseable ffprobe output");
            return ContainerFormat::Unknown;
        }
    };

    parsed
        .format
        .and_then(|format| format.format_name)
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty())
        .map(ContainerFormat::Known)
        .unwrap_or(ContainerFormat::Unknown)
}

/// Container detection through ffprobe
pub struct FfprobeProber {
    binary: String,
}

impl FfprobeProber {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    pub fn from_config(config: &MediaConfig) -> Self {
        Self::new(config.ffprobe_path.clone())
    }
}

#[async_trait]
impl FormatProber for FfprobeProber {
    async fn probe(&self, path: &Path) -> ContainerFormat {
        let output = Command::new(&self.binary)
            .args([
                "-v", "error",
                "-show_entries", "format=format_name",
                "-of", "json",
            ])
            .arg(path)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await;

        let output = match output {
            Ok(output) => output,
            Err(e) => {
                tracing::warn!(binary = %self.binary, error = %e, "Failed to run ffprobe");
                return ContainerFormat::Unknown;
            }
        };

        if !output.status.success() {
            tracing::debug!(
                path = %path.display(),
                status = %output.status,
                stderr = %String::from_utf8_lossy(&output.stderr).trim(),
                "ffprobe rejected file"
            );
            return ContainerFormat::Unknown;
        }

        parse_probe_output(&output.stdout)
    }
}

/// Audio extraction through ffmpeg
pub struct FfmpegTranscoder {
    binary: String,
    audio_extension: String,
}

impl FfmpegTranscoder {
    pub fn new(binary: impl Into<String>, audio_extension: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
            audio_extension: audio_extension.into(),
        }
    }

    pub fn from_config(config: &MediaConfig) -> Self {
        Self::new(config.ffmpeg_path.clone(), config.audio_extension.clone())
    }

    pub fn output_path(&self, video: &Path) -> PathBuf {
        audio_output_path(video, &self.audio_extension)
    }
}

#[async_trait]
impl Transcoder for FfmpegTranscoder {
    async fn transcode(&self, video: &Path) -> Result<PathBuf, BucketAudioError> {
        let audio_path = self.output_path(video);

        if audio_path.exists() {
            tracing::info!(path = %audio_path.display(), "Audio already present, skipping ffmpeg");
            return Ok(audio_path);
        }

        tracing::debug!("Extracting audio from {}", video.display());

        // ffmpeg writes a sibling file that only takes the final name once it exits cleanly
        let partial_path = partial_output_path(&audio_path);

        // Best-quality VBR, first audio stream only
        let output = Command::new(&self.binary)
            .arg("-y")
            .arg("-i")
            .arg(video)
            .args(["-q:a", "0", "-map", "0:a:0"])
            .arg(&partial_path)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| {
                BucketAudioError::TranscodeFailed(format!("could not run {}: {}", self.binary, e))
            })?;

        if !output.status.success() {
            let _ = tokio::fs::remove_file(&partial_path).await;
            let error = String::from_utf8_lossy(&output.stderr);
            return Err(BucketAudioError::TranscodeFailed(error.trim().to_string()));
        }

        tokio::fs::rename(&partial_path, &audio_path).await.map_err(|e| {
            BucketAudioError::TranscodeFailed(format!(
                "could not move {} into place: {}",
                partial_path.display(),
                e
            ))
        })?;

        Ok(audio_path)
    }
}

/// In-progress name for an audio file (`clip1.mp3` -> `clip1.part.mp3`)
///
/// The audio extension stays last so ffmpeg still picks the muxer from it.
pub fn partial_output_path(audio_path: &Path) -> PathBuf {
    let stem = audio_path
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default();

    let name = match audio_path.extension() {
        Some(ext) => format!("{}.part.{}", stem, ext.to_string_lossy()),
        None => format!("{}.part", stem),
    };
    audio_path.with_file_name(name)
}
