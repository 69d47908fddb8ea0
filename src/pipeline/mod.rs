use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Instant;

pub mod watcher;

use crate::config::Config;
use crate::media::{FormatProber, Transcoder};
use crate::storage::ObjectStore;
use crate::tracker::DedupTracker;
use crate::utils;

/// Bucket layout and local settings the pipeline runs with
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineSettings {
    pub video_prefix: String,
    pub audio_prefix: String,
    pub backup_prefix: String,
    pub video_extensions: Vec<String>,
    pub scratch_dir: PathBuf,
    pub cleanup_scratch: bool,
}

impl PipelineSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            video_prefix: config.layout.video_prefix.clone(),
            audio_prefix: config.layout.audio_prefix.clone(),
            backup_prefix: config.layout.backup_prefix.clone(),
            video_extensions: config.media.video_extensions.clone(),
            scratch_dir: config.scratch_dir(),
            cleanup_scratch: config.app.cleanup_scratch,
        }
    }
}

/// Result of one upload attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum UploadStatus {
    Uploaded { key: String },
    Failed { key: String, reason: String },
}

impl UploadStatus {
    pub fn is_uploaded(&self) -> bool {
        matches!(self, UploadStatus::Uploaded { .. })
    }
}

/// Terminal state reached by one video key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum KeyOutcome {
    /// The object could not be fetched
    DownloadFailed { reason: String },
    /// The download is not a recognizable media container
    InvalidFormat,
    /// ffmpeg could not produce the audio file
    ConversionFailed { reason: String },
    /// Audio produced; both uploads were attempted
    Delivered {
        audio_path: PathBuf,
        primary: UploadStatus,
        backup: UploadStatus,
    },
}

impl KeyOutcome {
    /// Audio produced and stored under both prefixes
    pub fn is_success(&self) -> bool {
        match self {
            KeyOutcome::Delivered { primary, backup, .. } => {
                primary.is_uploaded() && backup.is_uploaded()
            }
            _ => false,
        }
    }
}

/// What one scan of the video prefix found and did
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanReport {
    pub started_at: DateTime<Utc>,
    /// Objects returned by the listing
    pub listed: usize,
    /// Listed objects without a video extension
    pub ignored: usize,
    /// Video keys already seen by this process
    pub already_seen: usize,
    pub listing_error: Option<String>,
    /// Outcome of every new key, in listing order
    pub outcomes: Vec<(String, KeyOutcome)>,
}

impl ScanReport {
    fn started() -> Self {
        Self {
            started_at: Utc::now(),
            listed: 0,
            ignored: 0,
            already_seen: 0,
            listing_error: None,
            outcomes: Vec::new(),
        }
    }

    pub fn delivered(&self) -> usize {
        self.outcomes.iter().filter(|(_, o)| o.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.delivered()
    }
}

/// Sequential download → probe → transcode → upload pipeline
pub struct Pipeline {
    store: Box<dyn ObjectStore>,
    prober: Box<dyn FormatProber>,
    transcoder: Box<dyn Transcoder>,
    tracker: DedupTracker,
    settings: PipelineSettings,
}

impl Pipeline {
    pub fn new(
        store: Box<dyn ObjectStore>,
        prober: Box<dyn FormatProber>,
        transcoder: Box<dyn Transcoder>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            store,
            prober,
            transcoder,
            tracker: DedupTracker::new(),
            settings,
        }
    }

    /// Replace the dedup tracker, e.g. to pre-seed keys
    pub fn with_tracker(mut self, tracker: DedupTracker) -> Self {
        self.tracker = tracker;
        self
    }

    pub fn tracker(&self) -> &DedupTracker {
        &self.tracker
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    /// List the video prefix and process every new video key in listing order
    ///
    /// Never fails: a listing error is recorded in the report and the scan ends early.
    pub async fn scan_once(&mut self) -> ScanReport {
        let mut report = ScanReport::started();

        let listing = match self.store.list_by_prefix(&self.settings.video_prefix).await {
            Ok(listing) => listing,
            Err(e) => {
                tracing::error!(
                    prefix = %self.settings.video_prefix,
                    error = %e,
                    "Listing failed, waiting for the next scan"
                );
                report.listing_error = Some(e.to_string());
                return report;
            }
        };
        report.listed = listing.len();

        let videos: Vec<String> = listing
            .into_iter()
            .map(|object| object.key)
            .filter(|key| utils::has_video_extension(key, &self.settings.video_extensions))
            .collect();
        report.ignored = report.listed - videos.len();

        let candidates = videos.len();
        let fresh = self.tracker.filter_new(videos);
        report.already_seen = candidates - fresh.len();

        for key in fresh {
            tracing::info!(key = %key, "Found new video");
            let outcome = self.process_key(&key).await;
            report.outcomes.push((key, outcome));
        }

        report
    }

    /// Run one key through every stage, stopping at the first terminal failure
    pub async fn process_key(&self, key: &str) -> KeyOutcome {
        let start = Instant::now();
        let video_path = utils::scratch_path(&self.settings.scratch_dir, key);

        if let Err(e) = self.store.download(key, &video_path).await {
            tracing::error!(key = %key, error = %e, "Download failed, skipping");
            return KeyOutcome::DownloadFailed {
                reason: e.to_string(),
            };
        }
        tracing::info!(key = %key, path = %video_path.display(), "Downloaded");

        let format = self.prober.probe(&video_path).await;
        if !format.is_known() {
            tracing::warn!(key = %key, "Unrecognized container format, skipping");
            return KeyOutcome::InvalidFormat;
        }
        tracing::debug!(key = %key, format = %format, "Container format validated");

        let audio_path = match self.transcoder.transcode(&video_path).await {
            Ok(path) => path,
            Err(e) => {
                tracing::error!(key = %key, error = %e, "Conversion failed, skipping");
                return KeyOutcome::ConversionFailed {
                    reason: e.to_string(),
                };
            }
        };
        let audio_size = tokio::fs::metadata(&audio_path)
            .await
            .map(|m| utils::format_file_size(m.len()))
            .unwrap_or_else(|_| "unknown size".to_string());
        tracing::info!(key = %key, audio = %audio_path.display(), size = %audio_size, "Converted");

        let file_name = audio_path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| utils::key_file_name(key).to_string());

        // Both copies are attempted even if the first one fails
        let primary = self
            .upload(&audio_path, &self.settings.audio_prefix, &file_name)
            .await;
        let backup = self
            .upload(&audio_path, &self.settings.backup_prefix, &file_name)
            .await;

        if self.settings.cleanup_scratch {
            remove_scratch_file(&video_path).await;
            remove_scratch_file(&audio_path).await;
        }

        tracing::info!(
            key = %key,
            primary = primary.is_uploaded(),
            backup = backup.is_uploaded(),
            elapsed = %utils::format_duration(start.elapsed().as_secs_f64()),
            "Done processing"
        );

        KeyOutcome::Delivered {
            audio_path,
            primary,
            backup,
        }
    }

    async fn upload(&self, audio_path: &Path, prefix: &str, file_name: &str) -> UploadStatus {
        let key = utils::object_key(prefix, file_name);
        match self.store.upload(audio_path, &key).await {
            Ok(()) => {
                tracing::info!(key = %key, "Uploaded audio");
                UploadStatus::Uploaded { key }
            }
            Err(e) => {
                tracing::error!(key = %key, error = %e, "Audio upload failed");
                UploadStatus::Failed {
                    key,
                    reason: e.to_string(),
                }
            }
        }
    }
}

async fn remove_scratch_file(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            tracing::warn!(path = %path.display(), error = %e, "Could not remove scratch file");
        }
    }
}
