use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::BucketAudioError;

/// Video suffixes picked up from the input prefix (matched case-insensitively)
pub const DEFAULT_VIDEO_EXTENSIONS: &[&str] = &["mp4", "mov", "mkv", "avi", "flv", "wmv"];

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Bucket and client settings
    pub aws: AwsConfig,

    /// Logical folders inside the bucket
    pub layout: LayoutConfig,

    /// External tool settings
    pub media: MediaConfig,

    /// Application settings
    pub app: AppConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AwsConfig {
    /// AWS region; the default provider chain decides when unset
    pub region: Option<String>,

    /// Bucket holding both the videos and the produced audio
    pub bucket: String,

    /// Custom endpoint for S3-compatible stores (MinIO, Spaces, ...)
    pub endpoint_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    /// Prefix polled for new videos
    pub video_prefix: String,

    /// Prefix receiving the primary audio copy
    pub audio_prefix: String,

    /// Prefix receiving the backup audio copy
    pub backup_prefix: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MediaConfig {
    pub ffmpeg_path: String,

    pub ffprobe_path: String,

    /// Extension of the produced audio files, without the dot
    pub audio_extension: String,

    /// Recognized video extensions, without the dot
    pub video_extensions: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Scratch directory for downloads and transcodes (system temp dir if unset)
    pub scratch_dir: Option<PathBuf>,

    /// Seconds to sleep between two scans
    pub scan_interval_secs: u64,

    /// Remove local files once both uploads were attempted
    pub cleanup_scratch: bool,
}

impl Default for AwsConfig {
    fn default() -> Self {
        Self {
            region: None,
            bucket: "admiral-vc-automation".to_string(),
            endpoint_url: None,
        }
    }
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            video_prefix: "01. Video/".to_string(),
            audio_prefix: "02. Audio/".to_string(),
            backup_prefix: "08.Audio Backup/".to_string(),
        }
    }
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: "ffmpeg".to_string(),
            ffprobe_path: "ffprobe".to_string(),
            audio_extension: "mp3".to_string(),
            video_extensions: DEFAULT_VIDEO_EXTENSIONS
                .iter()
                .map(|ext| ext.to_string())
                .collect(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            scratch_dir: None,
            scan_interval_secs: 60,
            cleanup_scratch: false,
        }
    }
}

impl Config {
    /// Load configuration from the first file found, or fall back to defaults
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load_from(path);
        }

        match Self::discover_path() {
            Some(path) => Self::load_from(&path),
            None => {
                tracing::debug!("No config file found, using built-in defaults");
                Ok(Self::default())
            }
        }
    }

    /// Load and validate configuration from a specific file
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs_err::read_to_string(path)
            .context("Failed to read config file")?;

        let config: Config = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;

        config.validate()?;
        tracing::debug!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs_err::create_dir_all(parent)?;
            }
        }

        let content = serde_yaml::to_string(self)
            .context("Failed to serialize config")?;

        fs_err::write(path, content)
            .context("Failed to write config file")?;

        Ok(())
    }

    /// Path used by `config --init` when no explicit path is given
    pub fn default_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Could not determine config directory")?;

        Ok(config_dir.join("bucket-audio").join("config.yaml"))
    }

    fn discover_path() -> Option<PathBuf> {
        // Current directory first for easy testing
        let local_config = PathBuf::from("config.yaml");
        if local_config.exists() {
            return Some(local_config);
        }

        Self::default_path().ok().filter(|path| path.exists())
    }

    /// Validate configuration
    pub fn validate(&self) -> std::result::Result<(), BucketAudioError> {
        if self.aws.bucket.trim().is_empty() {
            return Err(BucketAudioError::Config("S3 bucket must be configured".into()));
        }

        let prefixes = [
            ("video_prefix", &self.layout.video_prefix),
            ("audio_prefix", &self.layout.audio_prefix),
            ("backup_prefix", &self.layout.backup_prefix),
        ];
        for (name, prefix) in prefixes {
            if prefix.trim().is_empty() {
                return Err(BucketAudioError::Config(format!("{} must not be empty", name)));
            }
        }

        if self.app.scan_interval_secs == 0 {
            return Err(BucketAudioError::Config(
                "scan_interval_secs must be greater than zero".into(),
            ));
        }

        if self.media.video_extensions.is_empty() {
            return Err(BucketAudioError::Config(
                "at least one video extension is required".into(),
            ));
        }

        if self.media.audio_extension.trim_start_matches('.').is_empty() {
            return Err(BucketAudioError::Config("audio_extension must not be empty".into()));
        }

        Ok(())
    }

    /// Display current configuration
    pub fn display(&self) {
        println!("Current Configuration:");
        println!("  AWS Region: {}", self.aws.region.as_deref().unwrap_or("(provider chain)"));
        println!("  S3 Bucket: {}", self.aws.bucket);
        if let Some(endpoint) = &self.aws.endpoint_url {
            println!("  Endpoint: {}", endpoint);
        }
        println!("  Video Prefix: {}", self.layout.video_prefix);
        println!("  Audio Prefix: {}", self.layout.audio_prefix);
        println!("  Backup Prefix: {}", self.layout.backup_prefix);
        println!("  Video Extensions: {}", self.media.video_extensions.join(", "));
        println!("  Audio Extension: {}", self.media.audio_extension);
        println!("  Scratch Dir: {}", self.scratch_dir().display());
        println!("  Scan Interval: {}s", self.app.scan_interval_secs);
        println!("  Cleanup Scratch: {}", self.app.cleanup_scratch);
    }

    pub fn scratch_dir(&self) -> PathBuf {
        self.app
            .scratch_dir
            .clone()
            .unwrap_or_else(|| std::env::temp_dir().join("bucket-audio"))
    }

    pub fn scan_interval(&self) -> Duration {
        Duration::from_secs(self.app.scan_interval_secs)
    }
}
