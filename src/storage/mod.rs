use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

pub mod s3;

use crate::BucketAudioError;

pub use s3::S3Gateway;

/// One entry of a prefix listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteObject {
    pub key: String,
    pub size_bytes: Option<u64>,
    pub last_modified: Option<DateTime<Utc>>,
}

impl RemoteObject {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            size_bytes: None,
            last_modified: None,
        }
    }
}

/// The three bucket operations the pipeline needs
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// List every object under `prefix`, in listing order, without directory markers
    async fn list_by_prefix(&self, prefix: &str) -> Result<Vec<RemoteObject>, BucketAudioError>;

    /// Fetch `key` into the local file `destination`
    async fn download(&self, key: &str, destination: &Path) -> Result<(), BucketAudioError>;

    /// Store the local file `source` under `key`, replacing any existing object
    async fn upload(&self, source: &Path, key: &str) -> Result<(), BucketAudioError>;
}
