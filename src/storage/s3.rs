use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use aws_sdk_s3::error::{DisplayErrorContext, SdkError};
use aws_sdk_s3::operation::get_object::GetObjectError;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use chrono::{DateTime, Utc};
use std::path::Path;
use std::time::Instant;
use tokio::io::AsyncWriteExt;

use super::{ObjectStore, RemoteObject};
use crate::config::AwsConfig;
use crate::BucketAudioError;

/// S3 implementation of [`ObjectStore`] bound to a single bucket
#[derive(Clone)]
pub struct S3Gateway {
    client: Client,
    bucket: String,
}

impl S3Gateway {
    /// Build a gateway from the ambient AWS configuration
    ///
    /// Credentials always come from the default provider chain. The region is pinned only
    /// when configured; a custom endpoint switches to path-style addressing, which
    /// MinIO and most other S3-compatible stores require.
    pub async fn connect(config: &AwsConfig) -> Self {
        let mut loader = aws_config::defaults(BehaviorVersion::latest());
        if let Some(region) = &config.region {
            loader = loader.region(Region::new(region.clone()));
        }
        let shared = loader.load().await;

        let client = match &config.endpoint_url {
            Some(endpoint) => {
                let s3_config = aws_sdk_s3::config::Builder::from(&shared)
                    .endpoint_url(endpoint)
                    .force_path_style(true)
                    .build();
                Client::from_conf(s3_config)
            }
            None => Client::new(&shared),
        };

        Self::with_client(client, config.bucket.clone())
    }

    pub fn with_client(client: Client, bucket: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
        }
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }
}

#[async_trait]
impl ObjectStore for S3Gateway {
    async fn list_by_prefix(&self, prefix: &str) -> Result<Vec<RemoteObject>, BucketAudioError> {
        let mut objects = Vec::new();
        let mut token: Option<String> = None;
        let mut pages = 0u32;

        loop {
            let response = self
                .client
                .list_objects_v2()
                .bucket(&self.bucket)
                .prefix(prefix)
                .set_continuation_token(token.take())
                .send()
                .await
                .map_err(|e| {
                    tracing::error!(
                        error = %DisplayErrorContext(&e),
                        bucket = %self.bucket,
                        prefix = %prefix,
                        "S3 listing failed"
                    );
                    BucketAudioError::Listing(DisplayErrorContext(&e).to_string())
                })?;
            pages += 1;

            for object in response.contents() {
                let Some(key) = object.key() else { continue };
                if key.ends_with('/') {
                    continue;
                }

                objects.push(RemoteObject {
                    key: key.to_string(),
                    size_bytes: object.size().and_then(|size| u64::try_from(size).ok()),
                    last_modified: object
                        .last_modified()
                        .and_then(|t| DateTime::<Utc>::from_timestamp(t.secs(), t.subsec_nanos())),
                });
            }

            match response.next_continuation_token() {
                Some(next) if response.is_truncated().unwrap_or(false) => {
                    token = Some(next.to_string());
                }
                _ => break,
            }
        }

        tracing::debug!(
            bucket = %self.bucket,
            prefix = %prefix,
            pages = pages,
            objects = objects.len(),
            "S3 listing complete"
        );

        Ok(objects)
    }

    async fn download(&self, key: &str, destination: &Path) -> Result<(), BucketAudioError> {
        let start = Instant::now();

        let response = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| match &e {
                SdkError::ServiceError(service_err)
                    if matches!(service_err.err(), GetObjectError::NoSuchKey(_)) =>
                {
                    BucketAudioError::NotFound(key.to_string())
                }
                _ => {
                    tracing::error!(
                        error = %DisplayErrorContext(&e),
                        bucket = %self.bucket,
                        key = %key,
                        duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                        "S3 download failed"
                    );
                    BucketAudioError::Transfer(DisplayErrorContext(&e).to_string())
                }
            })?;

        let written = match write_body(response.body, destination).await {
            Ok(written) => written,
            Err(e) => {
                // Never leave a truncated video behind for the next stage
                let _ = tokio::fs::remove_file(destination).await;
                return Err(BucketAudioError::Transfer(format!(
                    "failed to write {}: {}",
                    destination.display(),
                    e
                )));
            }
        };

        tracing::info!(
            bucket = %self.bucket,
            key = %key,
            size_bytes = written,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "S3 download successful"
        );

        Ok(())
    }

    async fn upload(&self, source: &Path, key: &str) -> Result<(), BucketAudioError> {
        let start = Instant::now();
        let size = tokio::fs::metadata(source).await.map(|m| m.len()).unwrap_or(0);

        let body = ByteStream::from_path(source).await.map_err(|e| {
            BucketAudioError::Transfer(format!("failed to read {}: {}", source.display(), e))
        })?;

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(body)
            .content_type(content_type_for(source))
            .send()
            .await
            .map_err(|e| {
                tracing::error!(
                    error = %DisplayErrorContext(&e),
                    bucket = %self.bucket,
                    key = %key,
                    size_bytes = size,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "S3 upload failed"
                );
                BucketAudioError::Transfer(DisplayErrorContext(&e).to_string())
            })?;

        tracing::info!(
            bucket = %self.bucket,
            key = %key,
            size_bytes = size,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "S3 upload successful"
        );

        Ok(())
    }
}

async fn write_body(body: ByteStream, destination: &Path) -> std::io::Result<u64> {
    let mut reader = body.into_async_read();
    let mut file = tokio::fs::File::create(destination).await?;
    let written = tokio::io::copy(&mut reader, &mut file).await?;
    file.flush().await?;
    Ok(written)
}

/// MIME type sent with uploaded audio
pub fn content_type_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_lowercase());

    match ext.as_deref() {
        Some("mp3") => "audio/mpeg",
        Some("m4a") | Some("mp4") => "audio/mp4",
        Some("aac") => "audio/aac",
        Some("wav") => "audio/wav",
        Some("flac") => "audio/flac",
        Some("ogg") | Some("opus") => "audio/ogg",
        Some("webm") => "audio/webm",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_type_for() {
        assert_eq!(content_type_for(Path::new("/tmp/clip1.mp3")), "audio/mpeg");
        assert_eq!(content_type_for(Path::new("/tmp/clip1.M4A")), "audio/mp4");
        assert_eq!(content_type_for(Path::new("/tmp/clip1.flac")), "audio/flac");
        assert_eq!(content_type_for(Path::new("/tmp/clip1")), "application/octet-stream");
    }

    #[tokio::test]
    async fn test_write_body_streams_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let destination = dir.path().join("clip1.mp4");

        let written =
            tokio_test::assert_ok!(write_body(ByteStream::from_static(b"fake video bytes"), &destination).await);

        assert_eq!(written, 16);
        assert_eq!(fs_err::read(&destination).unwrap(), b"fake video bytes");
    }

    mod replay {
        use super::*;
        use aws_sdk_s3::config::{Credentials, Region};
        use aws_smithy_runtime::client::http::test_util::{ReplayEvent, StaticReplayClient};
        use aws_smithy_types::body::SdkBody;

        fn event(uri: &str, status: u16, body: &'static str) -> ReplayEvent {
            ReplayEvent::new(
                http::Request::builder()
                    .uri(uri)
                    .body(SdkBody::empty())
                    .unwrap(),
                http::Response::builder()
                    .status(status)
                    .body(SdkBody::from(body))
                    .unwrap(),
            )
        }

        fn gateway(http_client: StaticReplayClient) -> S3Gateway {
            let config = aws_sdk_s3::Config::builder()
                .behavior_version(BehaviorVersion::latest())
                .region(Region::new("us-east-1"))
                .credentials_provider(Credentials::new("AKID", "SECRET", None, None, "test"))
                .http_client(http_client)
                .build();
            S3Gateway::with_client(Client::from_conf(config), "media-inbox")
        }

        const FIRST_PAGE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<ListBucketResult xmlns="http://s3.amazonaws.com/doc/2006-03-01/">
  <Name>media-inbox</Name>
  <Prefix>01. Video/</Prefix>
  <KeyCount>2</KeyCount>
  <MaxKeys>2</MaxKeys>
  <IsTruncated>true</IsTruncated>
  <NextContinuationToken>page-2</NextContinuationToken>
  <Contents>
    <Key>01. Video/</Key>
    <LastModified>2024-05-01T09:00:00.000Z</LastModified>
    <Size>0</Size>
  </Contents>
  <Contents>
    <Key>01. Video/clip1.mp4</Key>
    <LastModified>2024-05-01T10:00:00.000Z</LastModified>
    <Size>1024</Size>
  </Contents>
</ListBucketResult>"#;

        const SECOND_PAGE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<ListBucketResult xmlns="http://s3.amazonaws.com/doc/2006-03-01/">
  <Name>media-inbox</Name>
  <Prefix>01. Video/</Prefix>
  <KeyCount>2</KeyCount>
  <MaxKeys>2</MaxKeys>
  <IsTruncated>false</IsTruncated>
  <Contents>
    <Key>01. Video/clip2.mov</Key>
    <LastModified>2024-05-02T10:00:00.000Z</LastModified>
    <Size>2048</Size>
  </Contents>
  <Contents>
    <Key>01. Video/notes.txt</Key>
    <LastModified>2024-05-02T11:00:00.000Z</LastModified>
    <Size>12</Size>
  </Contents>
</ListBucketResult>"#;

        const NO_SUCH_KEY: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<Error>
  <Code>NoSuchKey</Code>
  <Message>The specified key does not exist.</Message>
  <Key>01. Video/gone.mp4</Key>
  <RequestId>4442587FB7D0A2F9</RequestId>
</Error>"#;

        const ACCESS_DENIED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<Error>
  <Code>AccessDenied</Code>
  <Message>Access Denied</Message>
  <RequestId>4442587FB7D0A2FA</RequestId>
</Error>"#;

        #[tokio::test]
        async fn test_listing_follows_continuation_tokens() {
            let http_client = StaticReplayClient::new(vec![
                event("https://media-inbox.s3.us-east-1.amazonaws.com/?list-type=2", 200, FIRST_PAGE),
                event("https://media-inbox.s3.us-east-1.amazonaws.com/?list-type=2", 200, SECOND_PAGE),
            ]);
            let store = gateway(http_client.clone());

            let objects = tokio_test::assert_ok!(store.list_by_prefix("01. Video/").await);

            let keys: Vec<&str> = objects.iter().map(|object| object.key.as_str()).collect();
            assert_eq!(
                keys,
                vec!["01. Video/clip1.mp4", "01. Video/clip2.mov", "01. Video/notes.txt"]
            );
            assert_eq!(objects[0].size_bytes, Some(1024));
            assert!(objects[0].last_modified.is_some());

            let requests: Vec<String> = http_client
                .actual_requests()
                .map(|request| request.uri().to_string())
                .collect();
            assert_eq!(requests.len(), 2);
            assert!(!requests[0].contains("continuation-token"));
            assert!(requests[1].contains("continuation-token=page-2"));
        }

        #[tokio::test]
        async fn test_missing_object_is_not_found() {
            let http_client = StaticReplayClient::new(vec![event(
                "https://media-inbox.s3.us-east-1.amazonaws.com/01.%20Video/gone.mp4",
                404,
                NO_SUCH_KEY,
            )]);
            let store = gateway(http_client);
            let dir = tempfile::tempdir().unwrap();
            let destination = dir.path().join("gone.mp4");

            let result = store.download("01. Video/gone.mp4", &destination).await;

            assert_eq!(
                result,
                Err(BucketAudioError::NotFound("01. Video/gone.mp4".to_string()))
            );
            assert!(!destination.exists());
        }

        #[tokio::test]
        async fn test_other_download_errors_are_transfer_failures() {
            let http_client = StaticReplayClient::new(vec![event(
                "https://media-inbox.s3.us-east-1.amazonaws.com/01.%20Video/clip1.mp4",
                403,
                ACCESS_DENIED,
            )]);
            let store = gateway(http_client);
            let dir = tempfile::tempdir().unwrap();

            let result = store
                .download("01. Video/clip1.mp4", &dir.path().join("clip1.mp4"))
                .await;

            assert!(matches!(result, Err(BucketAudioError::Transfer(_))));
        }
    }
}

