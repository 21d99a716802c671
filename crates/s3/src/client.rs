//! S3 client implementation
//!
//! Wraps aws-sdk-s3 and implements the ObjectStore trait from bsync-core.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use aws_sdk_s3::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_s3::types::{BucketVersioningStatus, CompletedMultipartUpload, CompletedPart};
use aws_smithy_types::DateTime;
use aws_smithy_types::byte_stream::{ByteStream, Length};

use bsync_core::{
    Error, ListPage, ListedObject, ObjectBody, ObjectStore, Profile, Result, VersionMarker,
    VersioningMode,
};

use crate::multipart::{MultipartConfig, calculate_parts, part_byte_range};

/// S3 client wrapper
pub struct S3Client {
    inner: aws_sdk_s3::Client,
    multipart: MultipartConfig,
}

impl S3Client {
    /// Create a new S3 client from a profile
    ///
    /// The profile's retry and timeout settings configure the SDK; bsync
    /// itself never retries a request.
    pub async fn new(profile: Profile) -> Result<Self> {
        profile.validate()?;

        let credentials = aws_credential_types::Credentials::new(
            profile.access_key.clone(),
            profile.secret_key.clone(),
            None, // session token
            None, // expiry
            "bsync-static-credentials",
        );

        let retry = profile.retry_config();
        let retry_config = aws_config::retry::RetryConfig::standard()
            .with_max_attempts(retry.max_attempts.max(1))
            .with_initial_backoff(Duration::from_millis(retry.initial_backoff_ms))
            .with_max_backoff(Duration::from_millis(retry.max_backoff_ms));

        let timeout = profile.timeout_config();
        let timeout_config = aws_config::timeout::TimeoutConfig::builder()
            .connect_timeout(Duration::from_millis(timeout.connect_ms))
            .read_timeout(Duration::from_millis(timeout.read_ms))
            .build();

        let config = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .credentials_provider(credentials)
            .region(aws_config::Region::new(profile.region.clone()))
            .endpoint_url(&profile.endpoint)
            .retry_config(retry_config)
            .timeout_config(timeout_config)
            .load()
            .await;

        // Path-style addressing unless virtual-hosted buckets were asked for
        let s3_config = aws_sdk_s3::config::Builder::from(&config)
            .force_path_style(profile.bucket_lookup != "dns")
            .build();

        tracing::debug!(
            profile = %profile.name,
            endpoint = %profile.endpoint,
            region = %profile.region,
            "Created S3 client"
        );

        Ok(Self {
            inner: aws_sdk_s3::Client::from_conf(s3_config),
            multipart: MultipartConfig::new(),
        })
    }

    async fn put_single(
        &self,
        bucket: &str,
        key: &str,
        source: &Path,
        content_type: &str,
    ) -> Result<()> {
        let body = ByteStream::from_path(source)
            .await
            .map_err(|e| Error::Io(std::io::Error::other(e)))?;

        self.inner
            .put_object()
            .bucket(bucket)
            .key(key)
            .content_type(content_type)
            .body(body)
            .send()
            .await
            .map_err(|e| map_sdk_error(e, key))?;

        Ok(())
    }

    async fn put_multipart(
        &self,
        bucket: &str,
        key: &str,
        source: &Path,
        size: u64,
        content_type: &str,
        progress: &(dyn Fn(u64) + Send + Sync),
    ) -> Result<()> {
        let created = self
            .inner
            .create_multipart_upload()
            .bucket(bucket)
            .key(key)
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| map_sdk_error(e, key))?;
        let upload_id = created
            .upload_id()
            .ok_or_else(|| Error::Network(format!("No upload id returned for {key}")))?
            .to_string();

        let result = self
            .upload_parts(bucket, key, &upload_id, source, size, progress)
            .await;

        if result.is_err() {
            if let Err(e) = self
                .inner
                .abort_multipart_upload()
                .bucket(bucket)
                .key(key)
                .upload_id(&upload_id)
                .send()
                .await
            {
                tracing::warn!(
                    key,
                    upload_id = %upload_id,
                    error = %DisplayErrorContext(&e),
                    "Failed to abort multipart upload"
                );
            }
        }

        result
    }

    async fn upload_parts(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        source: &Path,
        size: u64,
        progress: &(dyn Fn(u64) + Send + Sync),
    ) -> Result<()> {
        let part_size = self.multipart.calculate_part_size(size);
        let parts = calculate_parts(size, part_size);
        tracing::debug!(key, size, part_size, parts, "Starting multipart upload");

        let mut completed = Vec::with_capacity(parts);
        for part_number in 1..=parts as i32 {
            let (start, end) = part_byte_range(part_number, part_size, size);
            let body = ByteStream::read_from()
                .path(source)
                .offset(start)
                .length(Length::Exact(end - start))
                .build()
                .await
                .map_err(|e| Error::Io(std::io::Error::other(e)))?;

            let output = self
                .inner
                .upload_part()
                .bucket(bucket)
                .key(key)
                .upload_id(upload_id)
                .part_number(part_number)
                .body(body)
                .send()
                .await
                .map_err(|e| map_sdk_error(e, key))?;

            completed.push(
                CompletedPart::builder()
                    .set_e_tag(output.e_tag().map(str::to_string))
                    .part_number(part_number)
                    .build(),
            );
            progress(end);
        }

        self.inner
            .complete_multipart_upload()
            .bucket(bucket)
            .key(key)
            .upload_id(upload_id)
            .multipart_upload(
                CompletedMultipartUpload::builder()
                    .set_parts(Some(completed))
                    .build(),
            )
            .send()
            .await
            .map_err(|e| map_sdk_error(e, key))?;

        Ok(())
    }
}

#[async_trait]
impl ObjectStore for S3Client {
    async fn get_versioning(&self, bucket: &str) -> Result<VersioningMode> {
        let output = self
            .inner
            .get_bucket_versioning()
            .bucket(bucket)
            .send()
            .await
            .map_err(|e| map_sdk_error(e, bucket))?;

        // A bucket that never had versioning configured reports no status
        let mode = match output.status() {
            Some(BucketVersioningStatus::Enabled) => VersioningMode::Enabled,
            Some(BucketVersioningStatus::Suspended) => VersioningMode::Suspended,
            None => VersioningMode::Disabled,
            Some(other) => {
                tracing::debug!(status = other.as_str(), "Unrecognized versioning status");
                VersioningMode::Unknown
            }
        };
        Ok(mode)
    }

    async fn list_objects(
        &self,
        bucket: &str,
        prefix: &str,
        continuation: Option<String>,
    ) -> Result<ListPage<String>> {
        let output = self
            .inner
            .list_objects_v2()
            .bucket(bucket)
            .prefix(prefix)
            .set_continuation_token(continuation)
            .send()
            .await
            .map_err(|e| map_sdk_error(e, bucket))?;

        let entries = output
            .contents()
            .iter()
            .map(|object| ListedObject {
                key: object.key().map(str::to_string),
                version_id: None,
                last_modified: object.last_modified().and_then(to_timestamp),
                size_bytes: object.size(),
            })
            .collect();

        let next = next_marker(
            output.is_truncated(),
            output.next_continuation_token().map(str::to_string),
            prefix,
        )?;

        Ok(ListPage { entries, next })
    }

    async fn list_object_versions(
        &self,
        bucket: &str,
        prefix: &str,
        marker: Option<VersionMarker>,
    ) -> Result<ListPage<VersionMarker>> {
        let (key_marker, version_id_marker) = match marker {
            Some(m) => (Some(m.key_marker), m.version_id_marker),
            None => (None, None),
        };

        let output = self
            .inner
            .list_object_versions()
            .bucket(bucket)
            .prefix(prefix)
            .set_key_marker(key_marker)
            .set_version_id_marker(version_id_marker)
            .send()
            .await
            .map_err(|e| map_sdk_error(e, bucket))?;

        // Delete markers have no content to download
        if !output.delete_markers().is_empty() {
            tracing::debug!(
                prefix,
                count = output.delete_markers().len(),
                "Ignoring delete markers"
            );
        }

        let entries = output
            .versions()
            .iter()
            .map(|version| ListedObject {
                key: version.key().map(str::to_string),
                version_id: version.version_id().map(str::to_string),
                last_modified: version.last_modified().and_then(to_timestamp),
                size_bytes: version.size(),
            })
            .collect();

        let next = next_marker(
            output.is_truncated(),
            output.next_key_marker().map(|key| VersionMarker {
                key_marker: key.to_string(),
                version_id_marker: output.next_version_id_marker().map(str::to_string),
            }),
            prefix,
        )?;

        Ok(ListPage { entries, next })
    }

    async fn get_object(
        &self,
        bucket: &str,
        key: &str,
        version_id: Option<&str>,
    ) -> Result<Option<ObjectBody>> {
        if key.ends_with('/') {
            return Ok(None);
        }

        let output = self
            .inner
            .get_object()
            .bucket(bucket)
            .key(key)
            .set_version_id(version_id.map(str::to_string))
            .send()
            .await
            .map_err(|e| map_sdk_error(e, &describe_version(key, version_id)))?;

        let content_length = output
            .content_length()
            .and_then(|len| u64::try_from(len).ok());
        let reader = output.body.into_async_read();

        Ok(Some(ObjectBody::new(reader, content_length)))
    }

    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        source: &Path,
        size: u64,
        progress: &(dyn Fn(u64) + Send + Sync),
    ) -> Result<()> {
        let content_type = mime_guess::from_path(key)
            .first_or_octet_stream()
            .to_string();

        if self.multipart.use_multipart(size) {
            self.put_multipart(bucket, key, source, size, &content_type, progress)
                .await
        } else {
            self.put_single(bucket, key, source, &content_type).await?;
            progress(size);
            Ok(())
        }
    }

    async fn copy_object_version(&self, bucket: &str, key: &str, version_id: &str) -> Result<()> {
        let source = copy_source(bucket, key, version_id);

        self.inner
            .copy_object()
            .copy_source(source)
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| map_sdk_error(e, &describe_version(key, Some(version_id))))?;

        Ok(())
    }
}

/// Convert an SDK failure into the core error kinds
fn map_sdk_error<E, R>(err: SdkError<E, R>, target: &str) -> Error
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
    R: std::fmt::Debug,
{
    let code = err.code().map(str::to_string);
    classify_error(code.as_deref(), target, DisplayErrorContext(&err).to_string())
}

fn classify_error(code: Option<&str>, target: &str, message: String) -> Error {
    match code {
        Some("NoSuchKey" | "NoSuchVersion" | "NoSuchBucket" | "NotFound") => {
            Error::NotFound(target.to_string())
        }
        Some(
            "AccessDenied" | "InvalidAccessKeyId" | "SignatureDoesNotMatch" | "ExpiredToken"
            | "InvalidToken",
        ) => Error::Auth(message),
        _ => Error::Network(message),
    }
}

/// Next page marker, refusing to stop early on a truncated page
fn next_marker<M>(truncated: Option<bool>, marker: Option<M>, prefix: &str) -> Result<Option<M>> {
    if !truncated.unwrap_or(false) {
        return Ok(None);
    }
    marker.map(Some).ok_or_else(|| {
        Error::Network(format!(
            "Listing of '{prefix}' was truncated without a continuation marker"
        ))
    })
}

fn to_timestamp(time: &DateTime) -> Option<jiff::Timestamp> {
    jiff::Timestamp::from_second(time.secs()).ok()
}

fn describe_version(key: &str, version_id: Option<&str>) -> String {
    match version_id {
        Some(id) => format!("{key} (version {id})"),
        None => key.to_string(),
    }
}

/// `x-amz-copy-source` value naming one version of `key`
///
/// Each key segment is percent-encoded; the separators stay literal.
fn copy_source(bucket: &str, key: &str, version_id: &str) -> String {
    let key = key
        .split('/')
        .map(urlencoding::encode)
        .collect::<Vec<_>>()
        .join("/");
    format!("{bucket}/{key}?versionId={}", urlencoding::encode(version_id))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_error() {
        assert!(matches!(
            classify_error(Some("NoSuchKey"), "proj/a.txt", "gone".into()),
            Error::NotFound(target) if target == "proj/a.txt"
        ));
        assert!(matches!(
            classify_error(Some("NoSuchVersion"), "proj/a.txt", "gone".into()),
            Error::NotFound(_)
        ));
        assert!(matches!(
            classify_error(Some("AccessDenied"), "bucket", "denied".into()),
            Error::Auth(_)
        ));
        assert!(matches!(
            classify_error(Some("SlowDown"), "bucket", "busy".into()),
            Error::Network(_)
        ));
        assert!(matches!(
            classify_error(None, "bucket", "dispatch failure".into()),
            Error::Network(_)
        ));
    }

    #[test]
    fn test_next_marker() {
        assert_eq!(next_marker(Some(false), Some("t"), "p/").unwrap(), None);
        assert_eq!(next_marker(None, Some("t"), "p/").unwrap(), None);
        assert_eq!(next_marker(Some(true), Some("t"), "p/").unwrap(), Some("t"));
        assert!(next_marker::<String>(Some(true), None, "p/").is_err());
    }

    #[test]
    fn test_copy_source_encodes_segments() {
        assert_eq!(
            copy_source("bucket", "proj/sub/a.txt", "v1"),
            "bucket/proj/sub/a.txt?versionId=v1"
        );
        assert_eq!(
            copy_source("bucket", "proj/a b+c.txt", "v1"),
            "bucket/proj/a%20b%2Bc.txt?versionId=v1"
        );
        assert_eq!(
            copy_source("bucket", "proj/é", "3/x+y"),
            "bucket/proj/%C3%A9?versionId=3%2Fx%2By"
        );
    }

    #[test]
    fn test_describe_version() {
        assert_eq!(describe_version("p/a", None), "p/a");
        assert_eq!(describe_version("p/a", Some("v1")), "p/a (version v1)");
    }

    #[tokio::test]
    async fn test_new_rejects_incomplete_profile() {
        let profile = Profile::new("broken", "http://localhost:9000", "", "access", "secret");
        let result = S3Client::new(profile).await;
        assert!(matches!(result, Err(Error::Config(_))));
    }
}
