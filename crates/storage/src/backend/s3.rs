//! S3-compatible storage backend.
//!
//! This module provides an object store implementation for S3-compatible
//! services including AWS S3, Backblaze B2, Tigris (Fly.io), MinIO and others.
//!
//! # Credentials
//!
//! Credentials are provided explicitly (command-line, configuration file or
//! environment). The SDK's own credential provider chain is not consulted.

use crate::{
    ObjectInfo, ObjectStore, Upload,
    backend::{ObjectInfoStream, buffer_body},
    error::{Error, ErrorKind, Result},
    validate_key,
};
use async_stream::stream;
use async_trait::async_trait;
use aws_sdk_s3::{
    Client,
    config::{BehaviorVersion, Credentials, Region, retry::RetryConfig},
    error::{DisplayErrorContext, SdkError},
    primitives::ByteStream,
    types::{CompletedMultipartUpload, CompletedPart, ObjectCannedAcl},
};
use exn::ResultExt;
use futures::io::AsyncReadExt;
use std::error::Error as StdError;
use std::fmt::Debug;
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Generous default for concurrent S3 requests.
///
/// TODO: Adaptive rate limiting based on 429/throttling responses?
const DEFAULT_CONCURRENT_REQUESTS: usize = 100;

/// Bodies up to this size go up in one `PutObject`; larger ones are sent as a
/// multipart upload, one part of this size at a time. S3 wants parts of at
/// least 5 MiB, except the last.
const DEFAULT_PART_SIZE: u64 = 8 * 1024 * 1024;

/// S3 limit on the number of parts in one multipart upload.
const MAX_PARTS: u64 = 10_000;

/// S3-compatible storage backend.
///
/// Stores objects in an S3 bucket, optionally under a key prefix. All keys are
/// relative to the configured prefix (if any). Every object is written with
/// the `bucket-owner-full-control` canned ACL.
///
/// # Examples
///
/// ```no_run
/// use gfs2s3_storage::backend::S3Backend;
///
/// # fn example() -> gfs2s3_storage::error::Result<()> {
/// let backend = S3Backend::new(
///     "archive",
///     "my-bucket",
///     Some("gridfs/".to_string()),
///     "us-east-1",
///     None::<String>,
///     "access_key_id",
///     "secret_access_key",
/// )?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct S3Backend {
    name: String,
    client: Client,
    bucket: String,
    prefix: Option<String>,
    /// Rate limiter for concurrent S3 requests.
    rate_limiter: Arc<Semaphore>,
    part_size: u64,
}

impl S3Backend {
    /// Create a new S3 storage backend.
    ///
    /// # Arguments
    /// * `name` - A name for this backend (used in logging)
    /// * `bucket` - S3 bucket name
    /// * `prefix` - Optional key prefix (acts as virtual directory)
    /// * `region` - AWS region or provider-specific region
    /// * `endpoint` - Custom endpoint URL for S3-compatible services
    /// * `key_id` - AWS/provider access key ID
    /// * `key_secret` - AWS/provider secret access key
    pub fn new(
        name: impl Into<String>,
        bucket: impl Into<String>,
        prefix: Option<String>,
        region: impl Into<String>,
        endpoint: Option<impl Into<String>>,
        key_id: impl Into<String>,
        key_secret: impl Into<String>,
    ) -> Result<Self> {
        let region = Region::new(region.into());
        let credentials = Credentials::new(key_id, key_secret, None, None, "gfs2s3-config");
        let mut config_builder = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .credentials_provider(credentials)
            .region(region)
            // Configure retry policy with exponential backoff (1 initial + 3 retries)
            .retry_config(RetryConfig::standard().with_max_attempts(4));
        // Set custom endpoint for non-AWS services, which mostly only
        // understand path-style addressing.
        if let Some(endpoint_url) = endpoint {
            config_builder = config_builder.endpoint_url(endpoint_url).force_path_style(true);
        }
        let client = Client::from_conf(config_builder.build());
        Self::from_client(name, client, bucket, prefix)
    }

    /// Wrap an already configured client.
    pub fn from_client(
        name: impl Into<String>,
        client: Client,
        bucket: impl Into<String>,
        prefix: Option<String>,
    ) -> Result<Self> {
        let prefix = match prefix.as_deref().map(|p| p.trim_matches('/')) {
            None | Some("") => None,
            Some(p) => Some(validate_key(p)?.to_string()),
        };
        Ok(Self {
            name: name.into(),
            client,
            bucket: bucket.into(),
            prefix,
            rate_limiter: Arc::new(Semaphore::new(DEFAULT_CONCURRENT_REQUESTS)),
            part_size: DEFAULT_PART_SIZE,
        })
    }

    /// Construct the full S3 key from a relative key.
    fn full_key(&self, key: &str) -> Result<String> {
        let key = validate_key(key)?;
        Ok(match &self.prefix {
            Some(prefix) => format!("{prefix}/{key}"),
            None => key.to_string(),
        })
    }

    /// Strip the configured prefix from an S3 key to get the relative key.
    fn relative_key<'k>(&self, key: &'k str) -> &'k str {
        match &self.prefix {
            Some(prefix) => key.strip_prefix(prefix.as_str()).and_then(|s| s.strip_prefix('/')).unwrap_or(key),
            None => key,
        }
    }

    /// Acquire a rate limiter permit before making an S3 API call.
    async fn acquire_permit(&self) -> Result<OwnedSemaphorePermit> {
        self.rate_limiter
            .clone()
            .acquire_owned()
            .await
            .or_raise(|| ErrorKind::BackendError("S3 rate limiter closed".to_string()))
    }
}

/// Service errors mean S3 answered and refused; anything else never got a
/// usable answer.
fn sdk_error<E, R>(err: SdkError<E, R>) -> Error
where
    E: StdError + 'static,
    R: Debug,
{
    let service = matches!(err, SdkError::ServiceError(_));
    let message = DisplayErrorContext(err).to_string();
    match service {
        true => exn::Exn::from(ErrorKind::BackendError(message)),
        false => exn::Exn::from(ErrorKind::Network(message)),
    }
}

#[async_trait]
impl ObjectStore for S3Backend {
    fn name(&self) -> &str {
        &self.name
    }

    fn list_stream<'a>(&'a self, prefix: Option<&'a str>) -> ObjectInfoStream<'a> {
        let full_prefix = match (&self.prefix, prefix) {
            (Some(base), Some(p)) => Some(format!("{base}/{p}")),
            (Some(base), None) => Some(format!("{base}/")),
            (None, p) => p.map(str::to_string),
        };
        Box::pin(stream! {
            let mut pages = self
                .client
                .list_objects_v2()
                .bucket(&self.bucket)
                .set_prefix(full_prefix)
                .into_paginator()
                .send();
            while let Some(page) = pages.next().await {
                let page = match page {
                    Ok(page) => page,
                    Err(e) => {
                        yield Err(sdk_error(e));
                        return;
                    },
                };
                for object in page.contents() {
                    let Some(key) = object.key() else {
                        continue;
                    };
                    let size = object.size().and_then(|s| u64::try_from(s).ok()).unwrap_or(0);
                    yield Ok(ObjectInfo::new(self.relative_key(key), size));
                }
            }
        })
    }

    async fn put(&self, key: &str, upload: Upload) -> Result<()> {
        let full_key = self.full_key(key)?;
        // Held until the last byte is sent, so the limit also bounds how much
        // body data is in memory at once: at most one part per permit.
        let _permit = self.acquire_permit().await?;
        if upload.size <= self.part_size {
            self.put_single(key, &full_key, upload).await?;
        } else {
            self.put_multipart(key, &full_key, upload).await?;
        }
        tracing::trace!(backend = %self.name, bucket = %self.bucket, key = %full_key, "Object written");
        Ok(())
    }
}

impl S3Backend {
    async fn put_single(&self, key: &str, full_key: &str, upload: Upload) -> Result<()> {
        let content_type = upload.content_type().map(str::to_string);
        let data = buffer_body(key, upload.body, upload.size).await?;
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(full_key)
            .content_length(content_length(key, data.len())?)
            .set_content_type(content_type)
            .acl(ObjectCannedAcl::BucketOwnerFullControl)
            .body(ByteStream::from(data))
            .send()
            .await
            .map_err(sdk_error)?;
        Ok(())
    }

    /// Stream the body up part by part. Any failure after the upload was
    /// created aborts it, so no orphaned parts are left in the bucket.
    async fn put_multipart(&self, key: &str, full_key: &str, upload: Upload) -> Result<()> {
        let created = self
            .client
            .create_multipart_upload()
            .bucket(&self.bucket)
            .key(full_key)
            .set_content_type(upload.content_type().map(str::to_string))
            .acl(ObjectCannedAcl::BucketOwnerFullControl)
            .send()
            .await
            .map_err(sdk_error)?;
        let Some(upload_id) = created.upload_id().map(str::to_string) else {
            exn::bail!(ErrorKind::BackendError(format!("no upload id returned for {full_key}")));
        };

        let result = self.upload_parts(key, full_key, &upload_id, upload).await;
        if result.is_err() {
            let aborted = self
                .client
                .abort_multipart_upload()
                .bucket(&self.bucket)
                .key(full_key)
                .upload_id(&upload_id)
                .send()
                .await;
            if let Err(err) = aborted {
                tracing::warn!(backend = %self.name, key = %full_key, error = %DisplayErrorContext(err), "could not abort multipart upload");
            }
        }
        result
    }

    async fn upload_parts(&self, key: &str, full_key: &str, upload_id: &str, upload: Upload) -> Result<()> {
        let Upload { mut body, size, .. } = upload;
        let part_size = self.part_size.max(size.div_ceil(MAX_PARTS));
        let mut parts = Vec::new();
        let mut sent = 0u64;
        while sent < size {
            let len = part_size.min(size - sent);
            let mut part = Vec::with_capacity(usize::try_from(len).unwrap_or(0));
            (&mut body).take(len).read_to_end(&mut part).await.map_err(ErrorKind::Io)?;
            let read = part.len() as u64;
            if read < len {
                exn::bail!(ErrorKind::ShortRead {
                    key: key.to_string(),
                    expected: size,
                    actual: sent + read,
                });
            }
            let part_number = i32::try_from(parts.len() + 1)
                .or_raise(|| ErrorKind::BackendError(format!("{key} needs too many parts")))?;
            let uploaded = self
                .client
                .upload_part()
                .bucket(&self.bucket)
                .key(full_key)
                .upload_id(upload_id)
                .part_number(part_number)
                .content_length(content_length(key, part.len())?)
                .body(ByteStream::from(part))
                .send()
                .await
                .map_err(sdk_error)?;
            parts.push(
                CompletedPart::builder()
                    .set_e_tag(uploaded.e_tag().map(str::to_string))
                    .part_number(part_number)
                    .build(),
            );
            sent += read;
        }
        self.client
            .complete_multipart_upload()
            .bucket(&self.bucket)
            .key(full_key)
            .upload_id(upload_id)
            .multipart_upload(CompletedMultipartUpload::builder().set_parts(Some(parts)).build())
            .send()
            .await
            .map_err(sdk_error)?;
        Ok(())
    }
}

fn content_length(key: &str, len: usize) -> Result<i64> {
    i64::try_from(len).or_raise(|| ErrorKind::BackendError(format!("{key} is too large to upload")))
}
