//! Object store trait and implementations.
//!
//! This module defines the [`ObjectStore`] trait, the destination side of a
//! migration: something that can enumerate the keys it already holds and
//! accept new objects from a streaming body.

#[cfg(feature = "mock")]
mod mock;
#[cfg(feature = "s3")]
mod s3;

#[cfg(feature = "mock")]
pub use self::mock::{MockStore, StoredObject};
#[cfg(feature = "s3")]
pub use self::s3::S3Backend;
use crate::error::{ErrorKind, Result};
use crate::models::{BoxAsyncRead, ObjectInfo, Upload};
use async_trait::async_trait;
use futures::io::AsyncReadExt;
use futures::{Stream, TryStreamExt};
use std::pin::Pin;

pub(crate) type ObjectInfoStream<'a> = Pin<Box<dyn Stream<Item = Result<ObjectInfo>> + Send + 'a>>;

/// Unified interface for destination object stores.
///
/// # Examples
///
/// ```
/// use gfs2s3_storage::{ObjectStore, Upload, error::Result};
///
/// async fn upload_greeting(store: &dyn ObjectStore) -> Result<()> {
///     let body = futures::io::Cursor::new(b"hello".to_vec());
///     store.put("greetings/hello.txt", Upload::new(body, 5, "text/plain")).await
/// }
/// ```
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Name of the configured backend (used for logging only).
    fn name(&self) -> &str;

    /// List all objects matching an optional key prefix.
    ///
    /// Default implementation of this method is to collect all the results
    /// from [`list_stream()`](Self::list_stream) into a [`Vec`] before
    /// returning.
    async fn list(&self, prefix: Option<&str>) -> Result<Vec<ObjectInfo>> {
        self.list_stream(prefix).try_collect().await
    }

    /// Stream object metadata matching an optional key prefix.
    ///
    /// Keys are yielded relative to any prefix the backend itself was
    /// configured with, so they can be compared directly against the keys
    /// given to [`put()`](Self::put).
    ///
    /// # Examples
    ///
    /// ```
    /// use futures::TryStreamExt;
    /// # use gfs2s3_storage::{ObjectStore, error::Result};
    /// # async fn example(store: &dyn ObjectStore) -> Result<()> {
    /// let mut stream = store.list_stream(Some("images/"));
    /// while let Some(info) = stream.try_next().await? {
    ///     println!("{}: {} bytes", info.key, info.size);
    /// }
    /// # Ok(())
    /// # }
    /// ```
    fn list_stream<'a>(&'a self, prefix: Option<&'a str>) -> ObjectInfoStream<'a>;

    /// Write an object, consuming its body.
    ///
    /// Creates a new object or overwrites an existing one. The key is
    /// validated with [`validate_key`](crate::validate_key) first; exactly
    /// `upload.size` bytes are taken from the body, and a body that ends
    /// early fails with [`ShortRead`](crate::error::ErrorKind::ShortRead).
    async fn put(&self, key: &str, upload: Upload) -> Result<()>;
}

/// Drain exactly `size` bytes of an upload body into memory.
pub(crate) async fn buffer_body(key: &str, body: BoxAsyncRead, size: u64) -> Result<Vec<u8>> {
    // Capacity is a hint only; don't trust an absurd declared size up front.
    let mut buffer = Vec::with_capacity(usize::try_from(size).unwrap_or(0).min(64 * 1024 * 1024));
    body.take(size).read_to_end(&mut buffer).await.map_err(ErrorKind::Io)?;
    let actual = buffer.len() as u64;
    if actual != size {
        exn::bail!(ErrorKind::ShortRead {
            key: key.to_string(),
            expected: size,
            actual,
        });
    }
    Ok(buffer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::io::Cursor;
    use std::ops::Deref;

    #[tokio::test]
    async fn test_buffer_body_exact() {
        let body: BoxAsyncRead = Box::pin(Cursor::new(b"0123456789".to_vec()));
        assert_eq!(buffer_body("k", body, 10).await.unwrap(), b"0123456789");
    }

    #[tokio::test]
    async fn test_buffer_body_ignores_trailing_bytes() {
        let body: BoxAsyncRead = Box::pin(Cursor::new(b"0123456789".to_vec()));
        assert_eq!(buffer_body("k", body, 4).await.unwrap(), b"0123");
    }

    #[tokio::test]
    async fn test_buffer_body_short_read() {
        let body: BoxAsyncRead = Box::pin(Cursor::new(b"0123".to_vec()));
        let err = buffer_body("k", body, 10).await.unwrap_err();
        assert!(matches!(err.deref(), ErrorKind::ShortRead { expected: 10, actual: 4, .. }));
    }
}
