//! Storage models.

use futures::io::AsyncRead;
use std::fmt;
use std::pin::Pin;

/// Single-pass, owned byte source for an upload.
pub type BoxAsyncRead = Pin<Box<dyn AsyncRead + Send + 'static>>;

/// Object metadata returned by listing operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectInfo {
    /// Key relative to the backend's configured prefix
    pub key: String,
    /// Object size in bytes
    pub size: u64,
}
impl ObjectInfo {
    pub fn new(key: impl Into<String>, size: u64) -> Self {
        Self { key: key.into(), size }
    }
}

/// An object to be written.
///
/// The body is consumed exactly once and must yield at least `size` bytes;
/// anything past `size` is ignored.
pub struct Upload {
    pub body: BoxAsyncRead,
    /// Declared length of the body in bytes
    pub size: u64,
    /// MIME type; empty when unknown
    pub content_type: String,
}
impl Upload {
    pub fn new(body: impl AsyncRead + Send + 'static, size: u64, content_type: impl Into<String>) -> Self {
        Self {
            body: Box::pin(body),
            size,
            content_type: content_type.into(),
        }
    }

    /// Content type, or `None` if unknown.
    pub fn content_type(&self) -> Option<&str> {
        Some(self.content_type.as_str()).filter(|ct| !ct.is_empty())
    }
}
impl fmt::Debug for Upload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Upload")
            .field("size", &self.size)
            .field("content_type", &self.content_type)
            .finish_non_exhaustive()
    }
}
