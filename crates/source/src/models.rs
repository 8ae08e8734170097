use futures::io::AsyncRead;
use std::fmt;
use std::pin::Pin;

/// One file in a source file store.
///
/// The body is single-pass: once handed to a consumer it cannot be re-read.
/// Backends should open it lazily, so a record that is only inspected (and
/// then dropped) costs nothing beyond its metadata.
pub struct FileRecord {
    /// Logical name of the file within its file store
    pub name: String,
    /// Length of the content in bytes
    pub size: u64,
    /// MIME type; empty when the store doesn't record one
    pub content_type: String,
    pub body: Pin<Box<dyn AsyncRead + Send + 'static>>,
}
impl FileRecord {
    pub fn new(
        name: impl Into<String>,
        size: u64,
        content_type: impl Into<String>,
        body: impl AsyncRead + Send + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            size,
            content_type: content_type.into(),
            body: Box::pin(body),
        }
    }
}
impl fmt::Debug for FileRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileRecord")
            .field("name", &self.name)
            .field("size", &self.size)
            .field("content_type", &self.content_type)
            .finish_non_exhaustive()
    }
}
