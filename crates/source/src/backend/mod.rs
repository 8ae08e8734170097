//! Source database trait and implementations.

#[cfg(feature = "mock")]
mod mock;
#[cfg(feature = "mongo")]
mod mongo;

#[cfg(feature = "mock")]
pub use self::mock::MockSource;
#[cfg(feature = "mongo")]
pub use self::mongo::MongoSource;
use crate::error::Result;
use crate::models::FileRecord;
use async_trait::async_trait;
use futures::Stream;
use std::pin::Pin;

/// Sequential, single-pass enumeration of every file in one file store.
///
/// An `Err` item means enumeration can't continue; consumers should treat it
/// as the end of the stream.
pub type FileStream = Pin<Box<dyn Stream<Item = Result<FileRecord>> + Send + 'static>>;

/// Unified interface for databases holding file stores.
///
/// File stores are addressed by namespace: the metadata collection name with
/// [`FILES_SUFFIX`](crate::FILES_SUFFIX) removed.
///
/// # Examples
///
/// ```
/// use futures::TryStreamExt;
/// # use gfs2s3_source::{SourceDatabase, error::Result};
/// # async fn example(source: &dyn SourceDatabase) -> Result<()> {
/// let total = source.count("images").await?;
/// let mut files = source.open("images").await?;
/// while let Some(file) = files.try_next().await? {
///     println!("{} ({} bytes, {} total)", file.name, file.size, total);
/// }
/// # Ok(())
/// # }
/// ```
#[async_trait]
pub trait SourceDatabase: Send + Sync {
    /// Name of the source (the database name; used for logging only).
    fn name(&self) -> &str;

    /// Names of every collection in the database, file stores or not.
    async fn collection_names(&self) -> Result<Vec<String>>;

    /// Number of files in a file store.
    ///
    /// Computed separately from [`open()`](Self::open); the two can disagree
    /// if the store changes in between.
    async fn count(&self, namespace: &str) -> Result<u64>;

    /// Open a stream over every file in a file store.
    ///
    /// The stream owns its cursor; dropping it releases server resources.
    async fn open(&self, namespace: &str) -> Result<FileStream>;
}

/// Metadata collection name for a namespace.
pub fn files_collection(namespace: &str) -> String {
    format!("{namespace}{}", crate::FILES_SUFFIX)
}
