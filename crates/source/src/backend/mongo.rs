//! MongoDB GridFS source.
//!
//! File metadata is read straight from the `<namespace>.files` collection
//! rather than through the driver's GridFS `find`, because the driver's
//! `FilesCollectionDocument` drops the legacy `contentType` field that older
//! drivers wrote. Content is still fetched through a [`GridFsBucket`], and
//! only once a consumer actually reads the body.

use super::{FileStream, files_collection};
use crate::error::{ErrorKind, Result};
use crate::{FileRecord, SourceDatabase};
use async_stream::stream;
use async_trait::async_trait;
use exn::{OptionExt, ResultExt};
use futures::StreamExt;
use gfs2s3_asyncutils::LazyReader;
use mongodb::bson::{Bson, Document, doc};
use mongodb::gridfs::GridFsBucket;
use mongodb::options::GridFsBucketOptions;
use mongodb::{Client, Database};
use std::io;

/// GridFS file stores in one MongoDB database.
///
/// # Examples
///
/// ```no_run
/// use gfs2s3_source::backend::MongoSource;
///
/// # async fn example() -> gfs2s3_source::error::Result<()> {
/// let source = MongoSource::connect("mongodb://localhost", "media").await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct MongoSource {
    database: Database,
}

impl MongoSource {
    /// Connect and ping the server.
    ///
    /// The driver connects lazily; the ping makes an unreachable server or
    /// bad credentials fail here rather than halfway through a migration.
    pub async fn connect(url: &str, database: &str) -> Result<Self> {
        // The URL may carry credentials; keep it out of error messages.
        let client = Client::with_uri_str(url)
            .await
            .or_raise(|| ErrorKind::Connection(format!("invalid connection string for {database}")))?;
        let database = client.database(database);
        database
            .run_command(doc! { "ping": 1 })
            .await
            .or_raise(|| ErrorKind::Connection(format!("could not reach database {}", database.name())))?;
        tracing::debug!(database = database.name(), "Connected to MongoDB");
        Ok(Self { database })
    }
}

#[async_trait]
impl SourceDatabase for MongoSource {
    fn name(&self) -> &str {
        self.database.name()
    }

    async fn collection_names(&self) -> Result<Vec<String>> {
        self.database.list_collection_names().await.or_raise(|| ErrorKind::Query(self.name().to_string()))
    }

    async fn count(&self, namespace: &str) -> Result<u64> {
        let collection = files_collection(namespace);
        self.database
            .collection::<Document>(&collection)
            .count_documents(doc! {})
            .await
            .or_raise(|| ErrorKind::Query(collection))
    }

    async fn open(&self, namespace: &str) -> Result<FileStream> {
        let collection = files_collection(namespace);
        let cursor = self
            .database
            .collection::<Document>(&collection)
            .find(doc! {})
            .await
            .or_raise(|| ErrorKind::Query(collection.clone()))?;
        let options = GridFsBucketOptions::builder().bucket_name(namespace.to_string()).build();
        let bucket = self.database.gridfs_bucket(options);
        Ok(Box::pin(stream! {
            let mut cursor = cursor;
            while let Some(document) = cursor.next().await {
                yield match document {
                    Ok(document) => file_record(&bucket, &collection, document),
                    Err(e) => Err(e).or_raise(|| ErrorKind::Query(collection.clone())),
                };
            }
        }))
    }
}

/// Build a record from a `.files` document; the body opens the chunk
/// download on first read.
fn file_record(bucket: &GridFsBucket, collection: &str, document: Document) -> Result<FileRecord> {
    let invalid = |reason: &str| ErrorKind::InvalidDocument(collection.to_string(), reason.to_string());
    let id = document.get("_id").cloned().ok_or_raise(|| invalid("missing _id"))?;
    let size = length(&document).ok_or_raise(|| invalid("missing or invalid length"))?;
    // Both are optional in GridFS. A missing filename produces a key that the
    // destination rejects, which is reported per file.
    let name = document.get_str("filename").unwrap_or_default().to_string();
    let content_type = document.get_str("contentType").unwrap_or_default().to_string();

    let bucket = bucket.clone();
    let body = LazyReader::new(async move {
        let download = bucket.open_download_stream(id).await.map_err(io::Error::other)?;
        Ok::<_, io::Error>(Box::pin(download))
    });
    Ok(FileRecord::new(name, size, content_type, body))
}

/// Drivers have written `length` as every numeric BSON type over the years.
fn length(document: &Document) -> Option<u64> {
    match document.get("length")? {
        Bson::Int32(n) => u64::try_from(*n).ok(),
        Bson::Int64(n) => u64::try_from(*n).ok(),
        Bson::Double(n) if *n >= 0.0 && n.fract() == 0.0 => Some(*n as u64),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(doc! { "length": 12_i32 }, Some(12))]
    #[case(doc! { "length": 12_i64 }, Some(12))]
    #[case(doc! { "length": 12.0_f64 }, Some(12))]
    #[case(doc! { "length": 12.5_f64 }, None)]
    #[case(doc! { "length": -1_i64 }, None)]
    #[case(doc! { "length": "12" }, None)]
    #[case(doc! {}, None)]
    fn test_length(#[case] document: Document, #[case] expected: Option<u64>) {
        assert_eq!(length(&document), expected);
    }
}
