//! In-memory source database for testing.

use super::{FileStream, files_collection};
use crate::error::{ErrorKind, Result};
use crate::{FileRecord, SourceDatabase};
use async_stream::stream;
use async_trait::async_trait;
use futures::io::Cursor;
use gfs2s3_asyncutils::{Meter, MeteredReader};
use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, PoisonError};

struct MockFile {
    name: String,
    data: Vec<u8>,
    content_type: String,
}

/// In-memory source database for testing.
///
/// Every body handed out is wrapped in a [`MeteredReader`], so tests can
/// assert whether a file's content was ever read. Failures can be injected
/// for collection listing, and part-way through enumerating a file store.
///
/// # Examples
///
/// ```
/// use gfs2s3_source::SourceDatabase;
/// use gfs2s3_source::backend::MockSource;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> gfs2s3_source::error::Result<()> {
/// let source = MockSource::default().with_store("images", [("cat.png", b"png".to_vec(), "image/png")]);
/// assert_eq!(source.collection_names().await?, ["images.chunks", "images.files"]);
/// assert_eq!(source.count("images").await?, 1);
/// # Ok(())
/// # }
/// ```
#[derive(Default)]
pub struct MockSource {
    collections: Vec<String>,
    stores: HashMap<String, Vec<MockFile>>,
    failing_after: HashMap<String, usize>,
    failing_count: HashSet<String>,
    failing_listing: bool,
    meters: Mutex<HashMap<(String, String), Vec<Meter>>>,
    opened: Mutex<Vec<String>>,
}

impl MockSource {
    /// Add a file store, registering both its `.files` and `.chunks`
    /// collections.
    pub fn with_store(
        mut self,
        namespace: impl Into<String>,
        files: impl IntoIterator<Item = (impl Into<String>, Vec<u8>, impl Into<String>)>,
    ) -> Self {
        let namespace = namespace.into();
        let files = files
            .into_iter()
            .map(|(name, data, content_type)| MockFile {
                name: name.into(),
                data,
                content_type: content_type.into(),
            })
            .collect();
        self.collections.push(format!("{namespace}.chunks"));
        self.collections.push(files_collection(&namespace));
        self.stores.insert(namespace, files);
        self
    }

    /// Add a collection that isn't a file store.
    pub fn with_collection(mut self, name: impl Into<String>) -> Self {
        self.collections.push(name.into());
        self
    }

    /// Make enumeration of `namespace` fail after `n` records.
    pub fn failing_after(mut self, namespace: impl Into<String>, n: usize) -> Self {
        self.failing_after.insert(namespace.into(), n);
        self
    }

    /// Make [`count()`](SourceDatabase::count) fail for `namespace`.
    pub fn failing_count(mut self, namespace: impl Into<String>) -> Self {
        self.failing_count.insert(namespace.into());
        self
    }

    /// Make [`collection_names()`](SourceDatabase::collection_names) fail.
    pub fn failing_listing(mut self) -> Self {
        self.failing_listing = true;
        self
    }

    /// Whether any body handed out for this file has been read from.
    pub fn was_read(&self, namespace: &str, name: &str) -> bool {
        let meters = self.meters.lock().unwrap_or_else(PoisonError::into_inner);
        meters
            .get(&(namespace.to_string(), name.to_string()))
            .is_some_and(|meters| meters.iter().any(Meter::touched))
    }

    /// Namespaces passed to [`open()`](SourceDatabase::open), in call order.
    pub fn opened(&self) -> Vec<String> {
        self.opened.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn store(&self, namespace: &str) -> Result<&[MockFile]> {
        match self.stores.get(namespace) {
            Some(files) => Ok(files.as_slice()),
            None => exn::bail!(ErrorKind::Query(files_collection(namespace))),
        }
    }
}

#[async_trait]
impl SourceDatabase for MockSource {
    fn name(&self) -> &str {
        "mock"
    }

    async fn collection_names(&self) -> Result<Vec<String>> {
        if self.failing_listing {
            exn::bail!(ErrorKind::Query("injected listing failure".to_string()));
        }
        Ok(self.collections.clone())
    }

    async fn count(&self, namespace: &str) -> Result<u64> {
        if self.failing_count.contains(namespace) {
            exn::bail!(ErrorKind::Query(files_collection(namespace)));
        }
        Ok(self.store(namespace)?.len() as u64)
    }

    async fn open(&self, namespace: &str) -> Result<FileStream> {
        let files = self.store(namespace)?;
        self.opened.lock().unwrap_or_else(PoisonError::into_inner).push(namespace.to_string());

        let mut meters = self.meters.lock().unwrap_or_else(PoisonError::into_inner);
        let records: Vec<FileRecord> = files
            .iter()
            .map(|file| {
                let reader = MeteredReader::new(Cursor::new(file.data.clone()));
                meters.entry((namespace.to_string(), file.name.clone())).or_default().push(reader.meter());
                FileRecord::new(&file.name, file.data.len() as u64, &file.content_type, reader)
            })
            .collect();
        drop(meters);

        let fail_after = self.failing_after.get(namespace).copied();
        let collection = files_collection(namespace);
        Ok(Box::pin(stream! {
            for (i, record) in records.into_iter().enumerate() {
                if fail_after == Some(i) {
                    yield Err(exn::Exn::from(ErrorKind::Query(collection)));
                    return;
                }
                yield Ok(record);
            }
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::io::AsyncReadExt;
    use futures::{StreamExt, TryStreamExt};
    use std::ops::Deref;

    fn source() -> MockSource {
        MockSource::default()
            .with_store("ns", [("a", b"aaa".to_vec(), "text/plain"), ("b", b"bb".to_vec(), "")])
            .with_collection("system.views")
    }

    #[tokio::test]
    async fn test_collection_names() {
        let names = source().collection_names().await.unwrap();
        assert_eq!(names, ["ns.chunks", "ns.files", "system.views"]);
    }

    #[tokio::test]
    async fn test_open_yields_records_in_order() {
        let source = source();
        let records: Vec<FileRecord> = source.open("ns").await.unwrap().try_collect().await.unwrap();
        let names: Vec<_> = records.iter().map(|r| (r.name.as_str(), r.size, r.content_type.as_str())).collect();
        assert_eq!(names, [("a", 3, "text/plain"), ("b", 2, "")]);
        assert_eq!(source.opened(), ["ns"]);
    }

    #[tokio::test]
    async fn test_was_read() {
        let source = source();
        let mut stream = source.open("ns").await.unwrap();
        let mut first = stream.next().await.unwrap().unwrap();
        let mut buf = Vec::new();
        first.body.read_to_end(&mut buf).await.unwrap();
        drop(stream);
        assert_eq!(buf, b"aaa");
        assert!(source.was_read("ns", "a"));
        assert!(!source.was_read("ns", "b"));
    }

    #[tokio::test]
    async fn test_failing_after() {
        let source = source().failing_after("ns", 1);
        let mut stream = source.open("ns").await.unwrap();
        assert!(stream.next().await.unwrap().is_ok());
        let err = stream.next().await.unwrap().unwrap_err();
        assert!(matches!(err.deref(), ErrorKind::Query(_)));
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn test_failing_count() {
        let source = source().failing_count("ns");
        let err = source.count("ns").await.unwrap_err();
        assert!(matches!(err.deref(), ErrorKind::Query(_)));
        assert!(source.open("ns").await.is_ok());
    }

    #[tokio::test]
    async fn test_unknown_namespace() {
        let source = source();
        assert!(source.count("missing").await.is_err());
        assert!(source.open("missing").await.is_err());
    }
}
