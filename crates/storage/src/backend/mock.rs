//! In-memory object store for testing.

use super::{ObjectInfoStream, buffer_body};
use crate::error::{ErrorKind, Result};
use crate::{ObjectInfo, ObjectStore, Upload, validate_key};
use async_stream::stream;
use async_trait::async_trait;
use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::RwLock;

/// An object held by a [`MockStore`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub data: Vec<u8>,
    pub content_type: Option<String>,
}

/// In-memory object store for testing.
///
/// Objects are stored in a `BTreeMap` behind a [`RwLock`], so all trait
/// methods can operate on `&self` without external synchronisation. Failures
/// can be injected per key (for [`put()`](ObjectStore::put)) or for listing.
///
/// # Examples
///
/// ```
/// use gfs2s3_storage::backend::MockStore;
/// use gfs2s3_storage::{ObjectStore, Upload};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> gfs2s3_storage::error::Result<()> {
/// let store = MockStore::with_objects([("fs/existing.png", b"png")]);
/// let body = futures::io::Cursor::new(b"jpg".to_vec());
/// store.put("fs/new.jpg", Upload::new(body, 3, "image/jpeg")).await?;
/// assert_eq!(store.keys().await, ["fs/existing.png", "fs/new.jpg"]);
/// # Ok(())
/// # }
/// ```
pub struct MockStore {
    name: String,
    objects: RwLock<BTreeMap<String, StoredObject>>,
    failing_keys: HashSet<String>,
    failing_listing: bool,
    puts: AtomicUsize,
}

impl MockStore {
    /// Create a mock store pre-populated with objects (no content type).
    ///
    /// Panics if any key fails validation. If test setup is wrong, then test
    /// should not pass.
    pub fn with_objects(objects: impl IntoIterator<Item = (impl Into<String>, impl Into<Vec<u8>>)>) -> Self {
        let mut map = BTreeMap::new();
        for (key, data) in objects {
            let key = key.into();
            if validate_key(&key).is_err() {
                // The panic here is DELIBERATE. MockStore is intended to be
                // used in tests; panics are expected. There is no error result.
                panic!("MockStore::with_objects: invalid key {key:?}");
            }
            map.insert(key, StoredObject { data: data.into(), content_type: None });
        }
        Self {
            name: "mock".to_string(),
            objects: RwLock::new(map),
            failing_keys: HashSet::new(),
            failing_listing: false,
            puts: AtomicUsize::new(0),
        }
    }

    /// Make every [`put()`](ObjectStore::put) to one of these keys fail with
    /// a [`Network`](ErrorKind::Network) error, without reading the body.
    pub fn failing_on(mut self, keys: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.failing_keys.extend(keys.into_iter().map(Into::into));
        self
    }

    /// Make listing fail with a [`Network`](ErrorKind::Network) error.
    pub fn failing_listing(mut self) -> Self {
        self.failing_listing = true;
        self
    }

    /// Number of [`put()`](ObjectStore::put) calls so far, failed or not.
    pub fn put_count(&self) -> usize {
        self.puts.load(Ordering::SeqCst)
    }

    pub async fn get(&self, key: &str) -> Option<StoredObject> {
        self.objects.read().await.get(key).cloned()
    }

    /// All stored keys, in order.
    pub async fn keys(&self) -> Vec<String> {
        self.objects.read().await.keys().cloned().collect()
    }
}
impl Default for MockStore {
    fn default() -> Self {
        let objects: [(&str, &[u8]); 0] = [];
        Self::with_objects(objects)
    }
}

#[async_trait]
impl ObjectStore for MockStore {
    fn name(&self) -> &str {
        &self.name
    }

    fn list_stream<'a>(&'a self, prefix: Option<&'a str>) -> ObjectInfoStream<'a> {
        if self.failing_listing {
            let err = exn::Exn::from(ErrorKind::Network("injected listing failure".to_string()));
            return Box::pin(futures::stream::once(async { Err(err) }));
        }
        Box::pin(stream! {
            // Snapshot matching entries under the read lock, then drop it
            // before yielding to avoid holding the lock across yield points.
            let entries: Vec<ObjectInfo> = {
                let guard = self.objects.read().await;
                guard
                    .iter()
                    .filter(|(key, _)| prefix.is_none_or(|p| key.starts_with(p)))
                    .map(|(key, object)| ObjectInfo::new(key.clone(), object.data.len() as u64))
                    .collect()
            };
            for info in entries {
                yield Ok(info);
            }
        })
    }

    async fn put(&self, key: &str, upload: Upload) -> Result<()> {
        self.puts.fetch_add(1, Ordering::SeqCst);
        let key = validate_key(key)?;
        if self.failing_keys.contains(key) {
            exn::bail!(ErrorKind::Network(format!("injected failure writing {key}")));
        }
        let content_type = upload.content_type().map(str::to_string);
        let data = buffer_body(key, upload.body, upload.size).await?;
        self.objects.write().await.insert(key.to_string(), StoredObject { data, content_type });
        Ok(())
    }
}
