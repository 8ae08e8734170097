use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use futures::TryStreamExt;
use gfs2s3_storage::BackendHandle;
use std::collections::HashSet;

/// Every key present in the destination when the run started.
///
/// Built once and shared read-only between workers; uploads made during the
/// run are not added. Presence alone means "already migrated": sizes and
/// content are never compared.
#[derive(Debug, Default)]
pub struct DestinationIndex {
    keys: HashSet<String>,
}

impl DestinationIndex {
    /// List the whole destination. Any listing error is fatal.
    pub async fn build(store: &BackendHandle) -> Result<Self> {
        let mut keys = HashSet::new();
        let mut objects = store.list_stream(None);
        while let Some(object) = objects.try_next().await.or_raise(|| ErrorKind::Index)? {
            keys.insert(object.key);
        }
        tracing::info!(backend = store.name(), objects = keys.len(), "indexed destination");
        Ok(Self { keys })
    }

    pub fn contains(&self, key: &str) -> bool {
        self.keys.contains(key)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

impl<S: Into<String>> FromIterator<S> for DestinationIndex {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self { keys: iter.into_iter().map(Into::into).collect() }
    }
}
