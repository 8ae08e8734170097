use gfs2s3_source::FILES_SUFFIX;

/// A file store chosen for migration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    /// Name of the metadata collection, e.g. `images.files`
    pub collection: String,
    /// File store name, e.g. `images`; also the first segment of every
    /// destination key
    pub namespace: String,
}

/// Pick the file stores to migrate out of every collection in a database.
///
/// A collection is selected when its name ends in `.files` and, if `prefix`
/// is set and non-empty, starts with `prefix`. Collections are returned sorted
/// by name so runs are repeatable.
///
/// ```
/// use gfs2s3_migrate::select_collections;
///
/// let selected = select_collections(["b.files", "a.chunks", "a.files"], Some("a"));
/// assert_eq!(selected.len(), 1);
/// assert_eq!(selected[0].namespace, "a");
/// ```
pub fn select_collections<I, S>(names: I, prefix: Option<&str>) -> Vec<Selection>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let prefix = prefix.filter(|prefix| !prefix.is_empty());
    let mut selections: Vec<Selection> = names
        .into_iter()
        .map(Into::into)
        .filter(|name| prefix.is_none_or(|prefix| name.starts_with(prefix)))
        .filter_map(|collection| {
            let namespace = collection.strip_suffix(FILES_SUFFIX)?;
            if namespace.is_empty() {
                tracing::debug!(%collection, "ignoring file store with an empty name");
                return None;
            }
            let namespace = namespace.to_string();
            Some(Selection { collection, namespace })
        })
        .collect();
    selections.sort_by(|a, b| a.collection.cmp(&b.collection));
    selections
}
