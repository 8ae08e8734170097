use crate::cursor::SourceCursor;
use crate::error::{ErrorKind, Result};
use crate::index::DestinationIndex;
use crate::progress::{LogSink, ProgressAggregator, ProgressSink};
use crate::select::{Selection, select_collections};
use crate::worker::{WorkerContext, WorkerTally, run_workers};
use exn::ResultExt;
use gfs2s3_source::SourceHandle;
use gfs2s3_storage::BackendHandle;
use std::sync::Arc;
use tokio::sync::mpsc;

#[derive(Debug, Clone)]
pub struct MigrateOptions {
    /// Concurrent uploads per collection; `0` is treated as `1`.
    pub workers: usize,
    /// Only migrate collections whose name starts with this.
    pub prefix: Option<String>,
}

impl Default for MigrateOptions {
    fn default() -> Self {
        Self { workers: 1, prefix: None }
    }
}

/// Outcome of migrating one file store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionReport {
    pub collection: String,
    pub namespace: String,
    /// File count reported by the source before migration; `0` if counting
    /// failed.
    pub total: u64,
    /// Records handed out to workers.
    pub delivered: u64,
    pub tally: WorkerTally,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MigrationReport {
    pub collections: Vec<CollectionReport>,
}

impl MigrationReport {
    /// Tallies of every collection added together.
    pub fn totals(&self) -> WorkerTally {
        let mut totals = WorkerTally::default();
        for collection in &self.collections {
            totals += collection.tally;
        }
        totals
    }
}

/// Migrates every selected file store of a source into a destination.
///
/// # Examples
///
/// ```no_run
/// use gfs2s3_migrate::{MigrateOptions, Migrator};
/// # use gfs2s3_source::SourceHandle;
/// # use gfs2s3_storage::BackendHandle;
/// # async fn example(source: SourceHandle, store: BackendHandle) -> gfs2s3_migrate::error::Result<()> {
/// let options = MigrateOptions { workers: 8, prefix: Some("images".to_string()) };
/// let report = Migrator::new(source, store, options).run().await?;
/// println!("{} files failed", report.totals().failed);
/// # Ok(())
/// # }
/// ```
pub struct Migrator {
    options: MigrateOptions,
    source: SourceHandle,
    store: BackendHandle,
    sink: Arc<dyn ProgressSink>,
}

impl Migrator {
    pub fn new(source: SourceHandle, store: BackendHandle, options: MigrateOptions) -> Self {
        Self { options, source, store, sink: Arc::new(LogSink) }
    }

    /// Send progress lines somewhere other than the log.
    pub fn with_sink(mut self, sink: Arc<dyn ProgressSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Run the migration to completion.
    ///
    /// Failing to index the destination, list the source, or enumerate a
    /// file store stops the run. Files that fail to upload are logged,
    /// counted in the report, and otherwise ignored.
    pub async fn run(&self) -> Result<MigrationReport> {
        let index = Arc::new(DestinationIndex::build(&self.store).await?);
        let names = self.source.collection_names().await.or_raise(|| ErrorKind::Collections)?;
        let selections = select_collections(names, self.options.prefix.as_deref());
        tracing::info!(
            source = self.source.name(),
            destination = self.store.name(),
            collections = selections.len(),
            "starting migration"
        );

        let mut report = MigrationReport::default();
        // Strictly one file store at a time.
        for selection in selections {
            report.collections.push(self.migrate_collection(selection, &index).await?);
        }
        Ok(report)
    }

    async fn migrate_collection(&self, selection: Selection, index: &Arc<DestinationIndex>) -> Result<CollectionReport> {
        let Selection { collection, namespace } = selection;
        let stream = self.source.open(&namespace).await.or_raise(|| ErrorKind::Cursor(namespace.clone()))?;
        let cursor = Arc::new(SourceCursor::new(namespace.as_str(), stream));
        let total = match self.source.count(&namespace).await {
            Ok(total) => total,
            Err(err) => {
                tracing::warn!(%namespace, retryable = err.is_retryable(), error = ?err, "could not count files, reporting 0");
                0
            },
        };
        tracing::info!(%collection, %namespace, total, "migrating file store");

        let workers = self.options.workers.max(1);
        let (progress_tx, progress_rx) = mpsc::channel(workers);
        let aggregator = tokio::spawn(ProgressAggregator::new(namespace.as_str(), total, self.sink.clone()).run(progress_rx));

        let ctx = WorkerContext {
            namespace: Arc::from(namespace.as_str()),
            cursor: cursor.clone(),
            index: index.clone(),
            store: self.store.clone(),
        };
        let tally = run_workers(workers, ctx, progress_tx).await;

        let reported = aggregator.await.or_raise(|| ErrorKind::Progress(namespace.clone()))?;
        let delivered = cursor.close().await?;
        tracing::info!(
            %namespace,
            delivered,
            reported,
            skipped = tally.skipped,
            uploaded = tally.uploaded,
            failed = tally.failed,
            "file store done"
        );
        Ok(CollectionReport { collection, namespace, total, delivered, tally })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::Progress;
    use crate::progress::testing::RecordingSink;
    use gfs2s3_source::backend::MockSource;
    use gfs2s3_storage::backend::MockStore;
    use rstest::rstest;
    use std::ops::Deref;

    fn xyz() -> MockSource {
        MockSource::default().with_store(
            "ns",
            [
                ("x", b"x-content".to_vec(), "text/plain"),
                ("y", b"y-content".to_vec(), "image/png"),
                ("z", b"z-content".to_vec(), ""),
            ],
        )
    }

    fn migrator(source: &Arc<MockSource>, store: &Arc<MockStore>, workers: usize) -> Migrator {
        let source: SourceHandle = source.clone();
        let store: BackendHandle = store.clone();
        Migrator::new(source, store, MigrateOptions { workers, prefix: None })
    }

    #[rstest]
    #[case::single_worker(1)]
    #[case::more_workers_than_files(5)]
    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_migrates_every_file(#[case] workers: usize) {
        let source = Arc::new(xyz());
        let store = Arc::new(MockStore::default());

        let report = migrator(&source, &store, workers).run().await.unwrap();

        assert_eq!(store.keys().await, ["ns/x", "ns/y", "ns/z"]);
        let y = store.get("ns/y").await.unwrap();
        assert_eq!(y.data, b"y-content");
        assert_eq!(y.content_type.as_deref(), Some("image/png"));
        assert_eq!(store.get("ns/z").await.unwrap().content_type, None);
        assert_eq!(
            report.collections,
            [CollectionReport {
                collection: "ns.files".to_string(),
                namespace: "ns".to_string(),
                total: 3,
                delivered: 3,
                tally: WorkerTally { skipped: 0, uploaded: 3, failed: 0 },
            }]
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_existing_object_skipped_unread() {
        let source = Arc::new(xyz());
        let store = Arc::new(MockStore::with_objects([("ns/x", b"old".to_vec())]));

        let report = migrator(&source, &store, 2).run().await.unwrap();

        assert_eq!(store.put_count(), 2);
        assert_eq!(store.get("ns/x").await.unwrap().data, b"old");
        assert!(!source.was_read("ns", "x"));
        assert!(source.was_read("ns", "y"));
        assert_eq!(report.totals(), WorkerTally { skipped: 1, uploaded: 2, failed: 0 });
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_failed_upload_does_not_stop_run() {
        let source = Arc::new(xyz());
        let store = Arc::new(MockStore::default().failing_on(["ns/y"]));

        let report = migrator(&source, &store, 1).run().await.unwrap();

        assert_eq!(store.keys().await, ["ns/x", "ns/z"]);
        assert_eq!(report.totals(), WorkerTally { skipped: 0, uploaded: 2, failed: 1 });
    }

    #[tokio::test]
    async fn test_second_run_uploads_nothing() {
        let source = Arc::new(xyz());
        let store = Arc::new(MockStore::default());

        migrator(&source, &store, 1).run().await.unwrap();
        let report = migrator(&source, &store, 1).run().await.unwrap();

        assert_eq!(store.put_count(), 3);
        assert_eq!(report.totals(), WorkerTally { skipped: 3, uploaded: 0, failed: 0 });
    }

    #[tokio::test]
    async fn test_unnamed_file_fails_alone() {
        let source = Arc::new(MockSource::default().with_store("ns", [("", b"?".to_vec(), ""), ("ok", b"!".to_vec(), "")]));
        let store = Arc::new(MockStore::default());

        let report = migrator(&source, &store, 1).run().await.unwrap();

        assert_eq!(store.keys().await, ["ns/ok"]);
        assert_eq!(report.totals(), WorkerTally { skipped: 0, uploaded: 1, failed: 1 });
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_one_final_progress_line_per_collection() {
        let files = |n: usize| (0..n).map(|i| (format!("f{i}"), Vec::new(), "")).collect::<Vec<_>>();
        let source = Arc::new(MockSource::default().with_store("a", files(1200)).with_store("b", files(30)));
        let store = Arc::new(MockStore::default());
        let sink = Arc::new(RecordingSink::default());

        migrator(&source, &store, 1).with_sink(sink.clone()).run().await.unwrap();

        let finished: Vec<_> = sink.lines().into_iter().filter(|line| matches!(line, Progress::Finished { .. })).collect();
        assert_eq!(
            finished,
            [
                Progress::Finished { namespace: "a".to_string(), total: 1200 },
                Progress::Finished { namespace: "b".to_string(), total: 30 },
            ]
        );
        assert!(sink.lines().contains(&Progress::Milestone { namespace: "a".to_string(), migrated: 1000, total: 1200 }));
    }

    #[tokio::test]
    async fn test_count_failure_reports_zero_and_continues() {
        let source = Arc::new(xyz().failing_count("ns"));
        let store = Arc::new(MockStore::default());
        let sink = Arc::new(RecordingSink::default());

        let report = migrator(&source, &store, 1).with_sink(sink.clone()).run().await.unwrap();

        assert_eq!(store.keys().await, ["ns/x", "ns/y", "ns/z"]);
        assert_eq!(report.collections[0].total, 0);
        assert_eq!(report.collections[0].delivered, 3);
        assert_eq!(sink.lines(), [Progress::Finished { namespace: "ns".to_string(), total: 0 }]);
    }

    #[tokio::test]
    async fn test_collections_in_order_with_prefix() {
        let source = Arc::new(
            MockSource::default()
                .with_store("img-b", [("1", Vec::new(), "")])
                .with_store("docs", [("2", Vec::new(), "")])
                .with_store("img-a", [("3", Vec::new(), "")]),
        );
        let store = Arc::new(MockStore::default());
        let options = MigrateOptions { workers: 1, prefix: Some("img".to_string()) };

        let report = Migrator::new(source.clone(), store.clone(), options).run().await.unwrap();

        assert_eq!(source.opened(), ["img-a", "img-b"]);
        assert_eq!(store.keys().await, ["img-a/3", "img-b/1"]);
        assert_eq!(report.collections.len(), 2);
    }

    #[tokio::test]
    async fn test_destination_listing_failure_is_fatal() {
        let source = Arc::new(xyz());
        let store = Arc::new(MockStore::default().failing_listing());

        let err = migrator(&source, &store, 1).run().await.unwrap_err();

        assert!(matches!(err.deref(), ErrorKind::Index));
        assert!(source.opened().is_empty());
        assert_eq!(store.put_count(), 0);
    }

    #[tokio::test]
    async fn test_collection_listing_failure_is_fatal() {
        let source = Arc::new(xyz().failing_listing());
        let store = Arc::new(MockStore::default());

        let err = migrator(&source, &store, 1).run().await.unwrap_err();
        assert!(matches!(err.deref(), ErrorKind::Collections));
    }

    #[tokio::test]
    async fn test_enumeration_failure_is_fatal() {
        let source = Arc::new(xyz().with_store("zz", [("late", Vec::new(), "")]).failing_after("ns", 1));
        let store = Arc::new(MockStore::default());

        let err = migrator(&source, &store, 1).run().await.unwrap_err();

        assert!(matches!(err.deref(), ErrorKind::CursorClose(ns) if ns == "ns"));
        assert_eq!(store.keys().await, ["ns/x"]);
        assert_eq!(source.opened(), ["ns"]);
    }
}
