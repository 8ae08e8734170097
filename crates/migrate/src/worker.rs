use crate::cursor::SourceCursor;
use crate::index::DestinationIndex;
use gfs2s3_storage::{BackendHandle, Upload};
use std::ops::AddAssign;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinSet;

/// Each worker reports progress in increments of this many completed files.
pub const BATCH_SIZE: u64 = 100;

/// What a worker (or a whole pool) did with the records it pulled.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct WorkerTally {
    /// Already present in the destination
    pub skipped: u64,
    pub uploaded: u64,
    /// Upload attempted and failed; not retried
    pub failed: u64,
}

impl WorkerTally {
    /// Files that count towards progress: skipped or uploaded.
    pub fn completed(&self) -> u64 {
        self.skipped + self.uploaded
    }
}

impl AddAssign for WorkerTally {
    fn add_assign(&mut self, other: Self) {
        self.skipped += other.skipped;
        self.uploaded += other.uploaded;
        self.failed += other.failed;
    }
}

/// Everything a worker shares with the rest of its pool.
#[derive(Clone)]
pub struct WorkerContext {
    pub namespace: Arc<str>,
    pub cursor: Arc<SourceCursor>,
    pub index: Arc<DestinationIndex>,
    pub store: BackendHandle,
}

/// Destination key of a file: `<namespace>/<name>`.
pub fn object_key(namespace: &str, name: &str) -> String {
    format!("{namespace}/{name}")
}

/// Run `workers` workers until the cursor is drained, returning once every
/// one of them has exited.
///
/// `progress` is dropped along with the workers' clones of it, so the
/// receiving end sees the channel close when the pool is done.
pub async fn run_workers(workers: usize, ctx: WorkerContext, progress: mpsc::Sender<u64>) -> WorkerTally {
    let mut set = JoinSet::new();
    for id in 0..workers {
        set.spawn(worker(id, ctx.clone(), progress.clone()));
    }
    drop(progress);

    let mut tally = WorkerTally::default();
    while let Some(result) = set.join_next().await {
        match result {
            Ok(worker_tally) => tally += worker_tally,
            Err(err) => tracing::error!(namespace = %ctx.namespace, error = %err, "worker task failed"),
        }
    }
    tally
}

async fn worker(id: usize, ctx: WorkerContext, progress: mpsc::Sender<u64>) -> WorkerTally {
    let mut tally = WorkerTally::default();
    while let Some(record) = ctx.cursor.pull_next().await {
        let key = object_key(&ctx.namespace, &record.name);
        if ctx.index.contains(&key) {
            // Dropping the record unread leaves its content untouched.
            tracing::info!(worker = id, %key, "skipping, already in destination");
            tally.skipped += 1;
        } else {
            tracing::info!(worker = id, %key, size = record.size, "uploading");
            let upload = Upload { body: record.body, size: record.size, content_type: record.content_type };
            match ctx.store.put(&key, upload).await {
                Ok(()) => tally.uploaded += 1,
                Err(err) => {
                    tracing::error!(
                        worker = id,
                        %key,
                        retryable = err.is_retryable(),
                        error = ?err,
                        "upload failed"
                    );
                    tally.failed += 1;
                    continue;
                },
            }
        }
        if tally.completed() % BATCH_SIZE == 0 && progress.send(BATCH_SIZE).await.is_err() {
            tracing::warn!(worker = id, namespace = %ctx.namespace, "progress receiver has gone away");
        }
    }
    tracing::debug!(worker = id, namespace = %ctx.namespace, ?tally, "worker finished");
    tally
}

#[cfg(test)]
mod tests {
    use super::*;
    use gfs2s3_source::SourceDatabase;
    use gfs2s3_source::backend::MockSource;
    use gfs2s3_storage::backend::MockStore;

    async fn context(source: &MockSource, store: BackendHandle, index: DestinationIndex) -> WorkerContext {
        WorkerContext {
            namespace: Arc::from("ns"),
            cursor: Arc::new(SourceCursor::new("ns", source.open("ns").await.unwrap())),
            index: Arc::new(index),
            store,
        }
    }

    async fn drain(mut rx: mpsc::Receiver<u64>) -> Vec<u64> {
        let mut received = Vec::new();
        while let Some(count) = rx.recv().await {
            received.push(count);
        }
        received
    }

    #[test]
    fn test_object_key() {
        assert_eq!(object_key("images", "cat.png"), "images/cat.png");
        assert_eq!(object_key("images", "a/b.png"), "images/a/b.png");
    }

    #[test]
    fn test_tally_sum() {
        let mut tally = WorkerTally { skipped: 1, uploaded: 2, failed: 3 };
        tally += WorkerTally { skipped: 10, uploaded: 20, failed: 30 };
        assert_eq!(tally, WorkerTally { skipped: 11, uploaded: 22, failed: 33 });
        assert_eq!(tally.completed(), 33);
    }

    #[tokio::test]
    async fn test_skip_and_upload() {
        let source = MockSource::default()
            .with_store("ns", [("x", b"xx".to_vec(), "text/plain"), ("y", b"yyy".to_vec(), "")]);
        let mock = Arc::new(MockStore::default());
        let store: BackendHandle = mock.clone();
        let ctx = context(&source, store, DestinationIndex::from_iter(["ns/x"])).await;
        let (tx, rx) = mpsc::channel(1);
        let received = tokio::spawn(drain(rx));

        let tally = run_workers(1, ctx, tx).await;
        assert_eq!(tally, WorkerTally { skipped: 1, uploaded: 1, failed: 0 });
        assert_eq!(mock.keys().await, ["ns/y"]);
        assert!(!source.was_read("ns", "x"));
        assert!(received.await.unwrap().is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_batches_sent_per_worker() {
        let files = (0..250).map(|i| (format!("f{i}"), Vec::new(), ""));
        let source = MockSource::default().with_store("ns", files);
        let store: BackendHandle = Arc::new(MockStore::default());
        let ctx = context(&source, store, DestinationIndex::default()).await;
        let (tx, rx) = mpsc::channel(1);
        let received = tokio::spawn(drain(rx));

        let tally = run_workers(1, ctx, tx).await;
        assert_eq!(tally.uploaded, 250);
        assert_eq!(received.await.unwrap(), [BATCH_SIZE, BATCH_SIZE]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_skips_count_towards_progress() {
        let files = (0..150).map(|i| (format!("f{i}"), vec![1u8], ""));
        let source = MockSource::default().with_store("ns", files);
        let mock = Arc::new(MockStore::default());
        let store: BackendHandle = mock.clone();
        let index = DestinationIndex::from_iter((0..60).map(|i| format!("ns/f{i}")));
        let ctx = context(&source, store, index).await;
        let (tx, rx) = mpsc::channel(1);
        let received = tokio::spawn(drain(rx));

        let tally = run_workers(1, ctx, tx).await;
        assert_eq!(tally, WorkerTally { skipped: 60, uploaded: 90, failed: 0 });
        assert_eq!(mock.put_count(), 90);
        assert_eq!(received.await.unwrap(), [BATCH_SIZE]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_failures_do_not_count_towards_progress() {
        let files = (0..100).map(|i| (format!("f{i}"), Vec::new(), ""));
        let source = MockSource::default().with_store("ns", files);
        let mock = Arc::new(MockStore::default().failing_on(["ns/f7"]));
        let store: BackendHandle = mock.clone();
        let ctx = context(&source, store, DestinationIndex::default()).await;
        let (tx, rx) = mpsc::channel(1);
        let received = tokio::spawn(drain(rx));

        let tally = run_workers(1, ctx, tx).await;
        assert_eq!(tally, WorkerTally { skipped: 0, uploaded: 99, failed: 1 });
        assert_eq!(mock.put_count(), 100);
        assert!(received.await.unwrap().is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_pool_uploads_everything_once() {
        let files = (0..300).map(|i| (format!("f{i}"), vec![1u8; 3], ""));
        let source = MockSource::default().with_store("ns", files);
        let mock = Arc::new(MockStore::default());
        let store: BackendHandle = mock.clone();
        let ctx = context(&source, store, DestinationIndex::default()).await;
        let (tx, rx) = mpsc::channel(8);
        let received = tokio::spawn(drain(rx));

        let tally = run_workers(8, ctx, tx).await;
        assert_eq!(tally, WorkerTally { skipped: 0, uploaded: 300, failed: 0 });
        assert_eq!(mock.put_count(), 300);
        assert_eq!(mock.keys().await.len(), 300);
        let batches = received.await.unwrap();
        assert!(batches.iter().all(|count| *count == BATCH_SIZE));
        assert!(batches.len() <= 3);
    }
}
