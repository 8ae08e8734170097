use derive_more::Display;
use std::sync::Arc;
use tokio::sync::mpsc;

/// A progress line is emitted each time the running count of a file store
/// crosses a multiple of this.
pub const REPORT_INTERVAL: u64 = 1000;

#[derive(Debug, Clone, PartialEq, Eq, Display)]
pub enum Progress {
    #[display("Migrated {migrated} / {total} files for {namespace}")]
    Milestone { namespace: String, migrated: u64, total: u64 },
    /// Emitted once per file store when its workers have all finished.
    ///
    /// Reports the full total as migrated, whether or not every file was.
    #[display("Migrated {total} / {total} files for {namespace}")]
    Finished { namespace: String, total: u64 },
}

/// Where progress lines go.
pub trait ProgressSink: Send + Sync {
    fn report(&self, progress: &Progress);
}

/// Sends progress lines to the `tracing` subscriber.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl ProgressSink for LogSink {
    fn report(&self, progress: &Progress) {
        tracing::info!("{progress}");
    }
}

/// Sums the batched counts sent by workers for one file store.
pub struct ProgressAggregator {
    namespace: String,
    total: u64,
    sink: Arc<dyn ProgressSink>,
}

impl ProgressAggregator {
    pub fn new(namespace: impl Into<String>, total: u64, sink: Arc<dyn ProgressSink>) -> Self {
        Self { namespace: namespace.into(), total, sink }
    }

    /// Receive until every sender is dropped, then report the file store as
    /// finished. Returns the sum of everything received.
    pub async fn run(self, mut counts: mpsc::Receiver<u64>) -> u64 {
        let mut migrated = 0u64;
        while let Some(count) = counts.recv().await {
            let before = migrated / REPORT_INTERVAL;
            migrated = migrated.saturating_add(count);
            if migrated / REPORT_INTERVAL > before {
                self.sink.report(&Progress::Milestone {
                    namespace: self.namespace.clone(),
                    migrated,
                    total: self.total,
                });
            }
        }
        self.sink.report(&Progress::Finished { namespace: self.namespace, total: self.total });
        migrated
    }
}
