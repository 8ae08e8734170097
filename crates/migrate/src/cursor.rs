use crate::error::{ErrorKind, Result};
use futures::StreamExt;
use gfs2s3_source::error::Error as SourceError;
use gfs2s3_source::{FileRecord, FileStream};
use tokio::sync::Mutex;

struct State {
    /// `None` once the stream has ended, failed, or been closed.
    stream: Option<FileStream>,
    error: Option<SourceError>,
    delivered: u64,
}

/// A file store enumeration shared by every worker of a pool.
///
/// Pulls are serialised, so each record is handed to exactly one worker.
/// The end of the stream is sticky, and so is an enumeration error: after
/// either, every worker gets `None`. The error itself surfaces from
/// [`close()`](Self::close).
pub struct SourceCursor {
    namespace: String,
    state: Mutex<State>,
}

impl SourceCursor {
    pub fn new(namespace: impl Into<String>, stream: FileStream) -> Self {
        Self {
            namespace: namespace.into(),
            state: Mutex::new(State { stream: Some(stream), error: None, delivered: 0 }),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Take the next record, or `None` when there are no more to hand out.
    pub async fn pull_next(&self) -> Option<FileRecord> {
        let mut guard = self.state.lock().await;
        let state = &mut *guard;
        let stream = state.stream.as_mut()?;
        match stream.next().await {
            Some(Ok(record)) => {
                state.delivered += 1;
                Some(record)
            },
            Some(Err(err)) => {
                tracing::warn!(
                    namespace = %self.namespace,
                    retryable = err.is_retryable(),
                    error = ?err,
                    "file store enumeration failed"
                );
                state.stream = None;
                state.error = Some(err);
                None
            },
            None => {
                state.stream = None;
                None
            },
        }
    }

    /// Release the enumeration, returning how many records were handed out.
    ///
    /// Fails if enumeration stopped because of an error rather than reaching
    /// the end of the file store.
    pub async fn close(&self) -> Result<u64> {
        let mut state = self.state.lock().await;
        state.stream = None;
        match state.error.take() {
            Some(err) => Err(err.raise(ErrorKind::CursorClose(self.namespace.clone()))),
            None => Ok(state.delivered),
        }
    }
}
