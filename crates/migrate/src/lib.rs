//! Migration engine: moves every file of every selected GridFS file store
//! into an object store, skipping keys the destination already holds.
//!
//! One collection is migrated at a time. Within a collection a fixed pool of
//! workers pulls records from a shared [`SourceCursor`], and a single
//! [`ProgressAggregator`] turns their batched counts into progress lines.

mod cursor;
mod engine;
pub mod error;
mod index;
mod progress;
mod select;
mod worker;

pub use crate::cursor::SourceCursor;
pub use crate::engine::{CollectionReport, MigrateOptions, MigrationReport, Migrator};
pub use crate::index::DestinationIndex;
pub use crate::progress::{LogSink, Progress, ProgressAggregator, ProgressSink, REPORT_INTERVAL};
pub use crate::select::{Selection, select_collections};
pub use crate::worker::{BATCH_SIZE, WorkerContext, WorkerTally, object_key, run_workers};
