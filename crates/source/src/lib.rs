//! Source side of a migration: a database holding GridFS-style file stores.
//!
//! A file store named `<namespace>` is made of a `<namespace>.files`
//! collection (one metadata document per file) and a `<namespace>.chunks`
//! collection (the content). [`SourceDatabase`] hides the driver behind
//! enumeration of collection names, counting and streaming of
//! [`FileRecord`]s for one namespace.

pub mod backend;
pub mod error;
mod models;

pub use crate::backend::{FileStream, SourceDatabase};
pub use crate::models::FileRecord;
use std::sync::Arc;

/// Suffix marking the metadata collection of a file store.
pub const FILES_SUFFIX: &str = ".files";

pub type SourceHandle = Arc<dyn SourceDatabase + Send + Sync>;
