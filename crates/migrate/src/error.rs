//! Migration Error Types
//!
//! Every variant here is fatal to a run. Failures of individual files are
//! logged and counted by the workers instead of being raised.

use derive_more::{Display, Error};

/// A migration error with automatic location tracking via [`exn::Exn`].
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for migration operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Classifies the stage of a migration that failed.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// Listing the destination to build the index failed.
    #[display("could not index destination")]
    Index,
    /// Listing the source collections failed.
    #[display("could not list source collections")]
    Collections,
    /// Opening the enumeration of a file store failed.
    #[display("could not open file store {_0:?}")]
    Cursor(#[error(not(source))] String),
    /// Enumeration of a file store ended with an error.
    #[display("file store {_0:?} was not fully enumerated")]
    CursorClose(#[error(not(source))] String),
    /// The progress aggregator for a file store died.
    #[display("progress reporting for {_0:?} failed")]
    Progress(#[error(not(source))] String),
}
