//! Source Error Types
//!
//! Structured errors using `exn` for automatic location tracking and error
//! tree construction.

use derive_more::{Display, Error};

/// A source error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for source operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// Could not reach or authenticate against the database
    #[display("connection error: {_0}")]
    Connection(#[error(not(source))] String),
    /// A listing, count or find query failed
    #[display("query failed on {_0}")]
    Query(#[error(not(source))] String),
    /// A file document is missing fields or has fields of the wrong type
    #[display("invalid file document in {_0}: {_1}")]
    InvalidDocument(#[error(not(source))] String, String),
    /// Opening the content of a file failed
    #[display("could not open file {_1:?} in {_0}")]
    Download(#[error(not(source))] String, String),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Connection(_) | Self::Query(_) | Self::Download(_, _))
    }
}
