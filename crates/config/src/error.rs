//! Configuration Error Types

use derive_more::{Display, Error};

/// A configuration error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// Configuration file extension is not one of `toml`, `yaml`, `yml` or `json`
    #[display("unsupported configuration file format: {_0:?}")]
    UnsupportedFormat(#[error(not(source))] String),
    /// A provider failed, or the merged values don't fit [`Config`](crate::Config)
    #[display("could not load configuration")]
    Load,
    #[display("missing required setting: {_0}")]
    Missing(#[error(not(source))] &'static str),
    #[display("invalid region name: {_0:?}")]
    InvalidRegion(#[error(not(source))] String),
    #[display("worker count must be at least 1, got {_0}")]
    InvalidWorkers(#[error(not(source))] usize),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_kind_display() {
        assert_eq!(ErrorKind::Missing("destination.bucket").to_string(), "missing required setting: destination.bucket");
        assert_eq!(ErrorKind::InvalidRegion("mars-1".to_string()).to_string(), "invalid region name: \"mars-1\"");
        assert_eq!(ErrorKind::InvalidWorkers(0).to_string(), "worker count must be at least 1, got 0");
    }
}
