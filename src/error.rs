use derive_more::{Display, Error};

pub type Error = exn::Exn<ErrorKind>;
pub type Result<T> = std::result::Result<T, Error>;

/// The stage of the run that failed. All of them end the process.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    #[display("invalid configuration")]
    Config,
    #[display("could not set up the destination bucket")]
    Destination,
    #[display("could not connect to the source database")]
    Source,
    #[display("migration aborted")]
    Migrate,
}
