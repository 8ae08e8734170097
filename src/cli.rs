use clap::{ArgAction, Parser};
use gfs2s3_config::Overrides;
use std::path::PathBuf;

/// Copy every GridFS file store of a MongoDB database into an S3 bucket.
///
/// Files are written to `<store>/<filename>`; keys that already exist in the
/// bucket are left alone, so an interrupted run can simply be started again.
/// Any setting can also come from a configuration file or a `GFS2S3_`
/// environment variable (e.g. `GFS2S3_DESTINATION__BUCKET`).
#[derive(Debug, Parser)]
#[command(name = "gfs2s3", version)]
pub struct Cli {
    /// S3 access key
    #[arg(short = 'k', long, value_name = "KEY")]
    pub access_key: Option<String>,

    /// S3 secret key
    #[arg(short = 's', long, value_name = "SECRET")]
    pub secret_key: Option<String>,

    /// AWS region [default: us-east-1]
    #[arg(short = 'r', long)]
    pub region: Option<String>,

    /// Destination bucket
    #[arg(short = 'b', long)]
    pub bucket: Option<String>,

    /// S3-compatible endpoint URL; any region name is accepted with it
    #[arg(long, value_name = "URL")]
    pub endpoint: Option<String>,

    /// Key prefix inside the bucket
    #[arg(long, value_name = "PREFIX")]
    pub dest_prefix: Option<String>,

    /// MongoDB connection string [default: mongodb://localhost]
    #[arg(short = 'H', long, value_name = "URL")]
    pub source_url: Option<String>,

    /// Database holding the file stores
    #[arg(short = 'd', long)]
    pub database: Option<String>,

    /// Only migrate collections whose name starts with this
    #[arg(short = 'c', long, value_name = "PREFIX")]
    pub collection: Option<String>,

    /// Concurrent uploads per file store [default: 1]
    #[arg(short = 'w', long, value_name = "NUM")]
    pub workers: Option<usize>,

    /// Configuration file (TOML, YAML or JSON)
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// More logging; repeat for even more
    #[arg(short = 'v', long, action = ArgAction::Count)]
    pub verbose: u8,
}

impl Cli {
    pub fn overrides(&self) -> Overrides {
        Overrides {
            access_key: self.access_key.clone(),
            secret_key: self.secret_key.clone(),
            region: self.region.clone(),
            bucket: self.bucket.clone(),
            endpoint: self.endpoint.clone(),
            dest_prefix: self.dest_prefix.clone(),
            source_url: self.source_url.clone(),
            database: self.database.clone(),
            collection_prefix: self.collection.clone(),
            workers: self.workers,
        }
    }

    /// Default log filter when `RUST_LOG` isn't set.
    pub fn log_level(&self) -> &'static str {
        match self.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    }
}
