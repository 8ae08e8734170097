mod cli;
mod error;
mod progress;

use crate::cli::Cli;
use crate::error::{ErrorKind, Result};
use crate::progress::StdoutSink;
use clap::Parser;
use exn::ResultExt;
use gfs2s3_config::Config;
use gfs2s3_migrate::{MigrateOptions, MigrationReport, Migrator};
use gfs2s3_source::backend::MongoSource;
use gfs2s3_storage::backend::S3Backend;
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(cli.log_level())))
        .with_writer(std::io::stderr)
        .init();

    match run(&cli).await {
        Ok(report) => {
            let totals = report.totals();
            tracing::info!(
                collections = report.collections.len(),
                skipped = totals.skipped,
                uploaded = totals.uploaded,
                failed = totals.failed,
                "migration complete"
            );
            ExitCode::SUCCESS
        },
        Err(err) => {
            eprintln!("{err:?}");
            ExitCode::FAILURE
        },
    }
}

async fn run(cli: &Cli) -> Result<MigrationReport> {
    let config = Config::load(cli.config.as_deref(), &cli.overrides()).or_raise(|| ErrorKind::Config)?;
    let destination = &config.destination;
    let store = S3Backend::new(
        "s3",
        &destination.bucket,
        destination.prefix.clone(),
        &destination.region,
        destination.endpoint.as_deref(),
        &destination.access_key,
        &destination.secret_key,
    )
    .or_raise(|| ErrorKind::Destination)?;
    let source = MongoSource::connect(&config.source.url, &config.source.database)
        .await
        .or_raise(|| ErrorKind::Source)?;

    let options = MigrateOptions {
        workers: config.workers,
        prefix: config.collection_prefix().map(str::to_string),
    };
    Migrator::new(Arc::new(source), Arc::new(store), options)
        .with_sink(Arc::new(StdoutSink))
        .run()
        .await
        .or_raise(|| ErrorKind::Migrate)
}
