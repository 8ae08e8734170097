//! Layered configuration for a migration run.
//!
//! Values are merged from, lowest priority first:
//!
//! 1. built-in defaults,
//! 2. the per-user `config.toml` (e.g. `~/.config/gfs2s3/config.toml`),
//! 3. an explicit configuration file (TOML, YAML or JSON by extension),
//! 4. `GFS2S3_` environment variables, with `__` separating nested keys
//!    (`GFS2S3_DESTINATION__BUCKET`),
//! 5. [`Overrides`] from the command line.
//!
//! The merged [`Config`] is checked by [`Config::validate()`] once, then
//! passed around read-only.

pub mod error;
mod region;

use crate::error::{ErrorKind, Result};
use directories::ProjectDirs;
use exn::ResultExt;
use figment::Figment;
use figment::providers::{Env, Format, Json, Serialized, Toml, Yaml};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const ENV_PREFIX: &str = "GFS2S3_";
pub const DEFAULT_REGION: &str = "us-east-1";
pub const DEFAULT_SOURCE_URL: &str = "mongodb://localhost";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub destination: Destination,
    pub source: Source,
    /// Concurrent uploads per collection.
    pub workers: usize,
}

/// The bucket files are written to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Destination {
    pub access_key: String,
    pub secret_key: String,
    pub region: String,
    pub bucket: String,
    /// S3-compatible endpoint; switches to path-style addressing and skips
    /// region validation.
    pub endpoint: Option<String>,
    /// Key prefix inside the bucket.
    pub prefix: Option<String>,
}

/// The database files are read from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Source {
    pub url: String,
    pub database: String,
    /// Only collections whose name starts with this are migrated.
    pub prefix: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            destination: Destination::default(),
            source: Source::default(),
            workers: 1,
        }
    }
}

impl Default for Destination {
    fn default() -> Self {
        Self {
            access_key: String::new(),
            secret_key: String::new(),
            region: DEFAULT_REGION.to_string(),
            bucket: String::new(),
            endpoint: None,
            prefix: None,
        }
    }
}

impl Default for Source {
    fn default() -> Self {
        Self {
            url: DEFAULT_SOURCE_URL.to_string(),
            database: String::new(),
            prefix: None,
        }
    }
}

/// Highest-priority values, typically from command-line flags. `None` leaves
/// the lower layers alone.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub access_key: Option<String>,
    pub secret_key: Option<String>,
    pub region: Option<String>,
    pub bucket: Option<String>,
    pub endpoint: Option<String>,
    pub dest_prefix: Option<String>,
    pub source_url: Option<String>,
    pub database: Option<String>,
    pub collection_prefix: Option<String>,
    pub workers: Option<usize>,
}

impl Overrides {
    fn merge_into(&self, mut figment: Figment) -> Figment {
        let strings = [
            ("destination.access_key", &self.access_key),
            ("destination.secret_key", &self.secret_key),
            ("destination.region", &self.region),
            ("destination.bucket", &self.bucket),
            ("destination.endpoint", &self.endpoint),
            ("destination.prefix", &self.dest_prefix),
            ("source.url", &self.source_url),
            ("source.database", &self.database),
            ("source.prefix", &self.collection_prefix),
        ];
        for (key, value) in strings {
            if let Some(value) = value {
                figment = figment.merge(Serialized::default(key, value));
            }
        }
        if let Some(workers) = self.workers {
            figment = figment.merge(Serialized::default("workers", workers));
        }
        figment
    }
}

/// Location of the per-user configuration file, if the platform has one.
pub fn user_config_path() -> Option<PathBuf> {
    ProjectDirs::from("", "", "gfs2s3").map(|dirs| dirs.config_dir().join("config.toml"))
}

fn file_provider(figment: Figment, path: &Path) -> Result<Figment> {
    let extension = path.extension().and_then(|ext| ext.to_str()).unwrap_or_default();
    let figment = match extension.to_ascii_lowercase().as_str() {
        "toml" => figment.merge(Toml::file_exact(path)),
        "yaml" | "yml" => figment.merge(Yaml::file_exact(path)),
        "json" => figment.merge(Json::file_exact(path)),
        _ => exn::bail!(ErrorKind::UnsupportedFormat(path.display().to_string())),
    };
    Ok(figment)
}

impl Config {
    /// Build the layered provider stack without extracting it.
    pub fn figment(file: Option<&Path>, overrides: &Overrides) -> Result<Figment> {
        let mut figment = Figment::from(Serialized::defaults(Config::default()));
        if let Some(path) = user_config_path() {
            tracing::debug!(path = %path.display(), "layering user configuration");
            figment = figment.merge(Toml::file(path));
        }
        if let Some(path) = file {
            tracing::debug!(path = %path.display(), "layering configuration file");
            figment = file_provider(figment, path)?;
        }
        figment = figment.merge(Env::prefixed(ENV_PREFIX).split("__"));
        Ok(overrides.merge_into(figment))
    }

    /// Load and validate configuration from every layer.
    pub fn load(file: Option<&Path>, overrides: &Overrides) -> Result<Self> {
        let config: Self = Self::figment(file, overrides)?.extract().or_raise(|| ErrorKind::Load)?;
        config.validate()?;
        Ok(config)
    }

    /// Check that a migration can start with these settings.
    pub fn validate(&self) -> Result<()> {
        let required = [
            ("destination.access_key", &self.destination.access_key),
            ("destination.secret_key", &self.destination.secret_key),
            ("destination.bucket", &self.destination.bucket),
            ("source.url", &self.source.url),
            ("source.database", &self.source.database),
        ];
        for (name, value) in required {
            if value.trim().is_empty() {
                exn::bail!(ErrorKind::Missing(name));
            }
        }
        if self.destination.endpoint.is_none() && !region::is_known(&self.destination.region) {
            exn::bail!(ErrorKind::InvalidRegion(self.destination.region.clone()));
        }
        if self.workers == 0 {
            exn::bail!(ErrorKind::InvalidWorkers(self.workers));
        }
        Ok(())
    }

    /// The collection prefix filter, if it would filter anything.
    pub fn collection_prefix(&self) -> Option<&str> {
        self.source.prefix.as_deref().filter(|prefix| !prefix.is_empty())
    }
}
