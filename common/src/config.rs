use crate::snapshot::{DEFAULT_SOURCE, Snapshot};
use crate::{Error, Result};
use chrono::NaiveDate;
use config::{Config, ConfigError, Environment};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::PathBuf;
use tracing::debug;

/// Prefix shared by every environment variable the pipeline reads,
/// e.g. `AIRBNB_CITY` or `AIRBNB_S3_BUCKET`.
pub const ENV_PREFIX: &str = "AIRBNB";

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    #[serde(default = "default_source")]
    pub source: String,
    #[serde(default = "default_city")]
    pub city: String,
    #[serde(default = "default_snapshot_date")]
    pub snapshot_date: NaiveDate,
    #[serde(default = "default_base_dir")]
    pub base_dir: PathBuf,
    #[serde(default = "default_timeout_sec")]
    pub timeout_sec: u64,
    #[serde(default = "default_source_url")]
    pub source_url: String,
    #[serde(default = "default_source_region")]
    pub source_region: String,
    #[serde(default)]
    pub s3_bucket: Option<String>,
    #[serde(default)]
    pub s3_prefix: Option<String>,
    #[serde(default)]
    pub local_root: Option<PathBuf>,
    #[serde(default)]
    pub s3_endpoint: Option<String>,
    #[serde(default)]
    pub s3_region: Option<String>,
}

fn default_source() -> String {
    DEFAULT_SOURCE.to_string()
}

fn default_city() -> String {
    "london".to_string()
}

fn default_snapshot_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 9, 14).unwrap_or_default()
}

fn default_base_dir() -> PathBuf {
    PathBuf::from("data/raw")
}

fn default_timeout_sec() -> u64 {
    180
}

fn default_source_url() -> String {
    "https://data.insideairbnb.com".to_string()
}

fn default_source_region() -> String {
    "united-kingdom/england".to_string()
}

impl Settings {
    /// Loads settings from an optional config file, overridden by `AIRBNB_*`
    /// environment variables.
    pub fn new(path: Option<&str>) -> std::result::Result<Self, ConfigError> {
        Self::build(path, Environment::with_prefix(ENV_PREFIX))
    }

    /// Same as [`Settings::new`] but reads variables from `vars` instead of
    /// the process environment.
    pub fn from_vars(vars: HashMap<String, String>) -> std::result::Result<Self, ConfigError> {
        Self::build(None, Environment::with_prefix(ENV_PREFIX).source(Some(vars)))
    }

    fn build(path: Option<&str>, env: Environment) -> std::result::Result<Self, ConfigError> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path));
        }

        let config = builder.add_source(env).build()?;
        let settings: Settings = config.try_deserialize()?;

        debug!(
            city = %settings.city,
            snapshot_date = %settings.snapshot_date,
            base_dir = %settings.base_dir.display(),
            "Loaded settings"
        );

        Ok(settings)
    }

    pub fn snapshot(&self) -> Result<Snapshot> {
        Snapshot::new(&self.source, &self.city, self.snapshot_date)
    }

    /// Bucket for uploads; absent or blank is a configuration error.
    pub fn upload_bucket(&self) -> Result<&str> {
        match self.s3_bucket.as_deref().map(str::trim) {
            Some(bucket) if !bucket.is_empty() => Ok(bucket),
            _ => Err(Error::MissingConfig(format!(
                "set {}_S3_BUCKET (e.g. export {}_S3_BUCKET='my-airbnb-datalake')",
                ENV_PREFIX, ENV_PREFIX
            ))),
        }
    }

    /// Local directory the uploader walks, defaulting to the snapshot's raw
    /// partition under `base_dir`.
    pub fn upload_root(&self) -> Result<PathBuf> {
        match &self.local_root {
            Some(root) => Ok(root.clone()),
            None => Ok(self.snapshot()?.local_dir(&self.base_dir)),
        }
    }

    /// Key prefix mirroring the local layout under `raw/` in the bucket.
    pub fn upload_prefix(&self) -> Result<String> {
        match &self.s3_prefix {
            Some(prefix) => Ok(prefix.clone()),
            None => Ok(self.snapshot()?.object_prefix("raw")),
        }
    }
}
