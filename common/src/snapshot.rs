use crate::{Error, Result};
use chrono::NaiveDate;
use std::fmt;
use std::path::{Path, PathBuf};

pub const DEFAULT_SOURCE: &str = "insideairbnb";

/// The two datasets published for every snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Listings,
    Reviews,
}

impl Role {
    pub const ALL: [Role; 2] = [Role::Listings, Role::Reviews];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Listings => "listings",
            Role::Reviews => "reviews",
        }
    }

    pub fn file_name(&self) -> String {
        format!("{}.csv.gz", self.as_str())
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity of one dated pull of the source for one city. Every artifact of
/// the snapshot lives under `source=<source>/city=<city>/snapshot_date=<date>`
/// both on disk and in the bucket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    source: String,
    city: String,
    snapshot_date: NaiveDate,
}

impl Snapshot {
    pub fn new(source: &str, city: &str, snapshot_date: NaiveDate) -> Result<Self> {
        validate_segment("source", source)?;
        validate_segment("city", city)?;

        Ok(Self {
            source: source.to_string(),
            city: city.to_string(),
            snapshot_date,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn city(&self) -> &str {
        &self.city
    }

    pub fn snapshot_date(&self) -> NaiveDate {
        self.snapshot_date
    }

    pub fn date_string(&self) -> String {
        self.snapshot_date.format("%Y-%m-%d").to_string()
    }

    pub fn partition_path(&self) -> String {
        format!(
            "source={}/city={}/snapshot_date={}",
            self.source,
            self.city,
            self.date_string()
        )
    }

    pub fn local_dir(&self, base_dir: &Path) -> PathBuf {
        base_dir
            .join(format!("source={}", self.source))
            .join(format!("city={}", self.city))
            .join(format!("snapshot_date={}", self.date_string()))
    }

    pub fn raw_file(&self, base_dir: &Path, role: Role) -> PathBuf {
        self.local_dir(base_dir).join(role.file_name())
    }

    /// Object key prefix for the snapshot under a lake layer such as `raw`.
    pub fn object_prefix(&self, layer: &str) -> String {
        let layer = layer.trim_matches('/');
        if layer.is_empty() {
            self.partition_path()
        } else {
            format!("{}/{}", layer, self.partition_path())
        }
    }
}

fn validate_segment(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(Error::InvalidInput(format!("{} must not be empty", field)));
    }
    if value.contains('/') || value.contains('\\') || value == "." || value == ".." {
        return Err(Error::InvalidInput(format!(
            "{} '{}' cannot be used as a path segment",
            field, value
        )));
    }
    Ok(())
}
