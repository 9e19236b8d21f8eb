use arrow::error::ArrowError;
use aws_sdk_s3::primitives::ByteStreamError;
use datafusion::error::DataFusionError;
use std::path::PathBuf;
use thiserror::Error;
use url::ParseError;

pub mod config;
pub mod logging;
pub mod snapshot;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Request to {url} was rejected with HTTP status {status}")]
    HttpStatus { url: String, status: u16 },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Integrity check failed for {}: {source}", path.display())]
    Integrity {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Configuration error: {0}")]
    Config(#[from] ::config::ConfigError),

    #[error("Missing required configuration: {0}")]
    MissingConfig(String),

    #[error("Local folder not found: {}", .0.display())]
    LocalRootNotFound(PathBuf),

    #[error("Upload failed for {} -> {target}: {source}", path.display())]
    Upload {
        path: PathBuf,
        target: String,
        #[source]
        source: Box<Error>,
    },

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("ByteStream error: {0}")]
    ByteStream(#[from] ByteStreamError),

    #[error("Object store error: {0}")]
    ObjectStore(#[from] object_store::Error),

    #[error("Arrow error: {0}")]
    Arrow(#[from] ArrowError),

    #[error("DataFusion error: {0}")]
    DataFusion(#[from] DataFusionError),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Input not found: {0}")]
    InputNotFound(String),

    #[error("Input format error: {0}")]
    InputFormat(String),

    #[error("Output location already contains data: {0}")]
    OutputExists(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Invalid Uri: {0}")]
    InvalidUri(String),
}

impl From<ParseError> for Error {
    fn from(err: ParseError) -> Self {
        Error::InvalidUri(format!("URL parse error: {}", err))
    }
}

impl From<object_store::path::Error> for Error {
    fn from(err: object_store::path::Error) -> Self {
        Error::InvalidUri(err.to_string())
    }
}
