use crate::utils::decoded;
use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::config::{ProvideCredentials, Region, SharedCredentialsProvider};
use bytes::Bytes;
use common::config::Settings;
use common::{Error, Result};
use dashmap::DashMap;
use datafusion::execution::context::SessionContext;
use futures::TryStreamExt;
use object_store::aws::{AmazonS3Builder, AwsCredential};
use object_store::path::Path as ObjectPath;
use object_store::{CredentialProvider, ObjectStore};
use std::fmt;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};
use url::Url;

/// What to do when the output location already holds objects.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum WriteMode {
    #[default]
    ErrorIfExists,
    Overwrite,
}

/// A dataset location: a local path or an `s3://bucket/key` URI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Location {
    Local(PathBuf),
    S3 { bucket: String, key: String },
}

impl Location {
    pub fn parse(uri: &str) -> Result<Self> {
        if uri.trim().is_empty() {
            return Err(Error::InvalidInput("location must not be empty".to_string()));
        }

        if uri.starts_with("s3://") {
            let url = Url::parse(uri)?;
            let bucket = url
                .host_str()
                .filter(|b| !b.is_empty())
                .ok_or_else(|| Error::InvalidUri(format!("missing bucket in '{}'", uri)))?;
            return Ok(Location::S3 {
                bucket: bucket.to_string(),
                key: url.path().trim_matches('/').to_string(),
            });
        }

        if uri.starts_with("file://") {
            let url = Url::parse(uri)?;
            let path = url
                .to_file_path()
                .map_err(|_| Error::InvalidUri(format!("not a local file URI: '{}'", uri)))?;
            return Ok(Location::Local(path));
        }

        Ok(Location::Local(PathBuf::from(uri)))
    }

    /// URI DataFusion writes to, with a trailing `/` so the location is
    /// treated as a directory of part files.
    pub fn collection_url(&self) -> Result<String> {
        match self {
            Location::Local(path) => {
                let absolute = std::path::absolute(path)?;
                let mut url = absolute.to_string_lossy().into_owned();
                if !url.ends_with('/') {
                    url.push('/');
                }
                Ok(url)
            }
            Location::S3 { bucket, key } if key.is_empty() => Ok(format!("s3://{}/", bucket)),
            Location::S3 { bucket, key } => Ok(format!("s3://{}/{}/", bucket, key)),
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Location::Local(path) => write!(f, "{}", path.display()),
            Location::S3 { bucket, key } => write!(f, "s3://{}/{}", bucket, key),
        }
    }
}

/// An opened input. Local files are re-read from disk on every pass,
/// remote objects are fetched once and kept in memory.
#[derive(Debug, Clone)]
pub enum InputSource {
    File(PathBuf),
    Bytes(Bytes),
}

impl InputSource {
    /// Reader from the start of the input, gzip content decompressed.
    pub fn reader(&self) -> Result<Box<dyn Read + '_>> {
        match self {
            InputSource::File(path) => Ok(decoded(BufReader::new(File::open(path)?))?),
            InputSource::Bytes(bytes) => Ok(decoded(&bytes[..])?),
        }
    }
}

/// Serves object_store requests with credentials from the AWS SDK's
/// default provider chain, the same chain the uploader's client uses.
#[derive(Debug)]
struct SdkCredentialProvider {
    inner: SharedCredentialsProvider,
}

#[async_trait]
impl CredentialProvider for SdkCredentialProvider {
    type Credential = AwsCredential;

    async fn get_credential(&self) -> object_store::Result<Arc<AwsCredential>> {
        let credentials = self
            .inner
            .provide_credentials()
            .await
            .map_err(|e| object_store::Error::Generic {
                store: "S3",
                source: Box::new(e),
            })?;

        Ok(Arc::new(AwsCredential {
            key_id: credentials.access_key_id().to_string(),
            secret_key: credentials.secret_access_key().to_string(),
            token: credentials.session_token().map(str::to_string),
        }))
    }
}

/// Hands out one object store per bucket and performs the reads, existence
/// checks and clean-ups the aggregation needs around DataFusion.
pub struct StoreRegistry {
    endpoint: Option<String>,
    region: Option<String>,
    object_store_cache: DashMap<String, Arc<dyn ObjectStore>>,
}

impl StoreRegistry {
    pub fn new(endpoint: Option<String>, region: Option<String>) -> Self {
        Self {
            endpoint,
            region,
            object_store_cache: DashMap::new(),
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(settings.s3_endpoint.clone(), settings.s3_region.clone())
    }

    /// Store for `bucket`, configured from the registry's endpoint and
    /// region. Credentials come from the AWS default provider chain.
    pub async fn get_object_store(&self, bucket: &str) -> Result<Arc<dyn ObjectStore>> {
        if let Some(store) = self.object_store_cache.get(bucket) {
            return Ok(store.clone());
        }

        let mut loader = aws_config::defaults(BehaviorVersion::latest());
        if let Some(region) = &self.region {
            loader = loader.region(Region::new(region.clone()));
        }
        let sdk_config = loader.load().await;

        let mut builder = AmazonS3Builder::new().with_bucket_name(bucket);
        if let Some(region) = sdk_config.region() {
            builder = builder.with_region(region.to_string());
        }
        if let Some(endpoint) = &self.endpoint {
            builder = builder.with_endpoint(endpoint).with_allow_http(true);
        }
        if let Some(provider) = sdk_config.credentials_provider() {
            builder = builder.with_credentials(Arc::new(SdkCredentialProvider { inner: provider }));
        }

        debug!("Creating object store for bucket {}", bucket);
        let store: Arc<dyn ObjectStore> = Arc::new(builder.build()?);
        self.object_store_cache
            .insert(bucket.to_string(), store.clone());
        Ok(store)
    }

    /// Makes an S3 location writable through the session's runtime. Local
    /// paths need no registration.
    pub async fn register_object_store(&self, ctx: &SessionContext, location: &Location) -> Result<()> {
        if let Location::S3 { bucket, .. } = location {
            let store = self.get_object_store(bucket).await?;
            let url = Url::parse(&format!("s3://{}", bucket))?;
            ctx.register_object_store(&url, store);
        }
        Ok(())
    }

    /// Fails with [`Error::InputNotFound`] unless `location` is a readable
    /// file or object.
    pub async fn ensure_input_exists(&self, location: &Location) -> Result<()> {
        match location {
            Location::Local(path) => match tokio::fs::metadata(path).await {
                Ok(meta) if meta.is_file() => Ok(()),
                Ok(_) => Err(Error::InputNotFound(format!("{} is not a file", path.display()))),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    Err(Error::InputNotFound(path.display().to_string()))
                }
                Err(e) => Err(e.into()),
            },
            Location::S3 { bucket, key } => {
                let store = self.get_object_store(bucket).await?;
                match store.head(&ObjectPath::from(key.as_str())).await {
                    Ok(_) => Ok(()),
                    Err(object_store::Error::NotFound { .. }) => {
                        Err(Error::InputNotFound(location.to_string()))
                    }
                    Err(e) => Err(e.into()),
                }
            }
        }
    }

    /// Checks `location` exists and opens it for repeated reads.
    pub async fn open_input(&self, location: &Location) -> Result<InputSource> {
        match location {
            Location::Local(path) => {
                self.ensure_input_exists(location).await?;
                Ok(InputSource::File(path.clone()))
            }
            Location::S3 { .. } => Ok(InputSource::Bytes(self.read_bytes(location).await?)),
        }
    }

    pub async fn read_bytes(&self, location: &Location) -> Result<Bytes> {
        self.ensure_input_exists(location).await?;

        match location {
            Location::Local(path) => Ok(Bytes::from(tokio::fs::read(path).await?)),
            Location::S3 { bucket, key } => {
                let store = self.get_object_store(bucket).await?;
                let result = store.get(&ObjectPath::from(key.as_str())).await?;
                Ok(result.bytes().await?)
            }
        }
    }

    /// Refuses a populated output location, or empties it under
    /// [`WriteMode::Overwrite`].
    pub async fn prepare_output(&self, location: &Location, mode: WriteMode) -> Result<()> {
        match location {
            Location::Local(path) => prepare_local_output(path, mode, location).await,
            Location::S3 { bucket, key } => {
                let store = self.get_object_store(bucket).await?;
                let prefix = if key.is_empty() {
                    None
                } else {
                    Some(ObjectPath::from(key.as_str()))
                };
                let existing: Vec<ObjectPath> = store
                    .list(prefix.as_ref())
                    .map_ok(|meta| meta.location)
                    .try_collect()
                    .await?;

                if existing.is_empty() {
                    return Ok(());
                }
                if mode == WriteMode::ErrorIfExists {
                    return Err(Error::OutputExists(location.to_string()));
                }

                warn!("Overwriting {} existing objects under {}", existing.len(), location);
                for object in existing {
                    store.delete(&object).await?;
                }
                Ok(())
            }
        }
    }
}

async fn prepare_local_output(path: &Path, mode: WriteMode, location: &Location) -> Result<()> {
    let meta = match tokio::fs::metadata(path).await {
        Ok(meta) => meta,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e.into()),
    };

    if meta.is_file() {
        return Err(Error::OutputExists(format!("{} is a file", location)));
    }

    let mut entries = tokio::fs::read_dir(path).await?;
    if entries.next_entry().await?.is_none() {
        return Ok(());
    }
    if mode == WriteMode::ErrorIfExists {
        return Err(Error::OutputExists(location.to_string()));
    }

    info!("Removing existing output at {}", location);
    tokio::fs::remove_dir_all(path).await?;
    Ok(())
}
