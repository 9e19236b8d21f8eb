pub mod ingest;
pub mod storage;
pub mod upload;

use common::Result;
use common::config::Settings;
use ingest::{IngestedSnapshot, Ingestor};
use storage::S3Manager;
use storage::s3::S3Storage;
use tracing::info;
use upload::UploadStats;

/// Downloads the listings and reviews files of the configured snapshot.
pub async fn run_ingest(settings: &Settings) -> Result<IngestedSnapshot> {
    let snapshot = settings.snapshot()?;
    let ingestor = Ingestor::new(settings)?;

    ingestor.run(&snapshot).await
}

/// Uploads the configured local snapshot directory to the configured bucket.
pub async fn run_upload(settings: &Settings) -> Result<UploadStats> {
    let bucket = settings.upload_bucket()?;
    let local_root = settings.upload_root()?;
    let prefix = settings.upload_prefix()?;

    info!("Uploading folder: {}", local_root.display());
    info!("Target: s3://{}/{}/", bucket, prefix.trim_matches('/'));

    let manager = S3Manager::from_settings(settings);
    let storage = S3Storage::new(&manager, bucket).await;

    upload::upload_folder(&storage, &local_root, &prefix).await
}
