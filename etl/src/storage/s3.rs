use crate::storage::S3Manager;
use async_trait::async_trait;
use aws_sdk_s3::Client as S3Client;
use aws_sdk_s3::error::SdkError;
use aws_sdk_s3::primitives::ByteStream;
use common::Result;
use std::path::Path;

#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Uploads the local file at `path` as object `key`, replacing any
    /// existing object.
    async fn put_file(&self, key: &str, path: &Path) -> Result<()>;
    fn bucket(&self) -> &str;

    fn object_url(&self, key: &str) -> String {
        format!("s3://{}/{}", self.bucket(), key)
    }
}

/// Uploads through the AWS SDK client built by [`S3Manager`].
pub struct S3Storage {
    bucket: String,
    client: S3Client,
}

impl S3Storage {
    pub async fn new(s3_manager: &S3Manager, bucket: &str) -> Self {
        let client = s3_manager.get_client().await;

        Self {
            client,
            bucket: bucket.to_string(),
        }
    }
}

#[async_trait]
impl ObjectStorage for S3Storage {
    async fn put_file(&self, key: &str, path: &Path) -> Result<()> {
        let body = ByteStream::from_path(path).await?;
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(body)
            .send()
            .await
            .map_err(|e| match e {
                SdkError::ServiceError(err) => common::Error::Storage(err.into_err().to_string()),
                _ => common::Error::Storage(e.to_string()),
            })?;

        Ok(())
    }

    fn bucket(&self) -> &str {
        &self.bucket
    }
}
