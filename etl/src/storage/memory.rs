use crate::storage::s3::ObjectStorage;
use async_trait::async_trait;
use common::{Error, Result};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Mutex;

/// In-process bucket keeping object bytes in a map. A key registered with
/// [`MemoryStorage::fail_on`] is rejected the way a remote store would
/// reject it.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    bucket: String,
    objects: Mutex<BTreeMap<String, Vec<u8>>>,
    failing_key: Option<String>,
}

impl MemoryStorage {
    pub fn new(bucket: &str) -> Self {
        Self {
            bucket: bucket.to_string(),
            ..Default::default()
        }
    }

    pub fn fail_on(mut self, key: &str) -> Self {
        self.failing_key = Some(key.to_string());
        self
    }

    pub fn keys(&self) -> Vec<String> {
        self.lock().keys().cloned().collect()
    }

    pub fn object(&self, key: &str) -> Option<Vec<u8>> {
        self.lock().get(key).cloned()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, Vec<u8>>> {
        self.objects.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl ObjectStorage for MemoryStorage {
    async fn put_file(&self, key: &str, path: &Path) -> Result<()> {
        if self.failing_key.as_deref() == Some(key) {
            return Err(Error::Storage(format!("Access Denied for {}", self.object_url(key))));
        }

        let data = tokio::fs::read(path).await?;
        self.lock().insert(key.to_string(), data);
        Ok(())
    }

    fn bucket(&self) -> &str {
        &self.bucket
    }
}
