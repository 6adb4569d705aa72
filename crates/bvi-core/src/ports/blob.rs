use async_trait::async_trait;

use crate::error::CoreError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectInfo {
    pub size: u64,
    /// Content hash reported by the store, used as the integrity hash of model files.
    pub etag: String,
}

/// Object storage holding scan inputs, models and artifacts.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// `Ok(None)` when the object does not exist.
    async fn get(&self, path: &str) -> Result<Option<Vec<u8>>, CoreError>;

    async fn put(&self, path: &str, data: Vec<u8>) -> Result<(), CoreError>;

    async fn stat(&self, path: &str) -> Result<Option<ObjectInfo>, CoreError>;

    async fn remove(&self, path: &str) -> Result<(), CoreError>;

    /// Move `from` to `to` (copy then remove).
    async fn rename(&self, from: &str, to: &str) -> Result<(), CoreError> {
        let data = self
            .get(from)
            .await?
            .ok_or_else(|| CoreError::Blob(format!("object {from} not found")))?;
        self.put(to, data).await?;
        self.remove(from).await
    }
}
