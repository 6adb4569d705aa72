use std::{
    collections::HashMap,
    hash::{DefaultHasher, Hash, Hasher},
    sync::Arc,
};

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::{
    error::CoreError,
    ports::{BlobStore, ObjectInfo},
};

#[derive(Clone, Default)]
pub struct MemoryBlobStore {
    objects: Arc<Mutex<HashMap<String, Vec<u8>>>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, path: impl Into<String>, data: impl Into<Vec<u8>>) {
        self.objects.lock().insert(path.into(), data.into());
    }

    pub fn contains(&self, path: &str) -> bool {
        self.objects.lock().contains_key(path)
    }

    pub fn paths(&self) -> Vec<String> {
        let mut paths: Vec<_> = self.objects.lock().keys().cloned().collect();
        paths.sort();
        paths
    }
}

fn etag(data: &[u8]) -> String {
    let mut hasher = DefaultHasher::new();
    data.hash(&mut hasher);
    format!("{:016x}", hasher.finish())
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn get(&self, path: &str) -> Result<Option<Vec<u8>>, CoreError> {
        Ok(self.objects.lock().get(path).cloned())
    }

    async fn put(&self, path: &str, data: Vec<u8>) -> Result<(), CoreError> {
        self.objects.lock().insert(path.to_string(), data);
        Ok(())
    }

    async fn stat(&self, path: &str) -> Result<Option<ObjectInfo>, CoreError> {
        Ok(self.objects.lock().get(path).map(|data| ObjectInfo {
            size: data.len() as u64,
            etag: etag(data),
        }))
    }

    async fn remove(&self, path: &str) -> Result<(), CoreError> {
        self.objects.lock().remove(path);
        Ok(())
    }
}
