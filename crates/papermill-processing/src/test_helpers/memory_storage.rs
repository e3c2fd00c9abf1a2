use std::collections::HashMap;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use papermill_core::StorageBackend;
use papermill_storage::keys::object_key;
use papermill_storage::{Storage, StorageError, StorageResult};
use tokio::io::{AsyncRead, AsyncReadExt};
use uuid::Uuid;

/// In-memory object store for tests.
#[derive(Clone, Default)]
pub struct MemoryStorage {
    objects: Arc<Mutex<HashMap<String, Vec<u8>>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an object at an explicit key.
    pub fn insert(&self, key: &str, data: Vec<u8>) {
        self.objects.lock().unwrap().insert(key.to_string(), data);
    }

    pub fn object_count(&self) -> usize {
        self.objects.lock().unwrap().len()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.objects.lock().unwrap().contains_key(key)
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn put_object(
        &self,
        team_id: Uuid,
        document_id: Option<Uuid>,
        file_name: &str,
        _content_type: &str,
        data: Vec<u8>,
    ) -> StorageResult<(String, String)> {
        let key = object_key(team_id, document_id, file_name);
        self.objects.lock().unwrap().insert(key.clone(), data);
        let url = format!("memory://{}", key);
        Ok((key, url))
    }

    async fn put_object_stream(
        &self,
        team_id: Uuid,
        document_id: Option<Uuid>,
        file_name: &str,
        content_type: &str,
        _content_length: Option<u64>,
        mut reader: Pin<Box<dyn AsyncRead + Send + Unpin>>,
    ) -> StorageResult<(String, String)> {
        let mut data = Vec::new();
        reader
            .read_to_end(&mut data)
            .await
            .map_err(|e| StorageError::UploadFailed(e.to_string()))?;
        self.put_object(team_id, document_id, file_name, content_type, data)
            .await
    }

    async fn get_object(&self, storage_key: &str) -> StorageResult<Vec<u8>> {
        self.objects
            .lock()
            .unwrap()
            .get(storage_key)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(storage_key.to_string()))
    }

    async fn get_object_stream(
        &self,
        storage_key: &str,
    ) -> StorageResult<Pin<Box<dyn Stream<Item = Result<Bytes, StorageError>> + Send>>> {
        let data = self.get_object(storage_key).await?;
        Ok(Box::pin(futures::stream::once(async move {
            Ok(Bytes::from(data))
        })))
    }

    async fn presigned_get_url(
        &self,
        storage_key: &str,
        _expires_in: Duration,
    ) -> StorageResult<String> {
        Ok(format!("memory://{}", storage_key))
    }

    async fn exists(&self, storage_key: &str) -> StorageResult<bool> {
        Ok(self.objects.lock().unwrap().contains_key(storage_key))
    }

    async fn content_length(&self, storage_key: &str) -> StorageResult<u64> {
        self.objects
            .lock()
            .unwrap()
            .get(storage_key)
            .map(|data| data.len() as u64)
            .ok_or_else(|| StorageError::NotFound(storage_key.to_string()))
    }

    async fn delete(&self, storage_key: &str) -> StorageResult<()> {
        self.objects.lock().unwrap().remove(storage_key);
        Ok(())
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::Local
    }
}
