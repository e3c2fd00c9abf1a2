//! Storage abstraction trait
//!
//! Defines the `Storage` trait every backend must implement. The pipeline
//! only ever talks to `Arc<dyn Storage>`; backend selection happens once
//! in the factory.

use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use papermill_core::StorageBackend;
use thiserror::Error;
use tokio::io::AsyncRead;
use uuid::Uuid;

/// Storage operation errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("Download failed: {0}")]
    DownloadFailed(String),

    #[error("Delete failed: {0}")]
    DeleteFailed(String),

    #[error("Object not found: {0}")]
    NotFound(String),

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("Storage backend error: {0}")]
    BackendError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Storage abstraction trait
///
/// All backends (S3, local filesystem) implement this. Keys follow the
/// layout documented at the crate root; generation is centralized in
/// the `keys` module.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Upload an object and return (storage_key, url).
    ///
    /// The key is the durable reference persisted on version/page records;
    /// the url is the publicly resolvable location of the object.
    async fn put_object(
        &self,
        team_id: Uuid,
        document_id: Option<Uuid>,
        file_name: &str,
        content_type: &str,
        data: Vec<u8>,
    ) -> StorageResult<(String, String)>;

    /// Upload an object from a reader without buffering the whole payload.
    ///
    /// Used for large outputs (optimized video) where peak memory must stay
    /// a small multiple of the chunk size, not the file size.
    async fn put_object_stream(
        &self,
        team_id: Uuid,
        document_id: Option<Uuid>,
        file_name: &str,
        content_type: &str,
        content_length: Option<u64>,
        reader: Pin<Box<dyn AsyncRead + Send + Unpin>>,
    ) -> StorageResult<(String, String)>;

    /// Download an object fully into memory.
    async fn get_object(&self, storage_key: &str) -> StorageResult<Vec<u8>>;

    /// Download an object as a stream of `Bytes` chunks.
    async fn get_object_stream(
        &self,
        storage_key: &str,
    ) -> StorageResult<Pin<Box<dyn Stream<Item = Result<Bytes, StorageError>> + Send>>>;

    /// Generate a presigned/temporary GET URL for direct read access.
    async fn presigned_get_url(
        &self,
        storage_key: &str,
        expires_in: Duration,
    ) -> StorageResult<String>;

    /// Check whether an object exists.
    async fn exists(&self, storage_key: &str) -> StorageResult<bool>;

    /// Size in bytes of an object, if it exists.
    async fn content_length(&self, storage_key: &str) -> StorageResult<u64>;

    /// Delete an object. Deleting a missing object is not an error.
    async fn delete(&self, storage_key: &str) -> StorageResult<()>;

    /// The backend tag recorded on version and page records.
    fn backend_type(&self) -> StorageBackend;
}
