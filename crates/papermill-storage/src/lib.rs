//! Papermill storage gateway
//!
//! Uniform object-storage operations for the preview pipeline: deterministic
//! key generation, S3 and local filesystem backends, presigned read URLs,
//! and streaming uploads for large payloads.
//!
//! # Storage key format
//!
//! Keys are scoped by team and document:
//!
//! - **With a document**: `{team_id}/{document_id}/{slug(base)}{ext}`
//! - **Without**: `{team_id}/{slug(base)}{ext}`
//!
//! Keys must not contain `..` or a leading `/`. Key generation is
//! centralized in the `keys` module so all backends stay consistent.

pub mod factory;
pub mod keys;
pub mod local;
pub mod s3;
pub mod traits;

pub use factory::create_storage;
pub use keys::object_key;
pub use local::LocalStorage;
pub use papermill_core::StorageBackend;
pub use s3::S3Storage;
pub use traits::{Storage, StorageError, StorageResult};
