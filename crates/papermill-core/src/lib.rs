//! Papermill core library
//!
//! Domain models, configuration, and the unified error type shared by the
//! document preview pipeline crates. This crate has no I/O of its own;
//! storage and database access live in `papermill-storage` and
//! `papermill-db`.

pub mod config;
pub mod error;
pub mod models;
pub mod storage_types;

pub use config::{PipelineConfig, StorageConfig};
pub use error::AppError;
pub use storage_types::StorageBackend;
