//! Metadata-store seams for the processing stages.
//!
//! The embedding application implements these over its repositories;
//! tests use the in-memory mocks from `test_helpers`. The traits are
//! deliberately narrow: only the reads and writes the pipeline performs.

use async_trait::async_trait;
use papermill_core::models::{
    Document, DocumentKind, DocumentPage, DocumentVersion, NewDocumentPage,
};
use papermill_core::StorageBackend;
use uuid::Uuid;

/// Read access to documents (name and team scope the storage keys).
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn get(&self, document_id: Uuid) -> anyhow::Result<Option<Document>>;
}

/// Typed reads and updates on version records.
#[async_trait]
pub trait VersionStore: Send + Sync {
    async fn get(&self, version_id: Uuid) -> anyhow::Result<Option<DocumentVersion>>;

    /// Rewrite the version's canonical file reference after a conversion.
    async fn update_file(
        &self,
        version_id: Uuid,
        file_key: &str,
        kind: DocumentKind,
        backend: StorageBackend,
    ) -> anyhow::Result<()>;

    async fn set_duration(&self, version_id: Uuid, duration_secs: f64) -> anyhow::Result<()>;

    async fn set_orientation(&self, version_id: Uuid, is_vertical: bool) -> anyhow::Result<()>;

    /// Set page count and flags, and demote sibling versions, atomically.
    async fn finalize_pages(&self, version_id: Uuid, num_pages: i32) -> anyhow::Result<()>;
}

/// Append-only access to page records. `create` must defer to an existing
/// `(version_id, page_number)` row rather than duplicating it.
#[async_trait]
pub trait PageStore: Send + Sync {
    async fn find_by_version_and_number(
        &self,
        version_id: Uuid,
        page_number: i32,
    ) -> anyhow::Result<Option<DocumentPage>>;

    async fn create(&self, page: NewDocumentPage) -> anyhow::Result<DocumentPage>;
}
