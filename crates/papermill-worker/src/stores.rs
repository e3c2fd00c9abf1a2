//! Bridges the processing crate's store seams onto the sqlx repositories.

use async_trait::async_trait;
use papermill_core::models::{
    Document, DocumentKind, DocumentPage, DocumentVersion, NewDocumentPage,
};
use papermill_core::StorageBackend;
use papermill_db::{DocumentRepository, PageRepository, VersionRepository};
use papermill_processing::store::{DocumentStore, PageStore, VersionStore};
use sqlx::PgPool;
use uuid::Uuid;

/// Database-backed implementation of all three store seams.
#[derive(Clone)]
pub struct DbMetadataStore {
    documents: DocumentRepository,
    versions: VersionRepository,
    pages: PageRepository,
}

impl DbMetadataStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            documents: DocumentRepository::new(pool.clone()),
            versions: VersionRepository::new(pool.clone()),
            pages: PageRepository::new(pool),
        }
    }
}

#[async_trait]
impl DocumentStore for DbMetadataStore {
    async fn get(&self, document_id: Uuid) -> anyhow::Result<Option<Document>> {
        Ok(self.documents.get(document_id).await?)
    }
}

#[async_trait]
impl VersionStore for DbMetadataStore {
    async fn get(&self, version_id: Uuid) -> anyhow::Result<Option<DocumentVersion>> {
        Ok(self.versions.get(version_id).await?)
    }

    async fn update_file(
        &self,
        version_id: Uuid,
        file_key: &str,
        kind: DocumentKind,
        backend: StorageBackend,
    ) -> anyhow::Result<()> {
        Ok(self
            .versions
            .update_file(version_id, file_key, kind, backend)
            .await?)
    }

    async fn set_duration(&self, version_id: Uuid, duration_secs: f64) -> anyhow::Result<()> {
        Ok(self.versions.set_duration(version_id, duration_secs).await?)
    }

    async fn set_orientation(&self, version_id: Uuid, is_vertical: bool) -> anyhow::Result<()> {
        Ok(self
            .versions
            .set_orientation(version_id, is_vertical)
            .await?)
    }

    async fn finalize_pages(&self, version_id: Uuid, num_pages: i32) -> anyhow::Result<()> {
        Ok(self.versions.finalize_pages(version_id, num_pages).await?)
    }
}

#[async_trait]
impl PageStore for DbMetadataStore {
    async fn find_by_version_and_number(
        &self,
        version_id: Uuid,
        page_number: i32,
    ) -> anyhow::Result<Option<DocumentPage>> {
        Ok(self
            .pages
            .find_by_version_and_number(version_id, page_number)
            .await?)
    }

    async fn create(&self, page: NewDocumentPage) -> anyhow::Result<DocumentPage> {
        Ok(self.pages.create(page).await?)
    }
}
