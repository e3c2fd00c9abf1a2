use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use papermill_core::models::{
    Document, DocumentKind, DocumentPage, DocumentVersion, NewDocumentPage,
};
use papermill_core::StorageBackend;
use uuid::Uuid;

use crate::progress::ProgressSink;
use crate::store::{DocumentStore, PageStore, VersionStore};

/// In-memory metadata store implementing all three store seams.
#[derive(Clone, Default)]
pub struct MockMetadataStore {
    documents: Arc<Mutex<HashMap<Uuid, Document>>>,
    versions: Arc<Mutex<HashMap<Uuid, DocumentVersion>>>,
    pages: Arc<Mutex<HashMap<(Uuid, i32), DocumentPage>>>,
}

impl MockMetadataStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_document(&self, document: Document) {
        self.documents
            .lock()
            .unwrap()
            .insert(document.id, document);
    }

    pub fn add_version(&self, version: DocumentVersion) {
        self.versions.lock().unwrap().insert(version.id, version);
    }

    pub fn version(&self, id: Uuid) -> Option<DocumentVersion> {
        self.versions.lock().unwrap().get(&id).cloned()
    }

    pub fn page(&self, version_id: Uuid, page_number: i32) -> Option<DocumentPage> {
        self.pages
            .lock()
            .unwrap()
            .get(&(version_id, page_number))
            .cloned()
    }

    pub fn page_count_for(&self, version_id: Uuid) -> usize {
        self.pages
            .lock()
            .unwrap()
            .keys()
            .filter(|(v, _)| *v == version_id)
            .count()
    }

    pub fn primary_versions_of(&self, document_id: Uuid) -> Vec<Uuid> {
        self.versions
            .lock()
            .unwrap()
            .values()
            .filter(|v| v.document_id == document_id && v.is_primary)
            .map(|v| v.id)
            .collect()
    }

    /// Convenience: build and register a document + version pair.
    pub fn seed_version(
        &self,
        kind: DocumentKind,
        file_key: &str,
        file_size: i64,
    ) -> (Document, DocumentVersion) {
        let document = Document {
            id: Uuid::new_v4(),
            team_id: Uuid::new_v4(),
            name: "Quarterly Report".to_string(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let version = DocumentVersion {
            id: Uuid::new_v4(),
            document_id: document.id,
            version_number: 1,
            kind,
            file_key: file_key.to_string(),
            original_file_key: file_key.to_string(),
            storage_backend: StorageBackend::Local,
            content_type: "application/octet-stream".to_string(),
            file_size,
            num_pages: None,
            has_pages: false,
            is_primary: false,
            is_vertical: false,
            duration_secs: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        self.add_document(document.clone());
        self.add_version(version.clone());
        (document, version)
    }
}

#[async_trait]
impl DocumentStore for MockMetadataStore {
    async fn get(&self, document_id: Uuid) -> anyhow::Result<Option<Document>> {
        Ok(self.documents.lock().unwrap().get(&document_id).cloned())
    }
}

#[async_trait]
impl VersionStore for MockMetadataStore {
    async fn get(&self, version_id: Uuid) -> anyhow::Result<Option<DocumentVersion>> {
        Ok(self.versions.lock().unwrap().get(&version_id).cloned())
    }

    async fn update_file(
        &self,
        version_id: Uuid,
        file_key: &str,
        kind: DocumentKind,
        backend: StorageBackend,
    ) -> anyhow::Result<()> {
        let mut versions = self.versions.lock().unwrap();
        let version = versions
            .get_mut(&version_id)
            .ok_or_else(|| anyhow::anyhow!("version {} not found", version_id))?;
        version.file_key = file_key.to_string();
        version.kind = kind;
        version.storage_backend = backend;
        Ok(())
    }

    async fn set_duration(&self, version_id: Uuid, duration_secs: f64) -> anyhow::Result<()> {
        let mut versions = self.versions.lock().unwrap();
        let version = versions
            .get_mut(&version_id)
            .ok_or_else(|| anyhow::anyhow!("version {} not found", version_id))?;
        version.duration_secs = Some(duration_secs);
        Ok(())
    }

    async fn set_orientation(&self, version_id: Uuid, is_vertical: bool) -> anyhow::Result<()> {
        let mut versions = self.versions.lock().unwrap();
        let version = versions
            .get_mut(&version_id)
            .ok_or_else(|| anyhow::anyhow!("version {} not found", version_id))?;
        version.is_vertical = is_vertical;
        Ok(())
    }

    async fn finalize_pages(&self, version_id: Uuid, num_pages: i32) -> anyhow::Result<()> {
        let mut versions = self.versions.lock().unwrap();
        let document_id = {
            let version = versions
                .get_mut(&version_id)
                .ok_or_else(|| anyhow::anyhow!("version {} not found", version_id))?;
            version.num_pages = Some(num_pages);
            version.has_pages = true;
            version.is_primary = true;
            version.document_id
        };
        for sibling in versions.values_mut() {
            if sibling.document_id == document_id && sibling.id != version_id {
                sibling.is_primary = false;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl PageStore for MockMetadataStore {
    async fn find_by_version_and_number(
        &self,
        version_id: Uuid,
        page_number: i32,
    ) -> anyhow::Result<Option<DocumentPage>> {
        Ok(self
            .pages
            .lock()
            .unwrap()
            .get(&(version_id, page_number))
            .cloned())
    }

    async fn create(&self, page: NewDocumentPage) -> anyhow::Result<DocumentPage> {
        let mut pages = self.pages.lock().unwrap();
        let key = (page.version_id, page.page_number);
        // Mirror the database's unique-key semantics: a conflicting insert
        // returns the existing row unchanged.
        if let Some(existing) = pages.get(&key) {
            return Ok(existing.clone());
        }
        let record = DocumentPage {
            id: Uuid::new_v4(),
            version_id: page.version_id,
            page_number: page.page_number,
            image_key: page.image_key,
            storage_backend: page.storage_backend,
            links: page.links,
            render: page.render,
            created_at: Utc::now(),
        };
        pages.insert(key, record.clone());
        Ok(record)
    }
}

/// Progress sink that records every report for assertions.
#[derive(Clone, Default)]
pub struct CollectingProgress {
    reports: Arc<Mutex<Vec<(u8, String)>>>,
}

impl CollectingProgress {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reports(&self) -> Vec<(u8, String)> {
        self.reports.lock().unwrap().clone()
    }

    pub fn last_percent(&self) -> Option<u8> {
        self.reports.lock().unwrap().last().map(|(p, _)| *p)
    }
}

impl ProgressSink for CollectingProgress {
    fn report(&self, percent: u8, message: &str) {
        self.reports
            .lock()
            .unwrap()
            .push((percent, message.to_string()));
    }
}
