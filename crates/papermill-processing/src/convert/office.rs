//! Office document conversion: docs and slides become the canonical PDF
//! through an external office-to-PDF rendering service.
//!
//! State machine: fetch source → submit conversion (with retry/backoff) →
//! save result → trigger rasterization. Transport failures and 5xx
//! responses retry; any other non-success response aborts immediately.

use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use papermill_core::models::DocumentKind;
use papermill_core::AppError;
use papermill_storage::{Storage, StorageError};
use uuid::Uuid;

use crate::convert::ConvertOutcome;
use crate::progress::ProgressSink;
use crate::raster::{RasterOutcome, Rasterizer};
use crate::retry::{classify_reqwest, classify_status, run_with_retry, ExternalError, RetryPolicy};
use crate::store::{DocumentStore, VersionStore};

/// External office-to-PDF rendering capability.
#[async_trait]
pub trait OfficeRenderer: Send + Sync {
    /// Render an office document to PDF bytes. Failures arrive
    /// pre-classified so the retry driver can decide.
    async fn render_pdf(&self, file_name: &str, data: Vec<u8>) -> Result<Vec<u8>, ExternalError>;
}

/// HTTP implementation against a batch office rendering service.
pub struct HttpOfficeRenderer {
    client: reqwest::Client,
    base_url: String,
}

impl HttpOfficeRenderer {
    pub fn new(base_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url,
        }
    }
}

#[async_trait]
impl OfficeRenderer for HttpOfficeRenderer {
    async fn render_pdf(&self, file_name: &str, data: Vec<u8>) -> Result<Vec<u8>, ExternalError> {
        let part = reqwest::multipart::Part::bytes(data).file_name(file_name.to_string());
        let form = reqwest::multipart::Form::new().part("files", part);

        let response = self
            .client
            .post(format!("{}/convert/office", self.base_url.trim_end_matches('/')))
            .multipart(form)
            .send()
            .await
            .map_err(|e| ExternalError::with_kind(classify_reqwest(&e), e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ExternalError::with_kind(
                classify_status(status.as_u16()),
                format!("office renderer returned {}", status),
            ));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| ExternalError::transient(format!("failed to read PDF body: {}", e)))?;
        Ok(bytes.to_vec())
    }
}

pub struct OfficeConverter {
    documents: Arc<dyn DocumentStore>,
    versions: Arc<dyn VersionStore>,
    storage: Arc<dyn Storage>,
    renderer: Arc<dyn OfficeRenderer>,
    rasterizer: Arc<Rasterizer>,
    policy: RetryPolicy,
}

impl OfficeConverter {
    pub fn new(
        documents: Arc<dyn DocumentStore>,
        versions: Arc<dyn VersionStore>,
        storage: Arc<dyn Storage>,
        renderer: Arc<dyn OfficeRenderer>,
        rasterizer: Arc<Rasterizer>,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            documents,
            versions,
            storage,
            renderer,
            rasterizer,
            policy,
        }
    }

    /// Convert the version's original upload to PDF and chain into
    /// rasterization.
    #[tracing::instrument(skip(self, progress))]
    pub async fn run(
        &self,
        version_id: Uuid,
        progress: &dyn ProgressSink,
    ) -> Result<ConvertOutcome, AppError> {
        let Some(version) = self.versions.get(version_id).await? else {
            tracing::warn!(version_id = %version_id, "Version not found, skipping conversion");
            return Ok(ConvertOutcome::SourceMissing);
        };
        let Some(document) = self.documents.get(version.document_id).await? else {
            tracing::warn!(
                version_id = %version_id,
                document_id = %version.document_id,
                "Document not found, skipping conversion"
            );
            return Ok(ConvertOutcome::SourceMissing);
        };

        progress.report(5, "Fetching source document");
        let source = match self.storage.get_object(&version.original_file_key).await {
            Ok(data) => data,
            Err(StorageError::NotFound(key)) => {
                tracing::warn!(version_id = %version_id, key = %key, "Source object missing");
                return Ok(ConvertOutcome::SourceMissing);
            }
            Err(e) => return Err(AppError::Storage(e.to_string())),
        };

        progress.report(15, "Submitting office conversion");
        // The renderer sniffs the input format from the file name, so pass
        // the stored object's name (slug + extension), not the display name.
        let source_name = version
            .original_file_key
            .rsplit('/')
            .next()
            .unwrap_or(document.name.as_str())
            .to_string();
        let renderer = Arc::clone(&self.renderer);
        let pdf = run_with_retry(&self.policy, |attempt| {
            let renderer = Arc::clone(&renderer);
            let name = source_name.clone();
            let data = source.clone();
            async move {
                if attempt > 0 {
                    tracing::info!(attempt = attempt + 1, "Retrying office conversion");
                }
                renderer.render_pdf(&name, data).await
            }
        })
        .await
        .map_err(|e| AppError::conversion("office render", e.to_string()))?;

        progress.report(70, "Office conversion complete");

        let file_name = format!("{}.pdf", document.name);
        let (key, _url) = self
            .storage
            .put_object(
                document.team_id,
                Some(document.id),
                &file_name,
                "application/pdf",
                pdf,
            )
            .await
            .map_err(|e| AppError::Storage(e.to_string()))?;

        self.versions
            .update_file(version_id, &key, DocumentKind::Pdf, self.storage.backend_type())
            .await
            .context("Failed to update version after office conversion")?;

        progress.report(85, "Converted document saved");

        // Rasterization failure must not roll back the conversion; the
        // version stays converted to PDF even without pages.
        let rasterized = match self.rasterizer.rasterize(version_id, progress).await {
            Ok(RasterOutcome::Completed { .. }) => true,
            Ok(RasterOutcome::SourceMissing) => false,
            Err(e) => {
                tracing::error!(
                    version_id = %version_id,
                    document_id = %document.id,
                    error = %e,
                    "Rasterization failed after office conversion"
                );
                false
            }
        };

        Ok(ConvertOutcome::Completed { rasterized })
    }
}
