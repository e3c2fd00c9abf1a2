//! CAD drawing conversion: the external CAD service exposes an
//! asynchronous task graph (import → convert → export) instead of a
//! single call, so one conversion is submit + poll + download. The whole
//! graph runs under the shared retry policy; a transient failure anywhere
//! restarts it from the import.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use papermill_core::models::DocumentKind;
use papermill_core::AppError;
use papermill_storage::{Storage, StorageError};
use serde::Deserialize;
use uuid::Uuid;

use crate::convert::ConvertOutcome;
use crate::progress::ProgressSink;
use crate::raster::{RasterOutcome, Rasterizer};
use crate::retry::{classify_reqwest, classify_status, run_with_retry, ExternalError, RetryPolicy};
use crate::store::{DocumentStore, VersionStore};

/// Poll interval while a conversion job is in flight.
const JOB_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// State of a submitted conversion job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CadJobStatus {
    Pending,
    Running,
    Succeeded,
    Failed(String),
}

/// External CAD conversion capability as a task graph.
#[async_trait]
pub trait CadExporter: Send + Sync {
    /// Upload the source drawing; returns an import handle.
    async fn import(&self, file_name: &str, data: Vec<u8>) -> Result<String, ExternalError>;

    /// Start the conversion job for an imported drawing; returns a job id.
    async fn convert(&self, import_id: &str) -> Result<String, ExternalError>;

    async fn job_status(&self, job_id: &str) -> Result<CadJobStatus, ExternalError>;

    /// Download the produced PDF once the job has succeeded.
    async fn export(&self, job_id: &str) -> Result<Vec<u8>, ExternalError>;
}

#[derive(Deserialize)]
struct IdResponse {
    id: String,
}

#[derive(Deserialize)]
struct JobStatusResponse {
    status: String,
    #[serde(default)]
    error: Option<String>,
}

/// HTTP implementation against the CAD conversion service.
pub struct HttpCadExporter {
    client: reqwest::Client,
    base_url: String,
}

impl HttpCadExporter {
    pub fn new(base_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }

    async fn check(response: reqwest::Response, what: &str) -> Result<reqwest::Response, ExternalError> {
        let status = response.status();
        if status.is_success() {
            Ok(response)
        } else {
            Err(ExternalError::with_kind(
                classify_status(status.as_u16()),
                format!("{} returned {}", what, status),
            ))
        }
    }
}

#[async_trait]
impl CadExporter for HttpCadExporter {
    async fn import(&self, file_name: &str, data: Vec<u8>) -> Result<String, ExternalError> {
        let part = reqwest::multipart::Part::bytes(data).file_name(file_name.to_string());
        let form = reqwest::multipart::Form::new().part("file", part);

        let response = self
            .client
            .post(self.url("/imports"))
            .multipart(form)
            .send()
            .await
            .map_err(|e| ExternalError::with_kind(classify_reqwest(&e), e.to_string()))?;
        let response = Self::check(response, "CAD import").await?;

        let body: IdResponse = response
            .json()
            .await
            .map_err(|e| ExternalError::permanent(format!("malformed import response: {}", e)))?;
        Ok(body.id)
    }

    async fn convert(&self, import_id: &str) -> Result<String, ExternalError> {
        let response = self
            .client
            .post(self.url("/jobs"))
            .json(&serde_json::json!({ "import_id": import_id, "output": "pdf" }))
            .send()
            .await
            .map_err(|e| ExternalError::with_kind(classify_reqwest(&e), e.to_string()))?;
        let response = Self::check(response, "CAD convert").await?;

        let body: IdResponse = response
            .json()
            .await
            .map_err(|e| ExternalError::permanent(format!("malformed job response: {}", e)))?;
        Ok(body.id)
    }

    async fn job_status(&self, job_id: &str) -> Result<CadJobStatus, ExternalError> {
        let response = self
            .client
            .get(self.url(&format!("/jobs/{}", job_id)))
            .send()
            .await
            .map_err(|e| ExternalError::with_kind(classify_reqwest(&e), e.to_string()))?;
        let response = Self::check(response, "CAD job status").await?;

        let body: JobStatusResponse = response
            .json()
            .await
            .map_err(|e| ExternalError::permanent(format!("malformed status response: {}", e)))?;

        Ok(match body.status.as_str() {
            "pending" => CadJobStatus::Pending,
            "running" => CadJobStatus::Running,
            "succeeded" => CadJobStatus::Succeeded,
            _ => CadJobStatus::Failed(
                body.error.unwrap_or_else(|| format!("job status {}", body.status)),
            ),
        })
    }

    async fn export(&self, job_id: &str) -> Result<Vec<u8>, ExternalError> {
        let response = self
            .client
            .get(self.url(&format!("/jobs/{}/export", job_id)))
            .send()
            .await
            .map_err(|e| ExternalError::with_kind(classify_reqwest(&e), e.to_string()))?;
        let response = Self::check(response, "CAD export").await?;

        let bytes = response
            .bytes()
            .await
            .map_err(|e| ExternalError::transient(format!("failed to read export body: {}", e)))?;
        Ok(bytes.to_vec())
    }
}

pub struct CadConverter {
    documents: Arc<dyn DocumentStore>,
    versions: Arc<dyn VersionStore>,
    storage: Arc<dyn Storage>,
    exporter: Arc<dyn CadExporter>,
    rasterizer: Arc<Rasterizer>,
    policy: RetryPolicy,
}

impl CadConverter {
    pub fn new(
        documents: Arc<dyn DocumentStore>,
        versions: Arc<dyn VersionStore>,
        storage: Arc<dyn Storage>,
        exporter: Arc<dyn CadExporter>,
        rasterizer: Arc<Rasterizer>,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            documents,
            versions,
            storage,
            exporter,
            rasterizer,
            policy,
        }
    }

    /// Run the import → convert → export graph once, polling the job
    /// until it settles.
    async fn run_job_graph(
        exporter: &Arc<dyn CadExporter>,
        file_name: &str,
        data: Vec<u8>,
    ) -> Result<Vec<u8>, ExternalError> {
        let import_id = exporter.import(file_name, data).await?;
        let job_id = exporter.convert(&import_id).await?;

        loop {
            match exporter.job_status(&job_id).await? {
                CadJobStatus::Pending | CadJobStatus::Running => {
                    tokio::time::sleep(JOB_POLL_INTERVAL).await;
                }
                CadJobStatus::Succeeded => break,
                CadJobStatus::Failed(reason) => {
                    return Err(ExternalError::permanent(format!(
                        "CAD job failed: {}",
                        reason
                    )));
                }
            }
        }

        exporter.export(&job_id).await
    }

    /// Convert the version's original CAD drawing to PDF and chain into
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

        progress.report(5, "Fetching source drawing");
        let source = match self.storage.get_object(&version.original_file_key).await {
            Ok(data) => data,
            Err(StorageError::NotFound(key)) => {
                tracing::warn!(version_id = %version_id, key = %key, "Source object missing");
                return Ok(ConvertOutcome::SourceMissing);
            }
            Err(e) => return Err(AppError::Storage(e.to_string())),
        };

        progress.report(15, "Submitting CAD conversion");
        let exporter = Arc::clone(&self.exporter);
        let source_name = version
            .original_file_key
            .rsplit('/')
            .next()
            .unwrap_or(document.name.as_str())
            .to_string();
        let pdf = run_with_retry(&self.policy, |attempt| {
            let exporter = Arc::clone(&exporter);
            let name = source_name.clone();
            let data = source.clone();
            async move {
                if attempt > 0 {
                    tracing::info!(attempt = attempt + 1, "Retrying CAD conversion");
                }
                Self::run_job_graph(&exporter, &name, data).await
            }
        })
        .await
        .map_err(|e| AppError::conversion("cad export", e.to_string()))?;

        progress.report(70, "CAD conversion complete");

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
            .context("Failed to update version after CAD conversion")?;

        progress.report(85, "Converted drawing saved");

        let rasterized = match self.rasterizer.rasterize(version_id, progress).await {
            Ok(RasterOutcome::Completed { .. }) => true,
            Ok(RasterOutcome::SourceMissing) => false,
            Err(e) => {
                tracing::error!(
                    version_id = %version_id,
                    document_id = %document.id,
                    error = %e,
                    "Rasterization failed after CAD conversion"
                );
                false
            }
        };

        Ok(ConvertOutcome::Completed { rasterized })
    }
}
