//! Rasterization orchestration: PDF in, one persisted page record per
//! page out.
//!
//! Pages are processed strictly in order, 1..N. The first page failure
//! aborts the run; already-persisted pages stay (no rollback) and the
//! version keeps `has_pages = false`. Only after every page succeeds is
//! the version finalized as the document's primary.

use std::sync::Arc;

use anyhow::Context;
use bytes::Bytes;
use papermill_core::models::{NewDocumentPage, RenderMetrics};
use papermill_core::AppError;
use papermill_storage::{Storage, StorageError};
use uuid::Uuid;

use crate::progress::{page_percent, ProgressSink};
use crate::raster::encode::{encode_smaller, scale_factor};
use crate::raster::renderer::{PageGeometry, PageRenderer};
use crate::store::{DocumentStore, PageStore, VersionStore};

/// Result of a rasterization run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RasterOutcome {
    Completed { num_pages: u32 },
    /// Version, document, or source object no longer exists; the run
    /// aborted quietly.
    SourceMissing,
}

pub struct Rasterizer {
    documents: Arc<dyn DocumentStore>,
    versions: Arc<dyn VersionStore>,
    pages: Arc<dyn PageStore>,
    storage: Arc<dyn Storage>,
    renderer: Arc<dyn PageRenderer>,
}

impl Rasterizer {
    pub fn new(
        documents: Arc<dyn DocumentStore>,
        versions: Arc<dyn VersionStore>,
        pages: Arc<dyn PageStore>,
        storage: Arc<dyn Storage>,
        renderer: Arc<dyn PageRenderer>,
    ) -> Self {
        Self {
            documents,
            versions,
            pages,
            storage,
            renderer,
        }
    }

    /// Render every page of the version's canonical PDF and persist one
    /// page record per page.
    #[tracing::instrument(skip(self, progress))]
    pub async fn rasterize(
        &self,
        version_id: Uuid,
        progress: &dyn ProgressSink,
    ) -> Result<RasterOutcome, AppError> {
        let Some(version) = self.versions.get(version_id).await? else {
            tracing::warn!(version_id = %version_id, "Version not found, skipping rasterization");
            return Ok(RasterOutcome::SourceMissing);
        };
        let Some(document) = self.documents.get(version.document_id).await? else {
            tracing::warn!(
                version_id = %version_id,
                document_id = %version.document_id,
                "Document not found, skipping rasterization"
            );
            return Ok(RasterOutcome::SourceMissing);
        };

        let pdf = match self.storage.get_object(&version.file_key).await {
            Ok(data) => Bytes::from(data),
            Err(StorageError::NotFound(key)) => {
                tracing::warn!(
                    version_id = %version_id,
                    key = %key,
                    "Source PDF missing from storage, skipping rasterization"
                );
                return Ok(RasterOutcome::SourceMissing);
            }
            Err(e) => return Err(AppError::Storage(e.to_string())),
        };

        let num_pages = match version.num_pages {
            Some(n) if n >= 1 => n as u32,
            _ => self
                .renderer
                .page_count(&pdf)
                .await
                .context("Failed to probe page count")?,
        };
        if num_pages < 1 {
            return Err(AppError::InvalidInput(format!(
                "PDF for version {} has no pages",
                version_id
            )));
        }

        tracing::info!(
            version_id = %version_id,
            document_id = %document.id,
            num_pages = num_pages,
            "Starting rasterization"
        );

        // Orientation comes from page 1 alone and is persisted up front.
        let first_geometry = self
            .renderer
            .page_geometry(&pdf, 1)
            .await
            .context("Failed to measure first page")?;
        let is_vertical = first_geometry.height_pts > first_geometry.width_pts;
        self.versions
            .set_orientation(version_id, is_vertical)
            .await
            .context("Failed to persist orientation")?;

        for page_number in 1..=num_pages {
            let geometry = if page_number == 1 {
                first_geometry
            } else {
                self.renderer
                    .page_geometry(&pdf, page_number)
                    .await
                    .map_err(|e| AppError::render(page_number, e.to_string()))?
            };

            self.render_one_page(&version.id, &document, &pdf, page_number, geometry)
                .await?;

            progress.report(
                page_percent(page_number, num_pages),
                &format!("Rendered page {} of {}", page_number, num_pages),
            );
        }

        self.versions
            .finalize_pages(version_id, num_pages as i32)
            .await
            .context("Failed to finalize version")?;

        tracing::info!(
            version_id = %version_id,
            num_pages = num_pages,
            "Rasterization complete"
        );

        Ok(RasterOutcome::Completed { num_pages })
    }

    async fn render_one_page(
        &self,
        version_id: &Uuid,
        document: &papermill_core::models::Document,
        pdf: &Bytes,
        page_number: u32,
        geometry: PageGeometry,
    ) -> Result<(), AppError> {
        let scale = scale_factor(geometry.width_pts);
        let rendered = self
            .renderer
            .render_page(pdf, page_number, scale)
            .await
            .map_err(|e| AppError::render(page_number, e.to_string()))?;

        let encoded =
            encode_smaller(&rendered.image).map_err(|e| AppError::render(page_number, e.to_string()))?;

        let file_name = format!("{} page {}{}", document.name, page_number, encoded.extension);
        let (image_key, _url) = self
            .storage
            .put_object(
                document.team_id,
                Some(document.id),
                &file_name,
                encoded.content_type,
                encoded.bytes,
            )
            .await
            .map_err(|e| AppError::Storage(e.to_string()))?;

        // Idempotent upsert-by-lookup: a record that already exists is
        // returned unchanged, the fresh render is discarded as wasted
        // work. The store's unique key is the real arbiter under
        // concurrency.
        if let Some(existing) = self
            .pages
            .find_by_version_and_number(*version_id, page_number as i32)
            .await?
        {
            tracing::debug!(
                version_id = %version_id,
                page_number = page_number,
                page_id = %existing.id,
                "Page already rendered, keeping existing record"
            );
            return Ok(());
        }

        let render = RenderMetrics {
            original_width: geometry.width_pts,
            original_height: geometry.height_pts,
            rendered_width: rendered.image.width(),
            rendered_height: rendered.image.height(),
            scale_factor: scale,
        };

        self.pages
            .create(NewDocumentPage {
                version_id: *version_id,
                page_number: page_number as i32,
                image_key,
                storage_backend: self.storage.backend_type(),
                links: rendered.links,
                render,
            })
            .await
            .with_context(|| format!("Failed to persist page {}", page_number))?;

        Ok(())
    }
}
