//! Pipeline dispatcher: maps a newly created version's declared type to
//! the matching converter path and runs it as a detached task.
//!
//! The triggering caller never awaits the pipeline. Failures inside the
//! task are terminal at the task boundary: logged with document/version
//! context, never propagated. A version whose task failed simply remains
//! with `has_pages = false`.

use std::sync::Arc;

use papermill_core::models::{DocumentKind, DocumentVersion};
use papermill_core::AppError;
use papermill_processing::convert::{
    CadConverter, ConvertOutcome, OfficeConverter, VideoOptimizer,
};
use papermill_processing::progress::ProgressSink;
use papermill_processing::raster::{RasterOutcome, Rasterizer};
use uuid::Uuid;

use crate::invalidate::CacheInvalidator;

#[derive(Clone)]
pub struct Dispatcher {
    office: Arc<OfficeConverter>,
    cad: Arc<CadConverter>,
    video: Arc<VideoOptimizer>,
    rasterizer: Arc<Rasterizer>,
    invalidator: Option<Arc<CacheInvalidator>>,
}

impl Dispatcher {
    pub fn new(
        office: Arc<OfficeConverter>,
        cad: Arc<CadConverter>,
        video: Arc<VideoOptimizer>,
        rasterizer: Arc<Rasterizer>,
        invalidator: Option<Arc<CacheInvalidator>>,
    ) -> Self {
        Self {
            office,
            cad,
            video,
            rasterizer,
            invalidator,
        }
    }

    /// Start the pipeline for a version without blocking the caller.
    /// Exactly one converter path is started per call.
    pub fn dispatch(&self, version: &DocumentVersion, progress: Arc<dyn ProgressSink>) {
        let dispatcher = self.clone();
        let version_id = version.id;
        let document_id = version.document_id;
        let kind = version.kind;

        tokio::spawn(async move {
            if let Err(e) = dispatcher
                .run(version_id, document_id, kind, progress.as_ref())
                .await
            {
                tracing::error!(
                    version_id = %version_id,
                    document_id = %document_id,
                    kind = %kind,
                    error = %e,
                    "Pipeline task failed"
                );
            }
        });
    }

    /// The task body: one converter path per declared type. Public so
    /// embedding code (and tests) can run a path to completion.
    #[tracing::instrument(skip(self, progress))]
    pub async fn run(
        &self,
        version_id: Uuid,
        document_id: Uuid,
        kind: DocumentKind,
        progress: &dyn ProgressSink,
    ) -> Result<(), AppError> {
        match kind {
            DocumentKind::Docs | DocumentKind::Slides => {
                let outcome = self.office.run(version_id, progress).await?;
                self.invalidate_if_rasterized(document_id, outcome);
            }
            DocumentKind::Cad => {
                let outcome = self.cad.run(version_id, progress).await?;
                self.invalidate_if_rasterized(document_id, outcome);
            }
            DocumentKind::Video => {
                self.video.run(version_id, progress).await?;
            }
            DocumentKind::Pdf => {
                let outcome = self.rasterizer.rasterize(version_id, progress).await?;
                if matches!(outcome, RasterOutcome::Completed { .. }) {
                    self.fire_invalidation(document_id);
                }
            }
            DocumentKind::Sheet => {
                // Pre-rendered formats bypass conversion entirely.
                tracing::info!(
                    version_id = %version_id,
                    kind = %kind,
                    "Version needs no conversion, skipping pipeline"
                );
            }
        }
        Ok(())
    }

    fn invalidate_if_rasterized(&self, document_id: Uuid, outcome: ConvertOutcome) {
        if matches!(outcome, ConvertOutcome::Completed { rasterized: true }) {
            self.fire_invalidation(document_id);
        }
    }

    fn fire_invalidation(&self, document_id: Uuid) {
        if let Some(invalidator) = &self.invalidator {
            invalidator.fire(document_id);
        }
    }
}
