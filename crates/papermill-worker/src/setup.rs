//! Construction of a fully wired pipeline from configuration.

use std::sync::Arc;

use anyhow::{Context, Result};
use papermill_core::PipelineConfig;
use papermill_processing::convert::{
    CadConverter, FfmpegVideoTool, HttpCadExporter, HttpOfficeRenderer, OfficeConverter,
    VideoOptimizer,
};
use papermill_processing::raster::{PdfiumRenderer, Rasterizer};
use papermill_processing::retry::RetryPolicy;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use crate::dispatch::Dispatcher;
use crate::invalidate::CacheInvalidator;
use crate::stores::DbMetadataStore;

const DB_MAX_CONNECTIONS: u32 = 10;

/// Connect to the metadata database and apply migrations.
pub async fn connect_database(config: &PipelineConfig) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(DB_MAX_CONNECTIONS)
        .connect(&config.database_url)
        .await
        .context("Failed to connect to database")?;

    papermill_db::run_migrations(&pool)
        .await
        .context("Failed to run migrations")?;

    Ok(pool)
}

/// Build the dispatcher with production implementations of every seam.
pub async fn build_dispatcher(config: &PipelineConfig, pool: PgPool) -> Result<Dispatcher> {
    let storage = papermill_storage::create_storage(&config.storage)
        .await
        .context("Failed to create storage backend")?;

    let store = Arc::new(DbMetadataStore::new(pool));
    let policy = RetryPolicy {
        max_attempts: config.convert_max_attempts,
        ..RetryPolicy::default()
    };

    let rasterizer = Arc::new(Rasterizer::new(
        store.clone(),
        store.clone(),
        store.clone(),
        storage.clone(),
        Arc::new(PdfiumRenderer::new()),
    ));

    let office = Arc::new(OfficeConverter::new(
        store.clone(),
        store.clone(),
        storage.clone(),
        Arc::new(HttpOfficeRenderer::new(config.office_renderer_url.clone())),
        rasterizer.clone(),
        policy.clone(),
    ));

    let cad = Arc::new(CadConverter::new(
        store.clone(),
        store.clone(),
        storage.clone(),
        Arc::new(HttpCadExporter::new(config.cad_exporter_url.clone())),
        rasterizer.clone(),
        policy,
    ));

    let video = Arc::new(VideoOptimizer::new(
        store.clone(),
        store,
        storage,
        Arc::new(FfmpegVideoTool::new(
            config.ffmpeg_path.clone(),
            config.ffprobe_path.clone(),
        )),
        config.video_skip_threshold_bytes,
    ));

    let invalidator = match (&config.cache_invalidation_url, &config.cache_invalidation_secret) {
        (Some(url), Some(secret)) => {
            Some(Arc::new(CacheInvalidator::new(url.clone(), secret.clone())))
        }
        _ => None,
    };

    Ok(Dispatcher::new(office, cad, video, rasterizer, invalidator))
}
