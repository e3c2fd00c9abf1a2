//! Configuration module
//!
//! Env-driven configuration for the pipeline and its storage backend.
//! Every knob has a documented default so a local run only needs
//! `DATABASE_URL` and a storage backend.

use std::env;
use std::str::FromStr;

use crate::storage_types::StorageBackend;

const DEFAULT_FFMPEG_PATH: &str = "ffmpeg";
const DEFAULT_FFPROBE_PATH: &str = "ffprobe";
/// Videos at or above this size skip re-encoding to bound processing cost.
const DEFAULT_VIDEO_SKIP_THRESHOLD_BYTES: u64 = 500 * 1024 * 1024;
const DEFAULT_CONVERT_MAX_ATTEMPTS: u32 = 3;

/// Storage backend configuration.
#[derive(Clone, Debug)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    pub s3_bucket: Option<String>,
    pub s3_region: Option<String>,
    /// Custom endpoint for S3-compatible providers (MinIO, Spaces, ...).
    pub s3_endpoint: Option<String>,
    pub local_path: Option<String>,
    pub local_base_url: Option<String>,
}

impl StorageConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let backend = match env::var("STORAGE_BACKEND") {
            Ok(value) => StorageBackend::from_str(&value)?,
            Err(_) => StorageBackend::Local,
        };
        Ok(Self {
            backend,
            s3_bucket: env::var("S3_BUCKET").ok(),
            s3_region: env::var("S3_REGION").ok(),
            s3_endpoint: env::var("S3_ENDPOINT").ok(),
            local_path: env::var("LOCAL_STORAGE_PATH").ok(),
            local_base_url: env::var("LOCAL_STORAGE_BASE_URL").ok(),
        })
    }
}

/// Pipeline configuration: database, external converter endpoints,
/// transcoding tools, and the cache invalidation hook.
#[derive(Clone, Debug)]
pub struct PipelineConfig {
    pub database_url: String,
    pub storage: StorageConfig,
    /// Base URL of the office-to-PDF rendering service.
    pub office_renderer_url: String,
    /// Base URL of the CAD conversion service (import/convert/export jobs).
    pub cad_exporter_url: String,
    pub ffmpeg_path: String,
    pub ffprobe_path: String,
    pub video_skip_threshold_bytes: u64,
    pub convert_max_attempts: u32,
    /// Cache invalidation endpoint, called once after rasterization.
    pub cache_invalidation_url: Option<String>,
    pub cache_invalidation_secret: Option<String>,
}

impl PipelineConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let database_url = env::var("DATABASE_URL")
            .map_err(|_| anyhow::anyhow!("DATABASE_URL must be set"))?;

        Ok(Self {
            database_url,
            storage: StorageConfig::from_env()?,
            office_renderer_url: env::var("OFFICE_RENDERER_URL")
                .unwrap_or_else(|_| "http://localhost:3100".to_string()),
            cad_exporter_url: env::var("CAD_EXPORTER_URL")
                .unwrap_or_else(|_| "http://localhost:3200".to_string()),
            ffmpeg_path: env::var("FFMPEG_PATH")
                .unwrap_or_else(|_| DEFAULT_FFMPEG_PATH.to_string()),
            ffprobe_path: env::var("FFPROBE_PATH")
                .unwrap_or_else(|_| DEFAULT_FFPROBE_PATH.to_string()),
            video_skip_threshold_bytes: parse_env_or(
                "VIDEO_SKIP_THRESHOLD_BYTES",
                DEFAULT_VIDEO_SKIP_THRESHOLD_BYTES,
            ),
            convert_max_attempts: parse_env_or(
                "CONVERT_MAX_ATTEMPTS",
                DEFAULT_CONVERT_MAX_ATTEMPTS,
            ),
            cache_invalidation_url: env::var("CACHE_INVALIDATION_URL").ok(),
            cache_invalidation_secret: env::var("CACHE_INVALIDATION_SECRET").ok(),
        })
    }
}

fn parse_env_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skip_threshold_default_is_500_mib() {
        assert_eq!(DEFAULT_VIDEO_SKIP_THRESHOLD_BYTES, 524_288_000);
    }

    #[test]
    fn parse_env_or_falls_back_on_garbage() {
        // Key chosen to not collide with anything the test runner sets.
        std::env::set_var("PAPERMILL_TEST_PARSE_ENV", "not-a-number");
        assert_eq!(parse_env_or("PAPERMILL_TEST_PARSE_ENV", 42u32), 42);
        std::env::remove_var("PAPERMILL_TEST_PARSE_ENV");
    }
}
