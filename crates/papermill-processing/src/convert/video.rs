//! Video optimization: probe metadata, persist duration, and re-encode
//! with bounded parameters for progressive playback.
//!
//! Sources at or above the skip threshold keep their original file; only
//! the probed duration is persisted. Everything below it is re-encoded to
//! H.264 with a 6000 kbps target, capped resolution, and a faststart
//! layout, and the output is streamed to storage rather than buffered.

use std::path::Path;
use std::process::Stdio;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use futures::StreamExt;
use papermill_core::models::DocumentKind;
use papermill_core::AppError;
use papermill_storage::{Storage, StorageError};
use tempfile::TempDir;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use uuid::Uuid;

use crate::progress::ProgressSink;
use crate::store::{DocumentStore, VersionStore};

const TARGET_BITRATE_KBPS: u32 = 6000;
/// Downscale ceiling; sources at or below keep their resolution.
const MAX_OUTPUT_WIDTH: u32 = 1920;

/// Probed source metadata.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VideoProbe {
    pub width: u32,
    pub height: u32,
    pub framerate: f32,
    pub duration_secs: f64,
}

/// Encoding parameters derived from the probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TranscodeParams {
    pub target_bitrate_kbps: u32,
    pub max_bitrate_kbps: u32,
    pub keyframe_interval: u32,
    /// Set only when the source is wider than the output ceiling.
    pub scale_width: Option<u32>,
}

/// Derive bounded encoding parameters: 2x maxrate, keyframe every two
/// seconds of source frames, downscale only when the source exceeds the
/// width ceiling.
pub fn transcode_params(probe: &VideoProbe) -> TranscodeParams {
    TranscodeParams {
        target_bitrate_kbps: TARGET_BITRATE_KBPS,
        max_bitrate_kbps: TARGET_BITRATE_KBPS * 2,
        keyframe_interval: (probe.framerate * 2.0).round() as u32,
        scale_width: (probe.width > MAX_OUTPUT_WIDTH).then_some(MAX_OUTPUT_WIDTH),
    }
}

/// ffmpeg argument vector for the optimization pass.
fn build_transcode_args(input: &Path, output: &Path, params: &TranscodeParams) -> Vec<String> {
    let mut args = vec![
        "-i".to_string(),
        input.to_string_lossy().to_string(),
        "-c:v".to_string(),
        "libx264".to_string(),
        "-preset".to_string(),
        "fast".to_string(),
        "-b:v".to_string(),
        format!("{}k", params.target_bitrate_kbps),
        "-maxrate".to_string(),
        format!("{}k", params.max_bitrate_kbps),
        "-bufsize".to_string(),
        format!("{}k", params.max_bitrate_kbps),
        "-g".to_string(),
        params.keyframe_interval.to_string(),
    ];

    if let Some(width) = params.scale_width {
        args.push("-vf".to_string());
        args.push(format!("scale={}:-2", width));
    }

    args.extend_from_slice(&[
        "-c:a".to_string(),
        "aac".to_string(),
        "-b:a".to_string(),
        "128k".to_string(),
        "-movflags".to_string(),
        "+faststart".to_string(),
        "-y".to_string(),
        output.to_string_lossy().to_string(),
    ]);

    args
}

/// Parse ffprobe's JSON output into a probe. Pure so the parsing is
/// testable without spawning a process.
fn parse_probe_output(stdout: &[u8]) -> Result<VideoProbe> {
    let probe_data: serde_json::Value =
        serde_json::from_slice(stdout).context("Failed to parse ffprobe output")?;

    let stream = probe_data["streams"]
        .get(0)
        .ok_or_else(|| anyhow!("No video stream found"))?;
    let format = &probe_data["format"];

    let duration_secs = format["duration"]
        .as_str()
        .and_then(|d| d.parse::<f64>().ok())
        .ok_or_else(|| anyhow!("Could not parse duration"))?;

    let width = stream["width"]
        .as_u64()
        .ok_or_else(|| anyhow!("Could not parse width"))? as u32;

    let height = stream["height"]
        .as_u64()
        .ok_or_else(|| anyhow!("Could not parse height"))? as u32;

    let framerate = stream["r_frame_rate"]
        .as_str()
        .and_then(|r| {
            let parts: Vec<&str> = r.split('/').collect();
            if parts.len() == 2 {
                let num: f32 = parts[0].parse().ok()?;
                let den: f32 = parts[1].parse().ok()?;
                if den != 0.0 {
                    Some(num / den)
                } else {
                    None
                }
            } else {
                None
            }
        })
        .ok_or_else(|| anyhow!("Could not parse frame rate"))?;

    Ok(VideoProbe {
        width,
        height,
        framerate,
        duration_secs,
    })
}

/// External probe/transcode capability, implemented with ffprobe/ffmpeg
/// in production and scripted in tests.
#[async_trait]
pub trait VideoTool: Send + Sync {
    async fn probe(&self, path: &Path) -> Result<VideoProbe>;

    async fn transcode(&self, input: &Path, output: &Path, params: &TranscodeParams)
        -> Result<()>;
}

/// ffmpeg/ffprobe implementation.
pub struct FfmpegVideoTool {
    ffmpeg_path: String,
    ffprobe_path: String,
}

impl FfmpegVideoTool {
    pub fn new(ffmpeg_path: String, ffprobe_path: String) -> Self {
        Self {
            ffmpeg_path,
            ffprobe_path,
        }
    }
}

#[async_trait]
impl VideoTool for FfmpegVideoTool {
    #[tracing::instrument(skip(self))]
    async fn probe(&self, path: &Path) -> Result<VideoProbe> {
        let output = Command::new(&self.ffprobe_path)
            .args([
                "-v",
                "quiet",
                "-print_format",
                "json",
                "-show_format",
                "-show_streams",
                "-select_streams",
                "v:0",
            ])
            .arg(path)
            .output()
            .await
            .context("Failed to execute ffprobe")?;

        if !output.status.success() {
            return Err(anyhow!(
                "ffprobe failed: {}",
                String::from_utf8_lossy(&output.stderr)
            ));
        }

        let probe = parse_probe_output(&output.stdout)?;

        tracing::info!(
            duration = probe.duration_secs,
            width = probe.width,
            height = probe.height,
            framerate = probe.framerate,
            "Video probe completed"
        );

        Ok(probe)
    }

    #[tracing::instrument(skip(self, params))]
    async fn transcode(
        &self,
        input: &Path,
        output: &Path,
        params: &TranscodeParams,
    ) -> Result<()> {
        let args = build_transcode_args(input, output, params);

        let result = Command::new(&self.ffmpeg_path)
            .args(&args)
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .await
            .context("Failed to execute ffmpeg")?;

        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr);
            return Err(anyhow!("FFmpeg failed: {}", stderr));
        }

        Ok(())
    }
}

/// Result of a video optimization run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VideoOutcome {
    Optimized,
    /// Source met the skip threshold; duration persisted, file untouched.
    SkippedLarge,
    SourceMissing,
}

pub struct VideoOptimizer {
    documents: Arc<dyn DocumentStore>,
    versions: Arc<dyn VersionStore>,
    storage: Arc<dyn Storage>,
    tool: Arc<dyn VideoTool>,
    skip_threshold_bytes: u64,
}

impl VideoOptimizer {
    pub fn new(
        documents: Arc<dyn DocumentStore>,
        versions: Arc<dyn VersionStore>,
        storage: Arc<dyn Storage>,
        tool: Arc<dyn VideoTool>,
        skip_threshold_bytes: u64,
    ) -> Self {
        Self {
            documents,
            versions,
            storage,
            tool,
            skip_threshold_bytes,
        }
    }

    /// Probe the source, persist its duration, and re-encode unless the
    /// size guard skips it.
    #[tracing::instrument(skip(self, progress))]
    pub async fn run(
        &self,
        version_id: Uuid,
        progress: &dyn ProgressSink,
    ) -> Result<VideoOutcome, AppError> {
        let Some(version) = self.versions.get(version_id).await? else {
            tracing::warn!(version_id = %version_id, "Version not found, skipping optimization");
            return Ok(VideoOutcome::SourceMissing);
        };
        let Some(document) = self.documents.get(version.document_id).await? else {
            tracing::warn!(
                version_id = %version_id,
                document_id = %version.document_id,
                "Document not found, skipping optimization"
            );
            return Ok(VideoOutcome::SourceMissing);
        };

        // Scoped temp resources: dropped on every exit path below.
        let temp_dir = TempDir::new().map_err(AppError::from)?;
        let input_path = temp_dir.path().join("source");

        progress.report(5, "Fetching source video");
        match self.download_to(&version.original_file_key, &input_path).await {
            Ok(()) => {}
            Err(StorageError::NotFound(key)) => {
                tracing::warn!(version_id = %version_id, key = %key, "Source object missing");
                return Ok(VideoOutcome::SourceMissing);
            }
            Err(e) => return Err(AppError::Storage(e.to_string())),
        }

        let probe = self
            .tool
            .probe(&input_path)
            .await
            .map_err(|e| AppError::conversion("video probe", e.to_string()))?;

        // Duration is persisted from the probe regardless of whether
        // re-encoding happens; it is never recomputed afterwards.
        self.versions
            .set_duration(version_id, probe.duration_secs)
            .await
            .context("Failed to persist video duration")?;
        progress.report(25, "Probed video metadata");

        if version.file_size as u64 >= self.skip_threshold_bytes {
            tracing::info!(
                version_id = %version_id,
                file_size = version.file_size,
                threshold = self.skip_threshold_bytes,
                "Source exceeds size threshold, skipping re-encode"
            );
            progress.report(100, "Optimization skipped for large source");
            return Ok(VideoOutcome::SkippedLarge);
        }

        let params = transcode_params(&probe);
        tracing::info!(
            version_id = %version_id,
            keyframe_interval = params.keyframe_interval,
            scale_width = ?params.scale_width,
            "Transcoding video"
        );

        let output_path = temp_dir.path().join("optimized.mp4");
        self.tool
            .transcode(&input_path, &output_path, &params)
            .await
            .map_err(|e| AppError::conversion("video transcode", e.to_string()))?;
        progress.report(80, "Transcode complete");

        let output_len = tokio::fs::metadata(&output_path).await.map(|m| m.len()).ok();
        let output_file = tokio::fs::File::open(&output_path)
            .await
            .map_err(AppError::from)?;

        let file_name = format!("{}-optimized.mp4", document.name);
        let (key, _url) = self
            .storage
            .put_object_stream(
                document.team_id,
                Some(document.id),
                &file_name,
                "video/mp4",
                output_len,
                Box::pin(output_file),
            )
            .await
            .map_err(|e| AppError::Storage(e.to_string()))?;

        self.versions
            .update_file(version_id, &key, DocumentKind::Video, self.storage.backend_type())
            .await
            .context("Failed to update version after optimization")?;

        progress.report(100, "Video optimization complete");
        Ok(VideoOutcome::Optimized)
    }

    /// Stream a stored object into a local file so peak memory stays at
    /// chunk size even for multi-hundred-megabyte sources.
    async fn download_to(&self, storage_key: &str, dest: &Path) -> Result<(), StorageError> {
        let mut stream = self.storage.get_object_stream(storage_key).await?;
        let mut file = tokio::fs::File::create(dest).await?;
        while let Some(chunk) = stream.next().await {
            file.write_all(&chunk?).await?;
        }
        file.flush().await?;
        Ok(())
    }
}
