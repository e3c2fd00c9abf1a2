//! Dispatcher mapping: each declared type starts exactly the right path.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use papermill_core::models::DocumentKind;
use papermill_processing::convert::video::TranscodeParams;
use papermill_processing::convert::{
    CadConverter, CadExporter, CadJobStatus, OfficeConverter, OfficeRenderer, VideoOptimizer,
    VideoProbe, VideoTool,
};
use papermill_processing::progress::{NoopProgress, ProgressSink};
use papermill_processing::raster::Rasterizer;
use papermill_processing::retry::{ExternalError, RetryPolicy};
use papermill_processing::test_helpers::{
    FakePage, FakeRenderer, MemoryStorage, MockMetadataStore,
};
use papermill_worker::Dispatcher;

struct StubOfficeRenderer;

#[async_trait]
impl OfficeRenderer for StubOfficeRenderer {
    async fn render_pdf(&self, _file_name: &str, _data: Vec<u8>) -> Result<Vec<u8>, ExternalError> {
        Ok(b"%PDF-1.7 stub".to_vec())
    }
}

struct StubCadExporter;

#[async_trait]
impl CadExporter for StubCadExporter {
    async fn import(&self, _file_name: &str, _data: Vec<u8>) -> Result<String, ExternalError> {
        Ok("import".to_string())
    }

    async fn convert(&self, _import_id: &str) -> Result<String, ExternalError> {
        Ok("job".to_string())
    }

    async fn job_status(&self, _job_id: &str) -> Result<CadJobStatus, ExternalError> {
        Ok(CadJobStatus::Succeeded)
    }

    async fn export(&self, _job_id: &str) -> Result<Vec<u8>, ExternalError> {
        Ok(b"%PDF-1.7 stub".to_vec())
    }
}

struct StubVideoTool;

#[async_trait]
impl VideoTool for StubVideoTool {
    async fn probe(&self, _path: &Path) -> anyhow::Result<VideoProbe> {
        Ok(VideoProbe {
            width: 1280,
            height: 720,
            framerate: 30.0,
            duration_secs: 10.0,
        })
    }

    async fn transcode(
        &self,
        _input: &Path,
        output: &Path,
        _params: &TranscodeParams,
    ) -> anyhow::Result<()> {
        tokio::fs::write(output, b"optimized").await?;
        Ok(())
    }
}

fn dispatcher_for(store: &MockMetadataStore, storage: &MemoryStorage) -> Dispatcher {
    let store = Arc::new(store.clone());
    let storage: Arc<MemoryStorage> = Arc::new(storage.clone());

    let rasterizer = Arc::new(Rasterizer::new(
        store.clone(),
        store.clone(),
        store.clone(),
        storage.clone(),
        Arc::new(FakeRenderer::new(vec![FakePage::letter(), FakePage::letter()])),
    ));

    let office = Arc::new(OfficeConverter::new(
        store.clone(),
        store.clone(),
        storage.clone(),
        Arc::new(StubOfficeRenderer),
        rasterizer.clone(),
        RetryPolicy::default(),
    ));

    let cad = Arc::new(CadConverter::new(
        store.clone(),
        store.clone(),
        storage.clone(),
        Arc::new(StubCadExporter),
        rasterizer.clone(),
        RetryPolicy::default(),
    ));

    let video = Arc::new(VideoOptimizer::new(
        store.clone(),
        store,
        storage,
        Arc::new(StubVideoTool),
        500 * 1024 * 1024,
    ));

    Dispatcher::new(office, cad, video, rasterizer, None)
}

#[tokio::test]
async fn pdf_version_goes_straight_to_rasterization() {
    let store = MockMetadataStore::new();
    let storage = MemoryStorage::new();
    let (_, version) = store.seed_version(DocumentKind::Pdf, "team/doc/report.pdf", 4096);
    storage.insert("team/doc/report.pdf", b"%PDF".to_vec());

    let dispatcher = dispatcher_for(&store, &storage);
    dispatcher
        .run(version.id, version.document_id, version.kind, &NoopProgress)
        .await
        .unwrap();

    let updated = store.version(version.id).unwrap();
    assert!(updated.has_pages);
    assert_eq!(updated.num_pages, Some(2));
    // Still a PDF: no conversion ran.
    assert_eq!(updated.kind, DocumentKind::Pdf);
}

#[tokio::test]
async fn docs_version_is_converted_then_rasterized() {
    let store = MockMetadataStore::new();
    let storage = MemoryStorage::new();
    let (_, version) = store.seed_version(DocumentKind::Docs, "team/doc/report.docx", 4096);
    storage.insert("team/doc/report.docx", b"docx".to_vec());

    let dispatcher = dispatcher_for(&store, &storage);
    dispatcher
        .run(version.id, version.document_id, version.kind, &NoopProgress)
        .await
        .unwrap();

    let updated = store.version(version.id).unwrap();
    assert_eq!(updated.kind, DocumentKind::Pdf);
    assert!(updated.has_pages);
}

#[tokio::test]
async fn cad_version_is_converted_then_rasterized() {
    let store = MockMetadataStore::new();
    let storage = MemoryStorage::new();
    let (_, version) = store.seed_version(DocumentKind::Cad, "team/doc/plan.dwg", 4096);
    storage.insert("team/doc/plan.dwg", b"dwg".to_vec());

    let dispatcher = dispatcher_for(&store, &storage);
    dispatcher
        .run(version.id, version.document_id, version.kind, &NoopProgress)
        .await
        .unwrap();

    let updated = store.version(version.id).unwrap();
    assert_eq!(updated.kind, DocumentKind::Pdf);
    assert!(updated.has_pages);
}

#[tokio::test]
async fn video_version_is_optimized_without_pages() {
    let store = MockMetadataStore::new();
    let storage = MemoryStorage::new();
    let (_, version) = store.seed_version(DocumentKind::Video, "team/doc/clip.mp4", 4096);
    storage.insert("team/doc/clip.mp4", b"mp4".to_vec());

    let dispatcher = dispatcher_for(&store, &storage);
    dispatcher
        .run(version.id, version.document_id, version.kind, &NoopProgress)
        .await
        .unwrap();

    let updated = store.version(version.id).unwrap();
    assert_eq!(updated.duration_secs, Some(10.0));
    assert!(!updated.has_pages);
    assert_eq!(store.page_count_for(version.id), 0);
}

#[tokio::test]
async fn sheet_version_bypasses_the_pipeline() {
    let store = MockMetadataStore::new();
    let storage = MemoryStorage::new();
    let (_, version) = store.seed_version(DocumentKind::Sheet, "team/doc/grid.sheet", 4096);
    storage.insert("team/doc/grid.sheet", b"sheet".to_vec());

    let dispatcher = dispatcher_for(&store, &storage);
    dispatcher
        .run(version.id, version.document_id, version.kind, &NoopProgress)
        .await
        .unwrap();

    let unchanged = store.version(version.id).unwrap();
    assert_eq!(unchanged.kind, DocumentKind::Sheet);
    assert!(!unchanged.has_pages);
    assert_eq!(unchanged.file_key, "team/doc/grid.sheet");
    assert_eq!(store.page_count_for(version.id), 0);
}

#[tokio::test]
async fn dispatch_runs_detached_from_the_caller() {
    let store = MockMetadataStore::new();
    let storage = MemoryStorage::new();
    let (_, version) = store.seed_version(DocumentKind::Pdf, "team/doc/report.pdf", 4096);
    storage.insert("team/doc/report.pdf", b"%PDF".to_vec());

    let dispatcher = dispatcher_for(&store, &storage);
    let progress: Arc<dyn ProgressSink> = Arc::new(NoopProgress);
    dispatcher.dispatch(&version, progress);

    // The call returned immediately; poll for the detached task's effect.
    let mut done = false;
    for _ in 0..100 {
        if store.version(version.id).unwrap().has_pages {
            done = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(done, "detached pipeline task never completed");
}

#[tokio::test]
async fn failed_task_leaves_version_without_pages() {
    let store = MockMetadataStore::new();
    let storage = MemoryStorage::new();
    // Source object missing from storage entirely: converter aborts quietly,
    // no pages appear, and dispatch itself never surfaces an error.
    let (_, version) = store.seed_version(DocumentKind::Pdf, "team/doc/gone.pdf", 4096);

    let dispatcher = dispatcher_for(&store, &storage);
    dispatcher
        .run(version.id, version.document_id, version.kind, &NoopProgress)
        .await
        .unwrap();

    let unchanged = store.version(version.id).unwrap();
    assert!(!unchanged.has_pages);
}
