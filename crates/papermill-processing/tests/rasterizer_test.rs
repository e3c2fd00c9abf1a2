//! Rasterizer behavior against in-memory stores and a scripted renderer.

use std::sync::Arc;

use papermill_core::models::{DocumentKind, LinkAnnotation};
use papermill_processing::raster::{RasterOutcome, Rasterizer};
use papermill_processing::test_helpers::{
    CollectingProgress, FakePage, FakeRenderer, MemoryStorage, MockMetadataStore,
};
use uuid::Uuid;

fn rasterizer_with(
    store: &MockMetadataStore,
    storage: &MemoryStorage,
    renderer: FakeRenderer,
) -> Rasterizer {
    let store = Arc::new(store.clone());
    Rasterizer::new(
        store.clone(),
        store.clone(),
        store,
        Arc::new(storage.clone()),
        Arc::new(renderer),
    )
}

fn seed_pdf(store: &MockMetadataStore, storage: &MemoryStorage) -> Uuid {
    let (_, version) = store.seed_version(DocumentKind::Pdf, "team/doc/report.pdf", 4096);
    storage.insert("team/doc/report.pdf", b"%PDF-1.7 test".to_vec());
    version.id
}

#[tokio::test]
async fn three_page_pdf_produces_three_pages_and_primary_version() {
    let store = MockMetadataStore::new();
    let storage = MemoryStorage::new();
    let version_id = seed_pdf(&store, &storage);

    let renderer = FakeRenderer::new(vec![
        FakePage::letter(),
        FakePage::letter(),
        FakePage::letter(),
    ]);
    let rasterizer = rasterizer_with(&store, &storage, renderer);

    let progress = CollectingProgress::new();
    let outcome = rasterizer.rasterize(version_id, &progress).await.unwrap();

    assert_eq!(outcome, RasterOutcome::Completed { num_pages: 3 });
    assert_eq!(store.page_count_for(version_id), 3);

    let version = store.version(version_id).unwrap();
    assert_eq!(version.num_pages, Some(3));
    assert!(version.has_pages);
    assert!(version.is_primary);
    // Letter portrait: height > width.
    assert!(version.is_vertical);

    // Progress is monotonically non-decreasing and ends at 100.
    let percents: Vec<u8> = progress.reports().iter().map(|(p, _)| *p).collect();
    assert!(percents.windows(2).all(|w| w[0] <= w[1]));
    assert_eq!(progress.last_percent(), Some(100));
}

#[tokio::test]
async fn failure_on_page_three_keeps_earlier_pages_and_flags_unset() {
    let store = MockMetadataStore::new();
    let storage = MemoryStorage::new();
    let version_id = seed_pdf(&store, &storage);

    let renderer = FakeRenderer::failing_on(vec![FakePage::letter(); 5], 3);
    let rasterizer = rasterizer_with(&store, &storage, renderer);

    let progress = CollectingProgress::new();
    let result = rasterizer.rasterize(version_id, &progress).await;

    assert!(result.is_err());
    assert_eq!(store.page_count_for(version_id), 2);

    let version = store.version(version_id).unwrap();
    assert_eq!(version.num_pages, None);
    assert!(!version.has_pages);
    assert!(!version.is_primary);

    // Pages 1 and 2 completed: 20% then 40%, nothing after the abort.
    assert_eq!(progress.last_percent(), Some(40));
}

#[tokio::test]
async fn rerendering_an_existing_page_returns_it_unchanged() {
    let store = MockMetadataStore::new();
    let storage = MemoryStorage::new();
    let version_id = seed_pdf(&store, &storage);

    let rasterizer = rasterizer_with(
        &store,
        &storage,
        FakeRenderer::new(vec![FakePage::letter()]),
    );
    rasterizer
        .rasterize(version_id, &CollectingProgress::new())
        .await
        .unwrap();

    let first = store.page(version_id, 1).unwrap();

    // Second full run over the same version.
    rasterizer
        .rasterize(version_id, &CollectingProgress::new())
        .await
        .unwrap();

    assert_eq!(store.page_count_for(version_id), 1);
    let second = store.page(version_id, 1).unwrap();
    assert_eq!(second.id, first.id);
    assert_eq!(second.image_key, first.image_key);
    assert_eq!(second.created_at, first.created_at);
}

#[tokio::test]
async fn finalize_demotes_sibling_versions() {
    let store = MockMetadataStore::new();
    let storage = MemoryStorage::new();

    let (document, first) = store.seed_version(DocumentKind::Pdf, "team/doc/v1.pdf", 4096);
    storage.insert("team/doc/v1.pdf", b"%PDF v1".to_vec());

    let mut second = first.clone();
    second.id = Uuid::new_v4();
    second.version_number = 2;
    second.file_key = "team/doc/v2.pdf".to_string();
    store.add_version(second.clone());
    storage.insert("team/doc/v2.pdf", b"%PDF v2".to_vec());

    let rasterizer = rasterizer_with(
        &store,
        &storage,
        FakeRenderer::new(vec![FakePage::letter()]),
    );

    rasterizer
        .rasterize(first.id, &CollectingProgress::new())
        .await
        .unwrap();
    assert_eq!(store.primary_versions_of(document.id), vec![first.id]);

    rasterizer
        .rasterize(second.id, &CollectingProgress::new())
        .await
        .unwrap();
    assert_eq!(store.primary_versions_of(document.id), vec![second.id]);
}

#[tokio::test]
async fn wide_page_renders_at_scale_two() {
    let store = MockMetadataStore::new();
    let storage = MemoryStorage::new();
    let version_id = seed_pdf(&store, &storage);

    let wide = FakePage {
        width_pts: 1600.0,
        height_pts: 900.0,
        links: Vec::new(),
    };
    let rasterizer = rasterizer_with(&store, &storage, FakeRenderer::new(vec![wide]));

    rasterizer
        .rasterize(version_id, &CollectingProgress::new())
        .await
        .unwrap();

    let page = store.page(version_id, 1).unwrap();
    assert_eq!(page.render.scale_factor, 2);
    assert_eq!(page.render.original_width, 1600.0);

    let version = store.version(version_id).unwrap();
    // Landscape page: width > height.
    assert!(!version.is_vertical);
}

#[tokio::test]
async fn link_annotations_survive_to_the_page_record() {
    let store = MockMetadataStore::new();
    let storage = MemoryStorage::new();
    let version_id = seed_pdf(&store, &storage);

    let page = FakePage {
        width_pts: 612.0,
        height_pts: 792.0,
        links: vec![LinkAnnotation::new(
            "https://example.com/pricing",
            72.0,
            700.0,
            240.0,
            716.0,
        )],
    };
    let rasterizer = rasterizer_with(&store, &storage, FakeRenderer::new(vec![page]));

    rasterizer
        .rasterize(version_id, &CollectingProgress::new())
        .await
        .unwrap();

    let record = store.page(version_id, 1).unwrap();
    assert_eq!(record.links.len(), 1);
    assert_eq!(record.links[0].uri, "https://example.com/pricing");
    assert_eq!(record.links[0].bounding_box, "72,700,240,716");
}

#[tokio::test]
async fn missing_version_aborts_quietly() {
    let store = MockMetadataStore::new();
    let storage = MemoryStorage::new();
    let rasterizer = rasterizer_with(&store, &storage, FakeRenderer::new(vec![]));

    let outcome = rasterizer
        .rasterize(Uuid::new_v4(), &CollectingProgress::new())
        .await
        .unwrap();
    assert_eq!(outcome, RasterOutcome::SourceMissing);
}

#[tokio::test]
async fn missing_source_object_aborts_quietly() {
    let store = MockMetadataStore::new();
    let storage = MemoryStorage::new();
    let (_, version) = store.seed_version(DocumentKind::Pdf, "team/doc/gone.pdf", 4096);

    let rasterizer = rasterizer_with(
        &store,
        &storage,
        FakeRenderer::new(vec![FakePage::letter()]),
    );

    let outcome = rasterizer
        .rasterize(version.id, &CollectingProgress::new())
        .await
        .unwrap();
    assert_eq!(outcome, RasterOutcome::SourceMissing);
    assert_eq!(store.page_count_for(version.id), 0);
}

#[tokio::test]
async fn empty_pdf_fails_the_run() {
    let store = MockMetadataStore::new();
    let storage = MemoryStorage::new();
    let version_id = seed_pdf(&store, &storage);

    let rasterizer = rasterizer_with(&store, &storage, FakeRenderer::new(vec![]));

    let result = rasterizer
        .rasterize(version_id, &CollectingProgress::new())
        .await;
    assert!(result.is_err());
}
