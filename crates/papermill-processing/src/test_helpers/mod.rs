//! In-memory implementations of the pipeline's seams for testing.
//!
//! These mocks allow exercising converters and the rasterizer without a
//! database, object store, pdfium, or ffmpeg.

pub mod fake_renderer;
pub mod memory_storage;
pub mod mock_stores;

pub use fake_renderer::{FakePage, FakeRenderer};
pub use memory_storage::MemoryStorage;
pub use mock_stores::{CollectingProgress, MockMetadataStore};
