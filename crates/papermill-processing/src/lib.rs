//! Papermill processing pipeline
//!
//! The conversion and rasterization stages of the preview pipeline:
//!
//! - `convert` — per-format converters (office, CAD, video) that normalize
//!   uploads into a canonical PDF or optimized media file;
//! - `raster` — renders each PDF page to a bitmap, picks the smaller of
//!   two encodings, extracts link hot-zones, and persists page records;
//! - `retry` — failure classification and the bounded backoff policy the
//!   converters share;
//! - `progress` — the best-effort progress sink threaded through every
//!   stage;
//! - `store` — narrow metadata-store seams implemented by the embedding
//!   application and mocked in tests.

pub mod convert;
pub mod progress;
pub mod raster;
pub mod retry;
pub mod store;
pub mod test_helpers;

pub use convert::{CadConverter, ConvertOutcome, OfficeConverter, VideoOptimizer};
pub use progress::{NoopProgress, ProgressSink};
pub use raster::{RasterOutcome, Rasterizer};
pub use retry::{FailureKind, RetryPolicy};
pub use store::{DocumentStore, PageStore, VersionStore};
