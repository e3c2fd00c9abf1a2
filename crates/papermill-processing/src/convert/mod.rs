//! Per-format converters: each turns an uploaded source into a canonical
//! PDF (office, CAD) or an optimized media file (video).
//!
//! Conversion success is durable: once the produced file is saved and the
//! version updated, a failure in the chained rasterization is logged but
//! never rolls the conversion back.

pub mod cad;
pub mod office;
pub mod video;

pub use cad::{CadConverter, CadExporter, CadJobStatus, HttpCadExporter};
pub use office::{HttpOfficeRenderer, OfficeConverter, OfficeRenderer};
pub use video::{FfmpegVideoTool, VideoOptimizer, VideoOutcome, VideoProbe, VideoTool};

/// Result of an office/CAD conversion run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConvertOutcome {
    Completed {
        /// Whether the chained rasterization also succeeded. `false` is
        /// still a successful conversion (explicit partial-success policy).
        rasterized: bool,
    },
    /// Version, document, or source object no longer exists; the run
    /// aborted quietly.
    SourceMissing,
}
