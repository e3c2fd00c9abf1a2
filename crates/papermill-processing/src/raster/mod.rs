//! PDF rasterization: page rendering, encoding selection, and persistence.

pub mod encode;
pub mod rasterizer;
pub mod renderer;

pub use encode::{scale_factor, EncodedImage};
pub use rasterizer::{RasterOutcome, Rasterizer};
pub use renderer::{PageGeometry, PageRenderer, PdfiumRenderer, RenderedPage};
