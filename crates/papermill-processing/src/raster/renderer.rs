//! PDF page rendering behind a seam.
//!
//! The production implementation wraps pdfium, which is a C++ library with
//! thread-local state; every call runs inside `tokio::task::spawn_blocking`
//! so CPU-heavy rendering never stalls the async workers. Tests substitute
//! a scripted in-memory renderer.

use async_trait::async_trait;
use bytes::Bytes;
use image::RgbImage;
use papermill_core::models::LinkAnnotation;
use pdfium_render::prelude::*;

/// Page size in PDF points (1/72 inch).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageGeometry {
    pub width_pts: f32,
    pub height_pts: f32,
}

/// One rendered page: the RGB raster plus the link hot-zones extracted
/// from the page's annotations.
pub struct RenderedPage {
    pub image: RgbImage,
    pub links: Vec<LinkAnnotation>,
}

/// Rendering operations the rasterizer needs. Page numbers are 1-based.
#[async_trait]
pub trait PageRenderer: Send + Sync {
    async fn page_count(&self, pdf: &Bytes) -> anyhow::Result<u32>;

    async fn page_geometry(&self, pdf: &Bytes, page_number: u32) -> anyhow::Result<PageGeometry>;

    async fn render_page(
        &self,
        pdf: &Bytes,
        page_number: u32,
        scale_factor: u32,
    ) -> anyhow::Result<RenderedPage>;
}

/// pdfium-backed renderer. Holds no pdfium state itself; each operation
/// binds pdfium and reopens the document on a blocking thread, which keeps
/// the type `Send + Sync` without sharing C++ handles across threads.
pub struct PdfiumRenderer;

impl PdfiumRenderer {
    pub fn new() -> Self {
        Self
    }
}

impl Default for PdfiumRenderer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PageRenderer for PdfiumRenderer {
    async fn page_count(&self, pdf: &Bytes) -> anyhow::Result<u32> {
        let pdf = pdf.clone();
        tokio::task::spawn_blocking(move || {
            let pdfium = Pdfium::default();
            let document = pdfium
                .load_pdf_from_byte_slice(&pdf, None)
                .map_err(|e| anyhow::anyhow!("Failed to open PDF: {:?}", e))?;
            Ok(document.pages().len() as u32)
        })
        .await
        .map_err(|e| anyhow::anyhow!("Page count task panicked: {}", e))?
    }

    async fn page_geometry(&self, pdf: &Bytes, page_number: u32) -> anyhow::Result<PageGeometry> {
        let pdf = pdf.clone();
        tokio::task::spawn_blocking(move || {
            let pdfium = Pdfium::default();
            let document = pdfium
                .load_pdf_from_byte_slice(&pdf, None)
                .map_err(|e| anyhow::anyhow!("Failed to open PDF: {:?}", e))?;
            let page = document
                .pages()
                .get((page_number - 1) as u16)
                .map_err(|e| anyhow::anyhow!("Failed to open page {}: {:?}", page_number, e))?;
            Ok(PageGeometry {
                width_pts: page.width().value,
                height_pts: page.height().value,
            })
        })
        .await
        .map_err(|e| anyhow::anyhow!("Geometry task panicked: {}", e))?
    }

    async fn render_page(
        &self,
        pdf: &Bytes,
        page_number: u32,
        scale_factor: u32,
    ) -> anyhow::Result<RenderedPage> {
        let pdf = pdf.clone();
        tokio::task::spawn_blocking(move || {
            let pdfium = Pdfium::default();
            let document = pdfium
                .load_pdf_from_byte_slice(&pdf, None)
                .map_err(|e| anyhow::anyhow!("Failed to open PDF: {:?}", e))?;
            let page = document
                .pages()
                .get((page_number - 1) as u16)
                .map_err(|e| anyhow::anyhow!("Failed to open page {}: {:?}", page_number, e))?;

            let render_config = PdfRenderConfig::new().scale_page_by_factor(scale_factor as f32);
            let bitmap = page
                .render_with_config(&render_config)
                .map_err(|e| anyhow::anyhow!("Failed to render page {}: {:?}", page_number, e))?;
            let image = bitmap.as_image().to_rgb8();

            let links = extract_links(&page);

            tracing::debug!(
                page = page_number,
                width = image.width(),
                height = image.height(),
                link_count = links.len(),
                "Page rendered"
            );

            Ok(RenderedPage { image, links })
        })
        .await
        .map_err(|e| anyhow::anyhow!("Render task panicked: {}", e))?
    }
}

/// Pull URI link annotations off a page as `{uri, "x0,y0,x1,y1"}` tuples.
/// Links without a URI action or readable bounds are skipped.
fn extract_links(page: &PdfPage<'_>) -> Vec<LinkAnnotation> {
    let mut links = Vec::new();
    for link in page.links().iter() {
        let Some(action) = link.action() else {
            continue;
        };
        let Some(uri_action) = action.as_uri_action() else {
            continue;
        };
        let Ok(uri) = uri_action.uri() else {
            continue;
        };
        let Ok(bounds) = link.rect() else {
            continue;
        };
        links.push(LinkAnnotation::new(
            uri,
            bounds.left.value,
            bounds.bottom.value,
            bounds.right.value,
            bounds.top.value,
        ));
    }
    links
}
