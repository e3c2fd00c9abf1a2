use std::sync::Mutex;

use async_trait::async_trait;
use bytes::Bytes;
use image::{Rgb, RgbImage};
use papermill_core::models::LinkAnnotation;

use crate::raster::renderer::{PageGeometry, PageRenderer, RenderedPage};

/// Scripted page for the fake renderer.
#[derive(Clone)]
pub struct FakePage {
    pub width_pts: f32,
    pub height_pts: f32,
    pub links: Vec<LinkAnnotation>,
}

impl FakePage {
    /// US Letter portrait page with no links.
    pub fn letter() -> Self {
        Self {
            width_pts: 612.0,
            height_pts: 792.0,
            links: Vec::new(),
        }
    }
}

/// Renderer that serves scripted pages without touching pdfium. Can be
/// told to fail on a specific page to exercise abort behavior.
pub struct FakeRenderer {
    pages: Vec<FakePage>,
    fail_on_page: Option<u32>,
    render_calls: Mutex<Vec<u32>>,
}

impl FakeRenderer {
    pub fn new(pages: Vec<FakePage>) -> Self {
        Self {
            pages,
            fail_on_page: None,
            render_calls: Mutex::new(Vec::new()),
        }
    }

    pub fn failing_on(pages: Vec<FakePage>, fail_on_page: u32) -> Self {
        Self {
            pages,
            fail_on_page: Some(fail_on_page),
            render_calls: Mutex::new(Vec::new()),
        }
    }

    pub fn rendered_pages(&self) -> Vec<u32> {
        self.render_calls.lock().unwrap().clone()
    }

    fn page(&self, page_number: u32) -> anyhow::Result<&FakePage> {
        self.pages
            .get((page_number - 1) as usize)
            .ok_or_else(|| anyhow::anyhow!("page {} out of range", page_number))
    }
}

#[async_trait]
impl PageRenderer for FakeRenderer {
    async fn page_count(&self, _pdf: &Bytes) -> anyhow::Result<u32> {
        Ok(self.pages.len() as u32)
    }

    async fn page_geometry(&self, _pdf: &Bytes, page_number: u32) -> anyhow::Result<PageGeometry> {
        let page = self.page(page_number)?;
        Ok(PageGeometry {
            width_pts: page.width_pts,
            height_pts: page.height_pts,
        })
    }

    async fn render_page(
        &self,
        _pdf: &Bytes,
        page_number: u32,
        scale_factor: u32,
    ) -> anyhow::Result<RenderedPage> {
        if self.fail_on_page == Some(page_number) {
            anyhow::bail!("scripted failure on page {}", page_number);
        }
        let page = self.page(page_number)?;
        self.render_calls.lock().unwrap().push(page_number);

        let width = (page.width_pts as u32) * scale_factor;
        let height = (page.height_pts as u32) * scale_factor;
        // Small flat raster; encoding choice is not under test here.
        let image = RgbImage::from_pixel(width.min(64).max(1), height.min(64).max(1), Rgb([240, 240, 240]));

        Ok(RenderedPage {
            image,
            links: page.links.clone(),
        })
    }
}
