use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::storage_types::StorageBackend;

/// A link hot-zone extracted from a rendered page. The bounding box is the
/// wire format consumed by the viewer: `"x0,y0,x1,y1"` in page points.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkAnnotation {
    pub uri: String,
    pub bounding_box: String,
}

impl LinkAnnotation {
    pub fn new(uri: impl Into<String>, x0: f32, y0: f32, x1: f32, y1: f32) -> Self {
        Self {
            uri: uri.into(),
            bounding_box: format!("{},{},{},{}", x0, y0, x1, y1),
        }
    }
}

/// How a page was rendered: source geometry in points, output geometry in
/// pixels, and the scale factor that connects them.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderMetrics {
    pub original_width: f32,
    pub original_height: f32,
    pub rendered_width: u32,
    pub rendered_height: u32,
    pub scale_factor: u32,
}

/// One rendered page of a document version. Created once by the
/// rasterizer and never mutated; `(version_id, page_number)` is unique.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentPage {
    pub id: Uuid,
    pub version_id: Uuid,
    pub page_number: i32,
    pub image_key: String,
    pub storage_backend: StorageBackend,
    pub links: Vec<LinkAnnotation>,
    pub render: RenderMetrics,
    pub created_at: DateTime<Utc>,
}

/// Insert payload for a page record; the store assigns id and timestamp.
#[derive(Debug, Clone)]
pub struct NewDocumentPage {
    pub version_id: Uuid,
    pub page_number: i32,
    pub image_key: String,
    pub storage_backend: StorageBackend,
    pub links: Vec<LinkAnnotation>,
    pub render: RenderMetrics,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounding_box_wire_format() {
        let link = LinkAnnotation::new("https://example.com", 10.0, 20.5, 110.0, 40.5);
        assert_eq!(link.bounding_box, "10,20.5,110,40.5");
        assert_eq!(link.uri, "https://example.com");
    }

    #[test]
    fn render_metrics_serialize_camel_case() {
        let metrics = RenderMetrics {
            original_width: 612.0,
            original_height: 792.0,
            rendered_width: 1836,
            rendered_height: 2376,
            scale_factor: 3,
        };
        let json = serde_json::to_value(&metrics).unwrap();
        assert_eq!(json["originalWidth"], 612.0);
        assert_eq!(json["renderedWidth"], 1836);
        assert_eq!(json["scaleFactor"], 3);
    }
}
