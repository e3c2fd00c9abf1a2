//! Scale selection and deterministic raster encoding.
//!
//! Every render is encoded both losslessly (PNG) and lossily (JPEG at
//! quality 80) and the strictly smaller output wins; a tie keeps the
//! PNG. The choice is content-dependent: text-heavy pages compress better
//! as PNG, photographic pages as JPEG.

use std::io::Cursor;

use image::codecs::jpeg::JpegEncoder;
use image::{ImageFormat, RgbImage};

/// Pages at or above this width (in points) render at the lower scale so
/// very wide layouts don't explode in pixel count.
pub const WIDE_PAGE_THRESHOLD_PTS: f32 = 1600.0;

const JPEG_QUALITY: u8 = 80;

/// Deterministic scale rule: wide pages render at 2x, everything else at 3x.
pub fn scale_factor(page_width_pts: f32) -> u32 {
    if page_width_pts >= WIDE_PAGE_THRESHOLD_PTS {
        2
    } else {
        3
    }
}

/// An encoded page image with its content type and file extension.
#[derive(Debug, Clone)]
pub struct EncodedImage {
    pub bytes: Vec<u8>,
    pub content_type: &'static str,
    pub extension: &'static str,
}

/// Encode the raster both ways and keep the smaller output.
pub fn encode_smaller(image: &RgbImage) -> anyhow::Result<EncodedImage> {
    let (png, jpeg) = encode_both(image)?;
    Ok(select_smaller(png, jpeg))
}

fn encode_both(image: &RgbImage) -> anyhow::Result<(Vec<u8>, Vec<u8>)> {
    let mut png = Vec::new();
    image.write_to(&mut Cursor::new(&mut png), ImageFormat::Png)?;

    let mut jpeg = Vec::new();
    let mut jpeg_cursor = Cursor::new(&mut jpeg);
    let encoder = JpegEncoder::new_with_quality(&mut jpeg_cursor, JPEG_QUALITY);
    image.write_with_encoder(encoder)?;

    Ok((png, jpeg))
}

/// Strict `<` so a tie keeps the lossless encoding.
fn select_smaller(png: Vec<u8>, jpeg: Vec<u8>) -> EncodedImage {
    if jpeg.len() < png.len() {
        EncodedImage {
            bytes: jpeg,
            content_type: "image/jpeg",
            extension: ".jpg",
        }
    } else {
        EncodedImage {
            bytes: png,
            content_type: "image/png",
            extension: ".png",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn scale_factor_boundary() {
        assert_eq!(scale_factor(1599.0), 3);
        assert_eq!(scale_factor(1599.9), 3);
        assert_eq!(scale_factor(1600.0), 2);
        assert_eq!(scale_factor(1601.0), 2);
        assert_eq!(scale_factor(612.0), 3);
        assert_eq!(scale_factor(2400.0), 2);
    }

    #[test]
    fn tie_selects_lossless() {
        let chosen = select_smaller(vec![0u8; 100], vec![1u8; 100]);
        assert_eq!(chosen.content_type, "image/png");
        assert_eq!(chosen.extension, ".png");
    }

    #[test]
    fn smaller_jpeg_wins() {
        let chosen = select_smaller(vec![0u8; 101], vec![1u8; 100]);
        assert_eq!(chosen.content_type, "image/jpeg");
        assert_eq!(chosen.extension, ".jpg");
    }

    #[test]
    fn smaller_png_wins() {
        let chosen = select_smaller(vec![0u8; 99], vec![1u8; 100]);
        assert_eq!(chosen.content_type, "image/png");
    }

    #[test]
    fn encode_smaller_picks_minimum_of_both() {
        // Deterministic pseudo-noise so neither encoder gets a free ride.
        let mut state = 0x2545_F491u32;
        let image = RgbImage::from_fn(96, 96, |_, _| {
            state = state.wrapping_mul(1_103_515_245).wrapping_add(12_345);
            let v = (state >> 16) as u8;
            Rgb([v, v.wrapping_add(85), v.wrapping_add(170)])
        });

        let (png, jpeg) = encode_both(&image).unwrap();
        let chosen = encode_smaller(&image).unwrap();
        assert_eq!(chosen.bytes.len(), png.len().min(jpeg.len()));
    }

    #[test]
    fn flat_page_prefers_png() {
        let image = RgbImage::from_pixel(128, 128, Rgb([255, 255, 255]));
        let chosen = encode_smaller(&image).unwrap();
        assert_eq!(chosen.content_type, "image/png");
    }
}
