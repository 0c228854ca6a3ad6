use anyhow::{Context, Result};
use base64::{engine::general_purpose, Engine};
use image::{DynamicImage, ImageFormat, RgbaImage};
use std::io::Cursor;

/// Synchronous PNG encoding. Callers are responsible for keeping this off
/// the async runtime; the orchestrator runs it inside its render and
/// compose spawn_blocking closures.
pub fn encode_png_sync(img: &RgbaImage) -> Result<Vec<u8>> {
    let mut png_bytes = Vec::new();
    let mut cursor = Cursor::new(&mut png_bytes);
    DynamicImage::ImageRgba8(img.clone())
        .write_to(&mut cursor, ImageFormat::Png)
        .context("Failed to encode image as PNG")?;
    Ok(png_bytes)
}

/// Scale the image to cover the target box, then center-crop the overflow.
/// The result is exactly `width` x `height` with no letterboxing.
pub fn aspect_fill_crop(img: &DynamicImage, width: u32, height: u32) -> RgbaImage {
    let (src_w, src_h) = (img.width().max(1), img.height().max(1));

    // Scale factor that covers both dimensions
    let scale = (width as f64 / src_w as f64).max(height as f64 / src_h as f64);
    let scaled_w = ((src_w as f64 * scale).ceil() as u32).max(width);
    let scaled_h = ((src_h as f64 * scale).ceil() as u32).max(height);

    let scaled = img.resize_exact(scaled_w, scaled_h, image::imageops::FilterType::Triangle);
    let x = (scaled_w - width) / 2;
    let y = (scaled_h - height) / 2;
    scaled.crop_imm(x, y, width, height).to_rgba8()
}

/// Encode PNG bytes as a `data:image/png;base64,` URL for JSON responses.
pub fn to_data_url(png_bytes: &[u8]) -> String {
    format!(
        "data:image/png;base64,{}",
        general_purpose::STANDARD.encode(png_bytes)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn red_image(w: u32, h: u32) -> DynamicImage {
        DynamicImage::ImageRgba8(RgbaImage::from_pixel(w, h, Rgba([255, 0, 0, 255])))
    }

    #[test]
    fn sync_encode_produces_a_loadable_png() {
        let png = encode_png_sync(&red_image(16, 16).to_rgba8()).unwrap();
        let back = image::load_from_memory(&png).unwrap();
        assert_eq!(back.width(), 16);
        assert_eq!(back.height(), 16);
    }

    #[test]
    fn aspect_fill_always_matches_target() {
        for (sw, sh) in [(100, 100), (200, 50), (50, 200), (3, 3)] {
            let out = aspect_fill_crop(&red_image(sw, sh), 64, 96);
            assert_eq!(out.dimensions(), (64, 96));
        }
    }

    #[test]
    fn data_url_prefix() {
        assert!(to_data_url(&[1, 2, 3]).starts_with("data:image/png;base64,"));
    }
}
