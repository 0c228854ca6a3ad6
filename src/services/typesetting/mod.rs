// Comic lettering built on cosmic-text.
//
// Loads fonts from the fonts/ directory only (no system scan). When no font
// file is present, drawing degrades to a no-op so panel generation never
// fails over lettering.

use cosmic_text::{
    Attrs, Buffer, Color as CosmicColor, Family, FontSystem, Metrics, Shaping, SwashCache, Wrap,
};
use image::{Rgba, RgbaImage};
use parking_lot::Mutex;
use tracing::{debug, info, warn};

const LINE_HEIGHT_RATIO: f32 = 1.35;

/// Synchronous text renderer shared by the placeholder renderer and the
/// page compositor.
pub struct ComicTextRenderer {
    font_system: Mutex<FontSystem>,
    swash_cache: Mutex<SwashCache>,
    has_fonts: bool,
}

impl ComicTextRenderer {
    pub fn new() -> Self {
        Self::with_font_dir("fonts")
    }

    pub fn with_font_dir(dir: &str) -> Self {
        use cosmic_text::fontdb;

        let mut db = fontdb::Database::new();
        let mut loaded = 0usize;

        if let Ok(entries) = std::fs::read_dir(dir) {
            for entry in entries.flatten() {
                let path = entry.path();
                let is_font = path
                    .extension()
                    .and_then(|e| e.to_str())
                    .is_some_and(|e| matches!(e.to_ascii_lowercase().as_str(), "ttf" | "otf" | "ttc"));
                if !is_font {
                    continue;
                }
                match std::fs::read(&path) {
                    Ok(data) => {
                        db.load_font_data(data);
                        loaded += 1;
                        debug!("✓ Font: {}", path.display());
                    }
                    Err(e) => warn!("⚠ Font unreadable: {} ({e})", path.display()),
                }
            }
        }

        if loaded == 0 {
            warn!("No fonts found in {dir}/ - lettering will be skipped");
        } else {
            info!("✓ Lettering ready ({loaded} fonts)");
        }

        Self {
            font_system: Mutex::new(FontSystem::new_with_locale_and_db("en-US".to_string(), db)),
            swash_cache: Mutex::new(SwashCache::new()),
            has_fonts: loaded > 0,
        }
    }

    pub fn has_fonts(&self) -> bool {
        self.has_fonts
    }

    /// Measure wrapped text dimensions in pixels.
    pub fn measure(&self, text: &str, font_size: f32, max_width: Option<f32>) -> (f32, f32) {
        if text.trim().is_empty() || !self.has_fonts {
            return (0.0, 0.0);
        }

        let mut font_system = self.font_system.lock();
        let metrics = Metrics::new(font_size, font_size * LINE_HEIGHT_RATIO);
        let mut buffer = Buffer::new(&mut font_system, metrics);

        if let Some(width) = max_width {
            buffer.set_size(&mut font_system, Some(width), None);
        }
        buffer.set_wrap(&mut font_system, Wrap::Word);

        let attrs = Attrs::new().family(Family::SansSerif);
        buffer.set_text(&mut font_system, text, attrs, Shaping::Advanced);
        buffer.shape_until_scroll(&mut font_system, false);

        let mut width = 0.0f32;
        let mut lines = 0usize;
        for run in buffer.layout_runs() {
            width = width.max(run.line_w);
            lines += 1;
        }
        (width, lines as f32 * metrics.line_height)
    }

    /// Binary search for the largest font size whose wrapped text fits the
    /// given box.
    pub fn fit_size(&self, text: &str, max_width: f32, max_height: f32, min: f32, max: f32) -> f32 {
        let mut low = min;
        let mut high = max;
        let mut best = min;
        for _ in 0..16 {
            let mid = (low + high) / 2.0;
            let (w, h) = self.measure(text, mid, Some(max_width));
            if w <= max_width * 0.95 && h <= max_height {
                best = mid;
                low = mid;
            } else {
                high = mid;
            }
        }
        best
    }

    /// Draw wrapped text at (x, y) with alpha blending. Out-of-canvas pixels
    /// are clipped; missing fonts make this a no-op.
    pub fn draw(
        &self,
        img: &mut RgbaImage,
        text: &str,
        font_size: f32,
        color: Rgba<u8>,
        x: i32,
        y: i32,
        max_width: Option<f32>,
    ) {
        if text.trim().is_empty() || !self.has_fonts {
            return;
        }

        let mut font_system = self.font_system.lock();
        let mut swash_cache = self.swash_cache.lock();

        let metrics = Metrics::new(font_size, font_size * LINE_HEIGHT_RATIO);
        let mut buffer = Buffer::new(&mut font_system, metrics);
        if let Some(width) = max_width {
            buffer.set_size(&mut font_system, Some(width), None);
        }
        buffer.set_wrap(&mut font_system, Wrap::Word);

        let attrs = Attrs::new().family(Family::SansSerif);
        buffer.set_text(&mut font_system, text, attrs, Shaping::Advanced);
        buffer.shape_until_scroll(&mut font_system, false);

        let cosmic_color = CosmicColor::rgba(color[0], color[1], color[2], color[3]);
        buffer.draw(
            &mut font_system,
            &mut swash_cache,
            cosmic_color,
            |px_x, px_y, _w, _h, pixel_color| {
                let img_x = x + px_x;
                let img_y = y + px_y;
                if img_x < 0
                    || img_y < 0
                    || img_x >= img.width() as i32
                    || img_y >= img.height() as i32
                {
                    return;
                }

                let existing = img.get_pixel(img_x as u32, img_y as u32);
                let alpha = pixel_color.a() as f32 / 255.0;
                let inv = 1.0 - alpha;
                let blended = Rgba([
                    ((pixel_color.r() as f32 * alpha) + (existing[0] as f32 * inv)) as u8,
                    ((pixel_color.g() as f32 * alpha) + (existing[1] as f32 * inv)) as u8,
                    ((pixel_color.b() as f32 * alpha) + (existing[2] as f32 * inv)) as u8,
                    existing[3].max(pixel_color.a()),
                ]);
                img.put_pixel(img_x as u32, img_y as u32, blended);
            },
        );
    }

    /// Draw text horizontally centered on `cx`, top-aligned at `y`.
    pub fn draw_centered(
        &self,
        img: &mut RgbaImage,
        text: &str,
        font_size: f32,
        color: Rgba<u8>,
        cx: i32,
        y: i32,
        max_width: f32,
    ) {
        let (w, _) = self.measure(text, font_size, Some(max_width));
        let x = cx - (w / 2.0) as i32;
        self.draw(img, text, font_size, color, x, y, Some(max_width));
    }
}

impl Default for ComicTextRenderer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fonts_degrade_to_noop() {
        let renderer = ComicTextRenderer::with_font_dir("definitely-not-a-dir");
        assert!(!renderer.has_fonts());
        assert_eq!(renderer.measure("hello", 16.0, None), (0.0, 0.0));

        let mut img = RgbaImage::from_pixel(8, 8, Rgba([0, 0, 0, 255]));
        let before = img.clone();
        renderer.draw(&mut img, "hello", 16.0, Rgba([255, 255, 255, 255]), 0, 0, None);
        assert_eq!(img, before);
    }
}
