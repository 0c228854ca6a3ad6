// Page composition: paper background, drop-shadowed panel cards, aspect-fill
// panel art, ink borders and an optional title banner.
//
// Panel preparation (decode + crop) runs in parallel with rayon; the final
// composite is sequential so draw order stays deterministic.

use std::sync::Arc;

use image::{Rgba, RgbaImage};
use rayon::prelude::*;
use tracing::{debug, warn};

use crate::core::errors::{CompositionError, CompositionResult};
use crate::core::types::RenderedPanel;
use crate::services::layout::{PageGeometry, PanelSlot, Rect};
use crate::services::typesetting::ComicTextRenderer;

const PAPER: Rgba<u8> = Rgba([250, 247, 240, 255]);
const INK: Rgba<u8> = Rgba([28, 24, 20, 255]);
const CARD: Rgba<u8> = Rgba([255, 255, 255, 255]);
const SHADOW_OFFSET: i32 = 6;
const SHADOW_ALPHA: u8 = 60;
const CARD_PADDING: u32 = 10;
const BORDER_WIDTH: u32 = 3;

pub struct PageCompositor {
    text: Arc<ComicTextRenderer>,
}

impl PageCompositor {
    pub fn new(text: Arc<ComicTextRenderer>) -> Self {
        Self { text }
    }

    /// Compose one page. `panels[i].index` is the page-local slot index.
    /// Panels whose bytes fail to decode are skipped; a page with zero
    /// usable panels is an error and gets dropped by the caller.
    pub fn compose(
        &self,
        panels: &[RenderedPanel],
        slots: &[PanelSlot],
        geometry: PageGeometry,
        title: Option<&str>,
        page_number: usize,
    ) -> CompositionResult<RgbaImage> {
        // Decode and crop in parallel, keyed by slot
        let prepared: Vec<(usize, RgbaImage)> = panels
            .par_iter()
            .filter_map(|panel| {
                let slot = slots.get(panel.index)?;
                let inner = inset(slot.rect, CARD_PADDING);
                match image::load_from_memory(&panel.image_bytes) {
                    Ok(img) => {
                        let cropped =
                            crate::utils::image_ops::aspect_fill_crop(&img, inner.w, inner.h);
                        Some((panel.index, cropped))
                    }
                    Err(e) => {
                        warn!(panel = panel.index, "undecodable panel dropped: {e}");
                        None
                    }
                }
            })
            .collect();

        if prepared.is_empty() {
            return Err(CompositionError::NoPanels { page_number });
        }

        let mut page = RgbaImage::from_pixel(geometry.width, geometry.height, PAPER);

        if page_number == 0 {
            if let Some(title) = title {
                self.draw_title_banner(&mut page, title, geometry);
            }
        }

        let mut prepared = prepared;
        prepared.sort_by_key(|(index, _)| *index);

        for (index, art) in &prepared {
            let slot = slots[*index];
            let frame = slot.rect;
            let inner = inset(frame, CARD_PADDING);

            draw_shadow(&mut page, frame);
            fill_rect(&mut page, frame, CARD);
            image::imageops::overlay(&mut page, art, inner.x as i64, inner.y as i64);
            stroke_rect(&mut page, frame, BORDER_WIDTH, INK);
        }

        debug!(
            page = page_number,
            panels = prepared.len(),
            "page composed"
        );
        Ok(page)
    }

    /// Title centered in the top margin band of the first page.
    fn draw_title_banner(&self, page: &mut RgbaImage, title: &str, geometry: PageGeometry) {
        let band_h = geometry.margin as f32;
        let max_width = geometry.content_width() as f32;
        let font_size = self
            .text
            .fit_size(title, max_width, band_h * 0.8, 10.0, band_h * 0.7);

        self.text.draw_centered(
            page,
            title,
            font_size,
            INK,
            (geometry.width / 2) as i32,
            (band_h * 0.12) as i32,
            max_width,
        );
    }
}

fn inset(rect: Rect, by: u32) -> Rect {
    let by = by.min(rect.w / 2).min(rect.h / 2);
    Rect {
        x: rect.x + by,
        y: rect.y + by,
        w: rect.w - by * 2,
        h: rect.h - by * 2,
    }
}

fn fill_rect(img: &mut RgbaImage, rect: Rect, color: Rgba<u8>) {
    for y in rect.y..(rect.y + rect.h).min(img.height()) {
        for x in rect.x..(rect.x + rect.w).min(img.width()) {
            img.put_pixel(x, y, color);
        }
    }
}

fn draw_shadow(img: &mut RgbaImage, frame: Rect) {
    let x0 = frame.x as i32 + SHADOW_OFFSET;
    let y0 = frame.y as i32 + SHADOW_OFFSET;
    for dy in 0..frame.h as i32 {
        for dx in 0..frame.w as i32 {
            let (x, y) = (x0 + dx, y0 + dy);
            if x < 0 || y < 0 || x >= img.width() as i32 || y >= img.height() as i32 {
                continue;
            }
            let existing = *img.get_pixel(x as u32, y as u32);
            let alpha = SHADOW_ALPHA as f32 / 255.0;
            let inv = 1.0 - alpha;
            img.put_pixel(
                x as u32,
                y as u32,
                Rgba([
                    (existing[0] as f32 * inv) as u8,
                    (existing[1] as f32 * inv) as u8,
                    (existing[2] as f32 * inv) as u8,
                    255,
                ]),
            );
        }
    }
}

fn stroke_rect(img: &mut RgbaImage, rect: Rect, width: u32, color: Rgba<u8>) {
    fill_rect(img, Rect { x: rect.x, y: rect.y, w: rect.w, h: width }, color);
    fill_rect(
        img,
        Rect {
            x: rect.x,
            y: (rect.y + rect.h).saturating_sub(width),
            w: rect.w,
            h: width,
        },
        color,
    );
    fill_rect(img, Rect { x: rect.x, y: rect.y, w: width, h: rect.h }, color);
    fill_rect(
        img,
        Rect {
            x: (rect.x + rect.w).saturating_sub(width),
            y: rect.y,
            w: width,
            h: rect.h,
        },
        color,
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::LayoutStyle;
    use crate::services::layout::compute_slots;
    use crate::utils::image_ops::encode_png_sync;

    fn compositor() -> PageCompositor {
        PageCompositor::new(Arc::new(ComicTextRenderer::with_font_dir("no-fonts-here")))
    }

    fn geometry() -> PageGeometry {
        PageGeometry {
            width: 512,
            height: 768,
            margin: 24,
            gutter: 10,
        }
    }

    fn panel(index: usize, color: Rgba<u8>) -> RenderedPanel {
        let img = RgbaImage::from_pixel(64, 64, color);
        RenderedPanel {
            index,
            image_bytes: encode_png_sync(&img).unwrap(),
            source_prompt: format!("panel {index}"),
            generation_ms: 1,
        }
    }

    #[test]
    fn composes_full_page() {
        let g = geometry();
        let slots = compute_slots(2, g, LayoutStyle::Vertical);
        let panels = vec![panel(0, Rgba([200, 0, 0, 255])), panel(1, Rgba([0, 0, 200, 255]))];

        let page = compositor()
            .compose(&panels, &slots, g, Some("My Week"), 0)
            .unwrap();
        assert_eq!(page.dimensions(), (512, 768));

        // Paper background in the corner, ink border at a frame edge
        assert_eq!(*page.get_pixel(1, 1), PAPER);
        let frame = slots[0].rect;
        assert_eq!(*page.get_pixel(frame.x + 1, frame.y + 1), INK);
    }

    #[test]
    fn tolerates_missing_panels() {
        let g = geometry();
        let slots = compute_slots(3, g, LayoutStyle::Vertical);
        // Panel 1 failed to render and is absent
        let panels = vec![panel(0, Rgba([10, 10, 10, 255])), panel(2, Rgba([20, 20, 20, 255]))];

        let page = compositor().compose(&panels, &slots, g, None, 1).unwrap();
        // Missing panel's frame stays paper
        let gap = slots[1].rect;
        assert_eq!(*page.get_pixel(gap.x + gap.w / 2, gap.y + gap.h / 2), PAPER);
    }

    #[test]
    fn zero_usable_panels_is_an_error() {
        let g = geometry();
        let slots = compute_slots(1, g, LayoutStyle::Vertical);

        let err = compositor().compose(&[], &slots, g, None, 2).unwrap_err();
        assert!(matches!(err, CompositionError::NoPanels { page_number: 2 }));

        // Undecodable bytes count as unusable too
        let broken = RenderedPanel {
            index: 0,
            image_bytes: vec![1, 2, 3],
            source_prompt: "broken".to_string(),
            generation_ms: 0,
        };
        let err = compositor().compose(&[broken], &slots, g, None, 2).unwrap_err();
        assert!(matches!(err, CompositionError::NoPanels { page_number: 2 }));
    }

    #[test]
    fn panel_art_lands_inside_card() {
        let g = geometry();
        let slots = compute_slots(1, g, LayoutStyle::Vertical);
        let panels = vec![panel(0, Rgba([0, 255, 0, 255]))];

        let page = compositor().compose(&panels, &slots, g, None, 0).unwrap();
        let inner = inset(slots[0].rect, CARD_PADDING);
        let center = *page.get_pixel(inner.x + inner.w / 2, inner.y + inner.h / 2);
        assert_eq!(center, Rgba([0, 255, 0, 255]));
    }
}
