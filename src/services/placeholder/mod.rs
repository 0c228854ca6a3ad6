// Procedural placeholder panels.
//
// Deterministic comic-styled artwork from a classified prompt: radial
// gradient background, halftone dots, speed lines, an archetype silhouette,
// a sound-effect starburst and a caption strip. No randomness; the same
// prompt and style always produce the same pixels.

use std::sync::Arc;

use image::{Rgba, RgbaImage};

use crate::core::types::{ArchetypeKind, SceneStyle};
use crate::services::typesetting::ComicTextRenderer;

const CAPTION_MAX_CHARS: usize = 60;

pub struct PlaceholderRenderer {
    text: Arc<ComicTextRenderer>,
}

impl PlaceholderRenderer {
    pub fn new(text: Arc<ComicTextRenderer>) -> Self {
        Self { text }
    }

    /// Render one square panel. Never fails.
    pub fn render(&self, prompt: &str, style: &SceneStyle, size: u32) -> RgbaImage {
        let mut img = RgbaImage::new(size, size);
        let s = size as f32;

        self.paint_gradient(&mut img, style);
        self.paint_halftone(&mut img, style);
        self.paint_speed_lines(&mut img, style);
        self.paint_silhouette(&mut img, style);
        self.paint_starburst(&mut img, style);
        self.paint_caption(&mut img, prompt, style);
        self.paint_border(&mut img, (s * 0.016).max(2.0) as u32);

        img
    }

    fn paint_gradient(&self, img: &mut RgbaImage, style: &SceneStyle) {
        let size = img.width() as f32;
        let center = size / 2.0;
        let max_dist = center * std::f32::consts::SQRT_2;
        let [pr, pg, pb] = style.palette.primary;
        let [sr, sg, sb] = style.palette.secondary;

        for y in 0..img.height() {
            for x in 0..img.width() {
                let dx = x as f32 - center;
                let dy = y as f32 - center;
                let t = ((dx * dx + dy * dy).sqrt() / max_dist).min(1.0);
                let pixel = Rgba([
                    lerp(pr, sr, t),
                    lerp(pg, sg, t),
                    lerp(pb, sb, t),
                    255,
                ]);
                img.put_pixel(x, y, pixel);
            }
        }
    }

    /// Halftone dot grid, strongest near the edges and fading toward center.
    fn paint_halftone(&self, img: &mut RgbaImage, style: &SceneStyle) {
        let size = img.width() as f32;
        let center = size / 2.0;
        let spacing = (size / 18.0).max(6.0) as u32;
        let [sr, sg, sb] = style.palette.secondary;

        let mut y = spacing / 2;
        while y < img.height() {
            let mut x = spacing / 2;
            while x < img.width() {
                let dx = x as f32 - center;
                let dy = y as f32 - center;
                let t = ((dx * dx + dy * dy).sqrt() / center).min(1.0);
                let radius = 1.0 + t * (spacing as f32 * 0.18);
                let alpha = (t * 110.0) as u8;
                fill_circle(
                    img,
                    x as i32,
                    y as i32,
                    radius as i32,
                    Rgba([sr, sg, sb, alpha]),
                );
                x += spacing;
            }
            y += spacing;
        }
    }

    /// Radiating speed lines. Action scenes get more lines starting closer
    /// to the center.
    fn paint_speed_lines(&self, img: &mut RgbaImage, style: &SceneStyle) {
        let size = img.width() as f32;
        let center = size / 2.0;
        let (count, inner_frac) = if style.kind == ArchetypeKind::Action {
            (36, 0.22)
        } else {
            (24, 0.28)
        };
        let inner = size * inner_frac;
        let outer = size * 0.72;
        let [ar, ag, ab] = style.palette.accent;

        for i in 0..count {
            let angle = (i as f32 / count as f32) * std::f32::consts::TAU;
            let (sin, cos) = angle.sin_cos();
            let x0 = center + cos * inner;
            let y0 = center + sin * inner;
            let x1 = center + cos * outer;
            let y1 = center + sin * outer;
            draw_line(img, x0, y0, x1, y1, Rgba([ar, ag, ab, 70]));
        }
    }

    fn paint_silhouette(&self, img: &mut RgbaImage, style: &SceneStyle) {
        let size = img.width() as f32;
        let dark = Rgba([
            style.palette.secondary[0] / 2,
            style.palette.secondary[1] / 2,
            style.palette.secondary[2] / 2,
            255,
        ]);
        let accent = Rgba([
            style.palette.accent[0],
            style.palette.accent[1],
            style.palette.accent[2],
            255,
        ]);
        let cx = (size / 2.0) as i32;
        let cy = (size * 0.58) as i32;
        let unit = size / 10.0;

        match style.kind {
            ArchetypeKind::Hero => {
                // Caped figure, arms raised
                fill_circle(img, cx, cy - (unit * 1.6) as i32, (unit * 0.7) as i32, dark);
                fill_rect(img, cx - (unit * 0.8) as i32, cy - unit as i32, (unit * 1.6) as u32, (unit * 2.2) as u32, dark);
                fill_triangle(
                    img,
                    (cx as f32 - unit * 0.8, cy as f32 - unit),
                    (cx as f32 + unit * 0.8, cy as f32 - unit),
                    (cx as f32 - unit * 1.8, cy as f32 + unit * 1.6),
                    dark,
                );
                // Raised arms
                draw_thick_line(img, cx as f32 - unit * 0.7, cy as f32 - unit * 0.8, cx as f32 - unit * 1.6, cy as f32 - unit * 2.4, unit * 0.25, dark);
                draw_thick_line(img, cx as f32 + unit * 0.7, cy as f32 - unit * 0.8, cx as f32 + unit * 1.6, cy as f32 - unit * 2.4, unit * 0.25, dark);
            }
            ArchetypeKind::Shadow => {
                // Tall tapering form with glowing eyes
                fill_triangle(
                    img,
                    (cx as f32, cy as f32 - unit * 3.0),
                    (cx as f32 - unit * 1.6, cy as f32 + unit * 2.4),
                    (cx as f32 + unit * 1.6, cy as f32 + unit * 2.4),
                    dark,
                );
                fill_circle(img, cx - (unit * 0.35) as i32, cy - (unit * 1.4) as i32, (unit * 0.14).max(1.0) as i32, accent);
                fill_circle(img, cx + (unit * 0.35) as i32, cy - (unit * 1.4) as i32, (unit * 0.14).max(1.0) as i32, accent);
            }
            ArchetypeKind::Monster => {
                // Hulking blob with horns
                fill_circle(img, cx, cy, (unit * 1.8) as i32, dark);
                fill_circle(img, cx - (unit * 1.2) as i32, cy + (unit * 0.8) as i32, (unit * 1.1) as i32, dark);
                fill_circle(img, cx + (unit * 1.2) as i32, cy + (unit * 0.8) as i32, (unit * 1.1) as i32, dark);
                fill_triangle(
                    img,
                    (cx as f32 - unit * 1.0, cy as f32 - unit * 1.3),
                    (cx as f32 - unit * 0.4, cy as f32 - unit * 1.1),
                    (cx as f32 - unit * 1.1, cy as f32 - unit * 2.6),
                    dark,
                );
                fill_triangle(
                    img,
                    (cx as f32 + unit * 1.0, cy as f32 - unit * 1.3),
                    (cx as f32 + unit * 0.4, cy as f32 - unit * 1.1),
                    (cx as f32 + unit * 1.1, cy as f32 - unit * 2.6),
                    dark,
                );
                fill_circle(img, cx - (unit * 0.5) as i32, cy - (unit * 0.4) as i32, (unit * 0.18).max(1.0) as i32, accent);
                fill_circle(img, cx + (unit * 0.5) as i32, cy - (unit * 0.4) as i32, (unit * 0.18).max(1.0) as i32, accent);
            }
            ArchetypeKind::Action => {
                // Door frame with a jagged crack of light
                let door_w = (unit * 2.4) as u32;
                let door_h = (unit * 3.6) as u32;
                let door_x = cx - (door_w / 2) as i32;
                let door_y = cy - (door_h as f32 * 0.6) as i32;
                fill_rect(img, door_x, door_y, door_w, door_h, dark);
                let crack = [
                    (cx as f32, door_y as f32),
                    (cx as f32 - unit * 0.3, door_y as f32 + unit * 1.0),
                    (cx as f32 + unit * 0.25, door_y as f32 + unit * 1.9),
                    (cx as f32 - unit * 0.2, door_y as f32 + unit * 2.8),
                    (cx as f32 + unit * 0.1, door_y as f32 + door_h as f32),
                ];
                for pair in crack.windows(2) {
                    draw_thick_line(img, pair[0].0, pair[0].1, pair[1].0, pair[1].1, (unit * 0.16).max(2.0), accent);
                }
            }
            ArchetypeKind::Flying => {
                // Chevron wings and drifting clouds
                for i in 0..3 {
                    let oy = cy as f32 - unit * 1.5 + i as f32 * unit * 0.9;
                    let span = unit * (2.4 - i as f32 * 0.4);
                    draw_thick_line(img, cx as f32 - span, oy + unit * 0.6, cx as f32, oy, (unit * 0.2).max(2.0), dark);
                    draw_thick_line(img, cx as f32, oy, cx as f32 + span, oy + unit * 0.6, (unit * 0.2).max(2.0), dark);
                }
                let cloud = Rgba([240, 245, 250, 150]);
                fill_circle(img, cx - (unit * 2.6) as i32, cy + (unit * 1.8) as i32, (unit * 0.7) as i32, cloud);
                fill_circle(img, cx - (unit * 2.0) as i32, cy + (unit * 1.9) as i32, (unit * 0.5) as i32, cloud);
                fill_circle(img, cx + (unit * 2.3) as i32, cy + (unit * 2.2) as i32, (unit * 0.6) as i32, cloud);
            }
            ArchetypeKind::Chase => {
                // Two offset running figures with motion dashes
                for (offset, scale) in [(-1.2f32, 1.0f32), (1.0, 0.8)] {
                    let fx = cx as f32 + offset * unit;
                    let fy = cy as f32 + (1.0 - scale) * unit;
                    fill_circle(img, fx as i32, (fy - unit * 1.4 * scale) as i32, (unit * 0.45 * scale) as i32, dark);
                    fill_triangle(
                        img,
                        (fx - unit * 0.6 * scale, fy + unit * scale),
                        (fx + unit * 0.6 * scale, fy + unit * scale),
                        (fx, fy - unit * scale),
                        dark,
                    );
                }
                for i in 0..4 {
                    let y = cy as f32 - unit * 0.6 + i as f32 * unit * 0.5;
                    draw_thick_line(img, cx as f32 - unit * 3.4, y, cx as f32 - unit * 2.4, y, (unit * 0.12).max(1.0), dark);
                }
            }
            ArchetypeKind::Generic => {
                // Rolling hills and a sun
                let hill = dark;
                fill_circle(img, cx - (unit * 1.6) as i32, cy + (unit * 2.4) as i32, (unit * 2.2) as i32, hill);
                fill_circle(img, cx + (unit * 1.8) as i32, cy + (unit * 2.8) as i32, (unit * 2.6) as i32, hill);
                fill_circle(img, cx + (unit * 2.4) as i32, cy - (unit * 2.6) as i32, (unit * 0.8) as i32, accent);
            }
        }
    }

    /// Starburst polygon with the sound-effect token, upper third of the panel.
    fn paint_starburst(&self, img: &mut RgbaImage, style: &SceneStyle) {
        let size = img.width() as f32;
        let cx = size * 0.68;
        let cy = size * 0.2;
        let outer = size * 0.14;
        let inner = outer * 0.55;
        let points = 12;

        let [ar, ag, ab] = style.palette.accent;
        let mut polygon = Vec::with_capacity(points * 2);
        for i in 0..points * 2 {
            let angle = (i as f32 / (points * 2) as f32) * std::f32::consts::TAU
                - std::f32::consts::FRAC_PI_2;
            let r = if i % 2 == 0 { outer } else { inner };
            polygon.push((cx + angle.cos() * r, cy + angle.sin() * r));
        }
        fill_polygon(img, &polygon, Rgba([ar, ag, ab, 235]));

        let font_size = (size * 0.055).max(10.0);
        self.text.draw_centered(
            img,
            &style.sound_effect,
            font_size,
            Rgba([20, 12, 8, 255]),
            cx as i32,
            (cy - font_size * 0.7) as i32,
            outer * 1.8,
        );
    }

    /// Translucent strip along the bottom echoing the prompt.
    fn paint_caption(&self, img: &mut RgbaImage, prompt: &str, style: &SceneStyle) {
        let size = img.width() as f32;
        let strip_h = (size * 0.12) as u32;
        let strip_y = img.height() - strip_h;
        let [sr, sg, sb] = style.palette.secondary;

        for y in strip_y..img.height() {
            for x in 0..img.width() {
                let existing = *img.get_pixel(x, y);
                img.put_pixel(x, y, blend(existing, Rgba([sr, sg, sb, 190])));
            }
        }

        let caption = truncate_chars(prompt, CAPTION_MAX_CHARS);
        let font_size = (size * 0.034).max(9.0);
        self.text.draw(
            img,
            &caption,
            font_size,
            Rgba([245, 242, 235, 255]),
            (size * 0.04) as i32,
            strip_y as i32 + (strip_h as f32 * 0.2) as i32,
            Some(size * 0.92),
        );
    }

    fn paint_border(&self, img: &mut RgbaImage, width: u32) {
        let (w, h) = (img.width(), img.height());
        let border = Rgba([24, 20, 18, 255]);
        fill_rect(img, 0, 0, w, width, border);
        fill_rect(img, 0, h.saturating_sub(width) as i32, w, width, border);
        fill_rect(img, 0, 0, width, h, border);
        fill_rect(img, w.saturating_sub(width) as i32, 0, width, h, border);
    }
}

fn lerp(a: u8, b: u8, t: f32) -> u8 {
    (a as f32 + (b as f32 - a as f32) * t) as u8
}

fn truncate_chars(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let cut: String = text.chars().take(max.saturating_sub(1)).collect();
    format!("{}…", cut.trim_end())
}

fn blend(under: Rgba<u8>, over: Rgba<u8>) -> Rgba<u8> {
    let alpha = over[3] as f32 / 255.0;
    let inv = 1.0 - alpha;
    Rgba([
        (over[0] as f32 * alpha + under[0] as f32 * inv) as u8,
        (over[1] as f32 * alpha + under[1] as f32 * inv) as u8,
        (over[2] as f32 * alpha + under[2] as f32 * inv) as u8,
        under[3].max(over[3]),
    ])
}

fn put_blended(img: &mut RgbaImage, x: i32, y: i32, color: Rgba<u8>) {
    if x < 0 || y < 0 || x >= img.width() as i32 || y >= img.height() as i32 {
        return;
    }
    let existing = *img.get_pixel(x as u32, y as u32);
    img.put_pixel(x as u32, y as u32, blend(existing, color));
}

fn fill_circle(img: &mut RgbaImage, cx: i32, cy: i32, radius: i32, color: Rgba<u8>) {
    if radius <= 0 {
        put_blended(img, cx, cy, color);
        return;
    }
    let r2 = radius * radius;
    for dy in -radius..=radius {
        for dx in -radius..=radius {
            if dx * dx + dy * dy <= r2 {
                put_blended(img, cx + dx, cy + dy, color);
            }
        }
    }
}

fn fill_rect(img: &mut RgbaImage, x: i32, y: i32, w: u32, h: u32, color: Rgba<u8>) {
    for dy in 0..h as i32 {
        for dx in 0..w as i32 {
            put_blended(img, x + dx, y + dy, color);
        }
    }
}

fn draw_line(img: &mut RgbaImage, x0: f32, y0: f32, x1: f32, y1: f32, color: Rgba<u8>) {
    let steps = ((x1 - x0).abs().max((y1 - y0).abs()) as usize).max(1);
    for i in 0..=steps {
        let t = i as f32 / steps as f32;
        let x = x0 + (x1 - x0) * t;
        let y = y0 + (y1 - y0) * t;
        put_blended(img, x.round() as i32, y.round() as i32, color);
    }
}

fn draw_thick_line(
    img: &mut RgbaImage,
    x0: f32,
    y0: f32,
    x1: f32,
    y1: f32,
    thickness: f32,
    color: Rgba<u8>,
) {
    let steps = ((x1 - x0).abs().max((y1 - y0).abs()) as usize).max(1);
    let radius = (thickness / 2.0).max(0.5) as i32;
    for i in 0..=steps {
        let t = i as f32 / steps as f32;
        let x = x0 + (x1 - x0) * t;
        let y = y0 + (y1 - y0) * t;
        fill_circle(img, x.round() as i32, y.round() as i32, radius, color);
    }
}

fn fill_triangle(img: &mut RgbaImage, a: (f32, f32), b: (f32, f32), c: (f32, f32), color: Rgba<u8>) {
    fill_polygon(img, &[a, b, c], color);
}

/// Scanline polygon fill with even-odd crossing.
fn fill_polygon(img: &mut RgbaImage, points: &[(f32, f32)], color: Rgba<u8>) {
    if points.len() < 3 {
        return;
    }
    let min_y = points.iter().map(|p| p.1).fold(f32::INFINITY, f32::min).floor() as i32;
    let max_y = points.iter().map(|p| p.1).fold(f32::NEG_INFINITY, f32::max).ceil() as i32;

    for y in min_y.max(0)..=max_y.min(img.height() as i32 - 1) {
        let scan = y as f32 + 0.5;
        let mut crossings = Vec::new();
        for i in 0..points.len() {
            let (x0, y0) = points[i];
            let (x1, y1) = points[(i + 1) % points.len()];
            if (y0 <= scan && y1 > scan) || (y1 <= scan && y0 > scan) {
                let t = (scan - y0) / (y1 - y0);
                crossings.push(x0 + (x1 - x0) * t);
            }
        }
        crossings.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        for pair in crossings.chunks(2) {
            if let [start, end] = pair {
                for x in start.round() as i32..=end.round() as i32 {
                    put_blended(img, x, y, color);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::classifier::SceneClassifier;

    fn renderer() -> PlaceholderRenderer {
        PlaceholderRenderer::new(Arc::new(ComicTextRenderer::with_font_dir("no-fonts-here")))
    }

    #[test]
    fn render_is_deterministic() {
        let r = renderer();
        let style = SceneClassifier::new().classify("a monster in the dark");
        let a = r.render("a monster in the dark", &style, 64);
        let b = r.render("a monster in the dark", &style, 64);
        assert_eq!(a.as_raw(), b.as_raw());
    }

    #[test]
    fn different_archetypes_differ_visually() {
        let r = renderer();
        let classifier = SceneClassifier::new();
        let monster = r.render("x", &classifier.classify("a monster"), 64);
        let flying = r.render("x", &classifier.classify("soaring in the sky"), 64);
        assert_ne!(monster.as_raw(), flying.as_raw());
    }

    #[test]
    fn every_archetype_renders_at_small_sizes() {
        let r = renderer();
        let classifier = SceneClassifier::new();
        for prompt in [
            "a monster",
            "a triumph",
            "a dark alley",
            "a burst of light",
            "the open sky",
            "a frantic chase",
            "a quiet field",
        ] {
            let style = classifier.classify(prompt);
            let img = r.render(prompt, &style, 48);
            assert_eq!(img.dimensions(), (48, 48));
            // Border pixels are opaque
            assert_eq!(img.get_pixel(0, 0)[3], 255);
        }
    }

    #[test]
    fn degenerate_sizes_below_border_width_still_render() {
        let r = renderer();
        let classifier = SceneClassifier::new();
        let style = classifier.classify("a quiet field");
        for size in [1, 2, 3] {
            let img = r.render("tiny", &style, size);
            assert_eq!(img.dimensions(), (size, size));
        }
    }

    #[test]
    fn caption_truncation() {
        assert_eq!(truncate_chars("short", 60), "short");
        let long = "x".repeat(80);
        let out = truncate_chars(&long, 60);
        assert!(out.chars().count() <= 60);
        assert!(out.ends_with('…'));
    }
}
