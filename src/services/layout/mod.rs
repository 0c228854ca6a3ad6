// Panel layout: turns a panel count and page geometry into exact pixel
// frames. All arithmetic is integer so vertical, grid and dynamic layouts
// tile the content area exactly, gutters included. Widescreen keeps 16:9
// rows and letterboxes instead.

use crate::core::types::{LayoutStyle, PageLayout, PagePlan, PanelPlan, SanitizedPrompt, SizeClass};

/// Pixel-space frame within a page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rect {
    pub x: u32,
    pub y: u32,
    pub w: u32,
    pub h: u32,
}

/// A positioned panel slot with its grid coordinates
#[derive(Debug, Clone, Copy)]
pub struct PanelSlot {
    pub rect: Rect,
    pub row: usize,
    pub col: usize,
    pub size_class: SizeClass,
}

/// Page geometry shared by layout and composition
#[derive(Debug, Clone, Copy)]
pub struct PageGeometry {
    pub width: u32,
    pub height: u32,
    pub margin: u32,
    pub gutter: u32,
}

impl PageGeometry {
    pub fn content_width(&self) -> u32 {
        self.width.saturating_sub(self.margin * 2)
    }

    pub fn content_height(&self) -> u32 {
        self.height.saturating_sub(self.margin * 2)
    }
}

/// Split panel indices into per-page counts, `per_page` at most each.
pub fn paginate(total: usize, per_page: usize) -> Vec<usize> {
    if total == 0 {
        return Vec::new();
    }
    let per_page = per_page.max(1);
    let mut counts = Vec::new();
    let mut remaining = total;
    while remaining > 0 {
        let take = remaining.min(per_page);
        counts.push(take);
        remaining -= take;
    }
    counts
}

/// Assemble the whole-story layout: prompts are paginated, then each page's
/// slots give every panel its grid position and size class. The caption is a
/// short echo of the prompt.
pub fn build_layout(
    prompts: &[SanitizedPrompt],
    per_page: usize,
    geometry: PageGeometry,
    style: LayoutStyle,
) -> PageLayout {
    let counts = paginate(prompts.len(), per_page);
    let mut pages = Vec::with_capacity(counts.len());
    let mut offset = 0usize;

    for count in counts {
        let slots = compute_slots(count, geometry, style);
        let panels = slots
            .iter()
            .enumerate()
            .map(|(i, slot)| {
                let prompt = prompts[offset + i].clone();
                let caption = Some(prompt.as_str().chars().take(60).collect::<String>());
                PanelPlan {
                    index: i,
                    row: slot.row,
                    col: slot.col,
                    size_class: slot.size_class,
                    prompt,
                    caption,
                }
            })
            .collect();
        pages.push(PagePlan { panels });
        offset += count;
    }

    PageLayout { style, pages }
}

/// Compute positioned slots for one page.
pub fn compute_slots(panel_count: usize, geometry: PageGeometry, style: LayoutStyle) -> Vec<PanelSlot> {
    if panel_count == 0 {
        return Vec::new();
    }
    match style {
        LayoutStyle::Vertical => vertical_slots(panel_count, geometry),
        LayoutStyle::Grid => grid_slots(panel_count, geometry),
        LayoutStyle::Widescreen => widescreen_slots(panel_count, geometry),
        LayoutStyle::Dynamic => dynamic_slots(panel_count, geometry),
    }
}

/// Divide `total` into `n` spans separated by `gutter`, returning
/// (offset, length) pairs that cover `total` exactly. The division
/// remainder is spread over the leading spans.
fn split_even(total: u32, n: usize, gutter: u32) -> Vec<(u32, u32)> {
    split_weighted(total, &vec![1; n], gutter)
}

/// Weighted variant of `split_even`; the last span absorbs rounding slack.
fn split_weighted(total: u32, weights: &[u32], gutter: u32) -> Vec<(u32, u32)> {
    let n = weights.len();
    if n == 0 {
        return Vec::new();
    }
    let usable = total.saturating_sub(gutter * (n as u32 - 1));
    let weight_sum: u32 = weights.iter().sum::<u32>().max(1);

    let mut spans = Vec::with_capacity(n);
    let mut offset = 0u32;
    let mut used = 0u32;
    for (i, &w) in weights.iter().enumerate() {
        let len = if i == n - 1 {
            usable - used
        } else {
            usable * w / weight_sum
        };
        spans.push((offset, len));
        offset += len + gutter;
        used += len;
    }
    spans
}

fn class_for(rect: Rect, geometry: PageGeometry, panel_count: usize) -> SizeClass {
    let full_width = rect.w == geometry.content_width();
    if full_width && rect.h == geometry.content_height() {
        SizeClass::Full
    } else if full_width {
        SizeClass::Wide
    } else if panel_count >= 4 {
        SizeClass::Quarter
    } else {
        SizeClass::Half
    }
}

fn vertical_slots(panel_count: usize, g: PageGeometry) -> Vec<PanelSlot> {
    let rows = split_even(g.content_height(), panel_count, g.gutter);
    rows.into_iter()
        .enumerate()
        .map(|(row, (dy, h))| {
            let rect = Rect {
                x: g.margin,
                y: g.margin + dy,
                w: g.content_width(),
                h,
            };
            PanelSlot {
                rect,
                row,
                col: 0,
                size_class: class_for(rect, g, panel_count),
            }
        })
        .collect()
}

fn grid_slots(panel_count: usize, g: PageGeometry) -> Vec<PanelSlot> {
    if panel_count <= 2 {
        return vertical_slots(panel_count, g);
    }

    // Two columns; an odd trailing panel spans the full row.
    let row_count = panel_count.div_ceil(2);
    let rows = split_even(g.content_height(), row_count, g.gutter);
    let mut slots = Vec::with_capacity(panel_count);
    let mut remaining = panel_count;

    for (row, (dy, h)) in rows.into_iter().enumerate() {
        let in_row = remaining.min(2);
        let cols = split_even(g.content_width(), in_row, g.gutter);
        for (col, (dx, w)) in cols.into_iter().enumerate() {
            let rect = Rect {
                x: g.margin + dx,
                y: g.margin + dy,
                w,
                h,
            };
            slots.push(PanelSlot {
                rect,
                row,
                col,
                size_class: class_for(rect, g, panel_count),
            });
        }
        remaining -= in_row;
    }
    slots
}

fn widescreen_slots(panel_count: usize, g: PageGeometry) -> Vec<PanelSlot> {
    let content_w = g.content_width();
    let content_h = g.content_height();
    let n = panel_count as u32;

    // Ideal 16:9 rows at full content width; shrink (keeping the ratio)
    // when they overflow, then center the block vertically.
    let mut row_w = content_w;
    let mut row_h = content_w * 9 / 16;
    let gutters = g.gutter * (n - 1);
    if row_h * n + gutters > content_h {
        row_h = (content_h - gutters.min(content_h)) / n;
        row_w = (row_h * 16 / 9).min(content_w);
    }

    let block_h = row_h * n + gutters;
    let top = g.margin + (content_h.saturating_sub(block_h)) / 2;
    let left = g.margin + (content_w - row_w) / 2;

    (0..panel_count)
        .map(|row| PanelSlot {
            rect: Rect {
                x: left,
                y: top + row as u32 * (row_h + g.gutter),
                w: row_w,
                h: row_h,
            },
            row,
            col: 0,
            size_class: SizeClass::Wide,
        })
        .collect()
}

fn dynamic_slots(panel_count: usize, g: PageGeometry) -> Vec<PanelSlot> {
    match panel_count {
        2 => {
            // Small establishing panel over a larger payoff panel
            let rows = split_weighted(g.content_height(), &[2, 3], g.gutter);
            rows.into_iter()
                .enumerate()
                .map(|(row, (dy, h))| {
                    let rect = Rect {
                        x: g.margin,
                        y: g.margin + dy,
                        w: g.content_width(),
                        h,
                    };
                    PanelSlot {
                        rect,
                        row,
                        col: 0,
                        size_class: class_for(rect, g, panel_count),
                    }
                })
                .collect()
        }
        3 => {
            // Hero row on top, two supporting panels below
            let rows = split_weighted(g.content_height(), &[11, 9], g.gutter);
            let (top_dy, top_h) = rows[0];
            let (bot_dy, bot_h) = rows[1];

            let mut slots = vec![PanelSlot {
                rect: Rect {
                    x: g.margin,
                    y: g.margin + top_dy,
                    w: g.content_width(),
                    h: top_h,
                },
                row: 0,
                col: 0,
                size_class: SizeClass::Wide,
            }];
            for (col, (dx, w)) in split_even(g.content_width(), 2, g.gutter).into_iter().enumerate() {
                slots.push(PanelSlot {
                    rect: Rect {
                        x: g.margin + dx,
                        y: g.margin + bot_dy,
                        w,
                        h: bot_h,
                    },
                    row: 1,
                    col,
                    size_class: SizeClass::Half,
                });
            }
            slots
        }
        4 => {
            // Alternating column weights row to row
            let rows = split_even(g.content_height(), 2, g.gutter);
            let mut slots = Vec::with_capacity(4);
            for (row, (dy, h)) in rows.into_iter().enumerate() {
                let weights: &[u32] = if row == 0 { &[3, 2] } else { &[2, 3] };
                for (col, (dx, w)) in split_weighted(g.content_width(), weights, g.gutter)
                    .into_iter()
                    .enumerate()
                {
                    slots.push(PanelSlot {
                        rect: Rect {
                            x: g.margin + dx,
                            y: g.margin + dy,
                            w,
                            h,
                        },
                        row,
                        col,
                        size_class: SizeClass::Quarter,
                    });
                }
            }
            slots
        }
        _ => vertical_slots(panel_count, g),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn geometry() -> PageGeometry {
        PageGeometry {
            width: 1024,
            height: 1536,
            margin: 48,
            gutter: 20,
        }
    }

    /// Group slots by row and assert they tile the content area exactly:
    /// each row spans the full content width (gutters included) and the
    /// rows together span the full content height.
    fn assert_exact_fill(slots: &[PanelSlot], g: PageGeometry) {
        assert!(!slots.is_empty());
        let mut rows: BTreeMap<u32, Vec<Rect>> = BTreeMap::new();
        for slot in slots {
            rows.entry(slot.rect.y).or_default().push(slot.rect);
        }

        let mut expected_y = g.margin;
        let mut row_heights = Vec::new();
        for (y, mut rects) in rows {
            assert_eq!(y, expected_y, "row does not start where the last ended");
            rects.sort_by_key(|r| r.x);

            let mut expected_x = g.margin;
            for rect in &rects {
                assert_eq!(rect.x, expected_x, "horizontal gap or overlap");
                expected_x = rect.x + rect.w + g.gutter;
            }
            let last = rects.last().unwrap();
            assert_eq!(last.x + last.w, g.margin + g.content_width());

            let h = rects[0].h;
            assert!(rects.iter().all(|r| r.h == h), "uneven row height");
            row_heights.push(h);
            expected_y = y + h + g.gutter;
        }

        let total: u32 = row_heights.iter().sum::<u32>()
            + g.gutter * (row_heights.len() as u32 - 1);
        assert_eq!(total, g.content_height(), "rows do not fill content height");
    }

    #[test]
    fn vertical_fills_exactly() {
        let g = geometry();
        for n in [1, 2, 3, 4, 5, 7] {
            let slots = compute_slots(n, g, LayoutStyle::Vertical);
            assert_eq!(slots.len(), n);
            assert_exact_fill(&slots, g);
        }
    }

    #[test]
    fn grid_fills_exactly_including_odd_counts() {
        let g = geometry();
        for n in [1, 2, 3, 4, 5, 7] {
            let slots = compute_slots(n, g, LayoutStyle::Grid);
            assert_eq!(slots.len(), n);
            assert_exact_fill(&slots, g);
        }
    }

    #[test]
    fn grid_odd_remainder_spans_full_width() {
        let g = geometry();
        let slots = compute_slots(3, g, LayoutStyle::Grid);
        let last = slots.last().unwrap();
        assert_eq!(last.rect.w, g.content_width());
        assert_eq!(last.size_class, SizeClass::Wide);
    }

    #[test]
    fn dynamic_fills_exactly() {
        let g = geometry();
        for n in [1, 2, 3, 4, 5] {
            let slots = compute_slots(n, g, LayoutStyle::Dynamic);
            assert_eq!(slots.len(), n);
            assert_exact_fill(&slots, g);
        }
    }

    #[test]
    fn dynamic_three_panel_has_hero_row() {
        let g = geometry();
        let slots = compute_slots(3, g, LayoutStyle::Dynamic);
        assert_eq!(slots[0].rect.w, g.content_width());
        assert!(slots[0].rect.h > slots[1].rect.h);
        assert_eq!(slots[1].row, 1);
        assert_eq!(slots[2].col, 1);
    }

    #[test]
    fn widescreen_rows_keep_ratio_and_stay_inside_margins() {
        let g = geometry();
        for n in [1, 2, 3, 4] {
            let slots = compute_slots(n, g, LayoutStyle::Widescreen);
            assert_eq!(slots.len(), n);
            for slot in &slots {
                assert!(slot.rect.x >= g.margin);
                assert!(slot.rect.y >= g.margin);
                assert!(slot.rect.x + slot.rect.w <= g.width - g.margin);
                assert!(slot.rect.y + slot.rect.h <= g.height - g.margin);
                // 16:9 within integer rounding
                let ratio = slot.rect.w as f32 / slot.rect.h as f32;
                assert!((ratio - 16.0 / 9.0).abs() < 0.05, "ratio {ratio}");
            }
        }
    }

    #[test]
    fn single_panel_is_full_size() {
        let g = geometry();
        for style in [LayoutStyle::Vertical, LayoutStyle::Grid, LayoutStyle::Dynamic] {
            let slots = compute_slots(1, g, style);
            assert_eq!(slots[0].size_class, SizeClass::Full);
            assert_eq!(slots[0].rect.w, g.content_width());
            assert_eq!(slots[0].rect.h, g.content_height());
        }
    }

    #[test]
    fn pagination_counts() {
        assert_eq!(paginate(0, 4), Vec::<usize>::new());
        assert_eq!(paginate(3, 4), vec![3]);
        assert_eq!(paginate(4, 4), vec![4]);
        assert_eq!(paginate(7, 4), vec![4, 3]);
        assert_eq!(paginate(9, 4), vec![4, 4, 1]);
    }

    #[test]
    fn zero_panels_yield_no_slots() {
        assert!(compute_slots(0, geometry(), LayoutStyle::Dynamic).is_empty());
    }

    #[test]
    fn layout_assigns_unique_positions_per_page() {
        let prompts: Vec<SanitizedPrompt> = (0..7)
            .map(|i| SanitizedPrompt::new(format!("scene {i}")))
            .collect();
        let layout = build_layout(&prompts, 4, geometry(), LayoutStyle::Grid);

        assert_eq!(layout.pages.len(), 2);
        assert_eq!(layout.total_panels(), 7);

        for page in &layout.pages {
            let mut positions: Vec<(usize, usize)> =
                page.panels.iter().map(|p| (p.row, p.col)).collect();
            positions.sort_unstable();
            positions.dedup();
            assert_eq!(positions.len(), page.panels.len(), "duplicate position");

            for (i, panel) in page.panels.iter().enumerate() {
                assert_eq!(panel.index, i, "page-local index must be contiguous");
                assert!(panel.caption.is_some());
            }
        }
    }
}
