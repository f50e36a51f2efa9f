//! Deterministic CPU render pipeline.
//!
//! `compose` is a pure function of (background image, view transform, layer
//! store, canvas size, font) → RGBA surface: clear, blit the transformed
//! background, then draw every caption in store order as a black stroke
//! outline followed by a solid fill (classic meme-text legibility).  The
//! dashed selection rectangle is applied separately to a display copy so the
//! export path never contains it.

use ab_glyph::{Font, FontArc, GlyphId, ScaleFont, point};
use egui::{Rect, vec2};
use image::{Rgba, RgbaImage};
use rayon::prelude::*;

use crate::geometry::{self, ViewTransform};
use crate::layers::{LayerStore, TextLayer};

/// Selection outline accent (indigo).
pub const SELECTION_COLOR: [u8; 3] = [0x63, 0x66, 0xF1];
const SELECTION_THICKNESS: i32 = 2;
const DASH_ON: f32 = 5.0;
const DASH_OFF: f32 = 5.0;

/// The caption typeface, shared by measurement and rasterization so the
/// hit-test box always matches the drawn pixels.
pub struct CaptionFont {
    font: FontArc,
}

impl CaptionFont {
    /// Load a heavy sans-serif from the system for meme-style captions.
    /// Tries font-kit family matches first, then well-known file paths.
    pub fn load_system() -> Result<Self, String> {
        use font_kit::family_name::FamilyName;
        use font_kit::properties::{Properties, Weight};
        use font_kit::source::SystemSource;

        let mut props = Properties::new();
        props.weight = Weight::BOLD;

        let families = [
            FamilyName::Title("Impact".to_string()),
            FamilyName::Title("Inter".to_string()),
            FamilyName::Title("Arial".to_string()),
            FamilyName::Title("DejaVu Sans".to_string()),
            FamilyName::Title("Liberation Sans".to_string()),
            FamilyName::SansSerif,
        ];
        let source = SystemSource::new();
        if let Ok(handle) = source.select_best_match(&families, &props)
            && let Ok(loaded) = handle.load()
            && let Some(data) = loaded.copy_font_data()
            && let Ok(font) = FontArc::try_from_vec((*data).clone())
        {
            return Ok(Self { font });
        }

        // Direct path probes for headless environments without a font service
        let candidates: &[&str] = &[
            "/usr/share/fonts/truetype/dejavu/DejaVuSans-Bold.ttf",
            "/usr/share/fonts/truetype/liberation/LiberationSans-Bold.ttf",
            "/usr/share/fonts/TTF/DejaVuSans-Bold.ttf",
            "C:\\Windows\\Fonts\\impact.ttf",
            "C:\\Windows\\Fonts\\arialbd.ttf",
            "/System/Library/Fonts/Supplemental/Impact.ttf",
            "/System/Library/Fonts/Supplemental/Arial Bold.ttf",
        ];
        for path in candidates {
            if let Ok(data) = std::fs::read(path)
                && let Ok(font) = FontArc::try_from_vec(data)
            {
                return Ok(Self { font });
            }
        }
        Err("no usable caption font found on this system".to_string())
    }

    pub fn from_font(font: FontArc) -> Self {
        Self { font }
    }

    /// Pixel width of a single line at `font_size` (advances + kerning).
    pub fn measure(&self, text: &str, font_size: f32) -> f32 {
        layout_line(&self.font, text, font_size).1
    }
}

/// Lay out one line left-aligned at x = 0, returning positioned glyph ids and
/// the total advance width.
fn layout_line(font: &FontArc, text: &str, font_size: f32) -> (Vec<(GlyphId, f32)>, f32) {
    let scaled = font.as_scaled(font_size);
    let mut glyphs = Vec::new();
    let mut cursor_x = 0.0f32;
    let mut last: Option<GlyphId> = None;
    for ch in text.chars() {
        let id = font.glyph_id(ch);
        if let Some(prev) = last {
            cursor_x += scaled.kern(prev, id);
        }
        glyphs.push((id, cursor_x));
        cursor_x += scaled.h_advance(id);
        last = Some(id);
    }
    (glyphs, cursor_x)
}

/// Render the full composite: background, then captions in store order.
/// Does NOT include the selection overlay — apply `draw_selection_overlay`
/// to a display copy for that.
pub fn compose(
    background: &RgbaImage,
    transform: &ViewTransform,
    store: &LayerStore,
    canvas_size: (u32, u32),
    font: &CaptionFont,
) -> RgbaImage {
    let mut frame = compose_background(background, transform, canvas_size);
    let canvas_width = canvas_size.0 as f32;
    for layer in store.layers() {
        draw_caption(&mut frame, layer, font, canvas_width);
    }
    frame
}

/// Clear to opaque black and blit the background image at
/// `position .. position + natural * scale` with bilinear sampling.
/// Rows are composited in parallel.
pub fn compose_background(
    background: &RgbaImage,
    transform: &ViewTransform,
    canvas_size: (u32, u32),
) -> RgbaImage {
    let (cw, ch) = canvas_size;
    let mut frame = RgbaImage::from_pixel(cw, ch, Rgba([0, 0, 0, 255]));

    let natural = vec2(background.width() as f32, background.height() as f32);
    let dst = transform.image_rect(natural);
    let canvas_rect = Rect::from_min_size(egui::Pos2::ZERO, vec2(cw as f32, ch as f32));
    let visible = dst.intersect(canvas_rect);
    if visible.width() <= 0.0 || visible.height() <= 0.0 {
        return frame;
    }

    let x0 = visible.min.x.floor().max(0.0) as u32;
    let y0 = visible.min.y.floor().max(0.0) as u32;
    let x1 = (visible.max.x.ceil() as u32).min(cw);
    let y1 = (visible.max.y.ceil() as u32).min(ch);
    let scale = transform.scale();
    let pos = transform.position();
    let (src_w, src_h) = (background.width(), background.height());
    let src_raw = background.as_raw();

    let stride = cw as usize * 4;
    frame
        .as_mut()
        .par_chunks_mut(stride)
        .enumerate()
        .skip(y0 as usize)
        .take((y1 - y0) as usize)
        .for_each(|(y, row)| {
            let sy = (y as f32 + 0.5 - pos.y) / scale - 0.5;
            for x in x0..x1 {
                let sx = (x as f32 + 0.5 - pos.x) / scale - 0.5;
                let px = sample_bilinear(src_raw, src_w, src_h, sx, sy);
                let off = x as usize * 4;
                row[off..off + 4].copy_from_slice(&px);
            }
        });

    frame
}

/// Bilinear sample with edge clamping.  The source is treated as opaque;
/// callers only blit inside the image's destination rect.
fn sample_bilinear(raw: &[u8], w: u32, h: u32, x: f32, y: f32) -> [u8; 4] {
    let xf = x.clamp(0.0, (w - 1) as f32);
    let yf = y.clamp(0.0, (h - 1) as f32);
    let x0 = xf.floor() as u32;
    let y0 = yf.floor() as u32;
    let x1 = (x0 + 1).min(w - 1);
    let y1 = (y0 + 1).min(h - 1);
    let tx = xf - x0 as f32;
    let ty = yf - y0 as f32;

    let idx = |px: u32, py: u32| (py as usize * w as usize + px as usize) * 4;
    let (a, b, c, d) = (idx(x0, y0), idx(x1, y0), idx(x0, y1), idx(x1, y1));

    let mut out = [0u8; 4];
    for ch in 0..4 {
        let top = raw[a + ch] as f32 * (1.0 - tx) + raw[b + ch] as f32 * tx;
        let bot = raw[c + ch] as f32 * (1.0 - tx) + raw[d + ch] as f32 * tx;
        out[ch] = (top * (1.0 - ty) + bot * ty).round() as u8;
    }
    out
}

/// Draw one caption: upper-cased, centered on the layer anchor, black stroke
/// outline first, then the fill color.  Stroke width is font_size / 15,
/// realised as a disc dilation of the glyph coverage.
fn draw_caption(frame: &mut RgbaImage, layer: &TextLayer, font: &CaptionFont, canvas_width: f32) {
    let font_size = geometry::caption_font_size(canvas_width, layer.font_size_multiplier);
    let text = layer.text.to_uppercase();
    let (glyphs, total_width) = layout_line(&font.font, &text, font_size);
    if glyphs.is_empty() {
        return;
    }

    let stroke_radius = ((font_size / 15.0) / 2.0).max(1.0);
    let pad = stroke_radius.ceil() + 2.0;

    // Glyph bounding box relative to the baseline origin
    let origin_x = layer.x - total_width / 2.0;
    let origin_y = layer.y;
    let mut min_x = f32::MAX;
    let mut min_y = f32::MAX;
    let mut max_x = f32::MIN;
    let mut max_y = f32::MIN;
    for &(id, gx) in &glyphs {
        let glyph = id.with_scale_and_position(font_size, point(origin_x + gx, origin_y));
        let bounds = font.font.glyph_bounds(&glyph);
        min_x = min_x.min(bounds.min.x);
        min_y = min_y.min(bounds.min.y);
        max_x = max_x.max(bounds.max.x);
        max_y = max_y.max(bounds.max.y);
    }
    if min_x >= max_x || min_y >= max_y {
        return;
    }

    let buf_x0 = (min_x - pad).floor() as i32;
    let buf_y0 = (min_y - pad).floor() as i32;
    let buf_w = ((max_x + pad).ceil() as i32 - buf_x0).max(0) as usize;
    let buf_h = ((max_y + pad).ceil() as i32 - buf_y0).max(0) as usize;
    if buf_w == 0 || buf_h == 0 {
        return;
    }

    // Rasterize glyph coverage into a single-channel buffer
    let mut coverage = vec![0.0f32; buf_w * buf_h];
    for &(id, gx) in &glyphs {
        let glyph = id.with_scale_and_position(font_size, point(origin_x + gx, origin_y));
        if let Some(outlined) = font.font.outline_glyph(glyph) {
            let gb = outlined.px_bounds();
            outlined.draw(|px, py, cov| {
                let ix = gb.min.x as i32 + px as i32 - buf_x0;
                let iy = gb.min.y as i32 + py as i32 - buf_y0;
                if ix >= 0 && iy >= 0 && (ix as usize) < buf_w && (iy as usize) < buf_h {
                    let idx = iy as usize * buf_w + ix as usize;
                    coverage[idx] = coverage[idx].max(cov);
                }
            });
        }
    }

    // Stroke first (dilated coverage in black), then fill on top
    let stroke = dilate_coverage(&coverage, buf_w, buf_h, stroke_radius);
    blend_coverage(frame, &stroke, buf_w, buf_h, buf_x0, buf_y0, [0, 0, 0]);
    blend_coverage(frame, &coverage, buf_w, buf_h, buf_x0, buf_y0, layer.color);
}

/// Disc dilation of a coverage buffer: each output cell takes the maximum
/// coverage of any input cell within `radius`.  This is what turns glyph
/// coverage into a stroke outline.
fn dilate_coverage(coverage: &[f32], w: usize, h: usize, radius: f32) -> Vec<f32> {
    let r = radius.ceil() as i32;
    let r2 = radius * radius;
    let mut out = vec![0.0f32; w * h];
    out.par_chunks_mut(w).enumerate().for_each(|(y, row)| {
        for x in 0..w {
            let mut best = 0.0f32;
            for dy in -r..=r {
                let sy = y as i32 + dy;
                if sy < 0 || sy >= h as i32 {
                    continue;
                }
                for dx in -r..=r {
                    if (dx * dx + dy * dy) as f32 > r2 {
                        continue;
                    }
                    let sx = x as i32 + dx;
                    if sx < 0 || sx >= w as i32 {
                        continue;
                    }
                    best = best.max(coverage[sy as usize * w + sx as usize]);
                    if best >= 1.0 {
                        break;
                    }
                }
                if best >= 1.0 {
                    break;
                }
            }
            row[x] = best;
        }
    });
    out
}

/// Alpha-blend a coverage buffer onto the frame in a solid color.
fn blend_coverage(
    frame: &mut RgbaImage,
    coverage: &[f32],
    buf_w: usize,
    buf_h: usize,
    off_x: i32,
    off_y: i32,
    color: [u8; 3],
) {
    let (fw, fh) = (frame.width() as i32, frame.height() as i32);
    for by in 0..buf_h as i32 {
        let fy = off_y + by;
        if fy < 0 || fy >= fh {
            continue;
        }
        for bx in 0..buf_w as i32 {
            let cov = coverage[by as usize * buf_w + bx as usize];
            if cov <= 0.001 {
                continue;
            }
            let fx = off_x + bx;
            if fx < 0 || fx >= fw {
                continue;
            }
            let dst = frame.get_pixel_mut(fx as u32, fy as u32);
            for ch in 0..3 {
                let blended = color[ch] as f32 * cov + dst[ch] as f32 * (1.0 - cov);
                dst[ch] = blended.round() as u8;
            }
            dst[3] = 255;
        }
    }
}

/// Draw the dashed selection rectangle (2px indigo, 5 on / 5 off) over the
/// active layer's bounding box.  Display-only: callers apply this to a copy
/// of the composed frame, never to the export surface.
pub fn draw_selection_overlay(frame: &mut RgbaImage, bounds: Rect) {
    let (x0, y0) = (bounds.min.x, bounds.min.y);
    let (x1, y1) = (bounds.max.x, bounds.max.y);
    draw_dashed_segment(frame, x0, y0, x1, y0, Axis::Horizontal);
    draw_dashed_segment(frame, x0, y1, x1, y1, Axis::Horizontal);
    draw_dashed_segment(frame, x0, y0, x0, y1, Axis::Vertical);
    draw_dashed_segment(frame, x1, y0, x1, y1, Axis::Vertical);
}

enum Axis {
    Horizontal,
    Vertical,
}

fn draw_dashed_segment(frame: &mut RgbaImage, x0: f32, y0: f32, x1: f32, y1: f32, axis: Axis) {
    let (fw, fh) = (frame.width() as i32, frame.height() as i32);
    let period = DASH_ON + DASH_OFF;
    let len = match axis {
        Axis::Horizontal => x1 - x0,
        Axis::Vertical => y1 - y0,
    };
    let steps = len.max(0.0).round() as i32;
    for t in 0..steps {
        if (t as f32) % period >= DASH_ON {
            continue;
        }
        // Thickness extends inward from the edge line
        for n in 0..SELECTION_THICKNESS {
            let (px, py) = match axis {
                Axis::Horizontal => ((x0.round() as i32) + t, (y0.round() as i32) + n),
                Axis::Vertical => ((x0.round() as i32) + n, (y0.round() as i32) + t),
            };
            if px >= 0 && py >= 0 && px < fw && py < fh {
                let dst = frame.get_pixel_mut(px as u32, py as u32);
                dst[0] = SELECTION_COLOR[0];
                dst[1] = SELECTION_COLOR[1];
                dst[2] = SELECTION_COLOR[2];
                dst[3] = 255;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use egui::pos2;

    fn solid_background(w: u32, h: u32, color: [u8; 4]) -> RgbaImage {
        RgbaImage::from_pixel(w, h, Rgba(color))
    }

    #[test]
    fn background_blit_covers_fitted_rect_and_clears_outside() {
        let bg = solid_background(200, 100, [10, 200, 30, 255]);
        // Wide image in a square viewport: letterboxed top and bottom
        let transform = ViewTransform::fit(vec2(200.0, 100.0), vec2(400.0, 400.0));
        let frame = compose_background(&bg, &transform, (400, 400));

        // Center of the image area holds the source color
        assert_eq!(frame.get_pixel(200, 200).0, [10, 200, 30, 255]);
        // Letterbox rows stay cleared
        assert_eq!(frame.get_pixel(200, 10).0, [0, 0, 0, 255]);
        assert_eq!(frame.get_pixel(200, 390).0, [0, 0, 0, 255]);
    }

    #[test]
    fn compose_background_is_deterministic() {
        let mut bg = solid_background(64, 64, [50, 60, 70, 255]);
        // Some non-uniform content so sampling actually interpolates
        for y in 0..64 {
            for x in 0..32 {
                bg.put_pixel(x, y, Rgba([x as u8 * 4, y as u8 * 2, 90, 255]));
            }
        }
        let mut transform = ViewTransform::fit(vec2(64.0, 64.0), vec2(300.0, 200.0));
        transform.zoom_at(pos2(150.0, 100.0), 0.37);
        let a = compose_background(&bg, &transform, (300, 200));
        let b = compose_background(&bg, &transform, (300, 200));
        assert_eq!(a.as_raw(), b.as_raw());
    }

    #[test]
    fn offscreen_image_renders_cleared_frame() {
        let bg = solid_background(50, 50, [255, 0, 0, 255]);
        let mut transform = ViewTransform::fit(vec2(50.0, 50.0), vec2(100.0, 100.0));
        transform.set_position(vec2(-5000.0, -5000.0));
        let frame = compose_background(&bg, &transform, (100, 100));
        assert!(frame.pixels().all(|p| p.0 == [0, 0, 0, 255]));
    }

    #[test]
    fn dilation_grows_coverage_by_radius() {
        // Single lit cell in the middle of a 9×9 buffer
        let mut cov = vec![0.0f32; 81];
        cov[4 * 9 + 4] = 1.0;
        let out = dilate_coverage(&cov, 9, 9, 2.0);
        assert_eq!(out[4 * 9 + 4], 1.0);
        assert_eq!(out[4 * 9 + 2], 1.0); // distance 2, inside
        assert_eq!(out[2 * 9 + 4], 1.0);
        assert_eq!(out[4 * 9 + 1], 0.0); // distance 3, outside
        assert_eq!(out[0], 0.0); // corner, distance > radius
    }

    #[test]
    fn selection_overlay_draws_dashes_inside_frame_only() {
        let mut frame = solid_background(100, 100, [0, 0, 0, 255]);
        let bounds = Rect::from_min_max(pos2(10.0, 10.0), pos2(60.0, 40.0));
        draw_selection_overlay(&mut frame, bounds);

        // First dash of the top edge is on
        assert_eq!(frame.get_pixel(10, 10).0[..3], SELECTION_COLOR);
        assert_eq!(frame.get_pixel(12, 10).0[..3], SELECTION_COLOR);
        // Gap after 5 on-pixels
        assert_eq!(frame.get_pixel(16, 10).0, [0, 0, 0, 255]);
        // Second row of the 2px stroke
        assert_eq!(frame.get_pixel(10, 11).0[..3], SELECTION_COLOR);
        // Interior untouched
        assert_eq!(frame.get_pixel(30, 25).0, [0, 0, 0, 255]);

        // Out-of-frame bounds must not panic
        let mut frame = solid_background(20, 20, [0, 0, 0, 255]);
        draw_selection_overlay(&mut frame, Rect::from_min_max(pos2(-30.0, -30.0), pos2(50.0, 50.0)));
    }

    #[test]
    fn blend_coverage_mixes_toward_color() {
        let mut frame = solid_background(4, 4, [0, 0, 0, 255]);
        let mut cov = vec![0.0f32; 16];
        cov[0] = 1.0;
        cov[1] = 0.5;
        blend_coverage(&mut frame, &cov, 4, 4, 0, 0, [200, 100, 50]);
        assert_eq!(frame.get_pixel(0, 0).0, [200, 100, 50, 255]);
        assert_eq!(frame.get_pixel(1, 0).0, [100, 50, 25, 255]);
        assert_eq!(frame.get_pixel(2, 0).0, [0, 0, 0, 255]);
    }
}
