//! Pure coordinate math for the caption canvas: pointer→canvas conversion,
//! caption bounding boxes, and the world↔screen transform of the background
//! image (pan + uniform scale).  No I/O and no widget state lives here — the
//! same formulas back both hit-testing and the selection outline, so they can
//! never drift apart.

use egui::{Pos2, Rect, Vec2, pos2, vec2};

/// Authoritative zoom bounds, shared by the wheel path and the zoom slider.
pub const MIN_SCALE: f32 = 0.1;
pub const MAX_SCALE: f32 = 5.0;

/// Additive scale change per scroll unit (egui points of wheel travel).
pub const WHEEL_ZOOM_STEP: f32 = 0.002;

/// The base caption font size is the canvas width divided by this.
pub const BASE_FONT_DIVISOR: f32 = 15.0;

/// A caption's box extends below the baseline to 1.5× the font size,
/// accommodating descenders and the stroke outline.
const BOX_HEIGHT_FACTOR: f32 = 1.5;

/// Measures the pixel width of `text` rendered at `font_size`.  Injected so
/// layout math stays independent of any particular font backend.
pub type MeasureFn<'a> = &'a dyn Fn(&str, f32) -> f32;

/// Convert a pointer position in screen space to canvas-local space by
/// subtracting the canvas widget's on-screen origin.
pub fn canvas_pos(screen: Pos2, canvas_rect: Rect) -> Pos2 {
    pos2(screen.x - canvas_rect.min.x, screen.y - canvas_rect.min.y)
}

/// Effective font size for a caption on a canvas of the given width.
pub fn caption_font_size(canvas_width: f32, multiplier: f32) -> f32 {
    (canvas_width / BASE_FONT_DIVISOR) * multiplier
}

/// Bounding box of a caption anchored at `(x, y)` (baseline, horizontally
/// centered).  `text` is measured upper-cased, exactly as it is drawn.
///
/// Used verbatim by hit-testing AND the selection outline.
pub fn caption_bounds(
    text: &str,
    x: f32,
    y: f32,
    multiplier: f32,
    measure: MeasureFn,
    canvas_width: f32,
) -> Rect {
    let font_size = caption_font_size(canvas_width, multiplier);
    let width = measure(&text.to_uppercase(), font_size);
    Rect::from_min_size(
        pos2(x - width / 2.0, y - font_size),
        vec2(width, font_size * BOX_HEIGHT_FACTOR),
    )
}

/// Pan + uniform-scale placement of the background image on the canvas.
///
/// Invariant: the image's on-screen bounding box is always
/// `position .. position + natural_size * scale`.
///
/// The revision counter increments on every mutation; the canvas widget
/// observes it (together with the layer store's revision) and recomposes
/// exactly once per change.
#[derive(Clone, Copy, Debug)]
pub struct ViewTransform {
    scale: f32,
    position: Vec2,
    revision: u64,
}

impl ViewTransform {
    /// Contain-fit the image inside the viewport, centered.  This is the
    /// initial layout, recomputed when the canvas widget is resized.
    pub fn fit(natural: Vec2, viewport: Vec2) -> Self {
        let img_ratio = natural.x / natural.y;
        let container_ratio = viewport.x / viewport.y;
        let scale = if img_ratio > container_ratio {
            viewport.x / natural.x
        } else {
            viewport.y / natural.y
        };
        let position = (viewport - natural * scale) / 2.0;
        Self { scale, position, revision: 0 }
    }

    pub fn scale(&self) -> f32 {
        self.scale
    }

    pub fn position(&self) -> Vec2 {
        self.position
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// On-canvas rectangle currently covered by the image.
    pub fn image_rect(&self, natural: Vec2) -> Rect {
        Rect::from_min_size(self.position.to_pos2(), natural * self.scale)
    }

    /// Canvas point for a point in image (world) space.
    pub fn to_canvas(&self, world: Pos2) -> Pos2 {
        (self.position + world.to_vec2() * self.scale).to_pos2()
    }

    /// Image (world) point under a canvas point.
    pub fn to_world(&self, canvas: Pos2) -> Pos2 {
        ((canvas.to_vec2() - self.position) / self.scale).to_pos2()
    }

    /// Move the image's top-left corner.
    pub fn set_position(&mut self, position: Vec2) {
        self.position = position;
        self.revision += 1;
    }

    /// Set the scale directly (slider path), keeping the current position.
    pub fn set_scale(&mut self, scale: f32) {
        let clamped = scale.clamp(MIN_SCALE, MAX_SCALE);
        if clamped != self.scale {
            self.scale = clamped;
            self.revision += 1;
        }
    }

    /// Anchor-preserving zoom: adjust scale by an additive step while keeping
    /// the world point under `anchor` (canvas space) visually stationary.
    pub fn zoom_at(&mut self, anchor: Pos2, scale_delta: f32) {
        let new_scale = (self.scale + scale_delta).clamp(MIN_SCALE, MAX_SCALE);
        let world = self.to_world(anchor);
        self.scale = new_scale;
        self.position = anchor.to_vec2() - world.to_vec2() * new_scale;
        self.revision += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Width proportional to character count — enough for layout math.
    fn fake_measure(text: &str, font_size: f32) -> f32 {
        text.chars().count() as f32 * font_size * 0.6
    }

    #[test]
    fn canvas_pos_subtracts_widget_origin() {
        let rect = Rect::from_min_size(pos2(100.0, 50.0), vec2(800.0, 600.0));
        let p = canvas_pos(pos2(130.0, 80.0), rect);
        assert_eq!(p, pos2(30.0, 30.0));
    }

    #[test]
    fn caption_bounds_centered_on_anchor() {
        // 800px canvas → base font 53.33px at multiplier 1.0
        let b = caption_bounds("HELLO", 400.0, 540.0, 1.0, &fake_measure, 800.0);
        let font = 800.0 / 15.0;
        let width = 5.0 * font * 0.6;
        assert!((b.center().x - 400.0).abs() < 1e-3);
        assert!((b.min.y - (540.0 - font)).abs() < 1e-3);
        assert!((b.width() - width).abs() < 1e-3);
        assert!((b.height() - font * 1.5).abs() < 1e-3);
    }

    #[test]
    fn caption_bounds_measures_uppercased_text() {
        // The measure callback must see the text as it is drawn.
        let seen = std::cell::RefCell::new(String::new());
        let spy = |t: &str, s: f32| {
            *seen.borrow_mut() = t.to_string();
            t.len() as f32 * s
        };
        caption_bounds("hello", 0.0, 0.0, 1.0, &spy, 750.0);
        assert_eq!(*seen.borrow(), "HELLO");
    }

    #[test]
    fn fit_contains_and_centers() {
        // Wide image in a 4:3 viewport: width-limited
        let t = ViewTransform::fit(vec2(2000.0, 500.0), vec2(800.0, 600.0));
        assert!((t.scale() - 0.4).abs() < 1e-6);
        let rect = t.image_rect(vec2(2000.0, 500.0));
        assert!((rect.min.x - 0.0).abs() < 1e-3);
        assert!((rect.center().y - 300.0).abs() < 1e-3);
        assert!(rect.width() <= 800.0 + 1e-3 && rect.height() <= 600.0 + 1e-3);

        // Tall image: height-limited
        let t = ViewTransform::fit(vec2(500.0, 2000.0), vec2(800.0, 600.0));
        assert!((t.scale() - 0.3).abs() < 1e-6);
    }

    #[test]
    fn world_round_trip() {
        let mut t = ViewTransform::fit(vec2(1000.0, 800.0), vec2(640.0, 480.0));
        t.set_position(vec2(-20.0, 35.0));
        let w = pos2(123.4, 456.7);
        let back = t.to_world(t.to_canvas(w));
        assert!((back.x - w.x).abs() < 1e-3);
        assert!((back.y - w.y).abs() < 1e-3);
    }

    #[test]
    fn zoom_preserves_anchor_point() {
        let mut t = ViewTransform::fit(vec2(1200.0, 900.0), vec2(800.0, 600.0));
        let anchor = pos2(250.0, 180.0);
        for delta in [0.3, -0.15, 1.0, -0.4] {
            let before = t.to_world(anchor);
            t.zoom_at(anchor, delta);
            let after = t.to_world(anchor);
            assert!((before.x - after.x).abs() < 1e-2, "world x drifted: {before:?} vs {after:?}");
            assert!((before.y - after.y).abs() < 1e-2, "world y drifted: {before:?} vs {after:?}");
        }
    }

    #[test]
    fn zoom_clamps_to_bounds() {
        let mut t = ViewTransform::fit(vec2(100.0, 100.0), vec2(100.0, 100.0));
        for _ in 0..100 {
            t.zoom_at(pos2(50.0, 50.0), 0.5);
        }
        assert_eq!(t.scale(), MAX_SCALE);
        for _ in 0..100 {
            t.zoom_at(pos2(50.0, 50.0), -0.5);
        }
        assert_eq!(t.scale(), MIN_SCALE);

        t.set_scale(99.0);
        assert_eq!(t.scale(), MAX_SCALE);
        t.set_scale(0.0);
        assert_eq!(t.scale(), MIN_SCALE);
    }

    #[test]
    fn mutations_bump_revision_once() {
        let mut t = ViewTransform::fit(vec2(100.0, 100.0), vec2(200.0, 200.0));
        let r0 = t.revision();
        t.set_position(vec2(1.0, 1.0));
        assert_eq!(t.revision(), r0 + 1);
        t.zoom_at(pos2(0.0, 0.0), 0.1);
        assert_eq!(t.revision(), r0 + 2);
        // Setting an identical scale is not a change
        let r = t.revision();
        let s = t.scale();
        t.set_scale(s);
        assert_eq!(t.revision(), r);
    }
}
