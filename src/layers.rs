//! The caption layer store: an ordered collection of text layers plus the
//! single active selection.  Layers draw in insertion order (later entries on
//! top) and are hit-tested in reverse, so the visually topmost layer under
//! the pointer wins.  Every mutation bumps a revision counter that the canvas
//! widget observes to schedule exactly one recompose.

use egui::{Pos2, Rect, Vec2};
use uuid::Uuid;

use crate::geometry::{self, MeasureFn};

/// Font-size multiplier bounds, applied to every size adjustment.
pub const FONT_SIZE_MIN: f32 = 0.2;
pub const FONT_SIZE_MAX: f32 = 3.0;

/// Vertical spacing between the default anchors of successively added
/// layers, so new captions do not fully overlap.
const STACK_OFFSET: f32 = 40.0;

const DEFAULT_COLOR: [u8; 3] = [0xFF, 0xFF, 0xFF];

/// Opaque, stable identifier for a text layer.  Never reused.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct LayerId(Uuid);

impl LayerId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

/// One positioned, styled caption on the canvas.
///
/// `text` keeps the user's original casing; it is upper-cased at measure and
/// draw time only.  `(x, y)` is the baseline anchor in canvas pixel space,
/// horizontally centered.
#[derive(Clone, Debug)]
pub struct TextLayer {
    pub id: LayerId,
    pub text: String,
    pub x: f32,
    pub y: f32,
    pub font_size_multiplier: f32,
    pub color: [u8; 3],
}

impl TextLayer {
    /// Bounding box used for both hit-testing and the selection outline.
    pub fn bounds(&self, measure: MeasureFn, canvas_width: f32) -> Rect {
        geometry::caption_bounds(
            &self.text,
            self.x,
            self.y,
            self.font_size_multiplier,
            measure,
            canvas_width,
        )
    }
}

#[derive(Default)]
pub struct LayerStore {
    layers: Vec<TextLayer>,
    active: Option<LayerId>,
    revision: u64,
}

impl LayerStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Layers in draw order (first = bottom).
    pub fn layers(&self) -> &[TextLayer] {
        &self.layers
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    pub fn active_id(&self) -> Option<LayerId> {
        self.active
    }

    pub fn active_layer(&self) -> Option<&TextLayer> {
        self.active.and_then(|id| self.get(id))
    }

    pub fn get(&self, id: LayerId) -> Option<&TextLayer> {
        self.layers.iter().find(|l| l.id == id)
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    fn bump(&mut self) {
        self.revision += 1;
    }

    /// Commit a caption as a new layer and make it active.
    ///
    /// Blank or whitespace-only text is rejected: no layer is created and no
    /// id is returned.  New layers are horizontally centered and stacked
    /// upward from near the bottom edge.
    pub fn add_layer(&mut self, text: &str, canvas_size: Vec2) -> Option<LayerId> {
        if text.trim().is_empty() {
            return None;
        }
        let layer = TextLayer {
            id: LayerId::new(),
            text: text.to_string(),
            x: canvas_size.x / 2.0,
            y: canvas_size.y - canvas_size.y / 10.0 - self.layers.len() as f32 * STACK_OFFSET,
            font_size_multiplier: 1.0,
            color: DEFAULT_COLOR,
        };
        let id = layer.id;
        self.layers.push(layer);
        self.active = Some(id);
        self.bump();
        Some(id)
    }

    /// Move a layer's baseline anchor.  Unknown ids are a no-op.
    pub fn update_position(&mut self, id: LayerId, x: f32, y: f32) {
        if let Some(layer) = self.layers.iter_mut().find(|l| l.id == id) {
            layer.x = x;
            layer.y = y;
            self.bump();
        }
    }

    /// Adjust a layer's font-size multiplier by `delta`, clamped to
    /// [`FONT_SIZE_MIN`, `FONT_SIZE_MAX`].
    pub fn nudge_font_size(&mut self, id: LayerId, delta: f32) {
        if let Some(layer) = self.layers.iter_mut().find(|l| l.id == id) {
            layer.font_size_multiplier =
                (layer.font_size_multiplier + delta).clamp(FONT_SIZE_MIN, FONT_SIZE_MAX);
            self.bump();
        }
    }

    pub fn set_color(&mut self, id: LayerId, color: [u8; 3]) {
        if let Some(layer) = self.layers.iter_mut().find(|l| l.id == id) {
            layer.color = color;
            self.bump();
        }
    }

    /// Remove a layer.  Clears the selection if the removed layer was active;
    /// unknown ids are a no-op.
    pub fn remove(&mut self, id: LayerId) {
        let before = self.layers.len();
        self.layers.retain(|l| l.id != id);
        if self.layers.len() != before {
            if self.active == Some(id) {
                self.active = None;
            }
            self.bump();
        }
    }

    /// Set (or clear) the active layer.  Ids not present in the store are
    /// ignored, so `active` always refers to an existing layer.
    pub fn set_active(&mut self, id: Option<LayerId>) {
        let valid = match id {
            Some(id) => self.get(id).is_some(),
            None => true,
        };
        if valid && self.active != id {
            self.active = id;
            self.bump();
        }
    }

    /// Topmost layer whose bounding box contains `point`, if any.
    /// Later-inserted layers draw on top, so iteration runs in reverse.
    pub fn hit_test(&self, point: Pos2, measure: MeasureFn, canvas_width: f32) -> Option<LayerId> {
        self.layers
            .iter()
            .rev()
            .find(|l| l.bounds(measure, canvas_width).contains(point))
            .map(|l| l.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use egui::pos2;

    fn fake_measure(text: &str, font_size: f32) -> f32 {
        text.chars().count() as f32 * font_size * 0.6
    }

    const CANVAS: Vec2 = Vec2 { x: 800.0, y: 600.0 };

    #[test]
    fn default_placement_centers_and_stacks_upward() {
        let mut store = LayerStore::new();
        let a = store.add_layer("HELLO", CANVAS).unwrap();
        let first = store.get(a).unwrap();
        assert_eq!(first.x, 400.0);
        assert_eq!(first.y, 600.0 - 60.0); // h - h/10, no prior layers
        assert_eq!(first.font_size_multiplier, 1.0);
        assert_eq!(first.color, [0xFF, 0xFF, 0xFF]);

        let b = store.add_layer("WORLD", CANVAS).unwrap();
        assert_eq!(store.get(b).unwrap().y, 540.0 - 40.0);
        assert_ne!(a, b);
    }

    #[test]
    fn blank_text_is_rejected_without_side_effects() {
        let mut store = LayerStore::new();
        let r0 = store.revision();
        assert!(store.add_layer("", CANVAS).is_none());
        assert!(store.add_layer("   \t ", CANVAS).is_none());
        assert_eq!(store.len(), 0);
        assert_eq!(store.revision(), r0);
        assert!(store.active_id().is_none());
    }

    #[test]
    fn adding_a_layer_makes_it_active() {
        let mut store = LayerStore::new();
        let a = store.add_layer("a", CANVAS).unwrap();
        assert_eq!(store.active_id(), Some(a));
        let b = store.add_layer("b", CANVAS).unwrap();
        assert_eq!(store.active_id(), Some(b));
    }

    #[test]
    fn font_size_clamps_over_any_step_sequence() {
        let mut store = LayerStore::new();
        let id = store.add_layer("x", CANVAS).unwrap();
        for _ in 0..50 {
            store.nudge_font_size(id, 0.1);
        }
        assert_eq!(store.get(id).unwrap().font_size_multiplier, FONT_SIZE_MAX);
        for _ in 0..100 {
            store.nudge_font_size(id, -0.1);
        }
        assert_eq!(store.get(id).unwrap().font_size_multiplier, FONT_SIZE_MIN);
    }

    #[test]
    fn removing_active_layer_clears_selection() {
        let mut store = LayerStore::new();
        let a = store.add_layer("a", CANVAS).unwrap();
        store.remove(a);
        assert!(store.active_id().is_none());
        assert!(store.is_empty());
        // Unknown id removal is a no-op
        let r = store.revision();
        store.remove(a);
        assert_eq!(store.revision(), r);
    }

    #[test]
    fn removing_inactive_layer_keeps_selection() {
        let mut store = LayerStore::new();
        let a = store.add_layer("a", CANVAS).unwrap();
        let b = store.add_layer("b", CANVAS).unwrap();
        store.remove(a);
        assert_eq!(store.active_id(), Some(b));
    }

    #[test]
    fn set_active_rejects_unknown_ids() {
        let mut store = LayerStore::new();
        let a = store.add_layer("a", CANVAS).unwrap();
        store.remove(a);
        store.set_active(Some(a));
        assert!(store.active_id().is_none());
    }

    #[test]
    fn hit_test_prefers_topmost_of_overlapping_layers() {
        let mut store = LayerStore::new();
        let a = store.add_layer("overlap", CANVAS).unwrap();
        let b = store.add_layer("overlap", CANVAS).unwrap();
        // Stack B exactly on top of A
        store.update_position(b, 400.0, 540.0);
        store.update_position(a, 400.0, 540.0);
        let hit = store.hit_test(pos2(400.0, 530.0), &fake_measure, CANVAS.x);
        assert_eq!(hit, Some(b));
    }

    #[test]
    fn hit_test_agrees_with_selection_bounds() {
        // The same bounds drive hit-testing and the selection outline: points
        // just inside the box hit, points just outside miss.
        let mut store = LayerStore::new();
        let id = store.add_layer("Agree", CANVAS).unwrap();
        store.nudge_font_size(id, 0.4);
        let bounds = store.get(id).unwrap().bounds(&fake_measure, CANVAS.x);

        let inside = pos2(bounds.min.x + 0.5, bounds.min.y + 0.5);
        let outside = pos2(bounds.min.x - 1.5, bounds.min.y - 1.5);
        assert_eq!(store.hit_test(inside, &fake_measure, CANVAS.x), Some(id));
        assert_eq!(store.hit_test(outside, &fake_measure, CANVAS.x), None);
    }

    #[test]
    fn hit_test_misses_outside_bounds() {
        let mut store = LayerStore::new();
        store.add_layer("tiny", CANVAS).unwrap();
        assert!(store.hit_test(pos2(5.0, 5.0), &fake_measure, CANVAS.x).is_none());
    }

    #[test]
    fn each_mutation_bumps_revision_once() {
        let mut store = LayerStore::new();
        let r0 = store.revision();
        let id = store.add_layer("x", CANVAS).unwrap();
        assert_eq!(store.revision(), r0 + 1);
        store.update_position(id, 1.0, 2.0);
        assert_eq!(store.revision(), r0 + 2);
        store.nudge_font_size(id, 0.1);
        assert_eq!(store.revision(), r0 + 3);
        store.set_color(id, [1, 2, 3]);
        assert_eq!(store.revision(), r0 + 4);
        store.set_active(None);
        assert_eq!(store.revision(), r0 + 5);
        store.remove(id);
        assert_eq!(store.revision(), r0 + 6);
    }
}
