//! Pointer/wheel interaction for the caption canvas.
//!
//! Three mutually exclusive states: idle (hover feedback only), dragging a
//! caption layer, or panning the background image.  Each event is resolved
//! synchronously against the current state — there is no event queue, so a
//! mutation is always visible before the next event is handled.

use egui::{CursorIcon, Pos2, Vec2};

use crate::geometry::{MeasureFn, ViewTransform, WHEEL_ZOOM_STEP};
use crate::layers::{LayerId, LayerStore};

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Interaction {
    Idle,
    /// `grab_offset` = pointer − layer anchor at press time, so the layer
    /// does not jump to the cursor on the first move.
    DraggingLayer { id: LayerId, grab_offset: Vec2 },
    /// `grab_offset` = pointer − image origin at press time.
    PanningImage { grab_offset: Vec2 },
}

pub struct InputController {
    state: Interaction,
    hovering_caption: bool,
}

impl Default for InputController {
    fn default() -> Self {
        Self { state: Interaction::Idle, hovering_caption: false }
    }
}

impl InputController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> Interaction {
        self.state
    }

    /// Press: hit-test captions topmost-first.  A hit starts a layer drag and
    /// selects that layer; a miss clears the selection and starts an image pan.
    pub fn pointer_down(
        &mut self,
        pos: Pos2,
        store: &mut LayerStore,
        transform: &ViewTransform,
        measure: MeasureFn,
        canvas_width: f32,
    ) {
        let hit = store
            .hit_test(pos, measure, canvas_width)
            .and_then(|id| store.get(id).map(|l| (id, Vec2::new(l.x, l.y))));
        if let Some((id, anchor)) = hit {
            store.set_active(Some(id));
            self.state = Interaction::DraggingLayer { id, grab_offset: pos.to_vec2() - anchor };
        } else {
            store.set_active(None);
            self.state = Interaction::PanningImage {
                grab_offset: pos.to_vec2() - transform.position(),
            };
        }
    }

    /// Move: drag the grabbed layer or pan the image; while idle, only the
    /// hover flag changes (cursor feedback, no store mutation).
    pub fn pointer_move(
        &mut self,
        pos: Pos2,
        store: &mut LayerStore,
        transform: &mut ViewTransform,
        measure: MeasureFn,
        canvas_width: f32,
    ) {
        match self.state {
            Interaction::DraggingLayer { id, grab_offset } => {
                let anchor = pos.to_vec2() - grab_offset;
                store.update_position(id, anchor.x, anchor.y);
            }
            Interaction::PanningImage { grab_offset } => {
                transform.set_position(pos.to_vec2() - grab_offset);
            }
            Interaction::Idle => {
                self.hovering_caption = store.hit_test(pos, measure, canvas_width).is_some();
            }
        }
    }

    pub fn pointer_up(&mut self) {
        self.state = Interaction::Idle;
    }

    pub fn pointer_leave(&mut self) {
        self.state = Interaction::Idle;
        self.hovering_caption = false;
    }

    /// Wheel zoom, anchored at the pointer.  Ignored while a drag or pan is
    /// in progress, and when the pointer is outside the image's screen bounds.
    pub fn wheel(
        &mut self,
        pos: Pos2,
        scroll_delta_y: f32,
        transform: &mut ViewTransform,
        natural: Vec2,
    ) {
        if self.state != Interaction::Idle {
            return;
        }
        if !transform.image_rect(natural).contains(pos) {
            return;
        }
        transform.zoom_at(pos, scroll_delta_y * WHEEL_ZOOM_STEP);
    }

    /// Cursor shown over the canvas for the current state.
    pub fn cursor(&self) -> CursorIcon {
        match self.state {
            Interaction::DraggingLayer { .. } => CursorIcon::Move,
            Interaction::PanningImage { .. } => CursorIcon::Grabbing,
            Interaction::Idle if self.hovering_caption => CursorIcon::Move,
            Interaction::Idle => CursorIcon::Grab,
        }
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
    // Wide image: contain-fit letterboxes it, leaving empty canvas above/below
    const NATURAL: Vec2 = Vec2 { x: 400.0, y: 100.0 };

    fn setup() -> (InputController, LayerStore, ViewTransform) {
        (
            InputController::new(),
            LayerStore::new(),
            ViewTransform::fit(NATURAL, CANVAS),
        )
    }

    #[test]
    fn press_on_caption_starts_drag_and_selects() {
        let (mut input, mut store, transform) = setup();
        let id = store.add_layer("grab me", CANVAS).unwrap();
        store.set_active(None);

        // Default anchor (400, 540); press just above the baseline
        input.pointer_down(pos2(400.0, 530.0), &mut store, &transform, &fake_measure, CANVAS.x);
        assert!(matches!(input.state(), Interaction::DraggingLayer { id: d, .. } if d == id));
        assert_eq!(store.active_id(), Some(id));
    }

    #[test]
    fn drag_keeps_grab_offset() {
        let (mut input, mut store, mut transform) = setup();
        let id = store.add_layer("grab me", CANVAS).unwrap();
        input.pointer_down(pos2(410.0, 530.0), &mut store, &transform, &fake_measure, CANVAS.x);
        input.pointer_move(pos2(460.0, 500.0), &mut store, &mut transform, &fake_measure, CANVAS.x);
        let layer = store.get(id).unwrap();
        // Moved by the pointer delta (+50, −30), not snapped to the cursor
        assert!((layer.x - 450.0).abs() < 1e-3);
        assert!((layer.y - 510.0).abs() < 1e-3);
    }

    #[test]
    fn press_on_empty_canvas_pans_and_clears_selection() {
        let (mut input, mut store, mut transform) = setup();
        store.add_layer("caption", CANVAS).unwrap();
        let origin = transform.position();

        input.pointer_down(pos2(10.0, 10.0), &mut store, &transform, &fake_measure, CANVAS.x);
        assert!(matches!(input.state(), Interaction::PanningImage { .. }));
        assert!(store.active_id().is_none());

        input.pointer_move(pos2(30.0, 25.0), &mut store, &mut transform, &fake_measure, CANVAS.x);
        let moved = transform.position() - origin;
        assert!((moved.x - 20.0).abs() < 1e-3);
        assert!((moved.y - 15.0).abs() < 1e-3);
    }

    #[test]
    fn release_and_leave_return_to_idle() {
        let (mut input, mut store, transform) = setup();
        input.pointer_down(pos2(10.0, 10.0), &mut store, &transform, &fake_measure, CANVAS.x);
        input.pointer_up();
        assert_eq!(input.state(), Interaction::Idle);

        input.pointer_down(pos2(10.0, 10.0), &mut store, &transform, &fake_measure, CANVAS.x);
        input.pointer_leave();
        assert_eq!(input.state(), Interaction::Idle);
    }

    #[test]
    fn overlap_press_selects_later_inserted_layer() {
        let (mut input, mut store, transform) = setup();
        let _a = store.add_layer("overlap", CANVAS).unwrap();
        let b = store.add_layer("overlap", CANVAS).unwrap();
        store.update_position(b, 400.0, 540.0); // exactly over A
        input.pointer_down(pos2(400.0, 530.0), &mut store, &transform, &fake_measure, CANVAS.x);
        assert_eq!(store.active_id(), Some(b));
    }

    #[test]
    fn idle_hover_mutates_nothing() {
        let (mut input, mut store, mut transform) = setup();
        store.add_layer("caption", CANVAS).unwrap();
        let (rs, rt) = (store.revision(), transform.revision());
        input.pointer_move(pos2(400.0, 530.0), &mut store, &mut transform, &fake_measure, CANVAS.x);
        assert_eq!(store.revision(), rs);
        assert_eq!(transform.revision(), rt);
        assert_eq!(input.cursor(), CursorIcon::Move);
    }

    #[test]
    fn wheel_over_image_zooms() {
        let (mut input, _store, mut transform) = setup();
        let before = transform.scale();
        let center = transform.image_rect(NATURAL).center();
        input.wheel(center, 100.0, &mut transform, NATURAL);
        assert!(transform.scale() > before);
    }

    #[test]
    fn wheel_outside_image_is_ignored() {
        let (mut input, _store, mut transform) = setup();
        let (s, p) = (transform.scale(), transform.position());
        // Image is contain-fit and centered; the far corner is outside it
        input.wheel(pos2(1.0, 1.0), 100.0, &mut transform, NATURAL);
        assert_eq!(transform.scale(), s);
        assert_eq!(transform.position(), p);
    }

    #[test]
    fn wheel_during_drag_is_ignored() {
        let (mut input, mut store, mut transform) = setup();
        store.add_layer("caption", CANVAS).unwrap();
        input.pointer_down(pos2(400.0, 530.0), &mut store, &transform, &fake_measure, CANVAS.x);
        let s = transform.scale();
        let center = transform.image_rect(NATURAL).center();
        input.wheel(center, 100.0, &mut transform, NATURAL);
        assert_eq!(transform.scale(), s);
    }
}
