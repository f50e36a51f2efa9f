//! The interactive canvas widget: owns the per-image editing session (layer
//! store, view transform, input controller, composed frame) and bridges egui
//! pointer/wheel events into the input state machine.
//!
//! Redraw contract: the widget observes the store and transform revision
//! counters and recomposes the frame exactly once per change, after the
//! frame's input events have been applied.  The composed frame is the export
//! surface; the dashed selection outline is drawn onto a display copy only.

use std::sync::Arc;

use egui::{Color32, ColorImage, ImageData, Rect, Sense, TextureOptions, Vec2, vec2};
use image::RgbaImage;

use crate::geometry::{self, ViewTransform};
use crate::input::InputController;
use crate::layers::LayerStore;
use crate::render::{self, CaptionFont};

pub struct EditorSession {
    background: RgbaImage,
    pub store: LayerStore,
    pub transform: ViewTransform,
    input: InputController,
    canvas_size: (u32, u32),
    /// Latest composed frame, selection outline excluded.  This is what
    /// `export_jpeg` serialises.
    frame: Option<RgbaImage>,
    texture: Option<egui::TextureHandle>,
    /// (store revision, transform revision, active id) of the last compose.
    rendered_state: Option<(u64, u64, Option<crate::layers::LayerId>)>,
}

impl EditorSession {
    /// Build a session for a freshly decoded background image.  Only called
    /// once natural dimensions are known — layout math never runs before the
    /// image load completes.
    pub fn new(background: RgbaImage, viewport: Vec2) -> Self {
        let natural = vec2(background.width() as f32, background.height() as f32);
        let canvas_size = (viewport.x.max(1.0) as u32, viewport.y.max(1.0) as u32);
        Self {
            background,
            store: LayerStore::new(),
            transform: ViewTransform::fit(natural, viewport),
            input: InputController::new(),
            canvas_size,
            frame: None,
            texture: None,
            rendered_state: None,
        }
    }

    pub fn natural_size(&self) -> Vec2 {
        vec2(self.background.width() as f32, self.background.height() as f32)
    }

    pub fn canvas_size(&self) -> Vec2 {
        vec2(self.canvas_size.0 as f32, self.canvas_size.1 as f32)
    }

    /// Swap in an AI-edited background.  The view refits (new natural size)
    /// while the caption layers keep their canvas positions.
    pub fn replace_background(&mut self, background: RgbaImage) {
        self.background = background;
        let natural = self.natural_size();
        self.transform = ViewTransform::fit(natural, self.canvas_size());
        self.rendered_state = None;
    }

    /// Flatten the latest composed frame to JPEG.  Requires that a render has
    /// completed; export never re-renders implicitly.
    pub fn export_jpeg(&self) -> Result<Vec<u8>, String> {
        match &self.frame {
            Some(frame) => crate::io::flatten_jpeg(frame),
            None => Err("nothing rendered yet".to_string()),
        }
    }

    /// Lay out the canvas, apply this frame's pointer/wheel events, recompose
    /// if anything changed, and paint the result.
    pub fn show(&mut self, ui: &mut egui::Ui, font: &CaptionFont) {
        let available = ui.available_size();
        let (response, painter) = ui.allocate_painter(available, Sense::click_and_drag());
        let canvas_rect = response.rect;

        // Window resized: adopt the new surface size and refit the image.
        let new_size = (canvas_rect.width().max(1.0) as u32, canvas_rect.height().max(1.0) as u32);
        if new_size != self.canvas_size {
            self.canvas_size = new_size;
            let natural = self.natural_size();
            self.transform = ViewTransform::fit(natural, self.canvas_size());
            self.rendered_state = None;
        }

        self.handle_events(ui, &response, canvas_rect, font);
        self.recompose_if_needed(ui, font);

        if let Some(texture) = &self.texture {
            painter.image(
                texture.id(),
                canvas_rect,
                Rect::from_min_max(egui::pos2(0.0, 0.0), egui::pos2(1.0, 1.0)),
                Color32::WHITE,
            );
        }
        if response.hovered() || response.dragged() {
            let cursor = self.input.cursor();
            ui.ctx().output_mut(|o| o.cursor_icon = cursor);
        }
    }

    fn handle_events(
        &mut self,
        ui: &egui::Ui,
        response: &egui::Response,
        canvas_rect: Rect,
        font: &CaptionFont,
    ) {
        let measure = |text: &str, size: f32| font.measure(text, size);
        let canvas_width = self.canvas_size.0 as f32;
        let natural = self.natural_size();

        if response.drag_started()
            && let Some(screen) = response.interact_pointer_pos()
        {
            let pos = geometry::canvas_pos(screen, canvas_rect);
            self.input
                .pointer_down(pos, &mut self.store, &self.transform, &measure, canvas_width);
        } else if response.dragged()
            && let Some(screen) = response.interact_pointer_pos()
        {
            let pos = geometry::canvas_pos(screen, canvas_rect);
            self.input
                .pointer_move(pos, &mut self.store, &mut self.transform, &measure, canvas_width);
        }
        if response.drag_released() {
            self.input.pointer_up();
        }

        if let Some(screen) = response.hover_pos() {
            let pos = geometry::canvas_pos(screen, canvas_rect);
            if !response.dragged() {
                self.input
                    .pointer_move(pos, &mut self.store, &mut self.transform, &measure, canvas_width);
            }
            let scroll = ui.input(|i| i.scroll_delta);
            if scroll.y != 0.0 {
                self.input.wheel(pos, scroll.y, &mut self.transform, natural);
            }
        } else {
            self.input.pointer_leave();
        }
    }

    fn recompose_if_needed(&mut self, ui: &egui::Ui, font: &CaptionFont) {
        let state = (
            self.store.revision(),
            self.transform.revision(),
            self.store.active_id(),
        );
        if self.rendered_state == Some(state) && self.frame.is_some() {
            return;
        }

        let frame = render::compose(
            &self.background,
            &self.transform,
            &self.store,
            self.canvas_size,
            font,
        );

        // Display copy carries the selection outline; the export frame never does.
        let mut display = frame.clone();
        if let Some(active) = self.store.active_layer() {
            let measure = |text: &str, size: f32| font.measure(text, size);
            let bounds = active.bounds(&measure, self.canvas_size.0 as f32);
            render::draw_selection_overlay(&mut display, bounds);
        }

        let color_image = ColorImage::from_rgba_unmultiplied(
            [display.width() as usize, display.height() as usize],
            display.as_raw(),
        );
        let image_data = ImageData::Color(Arc::new(color_image));
        match &mut self.texture {
            Some(texture) => texture.set(image_data, TextureOptions::LINEAR),
            None => {
                self.texture = Some(ui.ctx().load_texture(
                    "meme_canvas",
                    image_data,
                    TextureOptions::LINEAR,
                ));
            }
        }

        self.frame = Some(frame);
        self.rendered_state = Some(state);
    }
}
