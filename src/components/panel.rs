//! The editor side panel: caption generation, translation, layer management,
//! per-layer style controls, image zoom, and the finalize flow.
//!
//! The panel mutates the layer store directly for local edits (selection,
//! removal, style) and returns a [`PanelAction`] for anything that crosses an
//! async boundary, which the app executes.

use egui::{RichText, Ui};

use crate::canvas::EditorSession;
use crate::geometry::{MAX_SCALE, MIN_SCALE};
use crate::ops::caption::LANGUAGES;

/// Maximum creator-name length, enforced at input time.
const CREATOR_NAME_MAX: usize = 30;

pub enum PanelAction {
    GenerateCaptions,
    /// Translate the current captions to `LANGUAGES[index]`.
    Translate(usize),
    AddCaption(String),
    ApplyEdit(String),
    Finalize,
    RetryUpload,
}

#[derive(Default)]
pub struct SidePanel {
    custom_text: String,
    edit_prompt: String,
}

impl SidePanel {
    #[allow(clippy::too_many_arguments)]
    pub fn show(
        &mut self,
        ui: &mut Ui,
        session: &mut EditorSession,
        captions: &[String],
        language_idx: &mut usize,
        creator_name: &mut String,
        wallet_address: Option<&str>,
        busy: bool,
        has_failed_upload: bool,
    ) -> Option<PanelAction> {
        let mut action = None;

        egui::ScrollArea::vertical().show(ui, |ui| {
            ui.heading("1. Generate Captions");
            if ui
                .add_enabled(!busy, egui::Button::new("✨ Magic Caption"))
                .clicked()
            {
                action = Some(PanelAction::GenerateCaptions);
            }
            ui.separator();

            if !captions.is_empty() {
                ui.heading("2. AI Captions & Translate");
                let before = *language_idx;
                egui::ComboBox::from_id_source("caption_language")
                    .selected_text(LANGUAGES[*language_idx].1)
                    .show_ui(ui, |ui| {
                        for (i, (_, name)) in LANGUAGES.iter().enumerate() {
                            ui.selectable_value(language_idx, i, *name);
                        }
                    });
                if *language_idx != before && !busy {
                    action = Some(PanelAction::Translate(*language_idx));
                }
                for caption in captions {
                    if ui.add_enabled(!busy, egui::Button::new(format!("+ {caption}"))).clicked() {
                        action = Some(PanelAction::AddCaption(caption.clone()));
                    }
                }
                ui.separator();
            }

            ui.heading("3. Add Custom Text");
            ui.horizontal(|ui| {
                ui.text_edit_singleline(&mut self.custom_text);
                let can_add = !busy && !self.custom_text.trim().is_empty();
                if ui.add_enabled(can_add, egui::Button::new("+")).clicked() {
                    action = Some(PanelAction::AddCaption(std::mem::take(&mut self.custom_text)));
                }
            });
            ui.separator();

            ui.heading("4. AI Image Edit");
            ui.text_edit_singleline(&mut self.edit_prompt);
            let can_edit = !busy && !self.edit_prompt.trim().is_empty();
            if ui.add_enabled(can_edit, egui::Button::new("Apply Edit")).clicked() {
                action = Some(PanelAction::ApplyEdit(self.edit_prompt.clone()));
            }
            ui.separator();

            ui.heading("5. Finalize Details & Style");
            ui.label("Meme Title / Creator Name (Required)");
            if ui.text_edit_singleline(creator_name).changed()
                && creator_name.chars().count() > CREATOR_NAME_MAX
            {
                *creator_name = creator_name.chars().take(CREATOR_NAME_MAX).collect();
            }

            self.layer_list(ui, session);
            self.active_layer_style(ui, session);
            self.image_settings(ui, session);
            ui.separator();

            ui.heading("6. Finalize");
            let connected = wallet_address.is_some();
            if !connected {
                ui.label(
                    RichText::new("Connect your wallet to sign and finalize your meme.")
                        .color(egui::Color32::LIGHT_RED),
                );
            } else if creator_name.trim().is_empty() {
                ui.label(
                    RichText::new("Please set your Meme Title / Creator Name before finalizing.")
                        .color(egui::Color32::YELLOW),
                );
            } else if session.store.is_empty() {
                ui.label(
                    RichText::new("Please add at least one text layer to the meme.")
                        .color(egui::Color32::YELLOW),
                );
            }
            let can_finalize =
                !busy && connected && !creator_name.trim().is_empty() && !session.store.is_empty();
            if ui
                .add_enabled(can_finalize, egui::Button::new("✔ Finalize & Sign Meme"))
                .clicked()
            {
                action = Some(PanelAction::Finalize);
            }

            if has_failed_upload {
                ui.add_space(6.0);
                ui.label(
                    RichText::new("Your finished meme could not be uploaded. It is kept locally.")
                        .color(egui::Color32::LIGHT_RED),
                );
                if ui.add_enabled(!busy, egui::Button::new("Retry Upload")).clicked() {
                    action = Some(PanelAction::RetryUpload);
                }
            }
        });

        action
    }

    fn layer_list(&mut self, ui: &mut Ui, session: &mut EditorSession) {
        ui.add_space(6.0);
        ui.label(format!(
            "Active Text Layers ({}) — click to select",
            session.store.len()
        ));
        let entries: Vec<_> = session
            .store
            .layers()
            .iter()
            .map(|l| (l.id, l.text.clone()))
            .collect();
        let active = session.store.active_id();
        for (id, text) in entries {
            ui.horizontal(|ui| {
                let selected = active == Some(id);
                if ui.selectable_label(selected, &text).clicked() {
                    session.store.set_active(Some(id));
                }
                if ui.small_button("−").clicked() {
                    session.store.remove(id);
                }
            });
        }
    }

    fn active_layer_style(&mut self, ui: &mut Ui, session: &mut EditorSession) {
        let Some(active) = session.store.active_layer() else {
            ui.label(RichText::new("Select a layer to adjust its style.").weak());
            return;
        };
        let id = active.id;
        let multiplier = active.font_size_multiplier;
        let mut color = active.color;

        ui.add_space(6.0);
        ui.label(RichText::new(format!("Style for: \"{}\"", truncated(&active.text, 14))).strong());

        ui.horizontal(|ui| {
            ui.label("Text Size");
            if ui.button("−").clicked() {
                session.store.nudge_font_size(id, -0.1);
            }
            ui.monospace(format!("{:.0}%", multiplier * 100.0));
            if ui.button("+").clicked() {
                session.store.nudge_font_size(id, 0.1);
            }
        });

        ui.horizontal(|ui| {
            ui.label("Text Color");
            if ui.color_edit_button_srgb(&mut color).changed() {
                session.store.set_color(id, color);
            }
        });
    }

    fn image_settings(&mut self, ui: &mut Ui, session: &mut EditorSession) {
        ui.add_space(6.0);
        ui.label("Image Zoom (or use the mouse wheel over the canvas)");
        let mut scale = session.transform.scale();
        if ui
            .add(egui::Slider::new(&mut scale, MIN_SCALE..=MAX_SCALE).fixed_decimals(2))
            .changed()
        {
            session.transform.set_scale(scale);
        }
    }
}

fn truncated(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.to_string()
    } else {
        let prefix: String = text.chars().take(max).collect();
        format!("{prefix}…")
    }
}
