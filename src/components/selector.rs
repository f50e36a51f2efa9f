//! Start screen: pick a local image or one of the well-known templates.

use egui::{RichText, Ui};

/// Popular meme templates offered on the start screen.
pub const TEMPLATES: &[(&str, &str)] = &[
    ("Distracted Boyfriend", "https://i.imgflip.com/1ur9b0.jpg"),
    ("Drake Hotline Bling", "https://i.imgflip.com/30b1gx.jpg"),
    ("Two Buttons", "https://i.imgflip.com/1g8my4.jpg"),
    ("Woman Yelling at Cat", "https://i.imgflip.com/345v97.jpg"),
    ("Expanding Brain", "https://i.imgflip.com/1jwhww.jpg"),
    ("Disaster Girl", "https://i.imgflip.com/23ls.jpg"),
];

pub enum SelectorAction {
    PickFile,
    /// Fetch a template by URL.
    Template(&'static str),
}

/// Render the start screen.  `busy` disables the inputs while an image is
/// already being loaded.
pub fn show(ui: &mut Ui, busy: bool) -> Option<SelectorAction> {
    let mut action = None;

    ui.vertical_centered(|ui| {
        ui.add_space(40.0);
        ui.heading("Create Your Meme");
        ui.label("Start by uploading an image or choosing a popular template.");
        ui.add_space(16.0);

        if ui
            .add_enabled(!busy, egui::Button::new(RichText::new("Upload an Image").strong()))
            .clicked()
        {
            action = Some(SelectorAction::PickFile);
        }

        ui.add_space(24.0);
        ui.label(RichText::new("Or pick a template").weak());
        ui.add_space(8.0);

        egui::Grid::new("template_grid").num_columns(3).spacing([12.0, 8.0]).show(ui, |ui| {
            for (i, (name, url)) in TEMPLATES.iter().enumerate() {
                if ui.add_enabled(!busy, egui::Button::new(*name)).clicked() {
                    action = Some(SelectorAction::Template(url));
                }
                if i % 3 == 2 {
                    ui.end_row();
                }
            }
        });
    });

    action
}
