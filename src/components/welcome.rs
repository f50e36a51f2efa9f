//! First-run welcome dialog, shown once.  The seen-flag is read from settings
//! at startup and written back exactly once when the user dismisses this.

use egui::{Align2, Context, RichText};

/// Render the dialog; returns true when the user dismisses it.
pub fn show(ctx: &Context) -> bool {
    let mut dismissed = false;
    egui::Window::new("Welcome to MemeFE")
        .collapsible(false)
        .resizable(false)
        .anchor(Align2::CENTER_CENTER, [0.0, 0.0])
        .show(ctx, |ui| {
            ui.label("Make a meme in five steps:");
            ui.label("  1. Pick an image or template");
            ui.label("  2. Generate AI captions (or type your own)");
            ui.label("  3. Drag captions into place, resize and recolor them");
            ui.label("  4. Pan and zoom the image with drag and mouse wheel");
            ui.label("  5. Finalize to sign and publish your creation");
            ui.add_space(8.0);
            ui.label(RichText::new("A small network fee is charged when finalizing.").weak());
            ui.add_space(8.0);
            ui.vertical_centered(|ui| {
                if ui.button("Got it").clicked() {
                    dismissed = true;
                }
            });
        });
    dismissed
}
