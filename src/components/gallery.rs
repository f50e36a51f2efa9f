//! Recent creations: a thumbnail strip of the latest uploads and a viewer
//! window for a selected meme.  Thumbnails arrive as decoded images from the
//! gallery worker; textures are built lazily and cached by meme id.

use std::collections::HashMap;
use std::sync::Arc;

use egui::{ColorImage, Context, ImageData, RichText, TextureHandle, TextureOptions, Ui, vec2};
use image::RgbaImage;

use crate::ops::gallery::Meme;

const THUMB_HEIGHT: f32 = 90.0;

#[derive(Default)]
pub struct GalleryStrip {
    textures: HashMap<String, TextureHandle>,
}

impl GalleryStrip {
    /// Render the strip; returns the index of a clicked meme.
    pub fn show(
        &mut self,
        ui: &mut Ui,
        memes: &[Meme],
        thumbs: &HashMap<String, RgbaImage>,
    ) -> Option<usize> {
        if memes.is_empty() {
            return None;
        }
        let mut clicked = None;

        ui.separator();
        ui.label(RichText::new("Recent Creations").heading());
        ui.horizontal_wrapped(|ui| {
            for (i, meme) in memes.iter().enumerate() {
                match self.texture_for(ui.ctx(), meme, thumbs) {
                    Some(texture) => {
                        let size = texture.size_vec2();
                        let scaled = vec2(size.x * THUMB_HEIGHT / size.y, THUMB_HEIGHT);
                        let sized = egui::load::SizedTexture::from_handle(&texture);
                        let img = egui::Image::from_texture(sized).fit_to_exact_size(scaled);
                        if ui
                            .add(egui::ImageButton::new(img).frame(false))
                            .on_hover_text(&meme.creator_name)
                            .clicked()
                        {
                            clicked = Some(i);
                        }
                    }
                    None => {
                        if ui.button(&meme.creator_name).clicked() {
                            clicked = Some(i);
                        }
                    }
                }
            }
        });

        clicked
    }

    /// Viewer window for one meme.  Returns false once the user closes it.
    pub fn show_viewer(
        &mut self,
        ctx: &Context,
        meme: &Meme,
        thumbs: &HashMap<String, RgbaImage>,
    ) -> bool {
        let mut open = true;
        egui::Window::new(&meme.creator_name)
            .open(&mut open)
            .collapsible(false)
            .resizable(true)
            .show(ctx, |ui| {
                if let Some(texture) = self.texture_for(ctx, meme, thumbs) {
                    let size = texture.size_vec2();
                    let max_w = 560.0f32.min(ui.available_width());
                    let scaled = vec2(max_w, size.y * max_w / size.x);
                    let sized = egui::load::SizedTexture::from_handle(&texture);
                    ui.add(egui::Image::from_texture(sized).fit_to_exact_size(scaled));
                } else {
                    ui.spinner();
                }
                ui.add_space(4.0);
                ui.monospace(format!("by {}", short_address(&meme.wallet_address)));
                ui.monospace(format!("tx {}", truncated(&meme.tx_signature, 20)));
                ui.monospace(format!("fee {} SOL", meme.fee_amount));
            });
        open
    }

    fn texture_for(
        &mut self,
        ctx: &Context,
        meme: &Meme,
        thumbs: &HashMap<String, RgbaImage>,
    ) -> Option<TextureHandle> {
        if let Some(texture) = self.textures.get(&meme.id) {
            return Some(texture.clone());
        }
        let image = thumbs.get(&meme.id)?;
        let color_image = ColorImage::from_rgba_unmultiplied(
            [image.width() as usize, image.height() as usize],
            image.as_raw(),
        );
        let texture = ctx.load_texture(
            format!("meme_thumb_{}", meme.id),
            ImageData::Color(Arc::new(color_image)),
            TextureOptions::LINEAR,
        );
        self.textures.insert(meme.id.clone(), texture.clone());
        Some(texture)
    }
}

fn short_address(address: &str) -> String {
    if address.len() > 8 {
        format!("{}…{}", &address[..4], &address[address.len() - 4..])
    } else {
        address.to_string()
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
