//! Top-level application state and frame loop.
//!
//! Screen flow: image selector → caption editor.  Everything that crosses a
//! network boundary (caption generation, translation, AI edit, wallet
//! signing, gallery upload/list) runs on a worker thread and reports back
//! over an mpsc channel; the UI polls the channel each frame.  Session-scoped
//! results carry the token that was current when the request was issued, so
//! replies that arrive after a reset are discarded instead of resurrecting a
//! cleared editing session.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::mpsc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use egui::RichText;
use image::RgbaImage;

use crate::canvas::EditorSession;
use crate::components::gallery::GalleryStrip;
use crate::components::panel::{PanelAction, SidePanel};
use crate::components::{selector, welcome};
use crate::ops::caption::{CaptionClient, GenerationError, LANGUAGES};
use crate::ops::edit::{EditClient, EditError};
use crate::ops::gallery::{
    GalleryClient, MAX_UPLOAD_RETRIES, Meme, RECENT_LIMIT, UploadError, fetch_bytes, jpeg_data_url,
};
use crate::ops::wallet::{SignerBridge, WalletError, WalletProvider, sol_to_lamports};
use crate::render::CaptionFont;
use crate::settings::AppSettings;

/// Which external operation is in flight.  At most one runs at a time; every
/// UI action that would start another one is disabled while busy.
#[derive(Clone, Debug, PartialEq)]
pub enum PendingOp {
    Idle,
    LoadingImage,
    LoadingGallery,
    Generating,
    Translating { language: String },
    Editing,
    AwaitingSignature,
    Uploading { attempt: u32, max: u32 },
}

impl PendingOp {
    pub fn is_busy(&self) -> bool {
        *self != PendingOp::Idle
    }

    /// Spinner caption for the busy overlay.
    pub fn label(&self) -> Option<String> {
        match self {
            PendingOp::Idle => None,
            PendingOp::LoadingImage => Some("Loading image...".to_string()),
            PendingOp::LoadingGallery => {
                Some("Loading latest creations from server...".to_string())
            }
            PendingOp::Generating => Some("Generating captions...".to_string()),
            PendingOp::Translating { language } => Some(format!("Translating to {language}...")),
            PendingOp::Editing => Some("Applying AI edit...".to_string()),
            PendingOp::AwaitingSignature => Some("Awaiting wallet signature...".to_string()),
            PendingOp::Uploading { attempt, max } => {
                Some(format!("Uploading meme data... (Attempt {attempt}/{max})"))
            }
        }
    }
}

enum FinalizeFailure {
    Wallet(WalletError),
    /// The artifact survives an exhausted retry loop so the user can retry
    /// manually instead of losing the finished meme.
    Upload { meme: Meme, error: UploadError },
}

enum OpOutcome {
    WalletReady(Arc<SignerBridge>),
    GalleryLoaded(Result<Vec<Meme>, String>),
    Thumb { id: String, image: RgbaImage },
    // Session-scoped outcomes (token-checked):
    ImageLoaded(Result<RgbaImage, String>),
    Captions(Result<Vec<String>, GenerationError>),
    Translation { result: Result<Vec<String>, GenerationError> },
    Edited(Box<Result<RgbaImage, EditError>>),
    UploadProgress { attempt: u32 },
    Finalized(Box<Result<Meme, FinalizeFailure>>),
}

struct OpMessage {
    token: u64,
    outcome: OpOutcome,
}

pub struct MemeFEApp {
    settings: AppSettings,
    font: Option<CaptionFont>,
    wallet: Option<Arc<SignerBridge>>,

    /// Decoded background waiting for the first editor frame (the canvas
    /// viewport size is only known inside the layout pass).
    pending_background: Option<RgbaImage>,
    session: Option<EditorSession>,
    /// Effective background (edited if present, else selected) encoded as
    /// JPEG for capability calls.
    background_jpeg: Vec<u8>,

    original_captions: Vec<String>,
    display_captions: Vec<String>,
    language_idx: usize,
    creator_name: String,

    side_panel: SidePanel,
    gallery_strip: GalleryStrip,

    recent: Vec<Meme>,
    thumbs: HashMap<String, RgbaImage>,
    viewing: Option<usize>,

    pending: PendingOp,
    error: Option<String>,
    failed_upload: Option<Meme>,

    /// Bumped on every reset/new-image; stale worker replies are discarded.
    session_token: u64,
    sender: mpsc::Sender<OpMessage>,
    receiver: mpsc::Receiver<OpMessage>,

    show_welcome: bool,
}

impl MemeFEApp {
    pub fn new(cc: &eframe::CreationContext<'_>) -> Self {
        cc.egui_ctx.set_visuals(egui::Visuals::dark());

        let settings = AppSettings::load();
        let show_welcome = !settings.has_seen_welcome;

        let font = match CaptionFont::load_system() {
            Ok(font) => Some(font),
            Err(e) => {
                crate::log_err!("caption font unavailable: {e}");
                None
            }
        };

        let (sender, receiver) = mpsc::channel();

        // Wallet bridge probe (may block on an unreachable daemon, so off-thread)
        {
            let sender = sender.clone();
            let url = settings.signer_url.clone();
            std::thread::spawn(move || {
                let bridge = Arc::new(SignerBridge::connect(url));
                match bridge.address() {
                    Some(addr) => crate::log_info!("wallet connected: {addr}"),
                    None => crate::log_warn!("wallet signer bridge not available"),
                }
                let _ = sender.send(OpMessage { token: 0, outcome: OpOutcome::WalletReady(bridge) });
            });
        }

        // Initial gallery fetch
        let pending = PendingOp::LoadingGallery;
        {
            let sender = sender.clone();
            let backend = settings.backend_url.clone();
            std::thread::spawn(move || {
                let result = GalleryClient::new(backend).list();
                let _ = sender.send(OpMessage { token: 0, outcome: OpOutcome::GalleryLoaded(result) });
            });
        }

        Self {
            settings,
            font,
            wallet: None,
            pending_background: None,
            session: None,
            background_jpeg: Vec::new(),
            original_captions: Vec::new(),
            display_captions: Vec::new(),
            language_idx: 0,
            creator_name: String::new(),
            side_panel: SidePanel::default(),
            gallery_strip: GalleryStrip::default(),
            recent: Vec::new(),
            thumbs: HashMap::new(),
            viewing: None,
            pending,
            error: None,
            failed_upload: None,
            session_token: 0,
            sender,
            receiver,
            show_welcome,
        }
    }

    fn wallet_address(&self) -> Option<String> {
        self.wallet.as_ref().and_then(|w| w.address())
    }

    fn editing(&self) -> bool {
        self.session.is_some() || self.pending_background.is_some()
    }

    /// Clear the editing session and everything scoped to it.  Bumping the
    /// token makes any still-running worker's reply stale.
    fn reset_editor(&mut self) {
        self.session = None;
        self.pending_background = None;
        self.background_jpeg.clear();
        self.original_captions.clear();
        self.display_captions.clear();
        self.language_idx = 0;
        self.creator_name.clear();
        self.error = None;
        self.pending = PendingOp::Idle;
        self.session_token += 1;
    }

    // ---- async boundary -----------------------------------------------------

    fn drain_channel(&mut self) {
        while let Ok(message) = self.receiver.try_recv() {
            match message.outcome {
                // App-global outcomes
                OpOutcome::WalletReady(bridge) => {
                    self.wallet = Some(bridge);
                }
                OpOutcome::GalleryLoaded(result) => {
                    if self.pending == PendingOp::LoadingGallery {
                        self.pending = PendingOp::Idle;
                    }
                    match result {
                        Ok(mut memes) => {
                            memes.sort_by(|a, b| b.created_at.cmp(&a.created_at));
                            memes.truncate(RECENT_LIMIT);
                            for meme in &memes {
                                self.spawn_thumb_fetch(meme);
                            }
                            self.recent = memes;
                        }
                        Err(e) => {
                            // The gallery is decorative; keep the editor usable.
                            crate::log_warn!("could not load recent memes: {e}");
                        }
                    }
                }
                OpOutcome::Thumb { id, image } => {
                    self.thumbs.insert(id, image);
                }

                // Session-scoped outcomes
                outcome => {
                    if message.token != self.session_token {
                        crate::log_info!(
                            "discarding stale response (token {} != {})",
                            message.token,
                            self.session_token
                        );
                        continue;
                    }
                    self.apply_session_outcome(outcome);
                }
            }
        }
    }

    fn apply_session_outcome(&mut self, outcome: OpOutcome) {
        match outcome {
            OpOutcome::ImageLoaded(result) => {
                self.pending = PendingOp::Idle;
                match result {
                    Ok(image) => match crate::io::flatten_jpeg(&image) {
                        Ok(jpeg) => {
                            self.background_jpeg = jpeg;
                            self.pending_background = Some(image);
                            self.session = None;
                            self.original_captions.clear();
                            self.display_captions.clear();
                            self.language_idx = 0;
                            self.creator_name.clear();
                            self.error = None;
                        }
                        Err(e) => self.error = Some(e),
                    },
                    Err(e) => self.error = Some(e),
                }
            }
            OpOutcome::Captions(result) => {
                self.pending = PendingOp::Idle;
                match result {
                    Ok(captions) => {
                        self.original_captions = captions.clone();
                        self.display_captions = captions;
                        self.language_idx = 0;
                    }
                    Err(e) => {
                        crate::log_err!("caption generation failed: {e}");
                        self.error = Some("Failed to generate captions. Please try again.".into());
                    }
                }
            }
            OpOutcome::Translation { result } => {
                self.pending = PendingOp::Idle;
                match result {
                    Ok(translated) => self.display_captions = translated,
                    Err(e) => {
                        crate::log_err!("translation failed: {e}");
                        self.error = Some("Failed to translate captions.".into());
                    }
                }
            }
            OpOutcome::Edited(result) => {
                self.pending = PendingOp::Idle;
                match *result {
                    Ok(image) => match crate::io::flatten_jpeg(&image) {
                        Ok(jpeg) => {
                            self.background_jpeg = jpeg;
                            if let Some(session) = &mut self.session {
                                session.replace_background(image);
                            }
                        }
                        Err(e) => self.error = Some(e),
                    },
                    Err(e) => {
                        crate::log_err!("image edit failed: {e}");
                        self.error = Some(match e {
                            EditError::NoImage => {
                                "Failed to edit image. The model may have content safety restrictions."
                                    .into()
                            }
                            other => other.to_string(),
                        });
                    }
                }
            }
            OpOutcome::UploadProgress { attempt } => {
                self.pending = PendingOp::Uploading { attempt, max: MAX_UPLOAD_RETRIES };
            }
            OpOutcome::Finalized(result) => {
                self.pending = PendingOp::Idle;
                match *result {
                    Ok(meme) => {
                        crate::log_info!("meme {} persisted at {}", meme.id, meme.image_url);
                        self.spawn_thumb_fetch(&meme);
                        self.recent.insert(0, meme);
                        self.recent.truncate(RECENT_LIMIT);
                        self.failed_upload = None;
                        self.reset_editor();
                    }
                    Err(FinalizeFailure::Wallet(e)) => {
                        self.error = Some(e.to_string());
                    }
                    Err(FinalizeFailure::Upload { meme, error }) => {
                        self.error = Some(error.to_string());
                        self.failed_upload = Some(meme);
                    }
                }
            }
            // Global outcomes never reach this function
            OpOutcome::WalletReady(_) | OpOutcome::GalleryLoaded(_) | OpOutcome::Thumb { .. } => {}
        }
    }

    fn spawn_thumb_fetch(&self, meme: &Meme) {
        // Data URLs decode locally; HTTP URLs are fetched.
        let sender = self.sender.clone();
        let id = meme.id.clone();
        let url = meme.image_url.clone();
        std::thread::spawn(move || {
            let bytes = if let Some(b64) = url.strip_prefix("data:image/jpeg;base64,") {
                use base64::Engine as _;
                base64::engine::general_purpose::STANDARD
                    .decode(b64)
                    .map_err(|e| e.to_string())
            } else {
                fetch_bytes(&url)
            };
            match bytes.and_then(|b| crate::io::decode_image(&b)) {
                Ok(image) => {
                    let _ = sender.send(OpMessage { token: 0, outcome: OpOutcome::Thumb { id, image } });
                }
                Err(e) => crate::log_warn!("thumbnail fetch failed for {id}: {e}"),
            }
        });
    }

    fn spawn_image_load(&mut self, source: ImageSource) {
        self.pending = PendingOp::LoadingImage;
        let sender = self.sender.clone();
        let token = self.session_token;
        std::thread::spawn(move || {
            let result = match source {
                ImageSource::File(path) => crate::io::load_image(&path),
                ImageSource::Url(url) => fetch_bytes(url).and_then(|b| crate::io::decode_image(&b)),
            };
            let _ = sender.send(OpMessage { token, outcome: OpOutcome::ImageLoaded(result) });
        });
    }

    fn spawn_generate(&mut self) {
        if self.background_jpeg.is_empty() {
            self.error = Some("Please select an image first.".into());
            return;
        }
        self.pending = PendingOp::Generating;
        let sender = self.sender.clone();
        let token = self.session_token;
        let api_key = self.settings.api_key.clone();
        let image = self.background_jpeg.clone();
        std::thread::spawn(move || {
            let result = CaptionClient::new(api_key).generate(&image);
            let _ = sender.send(OpMessage { token, outcome: OpOutcome::Captions(result) });
        });
    }

    fn spawn_translate(&mut self, language_idx: usize) {
        if self.original_captions.is_empty() {
            return;
        }
        let (code, name) = LANGUAGES[language_idx];
        if code == "en" {
            // English is the source language; restore without a network call.
            self.display_captions = self.original_captions.clone();
            return;
        }
        self.pending = PendingOp::Translating { language: name.to_string() };
        let sender = self.sender.clone();
        let token = self.session_token;
        let api_key = self.settings.api_key.clone();
        let captions = self.original_captions.clone();
        let name = name.to_string();
        std::thread::spawn(move || {
            let result = CaptionClient::new(api_key).translate(&captions, &name);
            let _ = sender.send(OpMessage { token, outcome: OpOutcome::Translation { result } });
        });
    }

    fn spawn_edit(&mut self, instruction: String) {
        if self.background_jpeg.is_empty() {
            self.error = Some("Please select an image to edit.".into());
            return;
        }
        if instruction.trim().is_empty() {
            self.error = Some("Please enter an edit instruction.".into());
            return;
        }
        self.pending = PendingOp::Editing;
        let sender = self.sender.clone();
        let token = self.session_token;
        let api_key = self.settings.api_key.clone();
        let image = self.background_jpeg.clone();
        std::thread::spawn(move || {
            let result = EditClient::new(api_key).edit(&image, &instruction);
            let _ = sender.send(OpMessage { token, outcome: OpOutcome::Edited(Box::new(result)) });
        });
    }

    /// Sign the fee transfer, then upload the flattened meme with bounded
    /// retry.  The finished artifact survives upload failure in
    /// `failed_upload` for a manual retry.
    fn spawn_finalize(&mut self) {
        let Some(session) = &self.session else { return };
        let Some(wallet) = self.wallet.clone() else {
            self.error = Some("Wallet not fully connected. Please connect your wallet.".into());
            return;
        };
        let Some(address) = wallet.address() else {
            self.error = Some("Wallet not fully connected. Please connect your wallet.".into());
            return;
        };
        if self.creator_name.trim().is_empty() {
            self.error = Some("Please enter your name to finalize your creation.".into());
            return;
        }
        let jpeg = match session.export_jpeg() {
            Ok(jpeg) => jpeg,
            Err(e) => {
                self.error = Some(e);
                return;
            }
        };

        self.pending = PendingOp::AwaitingSignature;
        let sender = self.sender.clone();
        let token = self.session_token;
        let backend = self.settings.backend_url.clone();
        let fee_receiver = self.settings.fee_receiver.clone();
        let fee_sol = self.settings.fee_sol;
        let creator_name = self.creator_name.trim().to_string();

        std::thread::spawn(move || {
            let signature = match wallet.transfer(sol_to_lamports(fee_sol), &fee_receiver) {
                Ok(sig) => sig,
                Err(e) => {
                    let _ = sender.send(OpMessage {
                        token,
                        outcome: OpOutcome::Finalized(Box::new(Err(FinalizeFailure::Wallet(e)))),
                    });
                    return;
                }
            };
            crate::log_info!("fee transfer signed: {signature}");

            let meme = Meme {
                id: uuid::Uuid::new_v4().to_string(),
                image_url: jpeg_data_url(&jpeg),
                wallet_address: address,
                tx_signature: signature,
                creator_name,
                created_at: now_secs(),
                fee_amount: fee_sol,
            };
            upload_and_report(&GalleryClient::new(backend), meme, &sender, token);
        });
    }

    fn spawn_retry_upload(&mut self) {
        let Some(meme) = self.failed_upload.take() else { return };
        self.pending = PendingOp::Uploading { attempt: 1, max: MAX_UPLOAD_RETRIES };
        let sender = self.sender.clone();
        let token = self.session_token;
        let backend = self.settings.backend_url.clone();
        std::thread::spawn(move || {
            upload_and_report(&GalleryClient::new(backend), meme, &sender, token);
        });
    }

    // ---- UI -----------------------------------------------------------------

    fn header(&mut self, ctx: &egui::Context) {
        egui::TopBottomPanel::top("header").show(ctx, |ui| {
            ui.horizontal(|ui| {
                ui.heading("MemeFE");
                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    match self.wallet_address() {
                        Some(address) => {
                            let short = if address.len() > 8 {
                                format!("{}…{}", &address[..4], &address[address.len() - 4..])
                            } else {
                                address
                            };
                            ui.label(RichText::new(short).monospace());
                            ui.label("Wallet:");
                        }
                        None => {
                            ui.label(RichText::new("wallet disconnected").weak());
                        }
                    }
                    if self.editing() && ui.button("⟲ Start Over").clicked() {
                        self.reset_editor();
                    }
                });
            });
        });
    }

    fn error_banner(&mut self, ctx: &egui::Context) {
        if self.error.is_none() {
            return;
        }
        egui::TopBottomPanel::top("error_banner").show(ctx, |ui| {
            ui.horizontal(|ui| {
                let message = self.error.clone().unwrap_or_default();
                ui.label(
                    RichText::new(format!("Error: {message}")).color(egui::Color32::LIGHT_RED),
                );
                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    if ui.button("✕").clicked() {
                        self.error = None;
                    }
                });
            });
        });
    }

    fn busy_overlay(&self, ctx: &egui::Context) {
        let Some(label) = self.pending.label() else { return };
        egui::Window::new("busy")
            .title_bar(false)
            .collapsible(false)
            .resizable(false)
            .anchor(egui::Align2::CENTER_CENTER, [0.0, 0.0])
            .show(ctx, |ui| {
                ui.horizontal(|ui| {
                    ui.spinner();
                    ui.label(label);
                });
            });
    }

    fn editor_screen(&mut self, ctx: &egui::Context) {
        let busy = self.pending.is_busy();
        let mut action = None;

        egui::SidePanel::right("editor_panel").default_width(320.0).show(ctx, |ui| {
            if let Some(session) = &mut self.session {
                let wallet_address = self.wallet.as_ref().and_then(|w| w.address());
                action = self.side_panel.show(
                    ui,
                    session,
                    &self.display_captions,
                    &mut self.language_idx,
                    &mut self.creator_name,
                    wallet_address.as_deref(),
                    busy,
                    self.failed_upload.is_some(),
                );
            } else {
                ui.spinner();
            }
        });

        egui::CentralPanel::default().show(ctx, |ui| {
            match &self.font {
                Some(font) => {
                    if self.session.is_none()
                        && let Some(background) = self.pending_background.take()
                    {
                        self.session =
                            Some(EditorSession::new(background, ui.available_size()));
                    }
                    if let Some(session) = &mut self.session {
                        session.show(ui, font);
                    }
                }
                None => {
                    ui.centered_and_justified(|ui| {
                        ui.label("No usable caption font was found on this system.");
                    });
                }
            }
        });

        match action {
            Some(PanelAction::GenerateCaptions) => self.spawn_generate(),
            Some(PanelAction::Translate(idx)) => self.spawn_translate(idx),
            Some(PanelAction::AddCaption(text)) => {
                if let Some(session) = &mut self.session {
                    // Blank text is rejected by the store (no layer, no id).
                    let canvas = session.canvas_size();
                    session.store.add_layer(&text, canvas);
                }
            }
            Some(PanelAction::ApplyEdit(instruction)) => self.spawn_edit(instruction),
            Some(PanelAction::Finalize) => self.spawn_finalize(),
            Some(PanelAction::RetryUpload) => self.spawn_retry_upload(),
            None => {}
        }
    }

    fn selector_screen(&mut self, ctx: &egui::Context) {
        let busy = self.pending.is_busy();
        egui::CentralPanel::default().show(ctx, |ui| {
            let action = selector::show(ui, busy);
            match action {
                Some(selector::SelectorAction::PickFile) => {
                    if let Some(path) = crate::io::pick_image_file() {
                        self.spawn_image_load(ImageSource::File(path));
                    }
                }
                Some(selector::SelectorAction::Template(url)) => {
                    self.spawn_image_load(ImageSource::Url(url));
                }
                None => {}
            }

            if let Some(clicked) = self.gallery_strip.show(ui, &self.recent, &self.thumbs) {
                self.viewing = Some(clicked);
            }
        });
    }
}

enum ImageSource {
    File(std::path::PathBuf),
    Url(&'static str),
}

impl eframe::App for MemeFEApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.drain_channel();
        if self.pending.is_busy() {
            // Keep polling the channel while workers run.
            ctx.request_repaint_after(Duration::from_millis(100));
        }

        self.header(ctx);
        self.error_banner(ctx);

        if self.editing() {
            self.editor_screen(ctx);
        } else {
            self.selector_screen(ctx);
        }

        if let Some(index) = self.viewing {
            match self.recent.get(index) {
                Some(meme) => {
                    let meme = meme.clone();
                    if !self.gallery_strip.show_viewer(ctx, &meme, &self.thumbs) {
                        self.viewing = None;
                    }
                }
                None => self.viewing = None,
            }
        }

        if self.show_welcome && welcome::show(ctx) {
            self.show_welcome = false;
            self.settings.has_seen_welcome = true;
            self.settings.save();
        }

        self.busy_overlay(ctx);
    }
}

/// Upload with retry, streaming per-attempt progress back to the UI, then
/// report the final outcome.  On failure the meme travels back with the error
/// so it can be kept for a manual retry.
fn upload_and_report(
    client: &GalleryClient,
    mut meme: Meme,
    sender: &mpsc::Sender<OpMessage>,
    token: u64,
) {
    let progress_sender = sender.clone();
    let mut progress = |attempt: u32| {
        let _ = progress_sender.send(OpMessage {
            token,
            outcome: OpOutcome::UploadProgress { attempt },
        });
    };
    let outcome = match client.upload_with_retry(&meme, &mut progress) {
        Ok(url) => {
            meme.image_url = url;
            OpOutcome::Finalized(Box::new(Ok(meme)))
        }
        Err(error) => OpOutcome::Finalized(Box::new(Err(FinalizeFailure::Upload { meme, error }))),
    };
    let _ = sender.send(OpMessage { token, outcome });
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
