// GUI-subsystem binary: no console window is allocated on Windows.
#![windows_subsystem = "windows"]

use memefe::app::MemeFEApp;
use memefe::logger;

fn main() -> Result<(), eframe::Error> {
    // Initialize session log (overwrites previous session log)
    logger::init();

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1280.0, 800.0])
            .with_title("MemeFE"),
        ..Default::default()
    };

    eframe::run_native(
        "MemeFE",
        options,
        Box::new(|cc| Box::new(MemeFEApp::new(cc))),
    )
}
