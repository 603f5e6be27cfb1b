mod bars;
mod capture;
mod config;
mod metadata;
mod overlay;
mod render;
mod settings;
mod state;

use log::{debug, info};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;

use crate::config::VizConfig;
use crate::metadata::NowPlaying;
use crate::state::{RedrawSignal, SharedViz, VizState};

fn main() -> Result<(), eframe::Error> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    info!("Starting up...");

    let settings_path = PathBuf::from(config::SETTINGS_FILE);
    let loaded = VizConfig::load(&settings_path);
    info!(
        "Configuration loaded: {} bars, sensitivity {}",
        loaded.bar_count, loaded.sensitivity
    );

    // === Shared State ===
    let shared: SharedViz = Arc::new(Mutex::new(VizState::new(loaded.clone())));
    let now_playing = Arc::new(Mutex::new(NowPlaying::default()));
    let redraw = Arc::new(RedrawSignal::new());
    let shutdown = Arc::new(AtomicBool::new(false));

    // === Capture Thread ===
    debug!("Spawning capture thread...");
    let capture_thread = {
        let shared = shared.clone();
        let redraw = redraw.clone();
        let shutdown = shutdown.clone();
        thread::spawn(move || capture::run(shared, redraw, shutdown))
    };

    // === Metadata Thread ===
    debug!("Spawning metadata thread...");
    let metadata_thread = {
        let now_playing = now_playing.clone();
        let redraw = redraw.clone();
        let shutdown = shutdown.clone();
        thread::spawn(move || metadata::run(now_playing, redraw, shutdown))
    };

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_title("loopbars")
            .with_decorations(false)
            .with_position([loaded.window_pos_x as f32, loaded.window_pos_y as f32])
            .with_inner_size([loaded.window_width as f32, loaded.window_height as f32])
            .with_window_level(overlay::window_level(&loaded)),
        ..Default::default()
    };

    debug!("Launching overlay...");
    let result = eframe::run_native(
        "loopbars",
        options,
        Box::new(move |cc| {
            Ok(Box::new(overlay::OverlayApp::new(
                cc,
                shared,
                now_playing,
                redraw,
                settings_path,
            )))
        }),
    );

    debug!("Signaling threads to shut down...");
    shutdown.store(true, Ordering::Relaxed);

    debug!("Waiting for capture thread to finish...");
    capture_thread
        .join()
        .expect("Failed to join capture thread");
    debug!("Capture thread joined");

    debug!("Waiting for metadata thread to finish...");
    metadata_thread
        .join()
        .expect("Failed to join metadata thread");
    debug!("Metadata thread joined");

    info!("Clean shutdown complete");

    result
}
