mod audio;
mod config;
mod ops;
mod renderer;
mod types;
mod ui;

use clap::Parser;
use eframe::egui;
use gstreamer as gst;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::ui::app::OrbviewApp;

fn main() -> anyhow::Result<()> {
    let config = Config::parse();

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    gst::init()?;
    info!(?config, "starting orbview");

    let native_options = eframe::NativeOptions {
        renderer: eframe::Renderer::Wgpu,
        viewport: egui::ViewportBuilder::default()
            .with_title("orbview")
            .with_inner_size([1280.0, 800.0])
            .with_drag_and_drop(true),
        ..Default::default()
    };
    eframe::run_native(
        "orbview",
        native_options,
        Box::new(move |cc| Ok(Box::new(OrbviewApp::new(cc, &config)?))),
    )
    .map_err(|e| anyhow::anyhow!("{e}"))?;
    Ok(())
}
