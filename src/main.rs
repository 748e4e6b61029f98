use crate::app_context::AppContext;
use crate::settings::Settings;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod app_context;
mod engine;
mod kick_detector;
mod lowpass;
mod osc_source;
mod sensor_gate;
mod session;
mod settings;
mod sound_trigger;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let settings = Settings::load_or_default()?;
    // Write the effective settings back so every tunable is visible in the file.
    if let Err(error) = settings.save() {
        warn!(%error, "could not write settings file");
    }
    info!(
        threshold = settings.threshold,
        damping = settings.damping,
        osc_port = settings.osc_port,
        sound_target = %settings.sound_target,
        "settings loaded"
    );

    let window_size = [320.0, 300.0];
    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size(window_size)
            .with_min_inner_size(window_size),
        ..Default::default()
    };

    let context = AppContext::new(settings);

    eframe::run_native(
        "KickBox",
        options,
        Box::new(|_ctx| {
            Ok(Box::new(context))
        })
    ).map_err(|e| anyhow::anyhow!("{:?}", e))?;

    Ok(())
}
