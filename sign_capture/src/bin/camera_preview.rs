use anyhow::Context;
use sign_capture::{
    camera::Camera,
    config,
    preview::{
        preview_camera_settings, run_preview, HighGuiDisplay, PreviewOutcome, PREVIEW_WINDOW,
    },
    telemetry,
};

fn main() -> anyhow::Result<()> {
    let config = config::get_configuration().context("failed to load configuration")?;
    telemetry::init_tracing(&config.log_level);

    let settings = preview_camera_settings();

    let mut camera = match Camera::open(&settings) {
        Ok(camera) => camera,
        Err(e) => {
            tracing::error!("Error: Camera not detected! {}", e);
            return Err(e).context("camera not detected");
        }
    };

    let mut display = HighGuiDisplay::new(PREVIEW_WINDOW);
    match run_preview(&mut camera, &mut display)? {
        PreviewOutcome::Cancelled => tracing::info!("Preview closed"),
        PreviewOutcome::ReadFailed => tracing::warn!("Preview stopped after a failed read"),
    }

    Ok(())
}
