use crate::camera::CameraSettings;
use crate::config::Config;
use crate::prediction::PredictionService;
use crate::session::SessionChannels;
use crate::state::{FrameSlot, SharedPrediction};
use crate::ui::{CameraSessionLauncher, SignClientUi};

use std::error::Error;

pub fn start_app(config: Config) -> Result<(), Box<dyn Error>> {
    let camera = match CameraSettings::from_config(&config.camera) {
        Ok(settings) => settings,
        Err(e) => {
            tracing::error!("Invalid camera configuration: {:?}", e);
            return Err(Box::new(e));
        }
    };

    let service = PredictionService::new(&config.prediction_service);
    tracing::info!("Using prediction server at {}", service.address());

    let channels = SessionChannels {
        prediction: SharedPrediction::new(),
        frames: FrameSlot::new(),
    };

    let launcher = CameraSessionLauncher {
        camera,
        service,
        channels: channels.clone(),
        request_interval: config.prediction.get_interval(),
    };

    let frame_size = config.camera.canvas_size().map_err(|e| {
        tracing::error!("Invalid camera frame size: {}", e);
        e
    })?;

    let ui = SignClientUi::new(
        config.ui.clone(),
        frame_size,
        launcher,
        channels.clone(),
    );
    ui.run()?;

    tracing::info!(
        frames_posted = channels.frames.posted(),
        frames_dropped = channels.frames.dropped(),
        "Sign client closed"
    );

    Ok(())
}
