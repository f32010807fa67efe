use crate::camera::{Camera, CameraSettings};
use crate::config::UiConfig;
use crate::cv_utils::{rect_contains, CvUtilsError, ImageConverter};
use crate::prediction::PredictionService;
use crate::session::{Session, SessionChannels, SessionError};
use crate::state::{FrameSlot, SharedPrediction};
use crate::throttle::Throttle;
use opencv::{core::Mat, highgui, prelude::*};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;

const KEY_ESC: i32 = 27;
const KEY_ENTER: i32 = 13;
const KEY_SPACE: i32 = 32;

const START_LABEL: &str = "Start Recognition";
const STOP_LABEL: &str = "Stop Recognition";
const CAMERA_ERROR_TEXT: &str = "Error: Camera not detected!";

#[derive(Error, Debug)]
pub enum UiError {
    #[error("Window error: {0}")]
    Window(#[from] opencv::Error),
    #[error("Drawing error: {0}")]
    Drawing(#[from] CvUtilsError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UiEvent {
    Toggle,
    Close,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlFlow {
    Continue,
    Exit,
}

/// Starts the sessions the toggle control asks for.
pub trait SessionLauncher {
    fn launch(&self) -> Result<Session, SessionError>;
}

/// Opens the configured camera and talks to the configured prediction server.
pub struct CameraSessionLauncher {
    pub camera: CameraSettings,
    pub service: PredictionService,
    pub channels: SessionChannels,
    pub request_interval: Duration,
}

impl SessionLauncher for CameraSessionLauncher {
    fn launch(&self) -> Result<Session, SessionError> {
        let settings = self.camera.clone();
        Session::start(
            move || Camera::open(&settings),
            self.service.clone(),
            self.channels.clone(),
            self.request_interval,
        )
    }
}

/// Toggle control state, kept apart from the window so it can be driven
/// without a display.
pub struct RecognitionControl<L: SessionLauncher> {
    launcher: L,
    session: Option<Session>,
    error: Option<String>,
}

impl<L: SessionLauncher> RecognitionControl<L> {
    pub fn new(launcher: L) -> Self {
        Self {
            launcher,
            session: None,
            error: None,
        }
    }

    pub fn is_capturing(&self) -> bool {
        self.session.is_some()
    }

    pub fn button_label(&self) -> &'static str {
        if self.is_capturing() {
            STOP_LABEL
        } else {
            START_LABEL
        }
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn handle(&mut self, event: UiEvent) -> ControlFlow {
        match event {
            UiEvent::Toggle if self.session.is_none() => {
                match self.launcher.launch() {
                    Ok(session) => {
                        self.error = None;
                        self.session = Some(session);
                    }
                    Err(e) => {
                        tracing::error!("Failed to start recognition: {}", e);
                        self.error = Some(match e {
                            SessionError::Camera(_) => CAMERA_ERROR_TEXT.to_string(),
                            other => format!("Error: {}", other),
                        });
                    }
                }
                ControlFlow::Continue
            }
            UiEvent::Toggle | UiEvent::Close => {
                self.shutdown();
                ControlFlow::Exit
            }
        }
    }

    /// Stops any running session, blocking until its worker is gone.
    pub fn shutdown(&mut self) {
        if let Some(mut session) = self.session.take() {
            session.stop();
        }
    }
}

impl<L: SessionLauncher> Drop for RecognitionControl<L> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

pub fn event_for_key(key: i32) -> Option<UiEvent> {
    match key & 0xff {
        KEY_ESC => Some(UiEvent::Close),
        KEY_SPACE | KEY_ENTER => Some(UiEvent::Toggle),
        _ => None,
    }
}

/// The sign client window: camera region, prediction banner, toggle button.
pub struct SignClientUi<L: SessionLauncher> {
    config: UiConfig,
    frame_size: (i32, i32),
    control: RecognitionControl<L>,
    prediction: SharedPrediction,
    frames: FrameSlot,
}

impl<L: SessionLauncher> SignClientUi<L> {
    pub fn new(
        config: UiConfig,
        frame_size: (i32, i32),
        launcher: L,
        channels: SessionChannels,
    ) -> Self {
        Self {
            config,
            frame_size,
            control: RecognitionControl::new(launcher),
            prediction: channels.prediction,
            frames: channels.frames,
        }
    }

    pub fn run(mut self) -> Result<(), UiError> {
        let window = self.config.window_title.clone();
        highgui::named_window(&window, highgui::WINDOW_AUTOSIZE)?;

        let clicks: Arc<Mutex<Option<(i32, i32)>>> = Arc::new(Mutex::new(None));
        let click_sink = clicks.clone();
        highgui::set_mouse_callback(
            &window,
            Some(Box::new(move |event: i32, x: i32, y: i32, _flags: i32| {
                if event == highgui::EVENT_LBUTTONDOWN {
                    *click_sink.lock() = Some((x, y));
                }
            })),
        )?;

        let result = self.event_loop(&window, &clicks);

        // The worker must be gone before the window and the refresh timer are.
        self.control.shutdown();
        if let Err(e) = highgui::destroy_all_windows() {
            tracing::warn!("Failed to destroy windows: {}", e);
        }
        result
    }

    fn event_loop(
        &mut self,
        window: &str,
        clicks: &Arc<Mutex<Option<(i32, i32)>>>,
    ) -> Result<(), UiError> {
        let mut canvas = ImageConverter::blank_canvas(self.frame_size.0, self.frame_size.1)?;
        let mut banner = "Prediction: --".to_string();
        let mut refresh = Throttle::new(self.config.get_refresh_interval());
        // The first tick happens one period after the window opens.
        refresh.ready(Instant::now());

        loop {
            if let Some(frame) = self.frames.take() {
                canvas = frame;
            }
            if refresh.ready(Instant::now()) {
                banner = format!("Prediction: {}", self.prediction.get());
            }

            let button = ImageConverter::button_rect(canvas.cols(), canvas.rows());
            let view = self.render(&canvas, &banner, button)?;
            highgui::imshow(window, &view)?;

            let key = highgui::wait_key(self.config.key_wait_ms.max(1))?;
            let mut event = event_for_key(key);
            if let Some((x, y)) = clicks.lock().take() {
                if rect_contains(&button, x, y) {
                    event = Some(UiEvent::Toggle);
                }
            }
            if event.is_none() && !window_visible(window) {
                event = Some(UiEvent::Close);
            }

            if let Some(event) = event {
                if self.control.handle(event) == ControlFlow::Exit {
                    return Ok(());
                }
            }
        }
    }

    fn render(&self, canvas: &Mat, banner: &str, button: opencv::core::Rect) -> Result<Mat, UiError> {
        let mut view = canvas.try_clone()?;
        match self.control.error() {
            Some(error) => ImageConverter::draw_error(&mut view, error)?,
            None => ImageConverter::draw_prediction(&mut view, banner)?,
        }
        ImageConverter::draw_button(&mut view, button, self.control.button_label())?;
        Ok(view)
    }
}

fn window_visible(window: &str) -> bool {
    highgui::get_window_property(window, highgui::WND_PROP_VISIBLE)
        .map(|visible| visible >= 1.0)
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::testing::{MockFrameSource, SourceProbe};
    use crate::camera::CameraError;
    use crate::worker::testing::MockPredictor;
    use std::cell::Cell;

    struct MockLauncher {
        probe: SourceProbe,
        camera_available: bool,
        launches: Cell<usize>,
        channels: SessionChannels,
    }

    impl MockLauncher {
        fn new(camera_available: bool) -> Self {
            Self {
                probe: SourceProbe::default(),
                camera_available,
                launches: Cell::new(0),
                channels: SessionChannels {
                    prediction: SharedPrediction::new(),
                    frames: FrameSlot::new(),
                },
            }
        }
    }

    impl SessionLauncher for &MockLauncher {
        fn launch(&self) -> Result<Session, SessionError> {
            self.launches.set(self.launches.get() + 1);
            let probe = self.probe.clone();
            let available = self.camera_available;
            Session::start(
                move || {
                    if available {
                        Ok(MockFrameSource::new(probe)
                            .with_read_delay(Duration::from_millis(2)))
                    } else {
                        Err(CameraError::NotOpened(0))
                    }
                },
                MockPredictor::new(&["OPEN"]),
                self.channels.clone(),
                Duration::from_millis(200),
            )
        }
    }

    #[test]
    fn test_toggle_starts_then_stops_and_exits() {
        let launcher = MockLauncher::new(true);
        let mut control = RecognitionControl::new(&launcher);
        assert_eq!(control.button_label(), START_LABEL);

        assert_eq!(control.handle(UiEvent::Toggle), ControlFlow::Continue);
        assert!(control.is_capturing());
        assert_eq!(control.button_label(), STOP_LABEL);

        assert_eq!(control.handle(UiEvent::Toggle), ControlFlow::Exit);
        assert!(!control.is_capturing());
        assert!(launcher.probe.released());
        assert_eq!(launcher.launches.get(), 1);
    }

    #[test]
    fn test_close_stops_running_session_first() {
        let launcher = MockLauncher::new(true);
        let mut control = RecognitionControl::new(&launcher);
        control.handle(UiEvent::Toggle);

        assert_eq!(control.handle(UiEvent::Close), ControlFlow::Exit);
        assert!(launcher.probe.released());
    }

    #[test]
    fn test_missing_camera_reports_and_stays_idle() {
        let launcher = MockLauncher::new(false);
        let mut control = RecognitionControl::new(&launcher);

        assert_eq!(control.handle(UiEvent::Toggle), ControlFlow::Continue);
        assert!(!control.is_capturing());
        assert_eq!(control.error(), Some(CAMERA_ERROR_TEXT));
        assert_eq!(control.button_label(), START_LABEL);
    }

    #[test]
    fn test_dropping_control_stops_session() {
        let launcher = MockLauncher::new(true);
        {
            let mut control = RecognitionControl::new(&launcher);
            control.handle(UiEvent::Toggle);
        }
        assert!(launcher.probe.released());
    }

    #[test]
    fn test_key_mapping() {
        assert_eq!(event_for_key(KEY_ESC), Some(UiEvent::Close));
        assert_eq!(event_for_key(KEY_SPACE), Some(UiEvent::Toggle));
        assert_eq!(event_for_key(KEY_ENTER), Some(UiEvent::Toggle));
        assert_eq!(event_for_key(-1), None);
        assert_eq!(event_for_key('q' as i32), None);
    }
}
