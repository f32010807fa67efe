use crate::camera::{CameraSettings, FrameSource};
use opencv::{core::Mat, highgui};

pub const PREVIEW_WINDOW: &str = "Webcam - Press ESC to Exit";
pub const PREVIEW_KEY_WAIT_MS: i32 = 30;
const KEY_ESC: i32 = 27;

/// The previewer always checks the first device with the default backend.
pub fn preview_camera_settings() -> CameraSettings {
    CameraSettings::default_device()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreviewOutcome {
    Cancelled,
    ReadFailed,
}

pub trait PreviewDisplay {
    fn show(&mut self, frame: &Mat) -> Result<(), opencv::Error>;

    /// Waits up to `delay_ms` for a key press, `-1` when none arrived.
    fn wait_key(&mut self, delay_ms: i32) -> Result<i32, opencv::Error>;

    fn close(&mut self);
}

pub struct HighGuiDisplay {
    window: String,
}

impl HighGuiDisplay {
    pub fn new(window: &str) -> Self {
        Self {
            window: window.to_string(),
        }
    }
}

impl PreviewDisplay for HighGuiDisplay {
    fn show(&mut self, frame: &Mat) -> Result<(), opencv::Error> {
        highgui::imshow(&self.window, frame)
    }

    fn wait_key(&mut self, delay_ms: i32) -> Result<i32, opencv::Error> {
        highgui::wait_key(delay_ms)
    }

    fn close(&mut self) {
        if let Err(e) = highgui::destroy_all_windows() {
            tracing::warn!("Failed to destroy preview windows: {}", e);
        }
    }
}

/// Shows frames until ESC is pressed or a read fails.
///
/// The source is released and the display closed on every exit path.
pub fn run_preview<S, D>(source: &mut S, display: &mut D) -> Result<PreviewOutcome, opencv::Error>
where
    S: FrameSource,
    D: PreviewDisplay,
{
    let outcome = preview_loop(source, display);
    source.release();
    display.close();
    outcome
}

fn preview_loop<S, D>(source: &mut S, display: &mut D) -> Result<PreviewOutcome, opencv::Error>
where
    S: FrameSource,
    D: PreviewDisplay,
{
    loop {
        let frame = match source.read_frame() {
            Ok(frame) => frame,
            Err(e) => {
                tracing::error!("Cannot read frame from camera: {}", e);
                return Ok(PreviewOutcome::ReadFailed);
            }
        };
        display.show(&frame)?;
        if display.wait_key(PREVIEW_KEY_WAIT_MS)? & 0xff == KEY_ESC {
            tracing::info!("Preview cancelled");
            return Ok(PreviewOutcome::Cancelled);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::testing::{MockFrameSource, SourceProbe};
    use std::collections::VecDeque;

    #[derive(Default)]
    struct MockPreviewDisplay {
        keys: VecDeque<i32>,
        shown: usize,
        waits: Vec<i32>,
        closed: bool,
    }

    impl MockPreviewDisplay {
        fn with_keys(keys: &[i32]) -> Self {
            Self {
                keys: keys.iter().copied().collect(),
                ..Default::default()
            }
        }
    }

    impl PreviewDisplay for MockPreviewDisplay {
        fn show(&mut self, _frame: &Mat) -> Result<(), opencv::Error> {
            self.shown += 1;
            Ok(())
        }

        fn wait_key(&mut self, delay_ms: i32) -> Result<i32, opencv::Error> {
            self.waits.push(delay_ms);
            Ok(self.keys.pop_front().unwrap_or(-1))
        }

        fn close(&mut self) {
            self.closed = true;
        }
    }

    #[test]
    fn test_preview_opens_first_device_without_hints() {
        let settings = preview_camera_settings();
        assert_eq!(settings.device_index, 0);
        assert!(settings.resolution.is_none());
    }

    #[test]
    fn test_escape_ends_preview_and_cleans_up() {
        let probe = SourceProbe::default();
        let mut source = MockFrameSource::new(probe.clone());
        let mut display = MockPreviewDisplay::with_keys(&[-1, 'a' as i32, KEY_ESC]);

        let outcome = run_preview(&mut source, &mut display).unwrap();

        assert_eq!(outcome, PreviewOutcome::Cancelled);
        assert_eq!(display.shown, 3);
        assert_eq!(display.waits, vec![PREVIEW_KEY_WAIT_MS; 3]);
        assert!(display.closed);
        assert!(probe.released());
    }

    #[test]
    fn test_read_failure_ends_preview_without_retry() {
        let probe = SourceProbe::default();
        let mut source = MockFrameSource::new(probe.clone()).failing_on([3]);
        let mut display = MockPreviewDisplay::default();

        let outcome = run_preview(&mut source, &mut display).unwrap();

        assert_eq!(outcome, PreviewOutcome::ReadFailed);
        assert_eq!(probe.reads(), 3);
        assert_eq!(display.shown, 2);
        assert!(display.closed);
        assert!(probe.released());
    }
}
