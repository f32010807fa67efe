use crate::camera::{CameraError, FrameSource};
use crate::prediction::LabelPredictor;
use crate::state::{CancellationToken, FrameSlot, SharedPrediction};
use crate::worker::{CaptureWorker, WorkerReport};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use thiserror::Error;

const WORKER_THREAD_NAME: &str = "capture-worker";

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Camera error: {0}")]
    Camera(#[from] CameraError),
    #[error("Failed to spawn capture worker: {0}")]
    SpawnFailed(#[source] std::io::Error),
}

/// Shared values handed to every session.
#[derive(Clone)]
pub struct SessionChannels {
    pub prediction: SharedPrediction,
    pub frames: FrameSlot,
}

/// One capture-and-predict run.
///
/// The camera is opened on the calling thread, so an unavailable device is
/// reported before any worker exists. `stop` blocks until the worker thread
/// has released the camera and exited.
pub struct Session {
    token: CancellationToken,
    handle: Option<JoinHandle<WorkerReport>>,
}

impl Session {
    pub fn start<S, P, F>(
        open: F,
        predictor: P,
        channels: SessionChannels,
        request_interval: Duration,
    ) -> Result<Self, SessionError>
    where
        S: FrameSource + 'static,
        P: LabelPredictor,
        F: FnOnce() -> Result<S, CameraError>,
    {
        let source = open()?;
        let token = CancellationToken::new();
        let worker = CaptureWorker::new(
            source,
            predictor,
            channels.prediction,
            channels.frames,
            token.clone(),
            request_interval,
        );

        let handle = thread::Builder::new()
            .name(WORKER_THREAD_NAME.to_string())
            .spawn(move || worker.run())
            .map_err(SessionError::SpawnFailed)?;

        tracing::info!("Recognition session started");

        Ok(Self {
            token,
            handle: Some(handle),
        })
    }

    pub fn is_running(&self) -> bool {
        self.handle
            .as_ref()
            .map(|handle| !handle.is_finished())
            .unwrap_or(false)
    }

    /// Signals the worker and waits for it. Returns `None` when the session
    /// was already stopped or the worker panicked.
    pub fn stop(&mut self) -> Option<WorkerReport> {
        let handle = self.handle.take()?;
        self.token.cancel();
        match handle.join() {
            Ok(report) => {
                tracing::info!("Recognition session stopped");
                Some(report)
            }
            Err(_) => {
                tracing::error!("Capture worker panicked");
                None
            }
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.stop();
    }
}
