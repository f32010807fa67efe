use crate::camera::FrameSource;
use crate::cv_utils::ImageConverter;
use crate::prediction::LabelPredictor;
use crate::state::{CancellationToken, FrameSlot, SharedPrediction};
use crate::throttle::Throttle;
use std::time::{Duration, Instant};

/// Counters for one capture session, returned when the worker exits.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkerReport {
    pub frames_read: u64,
    pub read_failures: u64,
    pub requests: u64,
}

/// Capture loop of a session. Owns the frame source until it returns.
pub struct CaptureWorker<S: FrameSource, P: LabelPredictor> {
    source: S,
    predictor: P,
    prediction: SharedPrediction,
    frames: FrameSlot,
    token: CancellationToken,
    request_interval: Duration,
}

impl<S: FrameSource, P: LabelPredictor> CaptureWorker<S, P> {
    pub fn new(
        source: S,
        predictor: P,
        prediction: SharedPrediction,
        frames: FrameSlot,
        token: CancellationToken,
        request_interval: Duration,
    ) -> Self {
        Self {
            source,
            predictor,
            prediction,
            frames,
            token,
            request_interval,
        }
    }

    pub fn run(mut self) -> WorkerReport {
        let mut report = WorkerReport::default();

        let runtime = match tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
        {
            Ok(runtime) => runtime,
            Err(e) => {
                tracing::error!("Failed to build worker runtime: {}", e);
                self.source.release();
                return report;
            }
        };

        let mut throttle = Throttle::new(self.request_interval);
        let mut consecutive_failures: u64 = 0;

        tracing::info!("Capture worker started");

        while !self.token.is_cancelled() {
            let frame = match self.source.read_frame() {
                Ok(frame) => frame,
                Err(e) => {
                    consecutive_failures += 1;
                    report.read_failures += 1;
                    tracing::warn!(
                        consecutive_failures,
                        "Failed to grab frame or frame is empty: {}",
                        e
                    );
                    continue;
                }
            };
            report.frames_read += 1;
            if consecutive_failures > 0 {
                tracing::info!("Frame capture recovered after {} failures", consecutive_failures);
                consecutive_failures = 0;
            }

            let encoded = if throttle.ready(Instant::now()) {
                match ImageConverter::encode_mat_to_jpg(&frame) {
                    Ok(jpg) => Some(jpg),
                    Err(e) => {
                        tracing::warn!("Skipping prediction, frame encoding failed: {}", e);
                        None
                    }
                }
            } else {
                None
            };

            self.frames.post(frame);

            if let Some(jpg) = encoded {
                report.requests += 1;
                let label = runtime.block_on(self.predictor.predict(jpg));
                tracing::debug!(label = %label, "Prediction updated");
                self.prediction.set(label);
            }
        }

        self.source.release();
        tracing::info!(
            frames_read = report.frames_read,
            read_failures = report.read_failures,
            requests = report.requests,
            "Capture worker stopped"
        );
        report
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use crate::prediction::LabelPredictor;
    use bytes::Bytes;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Answers from a fixed script, repeating the last entry.
    #[derive(Clone)]
    pub struct MockPredictor {
        answers: Arc<Vec<String>>,
        pub calls: Arc<AtomicUsize>,
        pub payload_sizes: Arc<Mutex<Vec<usize>>>,
    }

    impl MockPredictor {
        pub fn new(answers: &[&str]) -> Self {
            Self {
                answers: Arc::new(answers.iter().map(|a| a.to_string()).collect()),
                calls: Arc::new(AtomicUsize::new(0)),
                payload_sizes: Arc::new(Mutex::new(Vec::new())),
            }
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl LabelPredictor for MockPredictor {
        async fn predict(&self, image_data: Bytes) -> String {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            self.payload_sizes.lock().push(image_data.len());
            let idx = n.min(self.answers.len().saturating_sub(1));
            self.answers.get(idx).cloned().unwrap_or_default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::MockPredictor;
    use super::*;
    use crate::camera::testing::{MockFrameSource, SourceProbe};
    use crate::state::PLACEHOLDER;

    fn worker_for(
        source: MockFrameSource,
        predictor: MockPredictor,
        token: CancellationToken,
        interval: Duration,
    ) -> (CaptureWorker<MockFrameSource, MockPredictor>, SharedPrediction, FrameSlot) {
        let prediction = SharedPrediction::new();
        let frames = FrameSlot::new();
        let worker = CaptureWorker::new(
            source,
            predictor,
            prediction.clone(),
            frames.clone(),
            token,
            interval,
        );
        (worker, prediction, frames)
    }

    #[test]
    fn test_frames_closer_than_interval_share_one_request() {
        let token = CancellationToken::new();
        let probe = SourceProbe::default();
        let source = MockFrameSource::new(probe.clone()).cancel_after(2, token.clone());
        let predictor = MockPredictor::new(&["OPEN", "FIST"]);

        let (worker, prediction, frames) =
            worker_for(source, predictor.clone(), token, Duration::from_millis(200));
        let report = worker.run();

        assert_eq!(report.frames_read, 2);
        assert_eq!(report.requests, 1);
        assert_eq!(predictor.calls(), 1);
        assert_eq!(&*prediction.get(), "OPEN");
        assert_eq!(frames.posted(), 2);
        assert!(probe.released());
    }

    #[test]
    fn test_requests_resume_once_interval_elapsed() {
        let token = CancellationToken::new();
        let probe = SourceProbe::default();
        let source = MockFrameSource::new(probe.clone())
            .with_read_delay(Duration::from_millis(30))
            .cancel_after(3, token.clone());
        let predictor = MockPredictor::new(&["OPEN", "FIST"]);

        let (worker, prediction, _frames) =
            worker_for(source, predictor.clone(), token, Duration::from_millis(10));
        let report = worker.run();

        assert_eq!(report.requests, 3);
        assert_eq!(&*prediction.get(), "FIST");
        let sizes = predictor.payload_sizes.lock().clone();
        assert!(sizes.iter().all(|&size| size > 0));
    }

    #[test]
    fn test_read_failures_are_skipped_without_restart() {
        let token = CancellationToken::new();
        let probe = SourceProbe::default();
        let source = MockFrameSource::new(probe.clone())
            .failing_on(3..=5)
            .cancel_after(7, token.clone());
        let predictor = MockPredictor::new(&["PEACE"]);

        let (worker, _prediction, frames) =
            worker_for(source, predictor, token, Duration::from_millis(200));
        let report = worker.run();

        assert_eq!(probe.reads(), 7);
        assert_eq!(
            probe.outcomes(),
            vec![true, true, false, false, false, true, true]
        );
        assert_eq!(report.read_failures, 3);
        assert_eq!(report.frames_read, 4);
        assert_eq!(frames.posted(), 4);
        assert!(probe.released());
    }

    #[test]
    fn test_cancelled_before_start_reads_nothing() {
        let token = CancellationToken::new();
        token.cancel();
        let probe = SourceProbe::default();
        let predictor = MockPredictor::new(&["OPEN"]);

        let (worker, prediction, _frames) = worker_for(
            MockFrameSource::new(probe.clone()),
            predictor.clone(),
            token,
            Duration::from_millis(200),
        );
        let report = worker.run();

        assert_eq!(report, WorkerReport::default());
        assert_eq!(probe.reads(), 0);
        assert_eq!(predictor.calls(), 0);
        assert_eq!(&*prediction.get(), PLACEHOLDER);
        assert!(probe.released());
    }
}
