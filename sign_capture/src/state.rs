use opencv::core::Mat;
use parking_lot::{Mutex, RwLock};
use std::sync::{
    atomic::{AtomicBool, AtomicU64, Ordering},
    Arc,
};

/// Shown before the first answer and whenever the server answers with nothing.
pub const PLACEHOLDER: &str = "...";
/// Shown while the prediction server cannot be reached.
pub const SERVER_DOWN: &str = "SERVER DOWN";

/// Latest prediction label, written by the capture worker and read by the UI.
///
/// Each `set` swaps the whole `Arc<str>`, so a reader only ever sees a
/// complete previous or complete new label.
#[derive(Debug, Clone)]
pub struct SharedPrediction {
    label: Arc<RwLock<Arc<str>>>,
}

impl SharedPrediction {
    pub fn new() -> Self {
        Self {
            label: Arc::new(RwLock::new(Arc::from(PLACEHOLDER))),
        }
    }

    pub fn get(&self) -> Arc<str> {
        self.label.read().clone()
    }

    pub fn set(&self, label: impl Into<Arc<str>>) {
        let label = label.into();
        *self.label.write() = label;
    }
}

impl Default for SharedPrediction {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Default)]
struct SlotInner {
    frame: Option<Mat>,
    posted: u64,
}

/// Single-slot mailbox for display frames. Posting replaces whatever the UI
/// has not picked up yet.
#[derive(Clone, Default)]
pub struct FrameSlot {
    inner: Arc<Mutex<SlotInner>>,
    taken: Arc<AtomicU64>,
}

impl FrameSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn post(&self, frame: Mat) {
        let mut inner = self.inner.lock();
        inner.frame = Some(frame);
        inner.posted += 1;
    }

    pub fn take(&self) -> Option<Mat> {
        let frame = self.inner.lock().frame.take();
        if frame.is_some() {
            self.taken.fetch_add(1, Ordering::Relaxed);
        }
        frame
    }

    pub fn posted(&self) -> u64 {
        self.inner.lock().posted
    }

    /// Frames replaced before the UI got to them.
    pub fn dropped(&self) -> u64 {
        let inner = self.inner.lock();
        let pending = u64::from(inner.frame.is_some());
        inner
            .posted
            .saturating_sub(self.taken.load(Ordering::Relaxed) + pending)
    }
}

#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use opencv::core::{Scalar, CV_8UC1};
    use opencv::prelude::*;
    use std::thread;

    fn frame_of(value: f64) -> Mat {
        Mat::new_rows_cols_with_default(2, 2, CV_8UC1, Scalar::all(value)).unwrap()
    }

    #[test]
    fn test_prediction_starts_with_placeholder() {
        let prediction = SharedPrediction::new();
        assert_eq!(&*prediction.get(), PLACEHOLDER);

        let reader = prediction.clone();
        prediction.set("OPEN");
        assert_eq!(&*reader.get(), "OPEN");
    }

    #[test]
    fn test_prediction_reader_never_sees_partial_label() {
        let prediction = SharedPrediction::new();
        let writer = prediction.clone();
        let labels = ["THUMBS UP", "PEACE", SERVER_DOWN];

        let handle = thread::spawn(move || {
            for i in 0..2_000 {
                writer.set(labels[i % labels.len()]);
            }
        });

        for _ in 0..2_000 {
            let seen = prediction.get();
            assert!(seen.as_ref() == PLACEHOLDER || labels.contains(&seen.as_ref()));
        }
        handle.join().unwrap();
    }

    #[test]
    fn test_frame_slot_keeps_latest_frame_only() {
        let slot = FrameSlot::new();
        assert!(slot.take().is_none());

        slot.post(frame_of(1.0));
        slot.post(frame_of(2.0));
        slot.post(frame_of(3.0));

        let frame = slot.take().unwrap();
        assert_eq!(*frame.at_2d::<u8>(0, 0).unwrap(), 3);
        assert!(slot.take().is_none());
        assert_eq!(slot.posted(), 3);
        assert_eq!(slot.dropped(), 2);
    }

    #[test]
    fn test_cancellation_is_shared_between_clones() {
        let token = CancellationToken::new();
        let observer = token.clone();
        assert!(!observer.is_cancelled());
        token.cancel();
        assert!(observer.is_cancelled());
    }
}
