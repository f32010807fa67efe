use std::time::{Duration, Instant};

/// Minimum spacing between two occurrences of something.
///
/// Used for the prediction request spacing in the worker and for the label
/// refresh timer in the UI loop.
#[derive(Debug, Clone)]
pub struct Throttle {
    interval: Duration,
    last: Option<Instant>,
}

impl Throttle {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last: None,
        }
    }

    /// Returns `true` and marks `now` when at least one interval has passed
    /// since the previous `true`. The first call always fires.
    pub fn ready(&mut self, now: Instant) -> bool {
        match self.last {
            Some(last) if now.saturating_duration_since(last) < self.interval => false,
            _ => {
                self.last = Some(now);
                true
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_call_fires() {
        let mut throttle = Throttle::new(Duration::from_millis(200));
        assert!(throttle.ready(Instant::now()));
    }

    #[test]
    fn test_spacing_is_enforced_from_last_fire() {
        let start = Instant::now();
        let mut throttle = Throttle::new(Duration::from_millis(200));

        assert!(throttle.ready(start));
        assert!(!throttle.ready(start + Duration::from_millis(50)));
        assert!(!throttle.ready(start + Duration::from_millis(199)));
        assert!(throttle.ready(start + Duration::from_millis(200)));
        assert!(!throttle.ready(start + Duration::from_millis(350)));
        assert!(throttle.ready(start + Duration::from_millis(401)));
    }

    #[test]
    fn test_clock_going_backwards_does_not_fire() {
        let start = Instant::now() + Duration::from_secs(1);
        let mut throttle = Throttle::new(Duration::from_millis(200));

        assert!(throttle.ready(start));
        assert!(!throttle.ready(start - Duration::from_millis(10)));
    }
}
