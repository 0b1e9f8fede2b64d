//! Delay-and-coalesce scheduling driven by an explicit clock.

use std::time::{Duration, Instant};

/// Holds the latest value of a burst until `window` passes without a newer one.
///
/// Scheduling again before the deadline replaces the value and restarts the
/// window; there is never more than one pending value.
#[derive(Debug, Clone)]
pub struct Debouncer<T> {
    window: Duration,
    pending: Option<T>,
    deadline: Option<Instant>,
}

impl<T> Debouncer<T> {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            pending: None,
            deadline: None,
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Starts or restarts the window with `value` as the pending result.
    pub fn schedule(&mut self, value: T, now: Instant) {
        self.pending = Some(value);
        self.deadline = Some(now + self.window);
    }

    pub fn cancel(&mut self) {
        self.pending = None;
        self.deadline = None;
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn pending(&self) -> Option<&T> {
        self.pending.as_ref()
    }

    /// Returns the pending value once its deadline has passed.
    pub fn fire(&mut self, now: Instant) -> Option<T> {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                self.pending.take()
            }
            _ => None,
        }
    }

    /// Returns the pending value immediately, ignoring the deadline.
    pub fn flush(&mut self) -> Option<T> {
        self.deadline = None;
        self.pending.take()
    }
}

// ─── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fires_after_window() {
        let start = Instant::now();
        let mut debouncer = Debouncer::new(Duration::from_millis(800));
        debouncer.schedule("a", start);

        assert_eq!(debouncer.fire(start + Duration::from_millis(799)), None);
        assert_eq!(debouncer.fire(start + Duration::from_millis(800)), Some("a"));
        assert!(!debouncer.is_pending());
        assert_eq!(debouncer.fire(start + Duration::from_secs(5)), None);
    }

    #[test]
    fn test_reschedule_restarts_window() {
        let start = Instant::now();
        let mut debouncer = Debouncer::new(Duration::from_millis(800));
        debouncer.schedule(1, start);
        debouncer.schedule(2, start + Duration::from_millis(500));

        // First deadline passed, but the window was reset.
        assert_eq!(debouncer.fire(start + Duration::from_millis(900)), None);
        assert_eq!(debouncer.fire(start + Duration::from_millis(1300)), Some(2));
    }

    #[test]
    fn test_cancel_and_flush() {
        let start = Instant::now();
        let mut debouncer = Debouncer::new(Duration::from_secs(1));
        debouncer.schedule(1, start);
        debouncer.cancel();
        assert_eq!(debouncer.deadline(), None);
        assert_eq!(debouncer.fire(start + Duration::from_secs(2)), None);

        debouncer.schedule(7, start);
        assert_eq!(debouncer.flush(), Some(7));
        assert!(!debouncer.is_pending());
    }
}
