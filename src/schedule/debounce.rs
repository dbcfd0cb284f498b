use std::time::{Duration, Instant};

/// Trailing-edge debounce timer driven by explicit timestamps.
#[derive(Clone, Debug)]
pub(crate) struct Debouncer {
    window: Duration,
    deadline: Option<Instant>,
}

impl Debouncer {
    pub(crate) fn new(window: Duration) -> Self {
        Self {
            window,
            deadline: None,
        }
    }

    /// Cancel any pending deadline and re-arm `window` after `now`.
    pub(crate) fn arm(&mut self, now: Instant) {
        self.deadline = Some(now + self.window);
    }

    /// Arm so the next `fire` at or after `now` triggers.
    pub(crate) fn arm_immediate(&mut self, now: Instant) {
        self.deadline = Some(now);
    }

    pub(crate) fn cancel(&mut self) {
        self.deadline = None;
    }

    #[cfg(test)]
    pub(crate) fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    /// `true` once per arming, when `now` has reached the deadline.
    pub(crate) fn fire(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(d) if now >= d => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }
}
