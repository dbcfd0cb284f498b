//! Live preview orchestration.
//!
//! [`ProofScheduler`] runs on the host's interactive thread. It never blocks: the host calls
//! [`ProofScheduler::poll`] on every tick with the current time, and the scheduler advances its
//! profile loading, engine traffic, timeout and debounce from there.

mod debounce;
mod scheduler;

use std::time::Duration;

use crate::engine::{DEFAULT_GAMUT_COLOR, TransformResult};
use crate::foundation::core::RequestId;
use crate::foundation::error::ProofError;

pub use scheduler::ProofScheduler;

/// Scheduler lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProofState {
    /// Proofing is off, or was never turned on.
    Uninitialized,
    /// Profile bytes are being resolved or the engine is loading them.
    ProfilesLoading,
    /// The engine holds a transform and nothing is in flight.
    Ready,
    /// A preview request is in flight.
    Processing,
    /// The last load or request failed. See [`ProofScheduler::last_error`].
    Error,
}

/// Tunables. Defaults match the interactive editor.
#[derive(Clone, Debug)]
pub struct SchedulerOpts {
    /// Quiet period after the last refresh request before a preview is issued.
    pub debounce: Duration,
    /// Longest side of the raster sent to the engine.
    pub preview_max_dim: u32,
    /// How long a preview may stay unanswered before the scheduler gives up on it.
    pub request_timeout: Duration,
    /// Mask color for out-of-gamut pixels.
    pub gamut_color: [u8; 4],
}

impl Default for SchedulerOpts {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(200),
            preview_max_dim: 1024,
            request_timeout: Duration::from_secs(30),
            gamut_color: DEFAULT_GAMUT_COLOR,
        }
    }
}

/// Decision for an inbound preview result.
#[derive(Debug)]
pub enum Delivery {
    /// The result answers an older request and was dropped.
    Stale,
    /// The result answers the latest request and now backs the overlay.
    Applied(TransformResult),
}

impl Delivery {
    /// `true` for [`Delivery::Applied`].
    pub fn is_applied(&self) -> bool {
        matches!(self, Self::Applied(_))
    }
}

/// What happened during one [`ProofScheduler::poll`].
#[derive(Debug, Default)]
pub struct PollReport {
    /// `Init` sent to the engine.
    pub init_sent: Option<RequestId>,
    /// Engine confirmed the current `Init`.
    pub ready: Option<RequestId>,
    /// Preview request issued.
    pub issued: Option<RequestId>,
    /// Preview result applied to the overlay.
    pub applied: Option<RequestId>,
    /// Results dropped as stale.
    pub stale: usize,
    /// Preview request given up on.
    pub timed_out: Option<RequestId>,
    /// Failures raised during this poll.
    pub errors: Vec<ProofError>,
}

impl PollReport {
    /// `true` when the poll changed nothing.
    pub fn is_idle(&self) -> bool {
        self.init_sent.is_none()
            && self.ready.is_none()
            && self.issued.is_none()
            && self.applied.is_none()
            && self.stale == 0
            && self.timed_out.is_none()
            && self.errors.is_empty()
    }
}
