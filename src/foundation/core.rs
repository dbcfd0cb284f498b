use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

pub use kurbo::{Point, Rect, Size, Vec2};

/// Token tagging one engine request and its response.
///
/// Ids are issued by [`RequestIds`] and are strictly increasing within one counter.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
pub struct RequestId(pub u64);

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Shared monotonic request id counter.
///
/// Cloning shares the counter, so a scheduler and an export pipeline created from the same
/// `RequestIds` never hand out the same id.
#[derive(Clone, Debug, Default)]
pub struct RequestIds(Arc<AtomicU64>);

impl RequestIds {
    /// Create a fresh counter. The first id issued is `#1`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue the next id.
    pub fn next_id(&self) -> RequestId {
        RequestId(self.0.fetch_add(1, Ordering::Relaxed) + 1)
    }

    /// Most recently issued id, if any.
    pub fn last(&self) -> Option<RequestId> {
        match self.0.load(Ordering::Relaxed) {
            0 => None,
            n => Some(RequestId(n)),
        }
    }
}

/// Pixel extent of a surface length at `scale`, never zero.
pub(crate) fn pixel_extent(len: f64, scale: f64) -> u32 {
    let px = (len * scale).round();
    if !px.is_finite() || px < 1.0 {
        1
    } else if px >= f64::from(u32::MAX) {
        u32::MAX
    } else {
        px as u32
    }
}

/// Largest `(w, h)` with the same aspect ratio that fits in `max` on both sides.
///
/// Returns the input unchanged when it already fits.
pub(crate) fn fit_within(width: u32, height: u32, max: u32) -> (u32, u32) {
    let max = max.max(1);
    if width <= max && height <= max {
        return (width, height);
    }
    let scale = f64::from(max) / f64::from(width.max(height));
    (
        pixel_extent(f64::from(width), scale).min(max),
        pixel_extent(f64::from(height), scale).min(max),
    )
}
