//! Proof overlay: what the host draws above the design surface while proofing is on.

use image::RgbaImage;
use image::imageops::{self, FilterType};

use crate::foundation::core::RequestId;
use crate::foundation::math::mul_div255;

/// Scale `proofed` to the target size and add `gamut_mask` on top.
///
/// The proofed raster is resampled bilinearly; the mask uses nearest-neighbour so flagged areas
/// keep hard edges. The mask is added (saturating) weighted by its own alpha.
pub fn composite(
    proofed: &RgbaImage,
    gamut_mask: Option<&RgbaImage>,
    target_width: u32,
    target_height: u32,
) -> RgbaImage {
    let (w, h) = (target_width.max(1), target_height.max(1));
    let mut out = if proofed.dimensions() == (w, h) {
        proofed.clone()
    } else {
        imageops::resize(proofed, w, h, FilterType::Triangle)
    };

    let Some(mask) = gamut_mask else {
        return out;
    };
    let mask = if mask.dimensions() == (w, h) {
        mask.clone()
    } else {
        imageops::resize(mask, w, h, FilterType::Nearest)
    };

    for (d, m) in out.pixels_mut().zip(mask.pixels()) {
        let m = m.0;
        if m[3] == 0 {
            continue;
        }
        let a = u16::from(m[3]);
        for c in 0..3 {
            d.0[c] = add_sat_u8(d.0[c], mul_div255(u16::from(m[c]), a));
        }
        d.0[3] = d.0[3].max(m[3]);
    }
    out
}

fn add_sat_u8(a: u8, b: u8) -> u8 {
    a.saturating_add(b)
}

/// Overlay pixels plus visibility.
#[derive(Clone, Debug)]
pub struct Overlay {
    pixels: Option<RgbaImage>,
    visible: bool,
    applied: Option<RequestId>,
}

impl Default for Overlay {
    fn default() -> Self {
        Self {
            pixels: None,
            visible: true,
            applied: None,
        }
    }
}

impl Overlay {
    /// Empty, visible overlay.
    pub fn new() -> Self {
        Self::default()
    }

    /// Hide without dropping pixels.
    pub fn hide(&mut self) {
        self.visible = false;
    }

    /// Show again.
    pub fn show(&mut self) {
        self.visible = true;
    }

    /// Drop the pixels and forget which result they came from.
    pub fn clear(&mut self) {
        self.pixels = None;
        self.applied = None;
    }

    /// Replace the pixels with the result of request `id`.
    pub fn apply(&mut self, id: RequestId, pixels: RgbaImage) {
        self.pixels = Some(pixels);
        self.applied = Some(id);
    }

    /// Current pixels, if any.
    pub fn pixels(&self) -> Option<&RgbaImage> {
        self.pixels.as_ref()
    }

    /// Whether the host should draw the overlay.
    pub fn is_visible(&self) -> bool {
        self.visible
    }

    /// `true` when there is nothing to draw.
    pub fn is_empty(&self) -> bool {
        self.pixels.is_none()
    }

    /// Id of the result currently shown.
    pub fn applied_id(&self) -> Option<RequestId> {
        self.applied
    }
}
