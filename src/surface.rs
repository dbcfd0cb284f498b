//! Design surface abstraction.
//!
//! The host owns the interactive canvas; the proofing code only needs its physical geometry and
//! zoom-independent snapshots of surface regions.

use image::RgbaImage;
use image::imageops::{self, FilterType};

use crate::foundation::core::{Point, Rect, Size, Vec2, pixel_extent};
use crate::foundation::error::{ProofError, ProofResult};

/// Physical size of the document and where it sits on the surface.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct DocumentGeometry {
    /// Document width in millimetres.
    pub width_mm: f64,
    /// Document height in millimetres.
    pub height_mm: f64,
    /// Surface units per millimetre.
    pub units_per_mm: f64,
    /// Offset of the printable area's top-left corner in surface units.
    pub pasteboard_offset: Vec2,
}

impl DocumentGeometry {
    /// Geometry with no pasteboard.
    pub fn new(width_mm: f64, height_mm: f64, units_per_mm: f64) -> Self {
        Self {
            width_mm,
            height_mm,
            units_per_mm,
            pasteboard_offset: Vec2::ZERO,
        }
    }

    /// Builder-style pasteboard offset.
    pub fn with_pasteboard(mut self, offset: Vec2) -> Self {
        self.pasteboard_offset = offset;
        self
    }

    /// The printable area in surface units.
    pub fn printable_rect(&self) -> Rect {
        Rect::from_origin_size(
            self.pasteboard_offset.to_point(),
            Size::new(
                self.width_mm * self.units_per_mm,
                self.height_mm * self.units_per_mm,
            ),
        )
    }

    /// Larger of width and height in millimetres.
    pub fn max_dimension_mm(&self) -> f64 {
        self.width_mm.max(self.height_mm)
    }

    /// Reject non-finite or non-positive sizes.
    pub fn validate(&self) -> ProofResult<()> {
        let ok = |v: f64| v.is_finite() && v > 0.0;
        if !ok(self.width_mm) || !ok(self.height_mm) || !ok(self.units_per_mm) {
            return Err(ProofError::validation(format!(
                "document geometry {}x{} mm at {} units/mm is not drawable",
                self.width_mm, self.height_mm, self.units_per_mm
            )));
        }
        Ok(())
    }
}

/// Snapshot provider implemented by the host's design surface.
pub trait DesignSurface {
    /// Current document geometry.
    fn geometry(&self) -> DocumentGeometry;

    /// Render `region` (surface units) at `scale` output pixels per unit, independent of the
    /// current zoom or pan.
    fn capture_region(&self, region: Rect, scale: f64) -> ProofResult<RgbaImage>;
}

/// A surface backed by an in-memory raster at one pixel per surface unit.
#[derive(Clone, Debug)]
pub struct RasterSurface {
    geometry: DocumentGeometry,
    raster: RgbaImage,
}

impl RasterSurface {
    /// Surface showing `raster`, whose pixel (0, 0) is surface point (0, 0).
    pub fn new(raster: RgbaImage, geometry: DocumentGeometry) -> Self {
        Self { geometry, raster }
    }

    /// Surface whose raster is exactly the printable area of a document of `width_mm` x
    /// `height_mm`.
    pub fn document(raster: RgbaImage, width_mm: f64, height_mm: f64) -> Self {
        let units_per_mm = f64::from(raster.width()) / width_mm;
        Self::new(raster, DocumentGeometry::new(width_mm, height_mm, units_per_mm))
    }

    /// Backing raster.
    pub fn raster(&self) -> &RgbaImage {
        &self.raster
    }

    /// Replace the backing raster (e.g. after an edit).
    pub fn set_raster(&mut self, raster: RgbaImage) {
        self.raster = raster;
    }
}

impl DesignSurface for RasterSurface {
    fn geometry(&self) -> DocumentGeometry {
        self.geometry
    }

    fn capture_region(&self, region: Rect, scale: f64) -> ProofResult<RgbaImage> {
        if !(scale.is_finite() && scale > 0.0) {
            return Err(ProofError::capture(format!("invalid capture scale {scale}")));
        }
        let bounds = Rect::from_origin_size(
            Point::ZERO,
            Size::new(f64::from(self.raster.width()), f64::from(self.raster.height())),
        );
        let clipped = region.intersect(bounds);
        if clipped.width() < 1.0 || clipped.height() < 1.0 {
            return Err(ProofError::capture(format!(
                "region {region:?} does not overlap the surface"
            )));
        }
        let x = clipped.x0.floor() as u32;
        let y = clipped.y0.floor() as u32;
        let w = (clipped.x1.ceil() as u32).saturating_sub(x).max(1);
        let h = (clipped.y1.ceil() as u32).saturating_sub(y).max(1);
        let cropped = imageops::crop_imm(&self.raster, x, y, w, h).to_image();

        let out_w = pixel_extent(clipped.width(), scale);
        let out_h = pixel_extent(clipped.height(), scale);
        if (out_w, out_h) == cropped.dimensions() {
            return Ok(cropped);
        }
        Ok(imageops::resize(&cropped, out_w, out_h, FilterType::Triangle))
    }
}
