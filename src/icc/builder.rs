//! Synthetic profile generation.
//!
//! Built-in profiles are generated rather than shipped: RGB working spaces as matrix/TRC
//! profiles, print conditions as LUT profiles sampled from a small density model of a press.

use crate::foundation::math::{
    D50, Mat3, SRGB_TO_XYZ_D50, Vec3, clamp01, lab_to_xyz, xyz_to_lab,
};
use crate::icc::header::{ColorSpace, IccHeader, ProfileClass};
use crate::icc::lut::{Lut, LutPrecision, decode_pcs, encode_pcs};
use crate::icc::profile::ProfileWriter;
use crate::icc::tags::{
    Curve, TAG_A2B0, TAG_B2A0, TAG_BTRC, TAG_BXYZ, TAG_CPRT, TAG_DESC, TAG_GTRC, TAG_GXYZ,
    TAG_RTRC, TAG_RXYZ, TAG_WTPT, encode_curve, encode_desc, encode_text, encode_xyz,
};

const COPYRIGHT: &str = "No copyright, use freely";
const A2B_GRID: usize = 17;
const B2A_GRID: usize = 33;

/// Matrix/TRC RGB profile with the given colorants (PCS XYZ, D50-adapted) and one shared curve.
pub fn matrix_rgb_profile(description: &str, colorants: [Vec3; 3], curve: &Curve) -> Vec<u8> {
    let trc = encode_curve(curve);
    ProfileWriter::new(IccHeader::new(
        ProfileClass::Display,
        ColorSpace::Rgb,
        ColorSpace::Xyz,
    ))
    .tag(TAG_DESC, encode_desc(description))
    .tag(TAG_CPRT, encode_text(COPYRIGHT))
    .tag(TAG_WTPT, encode_xyz(D50))
    .tag(TAG_RXYZ, encode_xyz(colorants[0]))
    .tag(TAG_GXYZ, encode_xyz(colorants[1]))
    .tag(TAG_BXYZ, encode_xyz(colorants[2]))
    .tag(TAG_RTRC, trc.clone())
    .tag(TAG_GTRC, trc.clone())
    .tag(TAG_BTRC, trc)
    .finish()
}

/// The sRGB transfer function as a `para` type 3 curve.
pub fn srgb_curve() -> Curve {
    Curve::Parametric {
        kind: 3,
        params: [
            2.4,
            1.0 / 1.055,
            0.055 / 1.055,
            1.0 / 12.92,
            0.04045,
            0.0,
            0.0,
        ],
    }
}

/// sRGB (IEC 61966-2.1), D50-adapted colorants.
pub fn srgb_profile() -> Vec<u8> {
    let m = SRGB_TO_XYZ_D50;
    matrix_rgb_profile(
        "sRGB IEC61966-2.1",
        [m.column(0), m.column(1), m.column(2)],
        &srgb_curve(),
    )
}

/// Analytic model of a CMYK press on a given paper.
///
/// Each ink contributes optical density in three filter bands proportional to its effective
/// (dot-gained) coverage. Band reflectances are mapped to XYZ through the sRGB primaries, so the
/// model is colorimetric relative to the paper and inverts in closed form for a fixed black.
#[derive(Clone, Debug, PartialEq)]
pub struct PrintCondition {
    /// Human readable name, stored in `desc`.
    pub name: String,
    /// Paper white as Lab (D50).
    pub paper_lab: Vec3,
    /// Solid densities of C, M, Y, K in the red, green and blue bands.
    pub densities: [Vec3; 4],
    /// Dot gain at 50% coverage, in `[0, 0.25]`.
    pub dot_gain: f64,
    /// Maximum sum of device coverages, e.g. `3.3` for 330%.
    pub ink_limit: f64,
    /// Lightness fraction (0 = white, 1 = black) where black generation starts.
    pub black_start: f64,
    /// Black generation strength in `[0, 1]`.
    pub black_strength: f64,
}

const PROCESS_DENSITIES: [Vec3; 4] = [
    [1.30, 0.50, 0.15],
    [0.10, 1.35, 0.55],
    [0.02, 0.10, 1.00],
    [1.50, 1.50, 1.45],
];

impl PrintCondition {
    /// Sheet-fed offset on coated paper.
    pub fn offset_standard() -> Self {
        Self {
            name: "Offset Standard (coated)".to_string(),
            paper_lab: [95.0, 0.0, -2.0],
            densities: PROCESS_DENSITIES,
            dot_gain: 0.14,
            ink_limit: 3.3,
            black_start: 0.2,
            black_strength: 0.8,
        }
    }

    /// Offset on uncoated paper: weaker solids, more gain.
    pub fn offset_uncoated() -> Self {
        Self {
            name: "Offset Uncoated".to_string(),
            paper_lab: [93.0, 0.0, -3.0],
            densities: scaled(PROCESS_DENSITIES, 0.8),
            dot_gain: 0.2,
            ink_limit: 3.0,
            black_start: 0.25,
            black_strength: 0.75,
        }
    }

    /// Coldset newsprint.
    pub fn newsprint() -> Self {
        Self {
            name: "Newsprint".to_string(),
            paper_lab: [82.0, 0.0, 3.0],
            densities: scaled(PROCESS_DENSITIES, 0.62),
            dot_gain: 0.24,
            ink_limit: 2.4,
            black_start: 0.3,
            black_strength: 0.7,
        }
    }

    /// Paper white as XYZ (D50).
    pub fn paper_xyz(&self) -> Vec3 {
        lab_to_xyz(self.paper_lab, D50)
    }

    fn gain_coeff(&self) -> f64 {
        4.0 * self.dot_gain.clamp(0.0, 0.25)
    }

    fn gain(&self, t: f64) -> f64 {
        let dg = self.gain_coeff();
        let t = clamp01(t);
        t + dg * t * (1.0 - t)
    }

    fn ungain(&self, v: f64) -> f64 {
        let dg = self.gain_coeff();
        let v = clamp01(v);
        if dg < 1e-9 {
            return v;
        }
        let b = 1.0 + dg;
        clamp01((b - (b * b - 4.0 * dg * v).max(0.0).sqrt()) / (2.0 * dg))
    }

    /// Device CMYK to media-relative Lab.
    pub(crate) fn to_lab(&self, cmyk: [f64; 4]) -> Vec3 {
        let mut density = [0.0; 3];
        for (ink, &t) in cmyk.iter().enumerate() {
            let g = self.gain(t);
            for (band, d) in density.iter_mut().enumerate() {
                *d += g * self.densities[ink][band];
            }
        }
        let reflect = density.map(|d| 10f64.powf(-d));
        xyz_to_lab(SRGB_TO_XYZ_D50.mul_vec(reflect), D50)
    }

    /// Media-relative Lab to device CMYK (closest reproducible color).
    pub(crate) fn to_cmyk(&self, lab: Vec3) -> [f64; 4] {
        let xyz = lab_to_xyz(lab, D50);
        let inv = SRGB_TO_XYZ_D50.inverse().unwrap_or(Mat3::IDENTITY);
        let reflect = inv.mul_vec(xyz).map(|r| r.clamp(1e-4, 1.0));
        let target = reflect.map(|r| -r.log10());

        let Some(solve) =
            Mat3::from_columns(self.densities[0], self.densities[1], self.densities[2]).inverse()
        else {
            return [0.0; 4];
        };
        // Coverage of CMY alone, and the CMY mix that matches one unit of black.
        let gcmy0 = solve.mul_vec(target);
        let k_equiv = solve.mul_vec(self.densities[3]);

        // Black only replaces the gray component CMY actually share.
        let darkness = clamp01(1.0 - lab[0] / 100.0);
        let ramp = clamp01((darkness - self.black_start) / (1.0 - self.black_start).max(1e-6));
        let k_cap = (0..3)
            .filter(|&i| k_equiv[i] > 1e-9)
            .map(|i| gcmy0[i] / k_equiv[i])
            .fold(1.0f64, f64::min);
        let gk = (self.black_strength * ramp.powf(1.5)).min(k_cap).max(0.0);
        let gcmy = [
            gcmy0[0] - gk * k_equiv[0],
            gcmy0[1] - gk * k_equiv[1],
            gcmy0[2] - gk * k_equiv[2],
        ];

        let mut cmy = gcmy.map(|g| self.ungain(g));
        let k = self.ungain(gk);
        let total: f64 = cmy.iter().sum::<f64>() + k;
        if total > self.ink_limit {
            let room = (self.ink_limit - k).max(0.0);
            let sum_cmy: f64 = cmy.iter().sum();
            if sum_cmy > 0.0 {
                cmy = cmy.map(|c| c * room / sum_cmy);
            }
        }
        [cmy[0], cmy[1], cmy[2], k]
    }
}

fn scaled(d: [Vec3; 4], s: f64) -> [Vec3; 4] {
    d.map(|ink| ink.map(|v| v * s))
}

/// LUT-based CMYK output profile (PCS Lab, 16-bit tables) sampled from `cond`.
pub fn print_profile(cond: &PrintCondition) -> Vec<u8> {
    let enc = LutPrecision::Bits16;
    let a2b = Lut::sample16(4, 3, A2B_GRID, |x, out| {
        let lab = cond.to_lab([x[0], x[1], x[2], x[3]]);
        out.copy_from_slice(&encode_pcs(ColorSpace::Lab, enc, lab));
    });
    let b2a = Lut::sample16(3, 4, B2A_GRID, |x, out| {
        let lab = decode_pcs(ColorSpace::Lab, enc, [x[0], x[1], x[2]]);
        out.copy_from_slice(&cond.to_cmyk(lab));
    });

    ProfileWriter::new(IccHeader::new(
        ProfileClass::Output,
        ColorSpace::Cmyk,
        ColorSpace::Lab,
    ))
    .tag(TAG_DESC, encode_desc(&cond.name))
    .tag(TAG_CPRT, encode_text(COPYRIGHT))
    .tag(TAG_WTPT, encode_xyz(cond.paper_xyz()))
    .tag(TAG_A2B0, a2b.encode_mft2())
    .tag(TAG_B2A0, b2a.encode_mft2())
    .finish()
}
