use crate::foundation::error::{ProofError, ProofResult};
use crate::foundation::math::{D50, Vec3, lab_to_xyz, xyz_to_lab};
use crate::icc::lut::{decode_pcs, encode_pcs};
use crate::icc::tags::{TAG_A2B0, TAG_B2A0};
use crate::icc::{ColorSpace, IccProfile, Lut};
use crate::transform::shaper::MatrixShaper;

pub(crate) const MAX_DEVICE_CHANNELS: usize = 8;

/// Device side of the output profile: PCS to device values and back.
#[derive(Clone, Debug)]
pub(crate) enum OutputModel {
    Matrix(MatrixShaper),
    Lut {
        pcs: ColorSpace,
        a2b: Lut,
        b2a: Lut,
    },
}

impl OutputModel {
    pub(crate) fn from_profile(p: &IccProfile) -> ProofResult<Self> {
        let channels = p.header.color_space.channels().ok_or_else(|| {
            ProofError::invalid_profile(format!(
                "unsupported output color space {:?}",
                p.header.color_space
            ))
        })?;

        if let (Some(a2b), Some(b2a)) = (p.lut(TAG_A2B0), p.lut(TAG_B2A0)) {
            if a2b.input_channels() != channels
                || a2b.output_channels() != 3
                || b2a.input_channels() != 3
                || b2a.output_channels() != channels
            {
                return Err(ProofError::invalid_profile(format!(
                    "LUT shapes {}->{} / {}->{} do not match a {channels}-channel device",
                    a2b.input_channels(),
                    a2b.output_channels(),
                    b2a.input_channels(),
                    b2a.output_channels()
                )));
            }
            if channels > MAX_DEVICE_CHANNELS {
                return Err(ProofError::invalid_profile(format!(
                    "{channels} device channels exceed {MAX_DEVICE_CHANNELS}"
                )));
            }
            return Ok(Self::Lut {
                pcs: p.header.pcs,
                a2b: a2b.clone(),
                b2a: b2a.clone(),
            });
        }

        if p.header.color_space == ColorSpace::Rgb && p.is_matrix_shaper() {
            return MatrixShaper::from_profile(p).map(Self::Matrix);
        }

        Err(ProofError::invalid_profile(
            "output profile needs A2B0/B2A0 tables or an RGB matrix/TRC model",
        ))
    }

    pub(crate) fn channels(&self) -> usize {
        match self {
            Self::Matrix(_) => 3,
            Self::Lut { b2a, .. } => b2a.output_channels(),
        }
    }

    /// Relative colorimetric PCS XYZ to device values in `[0, 1]`. Returns the channel count.
    pub(crate) fn from_pcs(&self, xyz: Vec3, device: &mut [f64; MAX_DEVICE_CHANNELS]) -> usize {
        match self {
            Self::Matrix(shaper) => {
                device[..3].copy_from_slice(&shaper.xyz_to_device(xyz));
                3
            }
            Self::Lut { pcs, b2a, .. } => {
                let v = match pcs {
                    ColorSpace::Lab => xyz_to_lab(xyz, D50),
                    _ => xyz,
                };
                let input = encode_pcs(*pcs, b2a.precision, v);
                b2a.eval(&input, device);
                b2a.output_channels()
            }
        }
    }

    /// Device values back to relative colorimetric PCS XYZ.
    pub(crate) fn to_pcs(&self, device: &[f64]) -> Vec3 {
        match self {
            Self::Matrix(shaper) => shaper.device_to_xyz(device),
            Self::Lut { pcs, a2b, .. } => {
                let mut out = [0.0; 3];
                a2b.eval(device, &mut out);
                let v = decode_pcs(*pcs, a2b.precision, out);
                match pcs {
                    ColorSpace::Lab => lab_to_xyz(v, D50),
                    _ => v,
                }
            }
        }
    }
}
