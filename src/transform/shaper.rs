use crate::foundation::error::{ProofError, ProofResult};
use crate::foundation::math::{Mat3, Vec3, clamp01, interp_table};
use crate::icc::IccProfile;
use crate::icc::tags::{TAG_BTRC, TAG_BXYZ, TAG_GTRC, TAG_GXYZ, TAG_RTRC, TAG_RXYZ};

const INVERSE_LEN: usize = 4096;

/// Matrix/TRC model of an RGB profile with precomputed lookup tables.
///
/// Forward tables cover every 8-bit code value; inverse tables are sampled densely enough that
/// quantizing their output back to 8 bits is exact for smooth curves.
#[derive(Clone, Debug)]
pub(crate) struct MatrixShaper {
    to_xyz: Mat3,
    from_xyz: Mat3,
    forward: [Vec<f64>; 3],
    inverse: [Vec<f64>; 3],
}

impl MatrixShaper {
    pub(crate) fn from_profile(p: &IccProfile) -> ProofResult<Self> {
        let col = |sig| {
            p.xyz(sig)
                .ok_or_else(|| ProofError::invalid_profile(format!("missing '{sig}' colorant")))
        };
        let to_xyz = Mat3::from_columns(col(TAG_RXYZ)?, col(TAG_GXYZ)?, col(TAG_BXYZ)?);
        let from_xyz = to_xyz
            .inverse()
            .ok_or_else(|| ProofError::invalid_profile("colorant matrix is singular"))?;

        let red = p
            .curve(TAG_RTRC)
            .ok_or_else(|| ProofError::invalid_profile("missing 'rTRC' curve"))?;
        let curve = |sig| p.curve(sig).unwrap_or(red);
        let curves = [red, curve(TAG_GTRC), curve(TAG_BTRC)];

        Ok(Self {
            to_xyz,
            from_xyz,
            forward: curves.map(|c| c.sample(256)),
            inverse: curves.map(|c| c.inverse_table(INVERSE_LEN)),
        })
    }

    /// 8-bit RGB to PCS XYZ.
    pub(crate) fn rgb8_to_xyz(&self, rgb: [u8; 3]) -> Vec3 {
        let lin = [
            self.forward[0][usize::from(rgb[0])],
            self.forward[1][usize::from(rgb[1])],
            self.forward[2][usize::from(rgb[2])],
        ];
        self.to_xyz.mul_vec(lin)
    }

    /// Normalized device RGB to PCS XYZ.
    pub(crate) fn device_to_xyz(&self, rgb: &[f64]) -> Vec3 {
        let lin = [
            interp_table(&self.forward[0], rgb[0]),
            interp_table(&self.forward[1], rgb[1]),
            interp_table(&self.forward[2], rgb[2]),
        ];
        self.to_xyz.mul_vec(lin)
    }

    /// PCS XYZ to normalized device RGB, clipped to the device range.
    pub(crate) fn xyz_to_device(&self, xyz: Vec3) -> Vec3 {
        let lin = self.from_xyz.mul_vec(xyz);
        [
            interp_table(&self.inverse[0], clamp01(lin[0])),
            interp_table(&self.inverse[1], clamp01(lin[1])),
            interp_table(&self.inverse[2], clamp01(lin[2])),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::{D50, to_u8};
    use crate::icc::srgb_profile;

    fn srgb() -> MatrixShaper {
        MatrixShaper::from_profile(&IccProfile::parse(&srgb_profile()).unwrap()).unwrap()
    }

    #[test]
    fn white_is_d50_and_black_is_zero() {
        let s = srgb();
        let w = s.rgb8_to_xyz([255, 255, 255]);
        for (a, b) in w.iter().zip(D50) {
            assert!((a - b).abs() < 2e-3, "{w:?}");
        }
        assert_eq!(s.rgb8_to_xyz([0, 0, 0]), [0.0, 0.0, 0.0]);
    }

    #[test]
    fn eight_bit_round_trip_is_lossless() {
        let s = srgb();
        for v in [0u8, 1, 17, 64, 128, 200, 254, 255] {
            let dev = s.xyz_to_device(s.rgb8_to_xyz([v, v / 2, 255 - v]));
            assert_eq!(dev.map(to_u8), [v, v / 2, 255 - v]);
        }
    }

    #[test]
    fn lut_profiles_are_not_matrix_shapers() {
        let p = IccProfile::parse(&crate::icc::print_profile(
            &crate::icc::PrintCondition::newsprint(),
        ))
        .unwrap();
        assert!(MatrixShaper::from_profile(&p).is_err());
    }
}
