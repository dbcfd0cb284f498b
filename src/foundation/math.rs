//! Small color math kit shared by the ICC codec and the transform.
//!
//! Everything here works in `f64` and is free of global state, so results only depend on inputs.

pub(crate) type Vec3 = [f64; 3];

/// D50 reference white, the ICC profile connection space illuminant.
pub(crate) const D50: Vec3 = [0.9642, 1.0, 0.8249];

/// Linear sRGB to XYZ, Bradford-adapted to D50.
pub(crate) const SRGB_TO_XYZ_D50: Mat3 = Mat3([
    [0.436_074_7, 0.385_064_9, 0.143_080_4],
    [0.222_504_5, 0.716_878_6, 0.060_616_9],
    [0.013_932_2, 0.097_104_5, 0.714_173_3],
]);

#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct Mat3(pub(crate) [[f64; 3]; 3]);

impl Mat3 {
    pub(crate) const IDENTITY: Self = Self([[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]]);

    /// Matrix whose columns are `a`, `b`, `c`.
    pub(crate) fn from_columns(a: Vec3, b: Vec3, c: Vec3) -> Self {
        Self([[a[0], b[0], c[0]], [a[1], b[1], c[1]], [a[2], b[2], c[2]]])
    }

    pub(crate) fn column(&self, i: usize) -> Vec3 {
        [self.0[0][i], self.0[1][i], self.0[2][i]]
    }

    pub(crate) fn mul_vec(&self, v: Vec3) -> Vec3 {
        let m = &self.0;
        [
            m[0][0] * v[0] + m[0][1] * v[1] + m[0][2] * v[2],
            m[1][0] * v[0] + m[1][1] * v[1] + m[1][2] * v[2],
            m[2][0] * v[0] + m[2][1] * v[1] + m[2][2] * v[2],
        ]
    }

    pub(crate) fn determinant(&self) -> f64 {
        let m = &self.0;
        m[0][0] * (m[1][1] * m[2][2] - m[1][2] * m[2][1])
            - m[0][1] * (m[1][0] * m[2][2] - m[1][2] * m[2][0])
            + m[0][2] * (m[1][0] * m[2][1] - m[1][1] * m[2][0])
    }

    pub(crate) fn inverse(&self) -> Option<Self> {
        let det = self.determinant();
        if !det.is_finite() || det.abs() < 1e-12 {
            return None;
        }
        let m = &self.0;
        let inv = 1.0 / det;
        Some(Self([
            [
                (m[1][1] * m[2][2] - m[1][2] * m[2][1]) * inv,
                (m[0][2] * m[2][1] - m[0][1] * m[2][2]) * inv,
                (m[0][1] * m[1][2] - m[0][2] * m[1][1]) * inv,
            ],
            [
                (m[1][2] * m[2][0] - m[1][0] * m[2][2]) * inv,
                (m[0][0] * m[2][2] - m[0][2] * m[2][0]) * inv,
                (m[0][2] * m[1][0] - m[0][0] * m[1][2]) * inv,
            ],
            [
                (m[1][0] * m[2][1] - m[1][1] * m[2][0]) * inv,
                (m[0][1] * m[2][0] - m[0][0] * m[2][1]) * inv,
                (m[0][0] * m[1][1] - m[0][1] * m[1][0]) * inv,
            ],
        ]))
    }

    pub(crate) fn is_identity(&self) -> bool {
        self.0
            .iter()
            .flatten()
            .zip(Self::IDENTITY.0.iter().flatten())
            .all(|(a, b)| (a - b).abs() < 1e-6)
    }
}

fn lab_f(t: f64) -> f64 {
    const EPS: f64 = 216.0 / 24389.0;
    const KAPPA: f64 = 24389.0 / 27.0;
    if t > EPS {
        t.cbrt()
    } else {
        (KAPPA * t + 16.0) / 116.0
    }
}

fn lab_f_inv(f: f64) -> f64 {
    const EPS: f64 = 6.0 / 29.0;
    if f > EPS {
        f * f * f
    } else {
        3.0 * EPS * EPS * (f - 4.0 / 29.0)
    }
}

pub(crate) fn xyz_to_lab(xyz: Vec3, white: Vec3) -> Vec3 {
    let fx = lab_f(xyz[0] / white[0]);
    let fy = lab_f(xyz[1] / white[1]);
    let fz = lab_f(xyz[2] / white[2]);
    [116.0 * fy - 16.0, 500.0 * (fx - fy), 200.0 * (fy - fz)]
}

pub(crate) fn lab_to_xyz(lab: Vec3, white: Vec3) -> Vec3 {
    let fy = (lab[0] + 16.0) / 116.0;
    let fx = fy + lab[1] / 500.0;
    let fz = fy - lab[2] / 200.0;
    [
        lab_f_inv(fx) * white[0],
        lab_f_inv(fy) * white[1],
        lab_f_inv(fz) * white[2],
    ]
}

/// CIE76 color difference.
pub(crate) fn delta_e76(a: Vec3, b: Vec3) -> f64 {
    let d = [a[0] - b[0], a[1] - b[1], a[2] - b[2]];
    (d[0] * d[0] + d[1] * d[1] + d[2] * d[2]).sqrt()
}

pub(crate) fn clamp01(v: f64) -> f64 {
    if v.is_nan() { 0.0 } else { v.clamp(0.0, 1.0) }
}

pub(crate) fn to_u8(v: f64) -> u8 {
    (clamp01(v) * 255.0).round() as u8
}

pub(crate) fn to_u16(v: f64) -> u16 {
    (clamp01(v) * 65535.0).round() as u16
}

/// Piecewise-linear lookup into `table` sampled uniformly over `[0, 1]`.
pub(crate) fn interp_table(table: &[f64], x: f64) -> f64 {
    match table.len() {
        0 => clamp01(x),
        1 => table[0],
        n => {
            let pos = clamp01(x) * (n - 1) as f64;
            let i = (pos.floor() as usize).min(n - 2);
            let t = pos - i as f64;
            table[i] + (table[i + 1] - table[i]) * t
        }
    }
}

pub(crate) fn mul_div255(x: u16, y: u16) -> u8 {
    (((u32::from(x) * u32::from(y)) + 127) / 255) as u8
}
