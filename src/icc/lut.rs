use crate::foundation::error::{ProofError, ProofResult};
use crate::foundation::math::{Mat3, Vec3, clamp01, interp_table, to_u16};
use crate::icc::header::{ColorSpace, Signature, be_u8, be_u16, s15f16, s15f16_bytes, slice};

const MAX_IN: usize = 8;
const MAX_OUT: usize = 15;
const MAX_CLUT_ENTRIES: usize = 1 << 24;

/// Storage precision of a LUT tag, which also decides the PCS encoding it expects.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LutPrecision {
    /// `mft1`
    Bits8,
    /// `mft2`
    Bits16,
}

/// Multi-dimensional lookup table (`lut8Type` / `lut16Type`).
///
/// Layout follows the tag: optional 3x3 matrix, per-channel input curves, a uniform grid with the
/// first input channel varying slowest, per-channel output curves. All samples are normalized to
/// `[0, 1]`.
#[derive(Clone, Debug, PartialEq)]
pub struct Lut {
    pub(crate) in_ch: usize,
    pub(crate) out_ch: usize,
    pub(crate) grid: usize,
    pub(crate) precision: LutPrecision,
    pub(crate) matrix: Option<Mat3>,
    pub(crate) input: Vec<Vec<f64>>,
    pub(crate) clut: Vec<f64>,
    pub(crate) output: Vec<Vec<f64>>,
}

impl Lut {
    /// Input channel count.
    pub fn input_channels(&self) -> usize {
        self.in_ch
    }

    /// Output channel count.
    pub fn output_channels(&self) -> usize {
        self.out_ch
    }

    /// Grid points per dimension.
    pub fn grid_points(&self) -> usize {
        self.grid
    }

    /// Build a 16-bit LUT with identity curves by sampling `f` on the grid.
    pub(crate) fn sample16(
        in_ch: usize,
        out_ch: usize,
        grid: usize,
        mut f: impl FnMut(&[f64], &mut [f64]),
    ) -> Self {
        let entries = grid.pow(in_ch as u32);
        let mut clut = Vec::with_capacity(entries * out_ch);
        let mut coords = vec![0.0; in_ch];
        let mut out = vec![0.0; out_ch];
        let last = (grid - 1) as f64;
        for idx in 0..entries {
            let mut rem = idx;
            for d in (0..in_ch).rev() {
                coords[d] = (rem % grid) as f64 / last;
                rem /= grid;
            }
            f(&coords, &mut out);
            // Quantize now so the in-memory LUT matches what a parser reads back.
            clut.extend(out.iter().map(|v| f64::from(to_u16(*v)) / 65535.0));
        }
        Self {
            in_ch,
            out_ch,
            grid,
            precision: LutPrecision::Bits16,
            matrix: None,
            input: vec![vec![0.0, 1.0]; in_ch],
            clut,
            output: vec![vec![0.0, 1.0]; out_ch],
        }
    }

    pub(crate) fn parse_mft1(data: &[u8]) -> ProofResult<Self> {
        let (in_ch, out_ch, grid, matrix) = parse_common(data)?;
        let mut at = 48;
        let read_tables = |count: usize, at: &mut usize| -> ProofResult<Vec<Vec<f64>>> {
            let mut tables = Vec::with_capacity(count);
            for _ in 0..count {
                let raw = slice(data, *at, 256)?;
                tables.push(raw.iter().map(|&v| f64::from(v) / 255.0).collect());
                *at += 256;
            }
            Ok(tables)
        };
        let input = read_tables(in_ch, &mut at)?;
        let n = clut_len(in_ch, out_ch, grid)?;
        let clut = slice(data, at, n)?
            .iter()
            .map(|&v| f64::from(v) / 255.0)
            .collect();
        at += n;
        let output = read_tables(out_ch, &mut at)?;
        Ok(Self {
            in_ch,
            out_ch,
            grid,
            precision: LutPrecision::Bits8,
            matrix,
            input,
            clut,
            output,
        })
    }

    pub(crate) fn parse_mft2(data: &[u8]) -> ProofResult<Self> {
        let (in_ch, out_ch, grid, matrix) = parse_common(data)?;
        let in_entries = be_u16(data, 48)? as usize;
        let out_entries = be_u16(data, 50)? as usize;
        if !(2..=4096).contains(&in_entries) || !(2..=4096).contains(&out_entries) {
            return Err(ProofError::invalid_profile(format!(
                "lut16 table sizes {in_entries}/{out_entries} out of range"
            )));
        }
        let mut at = 52;
        let read_u16s = |at: &mut usize, count: usize| -> ProofResult<Vec<f64>> {
            let raw = slice(data, *at, count * 2)?;
            *at += count * 2;
            Ok(raw
                .chunks_exact(2)
                .map(|c| f64::from(u16::from_be_bytes([c[0], c[1]])) / 65535.0)
                .collect())
        };
        let mut input = Vec::with_capacity(in_ch);
        for _ in 0..in_ch {
            input.push(read_u16s(&mut at, in_entries)?);
        }
        let clut = read_u16s(&mut at, clut_len(in_ch, out_ch, grid)?)?;
        let mut output = Vec::with_capacity(out_ch);
        for _ in 0..out_ch {
            output.push(read_u16s(&mut at, out_entries)?);
        }
        Ok(Self {
            in_ch,
            out_ch,
            grid,
            precision: LutPrecision::Bits16,
            matrix,
            input,
            clut,
            output,
        })
    }

    pub(crate) fn encode_mft2(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&Signature::new(b"mft2").bytes());
        out.extend_from_slice(&[0; 4]);
        out.push(self.in_ch as u8);
        out.push(self.out_ch as u8);
        out.push(self.grid as u8);
        out.push(0);
        let m = self.matrix.unwrap_or(Mat3::IDENTITY);
        for row in m.0 {
            for v in row {
                out.extend_from_slice(&s15f16_bytes(v));
            }
        }
        let in_entries = self.input.first().map_or(2, Vec::len);
        let out_entries = self.output.first().map_or(2, Vec::len);
        out.extend_from_slice(&(in_entries as u16).to_be_bytes());
        out.extend_from_slice(&(out_entries as u16).to_be_bytes());
        let tables = self
            .input
            .iter()
            .flatten()
            .chain(self.clut.iter())
            .chain(self.output.iter().flatten());
        for v in tables {
            out.extend_from_slice(&to_u16(*v).to_be_bytes());
        }
        out
    }

    /// Evaluate the LUT. `input.len()` must equal the input channel count and `out` must hold
    /// at least the output channel count.
    pub(crate) fn eval(&self, input: &[f64], out: &mut [f64]) {
        let n = self.in_ch;
        let mut x = [0.0f64; MAX_IN];
        x[..n].copy_from_slice(&input[..n]);

        if let Some(m) = self.matrix
            && n == 3
        {
            let v = m.mul_vec([x[0], x[1], x[2]]);
            x[..3].copy_from_slice(&v);
        }

        for (d, table) in self.input.iter().enumerate() {
            x[d] = interp_table(table, x[d]);
        }

        let grid = self.grid;
        let mut strides = [0usize; MAX_IN];
        let mut stride = self.out_ch;
        for d in (0..n).rev() {
            strides[d] = stride;
            stride *= grid;
        }

        let last = (grid - 1) as f64;
        let mut fracs = [0.0f64; MAX_IN];
        let mut base = 0usize;
        for d in 0..n {
            let pos = clamp01(x[d]) * last;
            let i = (pos.floor() as usize).min(grid - 2);
            fracs[d] = pos - i as f64;
            base += i * strides[d];
        }

        let mut acc = [0.0f64; MAX_OUT];
        for corner in 0..(1usize << n) {
            let mut w = 1.0;
            let mut off = base;
            for d in 0..n {
                if corner >> d & 1 == 1 {
                    w *= fracs[d];
                    off += strides[d];
                } else {
                    w *= 1.0 - fracs[d];
                }
            }
            if w == 0.0 {
                continue;
            }
            for (o, a) in acc.iter_mut().take(self.out_ch).enumerate() {
                *a += w * self.clut[off + o];
            }
        }

        for (o, table) in self.output.iter().enumerate() {
            out[o] = interp_table(table, acc[o]);
        }
    }
}

fn parse_common(data: &[u8]) -> ProofResult<(usize, usize, usize, Option<Mat3>)> {
    let in_ch = be_u8(data, 8)? as usize;
    let out_ch = be_u8(data, 9)? as usize;
    let grid = be_u8(data, 10)? as usize;
    if !(1..=MAX_IN).contains(&in_ch) || !(1..=MAX_OUT).contains(&out_ch) {
        return Err(ProofError::invalid_profile(format!(
            "lut channel counts {in_ch}->{out_ch} unsupported"
        )));
    }
    if grid < 2 {
        return Err(ProofError::invalid_profile("lut grid needs at least 2 points"));
    }
    let mut m = [[0.0; 3]; 3];
    for (r, row) in m.iter_mut().enumerate() {
        for (c, v) in row.iter_mut().enumerate() {
            *v = s15f16(data, 12 + (r * 3 + c) * 4)?;
        }
    }
    let m = Mat3(m);
    let matrix = (!m.is_identity()).then_some(m);
    Ok((in_ch, out_ch, grid, matrix))
}

fn clut_len(in_ch: usize, out_ch: usize, grid: usize) -> ProofResult<usize> {
    grid.checked_pow(in_ch as u32)
        .and_then(|n| n.checked_mul(out_ch))
        .filter(|&n| n <= MAX_CLUT_ENTRIES)
        .ok_or_else(|| ProofError::invalid_profile("lut grid too large"))
}

/// Encode a PCS value into the normalized input a LUT of `precision` expects.
pub(crate) fn encode_pcs(pcs: ColorSpace, precision: LutPrecision, v: Vec3) -> Vec3 {
    match (pcs, precision) {
        (ColorSpace::Lab, LutPrecision::Bits16) => [
            v[0] * 652.8 / 65535.0,
            (v[1] + 128.0) * 256.0 / 65535.0,
            (v[2] + 128.0) * 256.0 / 65535.0,
        ],
        (ColorSpace::Lab, LutPrecision::Bits8) => [
            v[0] / 100.0,
            (v[1] + 128.0) / 255.0,
            (v[2] + 128.0) / 255.0,
        ],
        _ => v.map(|c| c * 32768.0 / 65535.0),
    }
}

/// Inverse of [`encode_pcs`].
pub(crate) fn decode_pcs(pcs: ColorSpace, precision: LutPrecision, n: Vec3) -> Vec3 {
    match (pcs, precision) {
        (ColorSpace::Lab, LutPrecision::Bits16) => [
            n[0] * 65535.0 / 652.8,
            n[1] * 65535.0 / 256.0 - 128.0,
            n[2] * 65535.0 / 256.0 - 128.0,
        ],
        (ColorSpace::Lab, LutPrecision::Bits8) => {
            [n[0] * 100.0, n[1] * 255.0 - 128.0, n[2] * 255.0 - 128.0]
        }
        _ => n.map(|c| c * 65535.0 / 32768.0),
    }
}
