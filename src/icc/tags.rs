use crate::foundation::error::{ProofError, ProofResult};
use crate::foundation::math::{Vec3, clamp01, interp_table};
use crate::icc::header::{Signature, be_u16, be_u32, read_xyz, s15f16, s15f16_bytes, slice};
use crate::icc::lut::Lut;

pub(crate) const TAG_DESC: Signature = Signature::new(b"desc");
pub(crate) const TAG_CPRT: Signature = Signature::new(b"cprt");
pub(crate) const TAG_WTPT: Signature = Signature::new(b"wtpt");
pub(crate) const TAG_RXYZ: Signature = Signature::new(b"rXYZ");
pub(crate) const TAG_GXYZ: Signature = Signature::new(b"gXYZ");
pub(crate) const TAG_BXYZ: Signature = Signature::new(b"bXYZ");
pub(crate) const TAG_RTRC: Signature = Signature::new(b"rTRC");
pub(crate) const TAG_GTRC: Signature = Signature::new(b"gTRC");
pub(crate) const TAG_BTRC: Signature = Signature::new(b"bTRC");
pub(crate) const TAG_A2B0: Signature = Signature::new(b"A2B0");
pub(crate) const TAG_B2A0: Signature = Signature::new(b"B2A0");

const TYPE_XYZ: Signature = Signature::new(b"XYZ ");
const TYPE_CURV: Signature = Signature::new(b"curv");
const TYPE_PARA: Signature = Signature::new(b"para");
const TYPE_MFT1: Signature = Signature::new(b"mft1");
const TYPE_MFT2: Signature = Signature::new(b"mft2");
const TYPE_DESC: Signature = Signature::new(b"desc");
const TYPE_TEXT: Signature = Signature::new(b"text");
const TYPE_MLUC: Signature = Signature::new(b"mluc");

/// One-dimensional tone reproduction curve.
#[derive(Clone, Debug, PartialEq)]
pub enum Curve {
    /// `curv` with zero entries.
    Identity,
    /// `curv` with a single u8Fixed8 gamma.
    Gamma(f64),
    /// `curv` table, normalized to `[0, 1]`.
    Table(Vec<f64>),
    /// `para` function type 0..=4 with up to seven parameters `g a b c d e f`.
    Parametric {
        /// ICC function type.
        kind: u16,
        /// Parameters, unused slots are zero.
        params: [f64; 7],
    },
}

impl Curve {
    /// Evaluate the curve at `x` in `[0, 1]`.
    pub fn eval(&self, x: f64) -> f64 {
        let x = clamp01(x);
        match self {
            Self::Identity => x,
            Self::Gamma(g) => x.powf(*g),
            Self::Table(t) => interp_table(t, x),
            Self::Parametric { kind, params } => {
                let [g, a, b, c, d, e, f] = *params;
                let pow = |v: f64| v.max(0.0).powf(g);
                match kind {
                    0 => x.powf(g),
                    1 => {
                        if a != 0.0 && x >= -b / a {
                            pow(a * x + b)
                        } else {
                            0.0
                        }
                    }
                    2 => {
                        if a != 0.0 && x >= -b / a {
                            pow(a * x + b) + c
                        } else {
                            c
                        }
                    }
                    3 => {
                        if x >= d {
                            pow(a * x + b)
                        } else {
                            c * x
                        }
                    }
                    _ => {
                        if x >= d {
                            pow(a * x + b) + e
                        } else {
                            c * x + f
                        }
                    }
                }
            }
        }
    }

    /// Sample the curve at `n` evenly spaced points over `[0, 1]`.
    pub(crate) fn sample(&self, n: usize) -> Vec<f64> {
        let last = (n.max(2) - 1) as f64;
        (0..n.max(2)).map(|i| self.eval(i as f64 / last)).collect()
    }

    /// Sample the inverse curve at `n` points by bisection.
    ///
    /// Assumes the curve is monotone; decreasing curves are handled by flipping the search.
    pub(crate) fn inverse_table(&self, n: usize) -> Vec<f64> {
        let n = n.max(2);
        let last = (n - 1) as f64;
        let lo_y = self.eval(0.0);
        let hi_y = self.eval(1.0);
        let rising = hi_y >= lo_y;
        (0..n)
            .map(|i| {
                let y = i as f64 / last;
                let (mut lo, mut hi) = (0.0f64, 1.0f64);
                for _ in 0..40 {
                    let mid = 0.5 * (lo + hi);
                    let v = self.eval(mid);
                    if (v < y) == rising {
                        lo = mid;
                    } else {
                        hi = mid;
                    }
                }
                0.5 * (lo + hi)
            })
            .collect()
    }
}

/// Decoded tag payload.
#[derive(Clone, Debug, PartialEq)]
pub enum TagData {
    /// `XYZ ` (first number only).
    Xyz([f64; 3]),
    /// `curv` or `para`.
    Curve(Curve),
    /// `mft1` or `mft2`.
    Lut(Lut),
    /// `desc`, `text` or the first `mluc` record.
    Text(String),
    /// A tag type this crate does not decode.
    Unsupported(Signature),
}

pub(crate) fn parse_tag(data: &[u8]) -> ProofResult<TagData> {
    let ty = Signature(be_u32(data, 0)?);
    match ty {
        TYPE_XYZ => Ok(TagData::Xyz(read_xyz(data, 8)?)),
        TYPE_CURV => parse_curv(data).map(TagData::Curve),
        TYPE_PARA => parse_para(data).map(TagData::Curve),
        TYPE_MFT1 => Lut::parse_mft1(data).map(TagData::Lut),
        TYPE_MFT2 => Lut::parse_mft2(data).map(TagData::Lut),
        TYPE_DESC => {
            let count = be_u32(data, 8)? as usize;
            Ok(TagData::Text(ascii(slice(data, 12, count)?)))
        }
        TYPE_TEXT => Ok(TagData::Text(ascii(data.get(8..).unwrap_or_default()))),
        TYPE_MLUC => parse_mluc(data).map(TagData::Text),
        other => Ok(TagData::Unsupported(other)),
    }
}

fn ascii(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).into_owned()
}

fn parse_curv(data: &[u8]) -> ProofResult<Curve> {
    let count = be_u32(data, 8)? as usize;
    match count {
        0 => Ok(Curve::Identity),
        1 => Ok(Curve::Gamma(f64::from(be_u16(data, 12)?) / 256.0)),
        n => {
            let raw = slice(data, 12, n.saturating_mul(2))?;
            Ok(Curve::Table(
                raw.chunks_exact(2)
                    .map(|c| f64::from(u16::from_be_bytes([c[0], c[1]])) / 65535.0)
                    .collect(),
            ))
        }
    }
}

fn parse_para(data: &[u8]) -> ProofResult<Curve> {
    let kind = be_u16(data, 8)?;
    let count = match kind {
        0 => 1,
        1 => 3,
        2 => 4,
        3 => 5,
        4 => 7,
        other => {
            return Err(ProofError::invalid_profile(format!(
                "unknown parametric curve type {other}"
            )));
        }
    };
    let mut params = [0.0; 7];
    for (i, p) in params.iter_mut().take(count).enumerate() {
        *p = s15f16(data, 12 + i * 4)?;
    }
    Ok(Curve::Parametric { kind, params })
}

fn parse_mluc(data: &[u8]) -> ProofResult<String> {
    let records = be_u32(data, 8)?;
    if records == 0 {
        return Ok(String::new());
    }
    let len = be_u32(data, 20)? as usize;
    let offset = be_u32(data, 24)? as usize;
    let raw = slice(data, offset, len)?;
    let units: Vec<u16> = raw
        .chunks_exact(2)
        .map(|c| u16::from_be_bytes([c[0], c[1]]))
        .collect();
    Ok(String::from_utf16_lossy(&units)
        .trim_end_matches('\0')
        .to_string())
}

pub(crate) fn encode_xyz(v: Vec3) -> Vec<u8> {
    let mut out = Vec::with_capacity(20);
    out.extend_from_slice(&TYPE_XYZ.bytes());
    out.extend_from_slice(&[0; 4]);
    for c in v {
        out.extend_from_slice(&s15f16_bytes(c));
    }
    out
}

pub(crate) fn encode_curve(curve: &Curve) -> Vec<u8> {
    let mut out = Vec::new();
    match curve {
        Curve::Parametric { kind, params } => {
            let count = match kind {
                0 => 1,
                1 => 3,
                2 => 4,
                3 => 5,
                _ => 7,
            };
            out.extend_from_slice(&TYPE_PARA.bytes());
            out.extend_from_slice(&[0; 4]);
            out.extend_from_slice(&kind.to_be_bytes());
            out.extend_from_slice(&[0; 2]);
            for p in params.iter().take(count) {
                out.extend_from_slice(&s15f16_bytes(*p));
            }
        }
        Curve::Identity => {
            out.extend_from_slice(&TYPE_CURV.bytes());
            out.extend_from_slice(&[0; 8]);
        }
        Curve::Gamma(g) => {
            out.extend_from_slice(&TYPE_CURV.bytes());
            out.extend_from_slice(&[0; 4]);
            out.extend_from_slice(&1u32.to_be_bytes());
            out.extend_from_slice(&((g * 256.0).round() as u16).to_be_bytes());
        }
        Curve::Table(t) => {
            out.extend_from_slice(&TYPE_CURV.bytes());
            out.extend_from_slice(&[0; 4]);
            out.extend_from_slice(&(t.len() as u32).to_be_bytes());
            for v in t {
                out.extend_from_slice(&crate::foundation::math::to_u16(*v).to_be_bytes());
            }
        }
    }
    out
}

/// Version 2 `textDescriptionType` carrying only the ASCII part.
pub(crate) fn encode_desc(text: &str) -> Vec<u8> {
    let ascii: Vec<u8> = text.bytes().filter(u8::is_ascii).collect();
    let mut out = Vec::new();
    out.extend_from_slice(&TYPE_DESC.bytes());
    out.extend_from_slice(&[0; 4]);
    out.extend_from_slice(&(ascii.len() as u32 + 1).to_be_bytes());
    out.extend_from_slice(&ascii);
    out.push(0);
    // Empty Unicode (lang + count) and ScriptCode (code + count + 67 bytes) sections.
    out.extend_from_slice(&[0; 8]);
    out.extend_from_slice(&[0; 3]);
    out.extend_from_slice(&[0; 67]);
    out
}

pub(crate) fn encode_text(text: &str) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(&TYPE_TEXT.bytes());
    out.extend_from_slice(&[0; 4]);
    out.extend(text.bytes().filter(u8::is_ascii));
    out.push(0);
    out
}
