use crate::foundation::error::{ProofError, ProofResult};
use crate::foundation::math::{D50, Vec3};

pub(crate) const HEADER_LEN: usize = 128;
const MAGIC: Signature = Signature::new(b"acsp");

/// Four-byte ICC signature (tag names, type names, color spaces).
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Signature(pub u32);

impl Signature {
    /// Signature from its four ASCII bytes.
    pub const fn new(bytes: &[u8; 4]) -> Self {
        Self(u32::from_be_bytes(*bytes))
    }

    /// The four raw bytes.
    pub fn bytes(self) -> [u8; 4] {
        self.0.to_be_bytes()
    }
}

impl std::fmt::Display for Signature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for b in self.bytes() {
            let c = if b.is_ascii_graphic() || b == b' ' {
                b as char
            } else {
                '?'
            };
            write!(f, "{c}")?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for Signature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Signature({self})")
    }
}

/// Data color space of a profile (or its PCS).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ColorSpace {
    /// Three-channel RGB.
    Rgb,
    /// Four-channel CMYK.
    Cmyk,
    /// Single channel gray.
    Gray,
    /// CIE XYZ (PCS).
    Xyz,
    /// CIE Lab (PCS).
    Lab,
    /// Anything else; kept so headers of exotic profiles still parse.
    Other(Signature),
}

impl ColorSpace {
    fn from_sig(sig: Signature) -> Self {
        match &sig.bytes() {
            b"RGB " => Self::Rgb,
            b"CMYK" => Self::Cmyk,
            b"GRAY" => Self::Gray,
            b"XYZ " => Self::Xyz,
            b"Lab " => Self::Lab,
            _ => Self::Other(sig),
        }
    }

    pub(crate) fn sig(self) -> Signature {
        match self {
            Self::Rgb => Signature::new(b"RGB "),
            Self::Cmyk => Signature::new(b"CMYK"),
            Self::Gray => Signature::new(b"GRAY"),
            Self::Xyz => Signature::new(b"XYZ "),
            Self::Lab => Signature::new(b"Lab "),
            Self::Other(sig) => sig,
        }
    }

    /// Number of device channels, if known.
    pub fn channels(self) -> Option<usize> {
        match self {
            Self::Gray => Some(1),
            Self::Rgb | Self::Xyz | Self::Lab => Some(3),
            Self::Cmyk => Some(4),
            Self::Other(_) => None,
        }
    }
}

/// Profile/device class.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProfileClass {
    /// `mntr`
    Display,
    /// `prtr`
    Output,
    /// `scnr`
    Input,
    /// `spac`
    ColorSpace,
    /// Any other class.
    Other(Signature),
}

impl ProfileClass {
    fn from_sig(sig: Signature) -> Self {
        match &sig.bytes() {
            b"mntr" => Self::Display,
            b"prtr" => Self::Output,
            b"scnr" => Self::Input,
            b"spac" => Self::ColorSpace,
            _ => Self::Other(sig),
        }
    }

    pub(crate) fn sig(self) -> Signature {
        match self {
            Self::Display => Signature::new(b"mntr"),
            Self::Output => Signature::new(b"prtr"),
            Self::Input => Signature::new(b"scnr"),
            Self::ColorSpace => Signature::new(b"spac"),
            Self::Other(sig) => sig,
        }
    }
}

/// The fixed 128-byte ICC header, reduced to the fields the transform needs.
#[derive(Clone, Debug, PartialEq)]
pub struct IccHeader {
    /// Declared profile size in bytes.
    pub size: u32,
    /// Encoded version, e.g. `0x0210_0000` for 2.1.
    pub version: u32,
    /// Device class.
    pub class: ProfileClass,
    /// Data color space.
    pub color_space: ColorSpace,
    /// Profile connection space (XYZ or Lab).
    pub pcs: ColorSpace,
    /// Default rendering intent.
    pub rendering_intent: u32,
    /// PCS illuminant, normally D50.
    pub illuminant: [f64; 3],
}

impl IccHeader {
    pub(crate) fn new(class: ProfileClass, color_space: ColorSpace, pcs: ColorSpace) -> Self {
        Self {
            size: 0,
            version: 0x0210_0000,
            class,
            color_space,
            pcs,
            rendering_intent: 0,
            illuminant: D50,
        }
    }

    /// Major.minor version, e.g. `(2, 1)`.
    pub fn version_pair(&self) -> (u8, u8) {
        let [major, minor, ..] = self.version.to_be_bytes();
        (major, minor >> 4)
    }

    pub(crate) fn parse(bytes: &[u8]) -> ProofResult<Self> {
        if bytes.len() < HEADER_LEN + 4 {
            return Err(ProofError::invalid_profile(format!(
                "profile is {} bytes, shorter than an ICC header",
                bytes.len()
            )));
        }
        if Signature(be_u32(bytes, 36)?) != MAGIC {
            return Err(ProofError::invalid_profile("missing 'acsp' signature"));
        }
        let size = be_u32(bytes, 0)?;
        if size as usize > bytes.len() || (size as usize) < HEADER_LEN {
            return Err(ProofError::invalid_profile(format!(
                "declared size {size} does not match {} available bytes",
                bytes.len()
            )));
        }
        let pcs = ColorSpace::from_sig(Signature(be_u32(bytes, 20)?));
        if !matches!(pcs, ColorSpace::Xyz | ColorSpace::Lab) {
            return Err(ProofError::invalid_profile(format!(
                "unsupported connection space '{}'",
                pcs.sig()
            )));
        }
        Ok(Self {
            size,
            version: be_u32(bytes, 8)?,
            class: ProfileClass::from_sig(Signature(be_u32(bytes, 12)?)),
            color_space: ColorSpace::from_sig(Signature(be_u32(bytes, 16)?)),
            pcs,
            rendering_intent: be_u32(bytes, 64)?,
            illuminant: read_xyz(bytes, 68)?,
        })
    }

    pub(crate) fn write(&self, out: &mut Vec<u8>) {
        let start = out.len();
        out.resize(start + HEADER_LEN, 0);
        let h = &mut out[start..start + HEADER_LEN];
        h[0..4].copy_from_slice(&self.size.to_be_bytes());
        h[4..8].copy_from_slice(b"sfpf");
        h[8..12].copy_from_slice(&self.version.to_be_bytes());
        h[12..16].copy_from_slice(&self.class.sig().bytes());
        h[16..20].copy_from_slice(&self.color_space.sig().bytes());
        h[20..24].copy_from_slice(&self.pcs.sig().bytes());
        h[36..40].copy_from_slice(&MAGIC.bytes());
        h[64..68].copy_from_slice(&self.rendering_intent.to_be_bytes());
        for (i, v) in self.illuminant.iter().enumerate() {
            let at = 68 + i * 4;
            h[at..at + 4].copy_from_slice(&s15f16_bytes(*v));
        }
        h[80..84].copy_from_slice(b"sfpf");
    }
}

pub(crate) fn be_u8(bytes: &[u8], at: usize) -> ProofResult<u8> {
    bytes
        .get(at)
        .copied()
        .ok_or_else(|| ProofError::invalid_profile(format!("read past end at offset {at}")))
}

pub(crate) fn be_u16(bytes: &[u8], at: usize) -> ProofResult<u16> {
    let s = slice(bytes, at, 2)?;
    Ok(u16::from_be_bytes([s[0], s[1]]))
}

pub(crate) fn be_u32(bytes: &[u8], at: usize) -> ProofResult<u32> {
    let s = slice(bytes, at, 4)?;
    Ok(u32::from_be_bytes([s[0], s[1], s[2], s[3]]))
}

pub(crate) fn s15f16(bytes: &[u8], at: usize) -> ProofResult<f64> {
    Ok(f64::from(be_u32(bytes, at)? as i32) / 65536.0)
}

pub(crate) fn read_xyz(bytes: &[u8], at: usize) -> ProofResult<Vec3> {
    Ok([
        s15f16(bytes, at)?,
        s15f16(bytes, at + 4)?,
        s15f16(bytes, at + 8)?,
    ])
}

pub(crate) fn slice(bytes: &[u8], at: usize, len: usize) -> ProofResult<&[u8]> {
    at.checked_add(len)
        .and_then(|end| bytes.get(at..end))
        .ok_or_else(|| {
            ProofError::invalid_profile(format!("{len} bytes at offset {at} exceed profile data"))
        })
}

pub(crate) fn s15f16_bytes(v: f64) -> [u8; 4] {
    ((v * 65536.0).round() as i32).to_be_bytes()
}
