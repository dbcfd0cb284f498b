use std::collections::BTreeMap;

use crate::foundation::error::{ProofError, ProofResult};
use crate::foundation::math::{D50, Vec3};
use crate::icc::header::{HEADER_LEN, IccHeader, Signature, be_u32, slice};
use crate::icc::lut::Lut;
use crate::icc::tags::{
    Curve, TAG_BXYZ, TAG_DESC, TAG_GXYZ, TAG_RXYZ, TAG_RTRC, TAG_WTPT, TagData, parse_tag,
};

const MAX_TAGS: usize = 100;

/// A decoded ICC profile: header plus every tag the codec understands.
#[derive(Clone, Debug, PartialEq)]
pub struct IccProfile {
    /// Parsed header.
    pub header: IccHeader,
    tags: BTreeMap<Signature, TagData>,
}

impl IccProfile {
    /// Decode `bytes`.
    ///
    /// Validates the header, the size field and the bounds of every tag table entry. Tags with
    /// unknown types are kept as [`TagData::Unsupported`].
    pub fn parse(bytes: &[u8]) -> ProofResult<Self> {
        let header = IccHeader::parse(bytes)?;
        let bytes = &bytes[..header.size as usize];
        let count = be_u32(bytes, HEADER_LEN)? as usize;
        if count > MAX_TAGS {
            return Err(ProofError::invalid_profile(format!(
                "tag count {count} exceeds {MAX_TAGS}"
            )));
        }
        let mut tags = BTreeMap::new();
        for i in 0..count {
            let entry = HEADER_LEN + 4 + i * 12;
            let sig = Signature(be_u32(bytes, entry)?);
            let offset = be_u32(bytes, entry + 4)? as usize;
            let len = be_u32(bytes, entry + 8)? as usize;
            let data = slice(bytes, offset, len).map_err(|_| {
                ProofError::invalid_profile(format!(
                    "tag '{sig}' ({len} bytes at {offset}) lies outside the profile"
                ))
            })?;
            let tag = parse_tag(data).map_err(|e| match e {
                ProofError::InvalidProfile(msg) => {
                    ProofError::invalid_profile(format!("tag '{sig}': {msg}"))
                }
                other => other,
            })?;
            tags.insert(sig, tag);
        }
        Ok(Self { header, tags })
    }

    /// Raw tag lookup.
    pub fn tag(&self, sig: Signature) -> Option<&TagData> {
        self.tags.get(&sig)
    }

    /// Signatures of all tags, in byte order.
    pub fn tag_signatures(&self) -> impl Iterator<Item = Signature> + '_ {
        self.tags.keys().copied()
    }

    pub(crate) fn xyz(&self, sig: Signature) -> Option<Vec3> {
        match self.tags.get(&sig)? {
            TagData::Xyz(v) => Some(*v),
            _ => None,
        }
    }

    pub(crate) fn curve(&self, sig: Signature) -> Option<&Curve> {
        match self.tags.get(&sig)? {
            TagData::Curve(c) => Some(c),
            _ => None,
        }
    }

    pub(crate) fn lut(&self, sig: Signature) -> Option<&Lut> {
        match self.tags.get(&sig)? {
            TagData::Lut(l) => Some(l),
            _ => None,
        }
    }

    /// Media white point, D50 when the profile does not carry one.
    pub fn media_white(&self) -> Vec3 {
        self.xyz(TAG_WTPT).unwrap_or(D50)
    }

    /// Profile description, if present.
    pub fn description(&self) -> Option<&str> {
        match self.tags.get(&TAG_DESC)? {
            TagData::Text(s) => Some(s),
            _ => None,
        }
    }

    /// `true` when the profile carries colorants and a red TRC (matrix/shaper model).
    pub fn is_matrix_shaper(&self) -> bool {
        [TAG_RXYZ, TAG_GXYZ, TAG_BXYZ]
            .into_iter()
            .all(|s| self.xyz(s).is_some())
            && self.curve(TAG_RTRC).is_some()
    }
}

/// Assembles profile bytes: header, tag table, tag data aligned to four bytes.
pub(crate) struct ProfileWriter {
    header: IccHeader,
    tags: Vec<(Signature, Vec<u8>)>,
}

impl ProfileWriter {
    pub(crate) fn new(header: IccHeader) -> Self {
        Self {
            header,
            tags: Vec::new(),
        }
    }

    pub(crate) fn tag(mut self, sig: Signature, data: Vec<u8>) -> Self {
        self.tags.push((sig, data));
        self
    }

    pub(crate) fn finish(self) -> Vec<u8> {
        let mut out = Vec::new();
        self.header.write(&mut out);
        out.extend_from_slice(&(self.tags.len() as u32).to_be_bytes());
        let table_at = out.len();
        out.resize(table_at + self.tags.len() * 12, 0);

        for (i, (sig, data)) in self.tags.iter().enumerate() {
            while out.len() % 4 != 0 {
                out.push(0);
            }
            let offset = out.len() as u32;
            out.extend_from_slice(data);
            let entry = table_at + i * 12;
            out[entry..entry + 4].copy_from_slice(&sig.bytes());
            out[entry + 4..entry + 8].copy_from_slice(&offset.to_be_bytes());
            out[entry + 8..entry + 12].copy_from_slice(&(data.len() as u32).to_be_bytes());
        }
        while out.len() % 4 != 0 {
            out.push(0);
        }
        let size = out.len() as u32;
        out[0..4].copy_from_slice(&size.to_be_bytes());
        out
    }
}
