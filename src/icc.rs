//! ICC profile codec.
//!
//! Reads the subset of ICC v2/v4 needed for soft proofing: matrix/TRC RGB profiles and LUT-based
//! (`mft1`/`mft2`) output profiles. [`builder`] writes synthetic profiles in the same subset.

pub mod builder;
pub(crate) mod header;
pub(crate) mod lut;
pub(crate) mod profile;
pub(crate) mod tags;

pub use builder::{PrintCondition, matrix_rgb_profile, print_profile, srgb_profile};
pub use header::{ColorSpace, IccHeader, ProfileClass, Signature};
pub use lut::{Lut, LutPrecision};
pub use profile::IccProfile;
pub use tags::{Curve, TagData};

/// Fingerprint of raw profile bytes (xxh3), used to identify profiles in logs and the CLI.
pub fn fingerprint(bytes: &[u8]) -> u64 {
    xxhash_rust::xxh3::xxh3_64(bytes)
}
