//! Profile catalog and byte resolution.

pub mod catalog;
pub mod source;

pub use catalog::{BuiltinProfile, deprecated_ids, migrate_deprecated};
pub use source::{
    ColorProfile, DirectoryFetcher, MemoryFetcher, ProfileFetcher, ProfileOrigin, ProfileSource,
    SyntheticFetcher,
};

/// Id of the working space every design is authored in.
pub const SOURCE_PROFILE_ID: &str = "srgb";
