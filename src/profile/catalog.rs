//! Built-in profile catalog and retired id migration.

use crate::icc::{PrintCondition, print_profile, srgb_profile};

/// Profiles every deployment ships.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BuiltinProfile {
    /// sRGB working space, the source of every design.
    Srgb,
    /// Coated sheet-fed offset.
    OffsetStandard,
    /// Uncoated offset.
    OffsetUncoated,
    /// Coldset newsprint.
    Newsprint,
}

/// Retired profile ids and their replacements.
const DEPRECATED: &[(&str, BuiltinProfile)] = &[
    ("coated-fogra27", BuiltinProfile::OffsetStandard),
    ("coated-fogra39", BuiltinProfile::OffsetStandard),
    ("iso-coated-v2", BuiltinProfile::OffsetStandard),
    ("uncoated-fogra29", BuiltinProfile::OffsetUncoated),
    ("isonewspaper26", BuiltinProfile::Newsprint),
];

impl BuiltinProfile {
    /// Every built-in, in catalog order.
    pub const ALL: [Self; 4] = [
        Self::Srgb,
        Self::OffsetStandard,
        Self::OffsetUncoated,
        Self::Newsprint,
    ];

    /// Stable id used in settings and requests.
    pub fn id(self) -> &'static str {
        match self {
            Self::Srgb => "srgb",
            Self::OffsetStandard => "offset-standard",
            Self::OffsetUncoated => "offset-uncoated",
            Self::Newsprint => "newsprint",
        }
    }

    /// File name inside a catalog directory.
    pub fn file_name(self) -> &'static str {
        match self {
            Self::Srgb => "srgb.icc",
            Self::OffsetStandard => "offset-standard.icc",
            Self::OffsetUncoated => "offset-uncoated.icc",
            Self::Newsprint => "newsprint.icc",
        }
    }

    /// Short label for pickers.
    pub fn label(self) -> &'static str {
        match self {
            Self::Srgb => "sRGB (screen)",
            Self::OffsetStandard => "Offset, coated paper",
            Self::OffsetUncoated => "Offset, uncoated paper",
            Self::Newsprint => "Newsprint",
        }
    }

    /// `true` for print conditions (valid output profiles).
    pub fn is_print(self) -> bool {
        !matches!(self, Self::Srgb)
    }

    /// Look up a current id.
    pub fn from_id(id: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.id() == id)
    }

    /// Generate the profile bytes.
    pub fn synthesize(self) -> Vec<u8> {
        match self {
            Self::Srgb => srgb_profile(),
            Self::OffsetStandard => print_profile(&PrintCondition::offset_standard()),
            Self::OffsetUncoated => print_profile(&PrintCondition::offset_uncoated()),
            Self::Newsprint => print_profile(&PrintCondition::newsprint()),
        }
    }
}

impl std::fmt::Display for BuiltinProfile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.id())
    }
}

/// Map a retired profile id to its replacement. Current and unknown ids pass through.
pub fn migrate_deprecated(id: &str) -> String {
    DEPRECATED
        .iter()
        .find(|(old, _)| *old == id)
        .map_or_else(|| id.to_string(), |(_, new)| new.id().to_string())
}

/// Retired ids known to [`migrate_deprecated`].
pub fn deprecated_ids() -> impl Iterator<Item = (&'static str, BuiltinProfile)> {
    DEPRECATED.iter().copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_round_trip() {
        for p in BuiltinProfile::ALL {
            assert_eq!(BuiltinProfile::from_id(p.id()), Some(p));
            assert!(p.file_name().starts_with(p.id()));
        }
        assert_eq!(BuiltinProfile::from_id("coated-fogra27"), None);
    }

    #[test]
    fn retired_ids_migrate_and_others_pass_through() {
        assert_eq!(migrate_deprecated("coated-fogra27"), "offset-standard");
        assert_eq!(migrate_deprecated("isonewspaper26"), "newsprint");
        assert_eq!(migrate_deprecated("offset-standard"), "offset-standard");
        assert_eq!(migrate_deprecated("custom-42"), "custom-42");
        for (old, new) in deprecated_ids() {
            assert!(BuiltinProfile::from_id(old).is_none());
            assert!(new.is_print());
        }
    }
}
