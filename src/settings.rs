//! Proofing settings and their persisted form.
//!
//! Loading and saving are plain functions at the process boundary; the live value is owned by
//! the scheduler.

use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::foundation::error::{ProofError, ProofResult};
use crate::profile::{BuiltinProfile, migrate_deprecated};

/// Output profile selected when nothing was persisted.
pub const DEFAULT_OUTPUT_PROFILE: &str = "offset-standard";

/// User-supplied profile, valid for one session only.
#[derive(Clone, PartialEq, Eq)]
pub struct CustomProfile {
    /// Id the profile is selected by.
    pub id: String,
    /// Display name.
    pub name: String,
    /// ICC bytes.
    pub bytes: Arc<[u8]>,
}

impl std::fmt::Debug for CustomProfile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CustomProfile")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("bytes", &self.bytes.len())
            .finish()
    }
}

/// Proofing settings of one editing session.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProofSettings {
    /// Whether soft proofing is on.
    pub enabled: bool,
    /// Selected output profile (built-in id or the custom profile's id).
    pub output_profile_id: String,
    /// Whether previews carry a gamut mask.
    pub show_gamut_warning: bool,
    /// Session-scoped custom profile. Never persisted.
    pub custom_profile: Option<CustomProfile>,
}

impl Default for ProofSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            output_profile_id: DEFAULT_OUTPUT_PROFILE.to_string(),
            show_gamut_warning: false,
            custom_profile: None,
        }
    }
}

/// Flat on-disk record.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PersistedSettings {
    /// See [`ProofSettings::enabled`].
    pub enabled: bool,
    /// See [`ProofSettings::output_profile_id`].
    pub output_profile_id: String,
    /// See [`ProofSettings::show_gamut_warning`].
    pub show_gamut_warning: bool,
}

impl Default for PersistedSettings {
    fn default() -> Self {
        ProofSettings::default().to_persisted()
    }
}

impl ProofSettings {
    /// Settings from a persisted record, with retired profile ids migrated.
    pub fn from_persisted(p: PersistedSettings) -> Self {
        let output_profile_id = migrate_deprecated(&p.output_profile_id);
        if output_profile_id != p.output_profile_id {
            tracing::info!(
                from = %p.output_profile_id,
                to = %output_profile_id,
                "migrated retired output profile"
            );
        }
        Self {
            enabled: p.enabled,
            output_profile_id,
            show_gamut_warning: p.show_gamut_warning,
            custom_profile: None,
        }
    }

    /// Persisted record; the custom profile is dropped.
    ///
    /// A selected custom profile cannot be restored next session, so the default built-in is
    /// persisted in its place.
    pub fn to_persisted(&self) -> PersistedSettings {
        let custom_selected = self
            .custom_profile
            .as_ref()
            .is_some_and(|c| c.id == self.output_profile_id);
        let output_profile_id = if custom_selected {
            DEFAULT_OUTPUT_PROFILE.to_string()
        } else {
            self.output_profile_id.clone()
        };
        PersistedSettings {
            enabled: self.enabled,
            output_profile_id,
            show_gamut_warning: self.show_gamut_warning,
        }
    }

    /// Parse a persisted JSON record.
    pub fn from_json(json: &str) -> ProofResult<Self> {
        let p: PersistedSettings =
            serde_json::from_str(json).map_err(|e| ProofError::serde(e.to_string()))?;
        Ok(Self::from_persisted(p))
    }

    /// Serialize to the persisted JSON record.
    pub fn to_json(&self) -> ProofResult<String> {
        serde_json::to_string_pretty(&self.to_persisted())
            .map_err(|e| ProofError::serde(e.to_string()))
    }

    /// Load settings from `path`. A missing file yields the defaults.
    pub fn load(path: &Path) -> ProofResult<Self> {
        match std::fs::read_to_string(path) {
            Ok(json) => Self::from_json(&json),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "no saved proof settings");
                Ok(Self::default())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Save settings to `path`, creating parent directories.
    pub fn save(&self, path: &Path) -> ProofResult<()> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }

    /// The active custom profile, if it is the selected output.
    pub fn selected_custom(&self) -> Option<&CustomProfile> {
        self.custom_profile
            .as_ref()
            .filter(|c| c.id == self.output_profile_id)
    }

    /// `true` when the selection names a built-in or the registered custom profile.
    pub fn selection_is_known(&self) -> bool {
        BuiltinProfile::from_id(&self.output_profile_id).is_some() || self.selected_custom().is_some()
    }
}
