//! Profile byte resolution.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::Context as _;

use crate::foundation::error::{ProfileRole, ProofError, ProofResult};
use crate::icc::fingerprint;
use crate::profile::catalog::BuiltinProfile;

/// Where profile bytes came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProfileOrigin {
    /// The fixed built-in catalog.
    BuiltIn,
    /// Supplied by the user for this session.
    Custom,
}

/// Resolved, immutable profile bytes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ColorProfile {
    /// Profile id as requested.
    pub id: String,
    /// ICC bytes.
    pub bytes: Arc<[u8]>,
    /// Provenance.
    pub origin: ProfileOrigin,
}

impl ColorProfile {
    /// Owned copy of the bytes for an engine message. The shared copy stays valid.
    pub fn to_engine_bytes(&self) -> Vec<u8> {
        self.bytes.to_vec()
    }

    /// xxh3 fingerprint of the bytes.
    pub fn fingerprint(&self) -> u64 {
        fingerprint(&self.bytes)
    }
}

/// Byte provider for the built-in catalog.
pub trait ProfileFetcher: Send + Sync {
    /// Fetch the bytes of `profile`.
    fn fetch(&self, profile: BuiltinProfile) -> anyhow::Result<Vec<u8>>;
}

/// Reads `<root>/<file_name>` for each built-in.
#[derive(Clone, Debug)]
pub struct DirectoryFetcher {
    root: PathBuf,
}

impl DirectoryFetcher {
    /// Catalog rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Catalog directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Write every built-in into the catalog directory, creating it if needed.
    pub fn populate(&self) -> ProofResult<Vec<PathBuf>> {
        std::fs::create_dir_all(&self.root)?;
        BuiltinProfile::ALL
            .into_iter()
            .map(|p| {
                let path = self.root.join(p.file_name());
                std::fs::write(&path, p.synthesize())?;
                Ok(path)
            })
            .collect()
    }
}

impl ProfileFetcher for DirectoryFetcher {
    fn fetch(&self, profile: BuiltinProfile) -> anyhow::Result<Vec<u8>> {
        let path = self.root.join(profile.file_name());
        std::fs::read(&path).with_context(|| format!("read profile '{}'", path.display()))
    }
}

/// Host-provided bytes. Profiles not inserted fail to fetch.
#[derive(Clone, Debug, Default)]
pub struct MemoryFetcher {
    profiles: HashMap<BuiltinProfile, Arc<[u8]>>,
}

impl MemoryFetcher {
    /// Empty fetcher.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace the bytes for `profile`.
    pub fn with(mut self, profile: BuiltinProfile, bytes: impl Into<Arc<[u8]>>) -> Self {
        self.profiles.insert(profile, bytes.into());
        self
    }
}

impl ProfileFetcher for MemoryFetcher {
    fn fetch(&self, profile: BuiltinProfile) -> anyhow::Result<Vec<u8>> {
        self.profiles
            .get(&profile)
            .map(|b| b.to_vec())
            .ok_or_else(|| anyhow::anyhow!("'{profile}' is not available"))
    }
}

/// Generates built-ins on demand and keeps the generated bytes.
#[derive(Debug, Default)]
pub struct SyntheticFetcher {
    generated: Mutex<HashMap<BuiltinProfile, Arc<[u8]>>>,
}

impl SyntheticFetcher {
    /// Fetcher with nothing generated yet.
    pub fn new() -> Self {
        Self::default()
    }
}

impl ProfileFetcher for SyntheticFetcher {
    fn fetch(&self, profile: BuiltinProfile) -> anyhow::Result<Vec<u8>> {
        let mut generated = self.generated.lock().unwrap_or_else(|e| e.into_inner());
        let bytes = generated
            .entry(profile)
            .or_insert_with(|| profile.synthesize().into());
        Ok(bytes.to_vec())
    }
}

/// Resolves profile ids to bytes: session custom profiles first, then the built-in catalog.
///
/// Cloning is cheap; clones share the fetcher but own their custom profile map.
#[derive(Clone)]
pub struct ProfileSource {
    fetcher: Arc<dyn ProfileFetcher>,
    custom: HashMap<String, Arc<[u8]>>,
}

impl ProfileSource {
    /// Source backed by `fetcher`.
    pub fn new(fetcher: impl ProfileFetcher + 'static) -> Self {
        Self::from_shared(Arc::new(fetcher))
    }

    /// Source sharing an existing fetcher.
    pub fn from_shared(fetcher: Arc<dyn ProfileFetcher>) -> Self {
        Self {
            fetcher,
            custom: HashMap::new(),
        }
    }

    /// Source generating the built-ins in memory.
    pub fn synthetic() -> Self {
        Self::new(SyntheticFetcher::new())
    }

    /// Register session-scoped custom bytes under `id`. Replaces an earlier registration.
    pub fn insert_custom(&mut self, id: impl Into<String>, bytes: Arc<[u8]>) {
        self.custom.insert(id.into(), bytes);
    }

    /// Forget a custom profile. Returns whether it was registered.
    pub fn remove_custom(&mut self, id: &str) -> bool {
        self.custom.remove(id).is_some()
    }

    /// `true` when `id` names a registered custom profile.
    pub fn has_custom(&self, id: &str) -> bool {
        self.custom.contains_key(id)
    }

    /// Resolve an output profile id.
    pub fn resolve(&self, profile_id: &str) -> ProofResult<ColorProfile> {
        self.resolve_as(ProfileRole::Output, profile_id)
    }

    /// Resolve `profile_id`, naming `role` in any error.
    #[tracing::instrument(skip(self), level = "debug")]
    pub fn resolve_as(&self, role: ProfileRole, profile_id: &str) -> ProofResult<ColorProfile> {
        if let Some(bytes) = self.custom.get(profile_id) {
            if bytes.is_empty() {
                return Err(ProofError::profile_unavailable(
                    role,
                    profile_id,
                    "custom profile is empty",
                ));
            }
            return Ok(ColorProfile {
                id: profile_id.to_string(),
                bytes: bytes.clone(),
                origin: ProfileOrigin::Custom,
            });
        }

        let builtin = BuiltinProfile::from_id(profile_id).ok_or_else(|| {
            ProofError::profile_unavailable(role, profile_id, "unknown profile id")
        })?;
        let bytes = self
            .fetcher
            .fetch(builtin)
            .map_err(|e| ProofError::profile_unavailable(role, profile_id, format!("{e:#}")))?;
        if bytes.is_empty() {
            return Err(ProofError::profile_unavailable(
                role,
                profile_id,
                "fetch returned no data",
            ));
        }
        Ok(ColorProfile {
            id: profile_id.to_string(),
            bytes: bytes.into(),
            origin: ProfileOrigin::BuiltIn,
        })
    }
}

impl std::fmt::Debug for ProfileSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut custom: Vec<&str> = self.custom.keys().map(String::as_str).collect();
        custom.sort_unstable();
        f.debug_struct("ProfileSource")
            .field("custom", &custom)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[path = "../../tests/unit/profile/source.rs"]
mod tests;
