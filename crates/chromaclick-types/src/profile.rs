use std::{collections::BTreeMap, fs, path::Path};

use serde::{Deserialize, Serialize};

use crate::{
    color::Color,
    config::{Connectivity, DetectionSettings, DEFAULT_MIN_AREA},
    geometry::Region,
    ChromaError, Result,
};

/// A named detection preset as stored on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub color: Color,
    pub tolerance: u32,
    #[serde(default)]
    pub use_region: bool,
    #[serde(default)]
    pub region: Option<Region>,
}

impl Profile {
    pub fn from_settings(settings: &DetectionSettings) -> Self {
        Self {
            color: settings.color,
            tolerance: settings.tolerance,
            use_region: settings.region.is_some(),
            region: settings.region,
        }
    }

    pub fn to_settings(&self) -> DetectionSettings {
        DetectionSettings {
            color: self.color,
            tolerance: self.tolerance,
            region: self.region.filter(|_| self.use_region),
            min_area: DEFAULT_MIN_AREA,
            connectivity: Connectivity::default(),
        }
    }
}

/// Name-keyed collection of profiles persisted as one JSON object.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProfileBook {
    profiles: BTreeMap<String, Profile>,
}

impl ProfileBook {
    /// A missing file yields an empty book.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_ref = path.as_ref();
        if !path_ref.exists() {
            return Ok(Self::default());
        }
        let contents = fs::read_to_string(path_ref).map_err(|err| {
            ChromaError::Profile(format!("unable to read {}: {err}", path_ref.display()))
        })?;
        serde_json::from_str(&contents).map_err(|err| {
            ChromaError::Profile(format!("failed to parse {}: {err}", path_ref.display()))
        })
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path_ref = path.as_ref();
        let doc = serde_json::to_string_pretty(self)
            .map_err(|err| ChromaError::Profile(format!("failed to encode profiles: {err}")))?;
        fs::write(path_ref, doc).map_err(|err| {
            ChromaError::Profile(format!("unable to write {}: {err}", path_ref.display()))
        })
    }

    pub fn get(&self, name: &str) -> Option<&Profile> {
        self.profiles.get(name)
    }

    /// Returns the profile previously stored under `name`, if any.
    pub fn insert(&mut self, name: impl Into<String>, profile: Profile) -> Result<Option<Profile>> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(ChromaError::Profile("profile name must not be empty".into()));
        }
        Ok(self.profiles.insert(name, profile))
    }

    pub fn remove(&mut self, name: &str) -> Option<Profile> {
        self.profiles.remove(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.profiles.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}
