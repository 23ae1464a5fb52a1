use crate::error::{Result, SyncError};
use crate::fingerprint::FingerprintAlgorithm;
use crate::sync::reconcile::DirectoryPolicy;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Named mirror profiles loaded from `<config_dir>/mirror/config.toml`
///
/// ```toml
/// [profiles.photos]
/// source = "/home/me/photos"
/// replica = "/mnt/backup/photos"
/// interval = "5m"
/// log_file = "/var/log/mirror-photos.log"
/// dirs = "merge"
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub profiles: BTreeMap<String, Profile>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replica: Option<PathBuf>,
    /// Same syntax as the command line interval ("30", "500ms", "5m")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interval: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_file: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fingerprint: Option<FingerprintAlgorithm>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dirs: Option<DirectoryPolicy>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_depth: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preserve_metadata: Option<bool>,
}

impl Config {
    pub fn config_path() -> Result<PathBuf> {
        let dir = dirs::config_dir()
            .ok_or_else(|| SyncError::Config("Could not determine config directory".to_string()))?;
        Ok(dir.join("mirror").join("config.toml"))
    }

    /// Load the user config, or an empty one if there is no config file
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
            .map_err(|e| SyncError::Config(format!("{}: {}", path.display(), e)))
    }

    pub fn parse(content: &str) -> std::result::Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    pub fn list_profiles(&self) -> Vec<&str> {
        self.profiles.keys().map(String::as_str).collect()
    }

    pub fn get_profile(&self, name: &str) -> Option<&Profile> {
        self.profiles.get(name)
    }

    /// Render a profile as TOML for display
    pub fn show_profile(&self, name: &str) -> Option<String> {
        let profile = self.profiles.get(name)?;
        let body = toml::to_string_pretty(profile).ok()?;
        Some(format!("[profiles.{}]\n{}", name, body))
    }
}
