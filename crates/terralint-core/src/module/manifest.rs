//! `.terraform/modules/modules.json`, written by `terraform init` for every
//! installed module.

use std::path::{Path, PathBuf};

use super::normalize_path;

pub const MANIFEST_PATH: &str = ".terraform/modules/modules.json";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ModuleManifest {
    #[serde(rename = "Modules", default)]
    pub modules: Vec<ManifestEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ManifestEntry {
    /// Dot separated call names from the root, e.g. `network.subnets`.
    #[serde(rename = "Key")]
    pub key: String,
    #[serde(rename = "Source", default)]
    pub source: String,
    #[serde(rename = "Version", default)]
    pub version: Option<String>,
    #[serde(rename = "Dir")]
    pub dir: String,
}

impl ModuleManifest {
    pub fn from_json(content: &str) -> Result<Self, String> {
        serde_json::from_str(content).map_err(|e| format!("invalid module manifest: {}", e))
    }

    /// Directory an installed module was unpacked to, relative to the root
    /// module. `key` is the dot separated path of call names.
    pub fn installed_dir(&self, key: &str, source: &str) -> Option<PathBuf> {
        self.modules
            .iter()
            .find(|entry| entry.key == key && (entry.source == source || entry.source.is_empty()))
            .map(|entry| normalize_path(Path::new(&entry.dir)))
    }
}
