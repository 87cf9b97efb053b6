//! CLI configuration loaded from the user config directory.

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Optional defaults for the `filterbar` CLI, read from
/// `<config dir>/filterbar/filterbar.toml`. A missing file is fine.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Default output format for CLI commands (`json`, `yaml` or `toml`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_output: Option<String>,
    /// Schema file used when a command omits its schema argument.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_schema: Option<PathBuf>,
}

impl Config {
    /// Location of the config file, when a config directory exists.
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("filterbar").join("filterbar.toml"))
    }

    /// Load the config file; a missing file yields defaults.
    pub fn load() -> Result<Self> {
        match Self::config_path() {
            Some(path) if path.exists() => Self::load_from(&path),
            _ => Ok(Self::default()),
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Resolve the schema path for a command: the explicit argument wins,
    /// then the configured default.
    pub fn resolve_schema_path(&self, explicit: Option<&Path>) -> Option<PathBuf> {
        explicit
            .map(Path::to_path_buf)
            .or_else(|| self.default_schema.clone())
    }
}
