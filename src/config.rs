use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::types::OutputFormat;

/// Environment variable naming the settings file used when no arguments
/// are given.
pub const CONFIG_ENV_VAR: &str = "PRQUEUE_CONFIG";

pub const DEFAULT_CONFIG_FILE: &str = "settings.json";

/// Defaults for the `queue` command, read from a JSON file. Command-line
/// arguments take precedence over every field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Settings {
    pub org: Option<String>,
    pub output: Option<OutputFormat>,
    #[serde(default)]
    pub ignore: Vec<String>,
    pub open: Option<bool>,
}

impl Settings {
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file '{}'", path.display()))?;
        serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse config file '{}'", path.display()))
    }
}

pub fn default_config_path() -> PathBuf {
    std::env::var_os(CONFIG_ENV_VAR)
        .filter(|p| !p.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE))
}
