use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::converter::{ConvertOptions, DEFAULT_YEAR};
use crate::error::{Result, ShushiError};
use crate::resolver::DEFAULT_SUMMARY_MARKER;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default = "default_year")]
    pub default_year: i32,
    #[serde(default = "default_summary_marker")]
    pub summary_marker: String,
}

fn default_year() -> i32 {
    DEFAULT_YEAR
}

fn default_summary_marker() -> String {
    DEFAULT_SUMMARY_MARKER.to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            default_year: default_year(),
            summary_marker: default_summary_marker(),
        }
    }
}

impl Settings {
    /// Conversion options, with an explicit year taking precedence over the default.
    pub fn convert_options(&self, year: Option<i32>) -> ConvertOptions {
        ConvertOptions {
            year: year.unwrap_or(self.default_year),
            summary_marker: self.summary_marker.clone(),
        }
    }
}

fn config_dir() -> PathBuf {
    if let Some(dir) = std::env::var_os("SHUSHI_CONFIG_DIR") {
        return PathBuf::from(dir);
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("shushi")
}

pub fn settings_path() -> PathBuf {
    config_dir().join("settings.json")
}

pub fn load_settings_from(path: &Path) -> Settings {
    if path.exists() {
        let content = std::fs::read_to_string(path).unwrap_or_default();
        serde_json::from_str(&content).unwrap_or_else(|e| {
            tracing::warn!(path = %path.display(), "ignoring unreadable settings: {e}");
            Settings::default()
        })
    } else {
        Settings::default()
    }
}

pub fn load_settings() -> Settings {
    load_settings_from(&settings_path())
}

pub fn save_settings_to(settings: &Settings, path: &Path) -> Result<()> {
    if settings.summary_marker.is_empty() {
        return Err(ShushiError::Settings("summary marker must not be empty".into()));
    }
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)?;
    }
    let json = serde_json::to_string_pretty(settings)
        .map_err(|e| ShushiError::Settings(e.to_string()))?;
    std::fs::write(path, format!("{json}\n"))?;
    Ok(())
}

pub fn save_settings(settings: &Settings) -> Result<()> {
    save_settings_to(settings, &settings_path())
}
