// src/config.rs
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};

use crate::image_codec::DEFAULT_LINEAR_SCAN_THRESHOLD;

const SETTINGS_FILE: &str = "settings.toml";

/// Tunables for the image placeholder codec
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CodecSettings {
    /// How many images a preview renders in full
    pub max_preview_images: usize,
    /// Replacement map size above which unused entries are pruned
    pub prune_threshold: usize,
    /// Document size (bytes) above which images are found by the linear scanner
    pub linear_scan_threshold: usize,
}

impl Default for CodecSettings {
    fn default() -> Self {
        Self {
            max_preview_images: 10,
            prune_threshold: 50,
            linear_scan_threshold: DEFAULT_LINEAR_SCAN_THRESHOLD,
        }
    }
}

impl CodecSettings {
    /// Load from the user config directory, defaults if there is no file yet
    pub fn load() -> Result<Self> {
        Self::load_from(&settings_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::debug!("No settings at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Failed to parse settings {}", path.display()))
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&settings_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create config directory {}", dir.display()))?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize settings")?;
        fs::write(path, content)
            .with_context(|| format!("Failed to write settings {}", path.display()))
    }
}

/// Get the config directory for marknote
pub fn config_dir() -> Result<PathBuf> {
    dirs::config_dir()
        .map(|p| p.join("marknote"))
        .ok_or_else(|| anyhow!("Could not determine config directory"))
}

fn settings_path() -> Result<PathBuf> {
    config_dir().map(|p| p.join(SETTINGS_FILE))
}
