use std::path::{Path, PathBuf};
use std::fs;

use anyhow::Context;

use crate::filter::{Direction, FilterParams};
use crate::image::ImageStore;

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct Config {
    /// where inbound images and filter results are written
    pub images_dir: PathBuf,
    // JPEG quality: 1-100
    pub jpeg_quality: u8,
    pub concat_direction: Direction,
    pub filters: FilterParams,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            images_dir: PathBuf::from("images"),
            jpeg_quality: 85,
            concat_direction: Direction::Horizontal,
            filters: FilterParams::default(),
        }
    }
}

impl Config {
    /// Load from the user config file, if there is a readable one
    pub fn load() -> Option<Self> {
        let config_path = Self::config_path()?;

        fs::read_to_string(&config_path)
            .ok()
            .and_then(|contents| serde_json::from_str(&contents).ok())
    }

    /// Load from an explicit path, failing loudly
    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        serde_json::from_str(&contents)
            .with_context(|| format!("Invalid config file {}", path.display()))
    }

    pub fn to_json(&self) -> anyhow::Result<String> {
        serde_json::to_string_pretty(self).context("Failed to serialize config")
    }

    /// Write to `path`, creating missing parent directories
    pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }

        fs::write(path, self.to_json()?)
            .with_context(|| format!("Failed to write config file {}", path.display()))
    }

    pub fn config_path() -> Option<PathBuf> {
        let home = std::env::home_dir()?;
        Some(home.join(".config").join("filterbot").join("config.json"))
    }

    pub fn image_store(&self) -> ImageStore {
        ImageStore::new(&self.images_dir, self.jpeg_quality)
    }
}
