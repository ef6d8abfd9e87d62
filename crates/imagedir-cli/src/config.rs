//! Shell configuration – reads `~/.imagedir/config.toml`.

use std::fs;
use std::path::{Path, PathBuf};

use imagedir_hal::{Attributes, ImageDirConfig};
use serde::{Deserialize, Serialize};

/// Persisted shell configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Instance name the camera is registered under.
    #[serde(default = "default_name")]
    pub name: String,

    /// Camera attributes, flattened into the top level of the file.
    #[serde(flatten)]
    pub camera: ImageDirConfig,

    /// Mime type requested when a command does not name one.
    #[serde(default = "default_mime")]
    pub default_mime: String,
}

fn default_name() -> String {
    "image-dir".to_string()
}
fn default_mime() -> String {
    "image/jpeg".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            name: default_name(),
            camera: ImageDirConfig::default(),
            default_mime: default_mime(),
        }
    }
}

impl Config {
    /// Attribute map handed to the camera registry.
    pub fn attributes(&self) -> Attributes {
        self.camera.to_attributes()
    }
}

/// `$IMAGEDIR_CONFIG` when set, otherwise `~/.imagedir/config.toml`.
pub fn config_path() -> PathBuf {
    if let Ok(path) = std::env::var("IMAGEDIR_CONFIG") {
        return PathBuf::from(path);
    }
    config_path_for_home(
        &std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string()),
    )
}

pub(crate) fn config_path_for_home(home: &str) -> PathBuf {
    PathBuf::from(home).join(".imagedir").join("config.toml")
}

/// Load the config with environment overrides applied. A missing file
/// yields the defaults.
pub fn load() -> Result<Config, String> {
    let mut cfg = load_from(&config_path())?.unwrap_or_default();
    apply_env_overrides(&mut cfg);
    Ok(cfg)
}

/// Load the config from a specific path. Returns `None` if it does not exist.
pub(crate) fn load_from(path: &Path) -> Result<Option<Config>, String> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read config at {}: {}", path.display(), e))?;
    let cfg: Config =
        toml::from_str(&raw).map_err(|e| format!("Failed to parse config: {}", e))?;
    Ok(Some(cfg))
}

/// Apply `IMAGEDIR_*` environment variable overrides to `cfg`.
///
/// | Variable | Config field |
/// |---|---|
/// | `IMAGEDIR_ROOT_DIR` | `root_dir` |
/// | `IMAGEDIR_DIR` | `dir` |
/// | `IMAGEDIR_EXT` | `ext` |
pub fn apply_env_overrides(cfg: &mut Config) {
    if let Ok(v) = std::env::var("IMAGEDIR_ROOT_DIR") {
        cfg.camera.root_dir = v;
    }
    if let Ok(v) = std::env::var("IMAGEDIR_DIR") {
        cfg.camera.dir = v;
    }
    if let Ok(v) = std::env::var("IMAGEDIR_EXT") {
        cfg.camera.ext = v;
    }
}
