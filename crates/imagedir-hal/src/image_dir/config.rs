//! Component attributes for the image-dir camera.

use std::path::{Path, PathBuf};

use imagedir_types::CameraError;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::camera::Attributes;

/// Extensions the indexer accepts, lowercase and without the dot.
pub const SUPPORTED_EXTENSIONS: [&str; 4] = ["jpg", "jpeg", "png", "gif"];

/// Attributes of one image-dir camera.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ImageDirConfig {
    /// Base directory; must exist.
    #[serde(default = "default_root_dir")]
    pub root_dir: String,

    /// Image set directory, relative to `root_dir`. Required.
    #[serde(default)]
    pub dir: String,

    /// File extension to serve: one of `jpg`, `jpeg`, `png`, `gif`
    /// (case-insensitive).
    #[serde(default = "default_ext")]
    pub ext: String,
}

fn default_root_dir() -> String {
    "/tmp".to_string()
}
fn default_ext() -> String {
    "jpg".to_string()
}

impl Default for ImageDirConfig {
    fn default() -> Self {
        Self {
            root_dir: default_root_dir(),
            dir: String::new(),
            ext: default_ext(),
        }
    }
}

impl ImageDirConfig {
    /// Build a config from the host's flat attribute map.
    ///
    /// Empty `root_dir` / `ext` strings fall back to their defaults and the
    /// extension is lowercased.
    ///
    /// # Errors
    ///
    /// Returns [`CameraError::InvalidConfig`] when an attribute has the wrong
    /// type.
    pub fn from_attributes(attributes: &Attributes) -> Result<Self, CameraError> {
        let cfg: ImageDirConfig = serde_json::from_value(Value::Object(attributes.clone()))
            .map_err(|e| CameraError::InvalidConfig(format!("malformed attributes: {e}")))?;
        Ok(cfg.normalized())
    }

    /// Attribute map equivalent of this config.
    pub fn to_attributes(&self) -> Attributes {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map,
            _ => Attributes::new(),
        }
    }

    pub fn normalized(mut self) -> Self {
        if self.root_dir.trim().is_empty() {
            self.root_dir = default_root_dir();
        }
        if self.ext.trim().is_empty() {
            self.ext = default_ext();
        }
        self.ext = self.ext.trim().trim_start_matches('.').to_ascii_lowercase();
        self
    }

    pub fn root_dir(&self) -> &Path {
        Path::new(&self.root_dir)
    }

    /// `root_dir` joined with `dir`.
    pub fn resolved_dir(&self) -> PathBuf {
        self.root_dir().join(&self.dir)
    }

    pub fn ext_supported(&self) -> bool {
        SUPPORTED_EXTENSIONS
            .iter()
            .any(|e| e.eq_ignore_ascii_case(&self.ext))
    }
}
