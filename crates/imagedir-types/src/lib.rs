use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Fully qualified resource model, e.g. `viam-labs:camera:image-dir`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub struct Model {
    pub namespace: String,
    pub family: String,
    pub name: String,
}

impl Model {
    pub fn new(
        namespace: impl Into<String>,
        family: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            namespace: namespace.into(),
            family: family.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.namespace, self.family, self.name)
    }
}

impl FromStr for Model {
    type Err = CameraError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split(':');
        match (parts.next(), parts.next(), parts.next(), parts.next()) {
            (Some(ns), Some(family), Some(name), None)
                if !ns.is_empty() && !family.is_empty() && !name.is_empty() =>
            {
                Ok(Model::new(ns, family, name))
            }
            _ => Err(CameraError::InvalidRequest(format!(
                "model '{s}' is not of the form namespace:family:name"
            ))),
        }
    }
}

/// Encodings a camera can hand back over the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, JsonSchema)]
pub enum MimeType {
    #[default]
    #[serde(rename = "image/jpeg")]
    Jpeg,
    #[serde(rename = "image/png")]
    Png,
}

impl MimeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MimeType::Jpeg => "image/jpeg",
            MimeType::Png => "image/png",
        }
    }
}

impl fmt::Display for MimeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MimeType {
    type Err = CameraError;

    /// Parameters after `;` are ignored, as is case.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let essence = s.split(';').next().unwrap_or_default().trim();
        match essence.to_ascii_lowercase().as_str() {
            "image/jpeg" | "image/jpg" => Ok(MimeType::Jpeg),
            "image/png" => Ok(MimeType::Png),
            _ => Err(CameraError::Unsupported(format!("mime type '{s}'"))),
        }
    }
}

/// Pinhole intrinsics, in pixels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct IntrinsicParameters {
    pub width_px: u32,
    pub height_px: u32,
    pub focal_x_px: f64,
    pub focal_y_px: f64,
    pub center_x_px: f64,
    pub center_y_px: f64,
}

/// Lens distortion model and its coefficients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct DistortionParameters {
    pub model: String,
    pub parameters: Vec<f64>,
}

/// Static capability flags reported by a camera.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Properties {
    pub supports_pcd: bool,
    pub intrinsic_parameters: Option<IntrinsicParameters>,
    pub distortion_parameters: Option<DistortionParameters>,
}

/// Encoded image bytes returned by a single-image fetch.
#[derive(Debug, Clone)]
pub struct CameraImage {
    pub data: Vec<u8>,
    pub mime_type: MimeType,
}

/// One entry of a named-image batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NamedImage {
    /// Source name the image was produced by.
    pub name: String,
    pub data: Vec<u8>,
    pub mime_type: MimeType,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseMetadata {
    pub captured_at: DateTime<Utc>,
}

impl ResponseMetadata {
    pub fn now() -> Self {
        Self {
            captured_at: Utc::now(),
        }
    }
}

/// Outcome of a configuration pre-flight check.
///
/// Errors block construction; warnings are reported and otherwise ignored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Validation {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl Validation {
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }

    /// Collapse into a single [`CameraError::InvalidConfig`] when any error
    /// was recorded.
    pub fn into_result(self) -> Result<Vec<String>, CameraError> {
        if self.errors.is_empty() {
            Ok(self.warnings)
        } else {
            Err(CameraError::InvalidConfig(self.errors.join("; ")))
        }
    }
}

/// Coarse grouping of [`CameraError`] variants.
///
/// Lets a caller tell bad input apart from stale backing state without
/// matching on every variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCategory {
    /// The component configuration is unusable until corrected.
    Configuration,
    /// The on-disk state drifted from the snapshot taken at configuration time.
    State,
    /// The operation is never supported by this driver.
    Unsupported,
    /// The caller sent a directive that cannot be honoured.
    InvalidRequest,
    /// Image bytes could not be decoded or re-encoded.
    Codec,
}

/// Error type shared by every camera driver and the host-side registry.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CameraError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Configured directory no longer exists: {}", .0.display())]
    DirectoryMissing(PathBuf),

    #[error("No images are indexed for {}", .0.display())]
    EmptyImageSet(PathBuf),

    #[error("Image not found on disk: {}", .0.display())]
    ImageNotFound(PathBuf),

    #[error("I/O error on {}: {details}", path.display())]
    Io { path: PathBuf, details: String },

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Unsupported: {0}")]
    Unsupported(String),

    #[error("Failed to decode {}: {details}", path.display())]
    Decode { path: PathBuf, details: String },

    #[error("Failed to encode image: {0}")]
    Encode(String),
}

impl CameraError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            CameraError::InvalidConfig(_) => ErrorCategory::Configuration,
            CameraError::DirectoryMissing(_)
            | CameraError::EmptyImageSet(_)
            | CameraError::ImageNotFound(_)
            | CameraError::Io { .. } => ErrorCategory::State,
            CameraError::InvalidRequest(_) => ErrorCategory::InvalidRequest,
            CameraError::Unsupported(_) => ErrorCategory::Unsupported,
            CameraError::Decode { .. } | CameraError::Encode(_) => ErrorCategory::Codec,
        }
    }
}
