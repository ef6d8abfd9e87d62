//! Cursor resolver: decides which position of an [`ImageSet`] to serve.
//!
//! # Precedence
//!
//! Directives are applied in a fixed order:
//!
//! 1. `index` replaces the working value,
//! 2. `index_reset: true` replaces it with 0,
//! 3. `index_jog` is computed from the *persisted* cursor, not from the
//!    working value, and replaces the working value when present.
//!
//! So a jog always wins, even next to an explicit index or reset in the same
//! call. Callers rely on this ordering; keep it until the request format is
//! versioned.
//!
//! The result is reduced with a true modulo, so `-1` on a three-image set
//! serves position 2.
//!
//! [`ImageSet`]: super::indexer::ImageSet

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use imagedir_types::CameraError;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

use super::config::ImageDirConfig;
use crate::camera::Attributes;

/// Per-call options recognised by image fetches and the `set` command.
///
/// Unknown keys are ignored.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Directives {
    /// Absolute position, before wraparound.
    #[serde(default, deserialize_with = "integral")]
    pub index: Option<i64>,
    #[serde(default)]
    pub index_reset: Option<bool>,
    /// Signed delta from the persisted cursor.
    #[serde(default, deserialize_with = "integral")]
    pub index_jog: Option<i64>,
    #[serde(default)]
    pub dir: Option<String>,
    #[serde(default)]
    pub ext: Option<String>,
}

impl Directives {
    /// Parse directives out of a host option map.
    ///
    /// # Errors
    ///
    /// Returns [`CameraError::InvalidRequest`] when a recognised key carries
    /// a value of the wrong type.
    pub fn from_attributes(extra: &Attributes) -> Result<Self, CameraError> {
        serde_json::from_value(Value::Object(extra.clone()))
            .map_err(|e| CameraError::InvalidRequest(format!("malformed directives: {e}")))
    }

    /// Reject attempts to point this call at a different directory or
    /// extension than the configured ones.
    pub fn check_source(&self, config: &ImageDirConfig) -> Result<(), CameraError> {
        if let Some(dir) = &self.dir
            && dir != &config.dir
        {
            return Err(CameraError::InvalidRequest(format!(
                "'dir' cannot be overridden per call (configured '{}', requested '{dir}')",
                config.dir
            )));
        }
        if let Some(ext) = &self.ext
            && !ext.trim().trim_start_matches('.').eq_ignore_ascii_case(&config.ext)
        {
            return Err(CameraError::InvalidRequest(format!(
                "'ext' cannot be overridden per call (configured '{}', requested '{ext}')",
                config.ext
            )));
        }
        Ok(())
    }

    /// Whether any cursor-moving directive is present.
    pub fn moves_cursor(&self) -> bool {
        self.index.is_some() || self.index_reset == Some(true) || self.index_jog.is_some()
    }
}

/// Next-index-to-serve, per resolved directory.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CursorMap {
    cursors: HashMap<PathBuf, usize>,
}

impl CursorMap {
    /// A map holding a single cursor at 0 for `dir`.
    pub fn seeded(dir: &Path) -> Self {
        let mut map = Self::default();
        map.set(dir, 0);
        map
    }

    /// Persisted cursor for `dir`, or 0 if none was stored yet.
    pub fn current(&self, dir: &Path) -> usize {
        self.cursors.get(dir).copied().unwrap_or(0)
    }

    pub fn set(&mut self, dir: &Path, index: usize) {
        self.cursors.insert(dir.to_path_buf(), index);
    }

    /// Copy of every stored cursor.
    pub fn snapshot(&self) -> HashMap<PathBuf, usize> {
        self.cursors.clone()
    }
}

/// Resolve `directives` against the persisted cursor `current` for a set of
/// `len` images.
///
/// Returns `None` only when `len` is 0.
pub fn resolve(directives: &Directives, current: usize, len: usize) -> Option<usize> {
    if len == 0 {
        return None;
    }

    let mut working = current as i128;
    if let Some(index) = directives.index {
        working = index as i128;
    }
    if directives.index_reset == Some(true) {
        working = 0;
    }
    if let Some(jog) = directives.index_jog {
        working = wrap(current as i128 + jog as i128, len) as i128;
    }
    Some(wrap(working, len))
}

/// Cursor value after serving `served` out of `len` images.
pub fn advance(served: usize, len: usize) -> usize {
    if len == 0 { 0 } else { (served + 1) % len }
}

fn wrap(value: i128, len: usize) -> usize {
    value.rem_euclid(len as i128) as usize
}

/// Accept JSON integers and integral floats (`5.0`), which is how numbers
/// arrive from protobuf `Struct` values.
fn integral<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let Some(number) = Option::<serde_json::Number>::deserialize(deserializer)? else {
        return Ok(None);
    };
    if let Some(i) = number.as_i64() {
        return Ok(Some(i));
    }
    match number.as_f64() {
        Some(f) if f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64 => {
            Ok(Some(f as i64))
        }
        _ => Err(D::Error::custom(format!("expected an integer, got {number}"))),
    }
}
