//! Decoding of served files and re-encoding into the requested mime type.

use std::io::Cursor;
use std::path::Path;

use image::{DynamicImage, ImageFormat};
use imagedir_types::{CameraError, CameraImage, MimeType};
use tracing::warn;

/// Parse a caller-supplied mime type; empty means JPEG.
pub fn requested_mime(mime_type: &str) -> Result<MimeType, CameraError> {
    if mime_type.trim().is_empty() {
        warn!("mime_type is empty, defaulting to {}", MimeType::Jpeg);
        return Ok(MimeType::Jpeg);
    }
    mime_type.parse()
}

/// Decode `bytes` (read from `path`), drop any alpha channel and encode as
/// `mime_type`.
pub fn transcode(path: &Path, bytes: &[u8], mime_type: MimeType) -> Result<CameraImage, CameraError> {
    let decoded = image::load_from_memory(bytes).map_err(|e| CameraError::Decode {
        path: path.to_path_buf(),
        details: e.to_string(),
    })?;
    let rgb = DynamicImage::ImageRgb8(decoded.into_rgb8());

    let format = match mime_type {
        MimeType::Jpeg => ImageFormat::Jpeg,
        MimeType::Png => ImageFormat::Png,
    };
    let mut out = Cursor::new(Vec::new());
    rgb.write_to(&mut out, format)
        .map_err(|e| CameraError::Encode(e.to_string()))?;

    Ok(CameraImage {
        data: out.into_inner(),
        mime_type,
    })
}
