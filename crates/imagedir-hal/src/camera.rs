//! Generic `Camera` trait: the seam between the host runtime and a driver.
//!
//! The host owns the transport and the resource lifecycle. It turns remote
//! calls into calls on this trait and hands configuration over as a flat
//! [`Attributes`] map.

use async_trait::async_trait;
use imagedir_types::{CameraError, CameraImage, NamedImage, Properties, ResponseMetadata};
use serde_json::{Map, Value};

/// Flat attribute / option map as delivered by the host.
pub type Attributes = Map<String, Value>;

/// A camera (or anything that can stand in for one).
///
/// Drivers implement this trait and are constructed through a
/// [`ResourceRegistry`][crate::registry::ResourceRegistry].
#[async_trait]
pub trait Camera: Send + Sync {
    /// Resource name the host registered this instance under.
    fn name(&self) -> &str;

    /// Apply a new configuration. Either the whole configuration takes
    /// effect or the previous one stays active.
    async fn reconfigure(&self, attributes: &Attributes) -> Result<(), CameraError>;

    /// Fetch one image encoded as `mime_type`.
    ///
    /// An empty `mime_type` means the driver default. `extra` carries
    /// driver-specific per-call options.
    async fn get_image(&self, mime_type: &str, extra: &Attributes)
    -> Result<CameraImage, CameraError>;

    /// Fetch a batch of named images, restricted to `filter_source_names`
    /// when that list is non-empty.
    async fn get_images(
        &self,
        filter_source_names: &[String],
        extra: &Attributes,
    ) -> Result<(Vec<NamedImage>, ResponseMetadata), CameraError>;

    /// Driver-specific control command.
    async fn do_command(&self, command: &Attributes) -> Result<Attributes, CameraError>;

    async fn get_properties(&self) -> Result<Properties, CameraError>;

    /// Point clouds are optional; drivers without depth data keep this.
    async fn get_point_cloud(&self, _extra: &Attributes) -> Result<(Vec<u8>, String), CameraError> {
        Err(CameraError::Unsupported(format!(
            "camera '{}' does not produce point clouds",
            self.name()
        )))
    }
}
