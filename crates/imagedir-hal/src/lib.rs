//! Camera drivers and the host-side resource registry.
//!
//! Drivers implement [`Camera`] and are registered by model with a
//! [`ResourceRegistry`]. The only driver shipped here is
//! [`ImageDirCamera`], which replays a directory of still images.

pub mod camera;
pub mod image_dir;
pub mod registry;

pub use camera::{Attributes, Camera};
pub use image_dir::{ImageDirCamera, ImageDirConfig};
pub use registry::{ModelRegistration, ResourceRegistry};
