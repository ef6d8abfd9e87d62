//! [`ImageDirCamera`] – a camera that plays back a directory of images.
//!
//! At configuration time the directory `root_dir/dir` is scanned once into an
//! immutable [`ImageSet`]. Every fetch then resolves a position with the
//! [`cursor`] rules, serves that file and leaves the cursor on the following
//! image, wrapping at the end.
//!
//! # Per-call options
//!
//! | Key | Type | Effect |
//! |---|---|---|
//! | `index` | integer | serve this position (wrapped) |
//! | `index_reset` | bool | serve the first image |
//! | `index_jog` | integer | move relative to the current cursor; wins over the two above |
//! | `dir` / `ext` | string | rejected unless equal to the configured value |
//!
//! The `set` control command accepts the same keys and only moves the cursor.

pub mod codec;
pub mod config;
pub mod cursor;
pub mod indexer;

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use imagedir_types::{
    CameraError, CameraImage, Model, NamedImage, Properties, ResponseMetadata, Validation,
};
use serde_json::{Value, json};
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use crate::camera::{Attributes, Camera};
use crate::registry::ModelRegistration;

pub use config::{ImageDirConfig, SUPPORTED_EXTENSIONS};
pub use cursor::{CursorMap, Directives};
pub use indexer::{ImageSet, OrderingMode};

/// Model triple this driver registers under.
pub fn model() -> Model {
    Model::new("viam-labs", "camera", "image-dir")
}

/// Hooks for [`ResourceRegistry::register_model`][crate::registry::ResourceRegistry::register_model].
pub fn registration() -> ModelRegistration {
    ModelRegistration {
        validate: validate_attributes,
        create: create_from_attributes,
    }
}

fn validate_attributes(attributes: &Attributes) -> Validation {
    match ImageDirConfig::from_attributes(attributes) {
        Ok(cfg) => ImageDirCamera::validate(&cfg),
        Err(e) => Validation {
            errors: vec![e.to_string()],
            warnings: Vec::new(),
        },
    }
}

fn create_from_attributes(name: &str, attributes: &Attributes) -> Result<Arc<dyn Camera>, CameraError> {
    let cfg = ImageDirConfig::from_attributes(attributes)?;
    Ok(Arc::new(ImageDirCamera::new(name, cfg)?))
}

/// Everything one configuration produced. Replaced as a whole on
/// reconfiguration.
#[derive(Debug)]
struct Session {
    config: ImageDirConfig,
    images: Arc<ImageSet>,
    cursors: CursorMap,
}

impl Session {
    fn build(config: ImageDirConfig) -> Result<Self, CameraError> {
        let (validation, images) = preflight(&config);
        let warnings = validation.into_result()?;
        let images = images.ok_or_else(|| {
            CameraError::InvalidConfig("image directory could not be indexed".to_string())
        })?;
        for warning in warnings {
            warn!(dir = %images.dir().display(), "{warning}");
        }
        let cursors = CursorMap::seeded(images.dir());
        Ok(Self {
            config,
            images: Arc::new(images),
            cursors,
        })
    }
}

/// Result of serving one file.
struct Served {
    image: CameraImage,
    /// Configured `dir` of the session the image came from.
    source: String,
    index: usize,
    file: String,
}

/// Camera backed by a directory of image files.
pub struct ImageDirCamera {
    name: String,
    session: Mutex<Session>,
}

impl ImageDirCamera {
    /// Validate `config`, index its directory and seed the cursor at 0.
    ///
    /// # Errors
    ///
    /// Returns [`CameraError::InvalidConfig`] listing every validation error.
    pub fn new(name: impl Into<String>, config: ImageDirConfig) -> Result<Self, CameraError> {
        let name = name.into();
        let session = Session::build(config.normalized())?;
        info!(
            camera = %name,
            dir = %session.images.dir().display(),
            images = session.images.len(),
            mode = ?session.images.mode(),
            "image-dir camera configured"
        );
        Ok(Self {
            name,
            session: Mutex::new(session),
        })
    }

    /// Pre-flight checks for `config`, without touching any instance.
    pub fn validate(config: &ImageDirConfig) -> Validation {
        preflight(config).0
    }

    /// Replace the active configuration.
    ///
    /// The new directory is indexed on the blocking pool before the swap;
    /// fetches keep being served from the previous session meanwhile. On
    /// failure the previous configuration, file list and cursor stay in place.
    pub async fn apply(&self, config: ImageDirConfig) -> Result<(), CameraError> {
        let config = config.normalized();
        let session = tokio::task::spawn_blocking(move || Session::build(config))
            .await
            .map_err(|e| CameraError::InvalidConfig(format!("indexing task failed: {e}")))??;
        info!(
            camera = %self.name,
            dir = %session.images.dir().display(),
            images = session.images.len(),
            "image-dir camera reconfigured"
        );
        *self.session.lock().await = session;
        Ok(())
    }

    /// The active configuration.
    pub async fn config(&self) -> ImageDirConfig {
        self.session.lock().await.config.clone()
    }

    /// The ordered file snapshot currently being served.
    pub async fn image_set(&self) -> Arc<ImageSet> {
        Arc::clone(&self.session.lock().await.images)
    }

    /// Copy of the persisted cursors, keyed by resolved directory.
    pub async fn cursors(&self) -> HashMap<PathBuf, usize> {
        self.session.lock().await.cursors.snapshot()
    }

    /// Move the cursor without serving an image and return its new value.
    ///
    /// The cursor ends up on the resolved position itself, so the next
    /// plain fetch serves exactly that image.
    pub async fn set_cursor(&self, directives: &Directives) -> Result<usize, CameraError> {
        let mut session = self.session.lock().await;
        directives.check_source(&session.config)?;

        let images = Arc::clone(&session.images);
        let dir = images.dir();
        let current = session.cursors.current(dir);
        let index = cursor::resolve(directives, current, images.len())
            .ok_or_else(|| CameraError::EmptyImageSet(dir.to_path_buf()))?;
        session.cursors.set(dir, index);
        debug!(camera = %self.name, index, "cursor set");
        Ok(index)
    }

    /// Serve the next image. Returns `None` when `source_filter` is
    /// non-empty and does not name the configured `dir`.
    #[instrument(skip_all, fields(camera = %self.name))]
    async fn serve(
        &self,
        mime_type: &str,
        directives: &Directives,
        source_filter: &[String],
    ) -> Result<Option<Served>, CameraError> {
        let mime_type = codec::requested_mime(mime_type)?;

        // Held until the cursor is written back so overlapping requests
        // cannot both read the same cursor value.
        let mut session = self.session.lock().await;
        let source = session.config.dir.clone();
        if !source_filter.is_empty() && !source_filter.contains(&source) {
            debug!(%source, "source filtered out of batch");
            return Ok(None);
        }
        directives.check_source(&session.config)?;

        let images = Arc::clone(&session.images);
        let dir = images.dir();
        match tokio::fs::metadata(dir).await {
            Ok(meta) if meta.is_dir() => {}
            _ => return Err(CameraError::DirectoryMissing(dir.to_path_buf())),
        }
        if images.is_empty() {
            return Err(CameraError::EmptyImageSet(dir.to_path_buf()));
        }

        let current = session.cursors.current(dir);
        let index = cursor::resolve(directives, current, images.len())
            .ok_or_else(|| CameraError::EmptyImageSet(dir.to_path_buf()))?;
        let path = images
            .path(index)
            .ok_or_else(|| CameraError::EmptyImageSet(dir.to_path_buf()))?;

        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(CameraError::ImageNotFound(path));
            }
            Err(e) => {
                return Err(CameraError::Io {
                    path,
                    details: e.to_string(),
                });
            }
        };
        let image = codec::transcode(&path, &bytes, mime_type)?;

        session.cursors.set(dir, cursor::advance(index, images.len()));
        let file = images.files()[index].clone();
        debug!(
            index,
            file = %file,
            directed = directives.moves_cursor(),
            "served image"
        );
        Ok(Some(Served {
            image,
            source,
            index,
            file,
        }))
    }
}

#[async_trait]
impl Camera for ImageDirCamera {
    fn name(&self) -> &str {
        &self.name
    }

    async fn reconfigure(&self, attributes: &Attributes) -> Result<(), CameraError> {
        let config = ImageDirConfig::from_attributes(attributes)?;
        self.apply(config).await
    }

    async fn get_image(&self, mime_type: &str, extra: &Attributes) -> Result<CameraImage, CameraError> {
        let directives = Directives::from_attributes(extra)?;
        match self.serve(mime_type, &directives, &[]).await? {
            Some(served) => Ok(served.image),
            None => Err(CameraError::InvalidRequest(
                "no image source selected".to_string(),
            )),
        }
    }

    async fn get_images(
        &self,
        filter_source_names: &[String],
        extra: &Attributes,
    ) -> Result<(Vec<NamedImage>, ResponseMetadata), CameraError> {
        let directives = Directives::from_attributes(extra)?;
        let Some(served) = self.serve("", &directives, filter_source_names).await? else {
            return Ok((Vec::new(), ResponseMetadata::now()));
        };
        debug!(camera = %self.name, index = served.index, file = %served.file, "batch image");
        let named = NamedImage {
            name: served.source,
            data: served.image.data,
            mime_type: served.image.mime_type,
        };
        Ok((vec![named], ResponseMetadata::now()))
    }

    async fn do_command(&self, command: &Attributes) -> Result<Attributes, CameraError> {
        let Some(set) = command.get("set") else {
            return Ok(Attributes::new());
        };
        let Value::Object(set) = set else {
            return Err(CameraError::InvalidRequest("'set' must be an object".to_string()));
        };

        let directives = Directives::from_attributes(set)?;
        let index = self.set_cursor(&directives).await?;

        let mut response = Attributes::new();
        response.insert("index".to_string(), json!(index));
        Ok(response)
    }

    async fn get_properties(&self) -> Result<Properties, CameraError> {
        Ok(Properties::default())
    }
}

/// Run every configuration check and hand back the scan when it succeeded.
fn preflight(config: &ImageDirConfig) -> (Validation, Option<ImageSet>) {
    let mut v = Validation::default();

    let root_ok = config.root_dir().is_dir();
    if !root_ok {
        v.errors.push("specified 'root_dir' does not exist".to_string());
    }
    if !config.ext_supported() {
        v.errors.push(format!(
            "unsupported 'ext' '{}', expected one of {}",
            config.ext,
            SUPPORTED_EXTENSIONS.join(", ")
        ));
    }
    if config.dir.trim().is_empty() {
        v.errors.push("'dir' is required".to_string());
        return (v, None);
    }
    if PathBuf::from(&config.dir).is_absolute() {
        v.errors
            .push("'dir' must be relative to the configured 'root_dir'".to_string());
        return (v, None);
    }
    if !root_ok {
        return (v, None);
    }

    let resolved = config.resolved_dir();
    if !resolved.is_dir() {
        v.errors
            .push("requested 'dir' not found within configured 'root_dir'".to_string());
        return (v, None);
    }
    if !v.is_ok() {
        return (v, None);
    }

    let images = match ImageSet::scan(&resolved, &config.ext) {
        Ok(images) => images,
        Err(e) => {
            v.errors.push(e.to_string());
            return (v, None);
        }
    };
    if images.matched() == 0 {
        v.errors.push(format!(
            "no files ending with .{} in {}",
            config.ext,
            resolved.display()
        ));
    } else if images.is_empty() {
        v.errors.push(format!(
            "no images with valid timestamp or numeric index in {}",
            resolved.display()
        ));
    } else if !images.skipped().is_empty() {
        v.warnings.push(format!(
            "{} file(s) in {} have no usable ordering key and will not be served",
            images.skipped().len(),
            resolved.display()
        ));
    }
    (v, Some(images))
}

#[cfg(test)]
mod tests {
    use super::*;
    use imagedir_types::{ErrorCategory, MimeType};
    use image::{ImageFormat, Rgb, RgbImage};
    use std::fs;
    use std::path::Path;

    // ------------------------------------------------------------------
    // Fixtures
    // ------------------------------------------------------------------

    /// Write a 2×2 image whose red channel encodes `shade`.
    fn write_image(path: &Path, shade: u8) {
        RgbImage::from_pixel(2, 2, Rgb([shade, 0, 0]))
            .save_with_format(path, ImageFormat::Png)
            .expect("write fixture");
    }

    /// Temp root with `sub/<name>` for every name.
    fn root_with(sub: &str, names: &[&str]) -> tempfile::TempDir {
        let root = tempfile::tempdir().expect("tmp dir");
        let dir = root.path().join(sub);
        fs::create_dir_all(&dir).unwrap();
        for (i, name) in names.iter().enumerate() {
            write_image(&dir.join(name), (i * 40) as u8);
        }
        root
    }

    fn config_for(root: &Path, sub: &str, ext: &str) -> ImageDirConfig {
        ImageDirConfig {
            root_dir: root.to_string_lossy().into_owned(),
            dir: sub.to_string(),
            ext: ext.to_string(),
        }
    }

    fn camera(root: &Path, sub: &str, ext: &str) -> ImageDirCamera {
        ImageDirCamera::new("cam", config_for(root, sub, ext)).expect("camera")
    }

    fn extra(value: serde_json::Value) -> Attributes {
        value.as_object().cloned().unwrap()
    }

    async fn cursor_of(cam: &ImageDirCamera, root: &Path, sub: &str) -> usize {
        cam.cursors().await[&root.join(sub)]
    }

    /// Red channel of the served image, used to tell fixtures apart.
    fn shade(img: &CameraImage) -> u8 {
        image::load_from_memory(&img.data).unwrap().to_rgb8().get_pixel(0, 0)[0]
    }

    // ------------------------------------------------------------------
    // Validation & construction
    // ------------------------------------------------------------------

    #[test]
    fn validate_missing_root() {
        let cfg = ImageDirConfig {
            root_dir: "/does/not/exist".into(),
            dir: "seq".into(),
            ext: "jpg".into(),
        };
        let v = ImageDirCamera::validate(&cfg);
        assert!(v.errors.iter().any(|e| e.contains("root_dir")));
        assert!(v.warnings.is_empty());
    }

    #[test]
    fn validate_unsupported_ext() {
        let root = root_with("seq", &["0.jpg"]);
        let v = ImageDirCamera::validate(&config_for(root.path(), "seq", "tif"));
        assert!(v.errors.iter().any(|e| e.contains("unsupported 'ext'")));
    }

    #[test]
    fn validate_dir_required() {
        let root = tempfile::tempdir().unwrap();
        let v = ImageDirCamera::validate(&config_for(root.path(), "", "jpg"));
        assert!(v.errors.iter().any(|e| e.contains("'dir' is required")));
    }

    #[test]
    fn validate_dir_not_found() {
        let root = tempfile::tempdir().unwrap();
        let v = ImageDirCamera::validate(&config_for(root.path(), "missing", "jpg"));
        assert!(v.errors.iter().any(|e| e.contains("requested 'dir' not found")));
    }

    #[test]
    fn validate_no_matching_files() {
        let root = root_with("seq", &["0.png", "1.png"]);
        let v = ImageDirCamera::validate(&config_for(root.path(), "seq", "jpg"));
        assert!(v.errors.iter().any(|e| e.contains("no files ending with .jpg")));
    }

    #[test]
    fn validate_warns_about_unkeyed_files() {
        let root = root_with("seq", &["0.jpg", "cover.jpg"]);
        let v = ImageDirCamera::validate(&config_for(root.path(), "seq", "jpg"));
        assert!(v.is_ok());
        assert_eq!(v.warnings.len(), 1);
    }

    #[test]
    fn construction_fails_without_keyed_images() {
        let root = root_with("seq", &["cover.jpg"]);
        let result = ImageDirCamera::new("cam", config_for(root.path(), "seq", "jpg"));
        match result {
            Err(CameraError::InvalidConfig(msg)) => {
                assert!(msg.contains("no images with valid timestamp or numeric index"));
            }
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("construction must fail"),
        }
    }

    #[test]
    fn construction_fails_on_empty_directory() {
        let root = tempfile::tempdir().unwrap();
        fs::create_dir(root.path().join("empty")).unwrap();
        let result = ImageDirCamera::new("cam", config_for(root.path(), "empty", "jpg"));
        assert!(matches!(result, Err(CameraError::InvalidConfig(_))));
    }

    #[tokio::test]
    async fn construction_seeds_cursor_at_zero() {
        let root = root_with("seq", &["0.jpg", "1.jpg", "2.jpg"]);
        let cam = camera(root.path(), "seq", "jpg");
        let cursors = cam.cursors().await;
        assert_eq!(cursors.len(), 1);
        assert_eq!(cursors[&root.path().join("seq")], 0);
        assert_eq!(cam.image_set().await.len(), 3);
        assert_eq!(cam.config().await.dir, "seq");
    }

    #[tokio::test]
    async fn extension_case_is_ignored_when_indexing() {
        let root = root_with("seq", &["0.jpg", "1.JPG", "2.Jpg", "3.JPEG"]);
        let cam = camera(root.path(), "seq", "jpg");
        assert_eq!(cam.image_set().await.files(), ["0.jpg", "1.JPG", "2.Jpg"]);
    }

    // ------------------------------------------------------------------
    // Plain fetches
    // ------------------------------------------------------------------

    #[tokio::test]
    async fn fetches_cycle_in_order_and_wrap_once() {
        let root = root_with("seq", &["0.jpg", "1.jpg", "2.jpg"]);
        let cam = camera(root.path(), "seq", "jpg");

        let mut shades = Vec::new();
        for _ in 0..4 {
            shades.push(shade(&cam.get_image("image/png", &Attributes::new()).await.unwrap()));
        }
        assert_eq!(shades, vec![0, 40, 80, 0]);
        assert_eq!(cursor_of(&cam, root.path(), "seq").await, 1);
    }

    #[tokio::test]
    async fn empty_mime_defaults_to_jpeg() {
        let root = root_with("seq", &["0.jpg"]);
        let cam = camera(root.path(), "seq", "jpg");
        let img = cam.get_image("", &Attributes::new()).await.unwrap();
        assert_eq!(img.mime_type, MimeType::Jpeg);
    }

    #[tokio::test]
    async fn unsupported_mime_leaves_cursor_alone() {
        let root = root_with("seq", &["0.jpg", "1.jpg"]);
        let cam = camera(root.path(), "seq", "jpg");
        let err = cam.get_image("image/bmp", &Attributes::new()).await.unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Unsupported);
        assert_eq!(cursor_of(&cam, root.path(), "seq").await, 0);
    }

    // ------------------------------------------------------------------
    // Directives
    // ------------------------------------------------------------------

    #[tokio::test]
    async fn jog_reset_and_absolute_index() {
        let root = root_with("seq", &["0.jpg", "1.jpg", "2.jpg"]);
        let cam = camera(root.path(), "seq", "jpg");
        let none = Attributes::new();

        cam.get_image("", &none).await.unwrap();
        cam.get_image("", &none).await.unwrap();
        assert_eq!(cursor_of(&cam, root.path(), "seq").await, 2);

        // (2 - 1) mod 3 = 1 served, cursor 2
        cam.get_image("", &extra(json!({ "index_jog": -1 }))).await.unwrap();
        assert_eq!(cursor_of(&cam, root.path(), "seq").await, 2);

        cam.get_image("", &extra(json!({ "index_reset": true }))).await.unwrap();
        assert_eq!(cursor_of(&cam, root.path(), "seq").await, 1);

        // 5 mod 3 = 2 served, cursor wraps to 0
        cam.get_image("", &extra(json!({ "index": 5 }))).await.unwrap();
        assert_eq!(cursor_of(&cam, root.path(), "seq").await, 0);
    }

    #[tokio::test]
    async fn jog_wins_over_index_and_reset_in_one_call() {
        let root = root_with("seq", &["0.jpg", "1.jpg", "2.jpg", "3.jpg", "4.jpg"]);
        let cam = camera(root.path(), "seq", "jpg");
        cam.set_cursor(&Directives {
            index: Some(2),
            ..Directives::default()
        })
        .await
        .unwrap();

        let img = cam
            .get_image(
                "image/png",
                &extra(json!({ "index": 3, "index_reset": true, "index_jog": 2 })),
            )
            .await
            .unwrap();
        // (2 + 2) mod 5 = 4 served
        assert_eq!(shade(&img), 160);
        assert_eq!(cursor_of(&cam, root.path(), "seq").await, 0);
    }

    #[tokio::test]
    async fn negative_and_large_indices_wrap() {
        let root = root_with("seq", &["0.jpg", "1.jpg", "2.jpg"]);
        let cam = camera(root.path(), "seq", "jpg");

        let img = cam.get_image("image/png", &extra(json!({ "index": -1 }))).await.unwrap();
        assert_eq!(shade(&img), 80);
        assert_eq!(cursor_of(&cam, root.path(), "seq").await, 0);

        let img = cam.get_image("image/png", &extra(json!({ "index": 100 }))).await.unwrap();
        assert_eq!(shade(&img), 40);
        assert_eq!(cursor_of(&cam, root.path(), "seq").await, 2);

        cam.get_image("", &extra(json!({ "index": 0 }))).await.unwrap();
        assert_eq!(cursor_of(&cam, root.path(), "seq").await, 1);
    }

    #[tokio::test]
    async fn dir_or_ext_override_is_rejected() {
        let root = root_with("seq", &["0.jpg", "1.jpg"]);
        let cam = camera(root.path(), "seq", "jpg");

        let err = cam.get_image("", &extra(json!({ "dir": "other" }))).await.unwrap_err();
        assert_eq!(err.category(), ErrorCategory::InvalidRequest);
        let err = cam.get_image("", &extra(json!({ "ext": "png" }))).await.unwrap_err();
        assert_eq!(err.category(), ErrorCategory::InvalidRequest);

        // Restating the configured values is harmless.
        assert!(
            cam.get_image("", &extra(json!({ "dir": "seq", "ext": "jpg" })))
                .await
                .is_ok()
        );
    }

    #[tokio::test]
    async fn timestamp_directory_is_served_chronologically() {
        let root = root_with(
            "ts",
            &[
                "2025-10-09T10_00_00.000Z_a.jpg",
                "2025-10-09T09_00_00.000Z_b.jpg",
                "2025-02-30T12_00_00.000Z_bad.jpg",
            ],
        );
        let cam = camera(root.path(), "ts", "jpg");
        let set = cam.image_set().await;
        assert_eq!(
            set.files(),
            ["2025-10-09T09_00_00.000Z_b.jpg", "2025-10-09T10_00_00.000Z_a.jpg"]
        );
        // Fixture shades follow creation order: _a = 0, _b = 40.
        let first = cam.get_image("image/png", &Attributes::new()).await.unwrap();
        assert_eq!(shade(&first), 40);
    }

    // ------------------------------------------------------------------
    // Drift after configuration
    // ------------------------------------------------------------------

    #[tokio::test]
    async fn deleted_directory_is_a_state_error() {
        let root = root_with("seq", &["0.jpg"]);
        let cam = camera(root.path(), "seq", "jpg");
        fs::remove_dir_all(root.path().join("seq")).unwrap();

        let err = cam.get_image("", &Attributes::new()).await.unwrap_err();
        assert!(matches!(err, CameraError::DirectoryMissing(_)));
        assert!(err.to_string().contains("no longer exists"));
        assert_eq!(err.category(), ErrorCategory::State);
    }

    #[tokio::test]
    async fn deleted_file_is_not_found_and_not_rescanned() {
        let root = root_with("seq", &["0.jpg", "1.jpg"]);
        let cam = camera(root.path(), "seq", "jpg");
        fs::remove_file(root.path().join("seq").join("0.jpg")).unwrap();

        let err = cam.get_image("", &Attributes::new()).await.unwrap_err();
        assert!(matches!(err, CameraError::ImageNotFound(_)));
        assert_eq!(cursor_of(&cam, root.path(), "seq").await, 0);
        assert_eq!(cam.image_set().await.len(), 2);

        // The camera stays usable for a corrected request.
        assert!(cam.get_image("", &extra(json!({ "index": 1 }))).await.is_ok());
    }

    #[tokio::test]
    async fn corrupt_file_is_a_codec_error() {
        let root = root_with("seq", &["0.jpg"]);
        fs::write(root.path().join("seq").join("0.jpg"), b"garbage").unwrap();
        let cam = camera(root.path(), "seq", "jpg");
        let err = cam.get_image("", &Attributes::new()).await.unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Codec);
    }

    // ------------------------------------------------------------------
    // Batch, command, properties
    // ------------------------------------------------------------------

    #[tokio::test]
    async fn get_images_filters_by_source_name() {
        let root = root_with("seqA", &["0.jpg", "1.jpg"]);
        let cam = camera(root.path(), "seqA", "jpg");

        let (images, _) = cam
            .get_images(&["other".to_string()], &Attributes::new())
            .await
            .unwrap();
        assert!(images.is_empty());
        assert_eq!(cursor_of(&cam, root.path(), "seqA").await, 0);

        let (images, _) = cam
            .get_images(&["seqA".to_string()], &Attributes::new())
            .await
            .unwrap();
        assert_eq!(images.len(), 1);
        assert_eq!(images[0].name, "seqA");
        assert_eq!(images[0].mime_type, MimeType::Jpeg);
        assert!(!images[0].data.is_empty());

        let (images, _) = cam.get_images(&[], &Attributes::new()).await.unwrap();
        assert_eq!(images.len(), 1);
        assert_eq!(cursor_of(&cam, root.path(), "seqA").await, 0);
    }

    #[tokio::test]
    async fn do_command_set_index_reset_and_jog() {
        let root = root_with("seq", &["0.jpg", "1.jpg", "2.jpg"]);
        let cam = camera(root.path(), "seq", "jpg");

        let out = cam.do_command(&extra(json!({ "set": { "index": 5 } }))).await.unwrap();
        assert_eq!(out["index"], json!(2));

        let out = cam
            .do_command(&extra(json!({ "set": { "index_reset": true } })))
            .await
            .unwrap();
        assert_eq!(out["index"], json!(0));

        let out = cam
            .do_command(&extra(json!({ "set": { "index_jog": -1 } })))
            .await
            .unwrap();
        assert_eq!(out["index"], json!(2));

        // The next plain fetch serves the position the command chose.
        let img = cam.get_image("image/png", &Attributes::new()).await.unwrap();
        assert_eq!(shade(&img), 80);
    }

    #[tokio::test]
    async fn do_command_rejects_source_changes() {
        let root = root_with("seq", &["0.jpg", "1.jpg"]);
        let cam = camera(root.path(), "seq", "jpg");
        let result = cam.do_command(&extra(json!({ "set": { "dir": "other" } }))).await;
        assert!(matches!(result, Err(CameraError::InvalidRequest(_))));
        let result = cam.do_command(&extra(json!({ "set": { "ext": "png" } }))).await;
        assert!(matches!(result, Err(CameraError::InvalidRequest(_))));
        let result = cam.do_command(&extra(json!({ "set": 3 }))).await;
        assert!(matches!(result, Err(CameraError::InvalidRequest(_))));
    }

    #[tokio::test]
    async fn do_command_without_set_is_a_no_op() {
        let root = root_with("seq", &["0.jpg", "1.jpg"]);
        let cam = camera(root.path(), "seq", "jpg");
        assert!(cam.do_command(&Attributes::new()).await.unwrap().is_empty());
        assert!(
            cam.do_command(&extra(json!({ "unknown": "command" })))
                .await
                .unwrap()
                .is_empty()
        );
    }

    #[tokio::test]
    async fn properties_and_point_cloud() {
        let root = root_with("seq", &["0.jpg"]);
        let cam = camera(root.path(), "seq", "jpg");
        let props = cam.get_properties().await.unwrap();
        assert!(!props.supports_pcd);
        assert!(props.intrinsic_parameters.is_none());
        assert!(props.distortion_parameters.is_none());

        let err = cam.get_point_cloud(&Attributes::new()).await.unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Unsupported);
    }

    // ------------------------------------------------------------------
    // Reconfiguration
    // ------------------------------------------------------------------

    #[tokio::test]
    async fn reconfigure_rebuilds_list_and_resets_cursor() {
        let root = root_with("seq", &["0.jpg", "1.jpg"]);
        let other = root.path().join("other");
        fs::create_dir(&other).unwrap();
        for i in 0..3 {
            write_image(&other.join(format!("{i}.png")), 0);
        }
        let cam = camera(root.path(), "seq", "jpg");
        cam.get_image("", &Attributes::new()).await.unwrap();

        let attrs = config_for(root.path(), "other", "png").to_attributes();
        cam.reconfigure(&attrs).await.unwrap();

        assert_eq!(cam.image_set().await.len(), 3);
        let cursors = cam.cursors().await;
        assert_eq!(cursors.len(), 1);
        assert_eq!(cursors[&other], 0);
    }

    #[tokio::test]
    async fn failed_reconfigure_keeps_previous_state() {
        let root = root_with("seq", &["0.jpg", "1.jpg"]);
        let cam = camera(root.path(), "seq", "jpg");
        cam.get_image("", &Attributes::new()).await.unwrap();

        let attrs = config_for(root.path(), "missing", "jpg").to_attributes();
        let err = cam.reconfigure(&attrs).await.unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Configuration);

        assert_eq!(cam.config().await.dir, "seq");
        assert_eq!(cursor_of(&cam, root.path(), "seq").await, 1);
    }

    #[tokio::test]
    async fn registry_constructs_image_dir_cameras() {
        use crate::registry::ResourceRegistry;

        let root = root_with("seq", &["0.jpg", "1.jpg"]);
        let mut registry = ResourceRegistry::new();
        registry.register_model(model(), registration());

        let attrs = config_for(root.path(), "seq", "jpg").to_attributes();
        assert!(registry.validate(&model(), &attrs).unwrap().is_ok());
        let cam = registry.create(&model(), "front", &attrs).unwrap();
        assert_eq!(cam.name(), "front");
        assert!(cam.get_image("", &Attributes::new()).await.is_ok());

        let bad = config_for(root.path(), "", "bmp").to_attributes();
        let v = registry.validate(&model(), &bad).unwrap();
        assert_eq!(v.errors.len(), 2);
        assert!(registry.create(&model(), "broken", &bad).is_err());
    }

    #[tokio::test]
    async fn get_images_follows_reconfiguration() {
        let root = root_with("old", &["0.jpg"]);
        let new = root.path().join("new");
        fs::create_dir(&new).unwrap();
        write_image(&new.join("0.png"), 0);
        let cam = camera(root.path(), "old", "jpg");

        let attrs = config_for(root.path(), "new", "png").to_attributes();
        cam.reconfigure(&attrs).await.unwrap();

        let (images, _) = cam
            .get_images(&["old".to_string()], &Attributes::new())
            .await
            .unwrap();
        assert!(images.is_empty());
        let (images, _) = cam
            .get_images(&["new".to_string()], &Attributes::new())
            .await
            .unwrap();
        assert_eq!(images.len(), 1);
        assert_eq!(images[0].name, "new");
    }

    // ------------------------------------------------------------------
    // Concurrency
    // ------------------------------------------------------------------

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn overlapping_fetches_each_serve_a_distinct_image() {
        const N: usize = 20;
        let root = tempfile::tempdir().unwrap();
        let dir = root.path().join("seq");
        fs::create_dir(&dir).unwrap();
        for i in 0..N {
            write_image(&dir.join(format!("{i}.png")), (i * 12) as u8);
        }
        let cam = Arc::new(camera(root.path(), "seq", "png"));

        let handles: Vec<_> = (0..N)
            .map(|_| {
                let cam = Arc::clone(&cam);
                tokio::spawn(async move {
                    cam.get_image("image/png", &Attributes::new())
                        .await
                        .map(|img| shade(&img))
                })
            })
            .collect();

        let mut shades = Vec::with_capacity(N);
        for handle in handles {
            shades.push(handle.await.unwrap().unwrap());
        }
        shades.sort_unstable();
        shades.dedup();
        assert_eq!(shades.len(), N, "every image served exactly once");
        assert_eq!(cursor_of(&cam, root.path(), "seq").await, 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn reconfigure_during_fetches_never_mixes_sessions() {
        let root = tempfile::tempdir().unwrap();
        for (sub, base) in [("old", 0u8), ("new", 200u8)] {
            let dir = root.path().join(sub);
            fs::create_dir(&dir).unwrap();
            for i in 0..5u8 {
                write_image(&dir.join(format!("{i}.png")), base + i * 10);
            }
        }
        let cam = Arc::new(camera(root.path(), "old", "png"));

        let handles: Vec<_> = (0..40)
            .map(|_| {
                let cam = Arc::clone(&cam);
                tokio::spawn(async move { cam.get_images(&[], &Attributes::new()).await })
            })
            .collect();
        cam.apply(config_for(root.path(), "new", "png")).await.unwrap();

        for handle in handles {
            let (images, _) = handle.await.unwrap().unwrap();
            assert_eq!(images.len(), 1);
            let red = image::load_from_memory(&images[0].data)
                .unwrap()
                .to_rgb8()
                .get_pixel(0, 0)[0];
            match images[0].name.as_str() {
                "old" => assert!(red < 128, "old label with new pixels ({red})"),
                "new" => assert!(red >= 128, "new label with old pixels ({red})"),
                other => panic!("unexpected source {other}"),
            }
        }

        let cursors = cam.cursors().await;
        assert_eq!(cursors.len(), 1);
        assert!(cursors.contains_key(&root.path().join("new")));
        assert_eq!(cam.config().await.dir, "new");
    }

    #[tokio::test]
    async fn large_directory_indexes_every_file() {
        let names: Vec<String> = (0..100).map(|i| format!("img_{i:04}.jpg")).collect();
        let refs: Vec<&str> = names.iter().map(String::as_str).collect();
        let root = root_with("large", &refs);
        let cam = camera(root.path(), "large", "jpg");
        assert_eq!(cam.image_set().await.len(), 100);
        assert!(cam.get_image("", &extra(json!({ "index": 50 }))).await.is_ok());
        assert_eq!(cursor_of(&cam, root.path(), "large").await, 51);
    }
}
