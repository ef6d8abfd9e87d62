//! [`ResourceRegistry`] – model registration and instance lifecycle.
//!
//! Stands in for the host's resource registry. A driver registers its
//! [`Model`] together with a [`ModelRegistration`] (a pre-flight validator
//! and a constructor). The host then validates attributes, creates named
//! instances, routes reconfiguration to them and looks them up by name.
//!
//! # Lifecycle
//!
//! | Step | Registry call | Driver hook |
//! |---|---|---|
//! | pre-flight | [`ResourceRegistry::validate`] | `validate` |
//! | construction | [`ResourceRegistry::create`] | `create` (runs its own pre-flight) |
//! | attribute change | [`ResourceRegistry::reconfigure`] | [`Camera::reconfigure`] |
//! | shutdown | [`ResourceRegistry::remove`] | drop |

use std::collections::HashMap;
use std::sync::Arc;

use imagedir_types::{CameraError, Model, Validation};
use tracing::info;

use crate::camera::{Attributes, Camera};

/// Pre-flight check over raw attributes. Must not have side effects.
pub type ValidateFn = fn(&Attributes) -> Validation;

/// Build a ready-to-serve instance named `name` from raw attributes.
///
/// Constructors validate as part of construction and fail with
/// [`CameraError::InvalidConfig`]; the registry does not call the
/// [`ValidateFn`] first, so the backing resource is inspected only once.
pub type CreateFn = fn(&str, &Attributes) -> Result<Arc<dyn Camera>, CameraError>;

/// The pair of hooks a driver hands to the registry for one model.
#[derive(Clone, Copy)]
pub struct ModelRegistration {
    pub validate: ValidateFn,
    pub create: CreateFn,
}

/// Registry of camera models and the live instances built from them.
#[derive(Default)]
pub struct ResourceRegistry {
    models: HashMap<Model, ModelRegistration>,
    cameras: HashMap<String, Arc<dyn Camera>>,
}

impl ResourceRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a model. Any previous registration of the same model is
    /// replaced.
    pub fn register_model(&mut self, model: Model, registration: ModelRegistration) {
        info!(%model, "registered camera model");
        self.models.insert(model, registration);
    }

    /// Run the model's pre-flight validation.
    ///
    /// # Errors
    ///
    /// Returns [`CameraError::InvalidRequest`] when `model` is not registered.
    pub fn validate(&self, model: &Model, attributes: &Attributes) -> Result<Validation, CameraError> {
        let registration = self.registration(model)?;
        Ok((registration.validate)(attributes))
    }

    /// Construct a new instance named `name`.
    ///
    /// An existing instance with the same name is replaced.
    ///
    /// # Errors
    ///
    /// Returns [`CameraError::InvalidRequest`] for an unknown model,
    /// otherwise whatever the constructor fails with (usually
    /// [`CameraError::InvalidConfig`]).
    pub fn create(
        &mut self,
        model: &Model,
        name: &str,
        attributes: &Attributes,
    ) -> Result<Arc<dyn Camera>, CameraError> {
        let registration = *self.registration(model)?;
        let camera = (registration.create)(name, attributes)?;
        info!(camera = name, %model, "camera created");
        self.cameras.insert(name.to_string(), Arc::clone(&camera));
        Ok(camera)
    }

    /// Forward new attributes to the live instance named `name`.
    ///
    /// # Errors
    ///
    /// Returns [`CameraError::InvalidRequest`] when no such instance exists,
    /// otherwise whatever the driver's reconfiguration fails with. A failed
    /// reconfiguration leaves the instance on its previous configuration.
    pub async fn reconfigure(&self, name: &str, attributes: &Attributes) -> Result<(), CameraError> {
        let camera = self
            .get(name)
            .ok_or_else(|| CameraError::InvalidRequest(format!("camera '{name}' is not registered")))?;
        camera.reconfigure(attributes).await
    }

    /// Look up a live instance.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Camera>> {
        self.cameras.get(name).cloned()
    }

    /// Drop a live instance from the registry and hand it back.
    pub fn remove(&mut self, name: &str) -> Option<Arc<dyn Camera>> {
        self.cameras.remove(name)
    }

    /// Names of every live instance, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.cameras.keys().cloned().collect();
        names.sort();
        names
    }

    fn registration(&self, model: &Model) -> Result<&ModelRegistration, CameraError> {
        self.models
            .get(model)
            .ok_or_else(|| CameraError::InvalidRequest(format!("model '{model}' is not registered")))
    }
}
