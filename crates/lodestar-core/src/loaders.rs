//! Spec-loader plugins.
//!
//! A spec loader turns a declarative artifact or instance spec into the
//! opaque byte payload a specific runtime or service expects. Loaders are
//! bound by name through a [`LoaderRegistry`] populated at startup; a plan
//! referencing an unbound name is a configuration error, surfaced before
//! any request is built.

use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;

use crate::instance::Instance;

/// Errors raised while encoding a spec or config payload.
#[derive(Debug, Error)]
pub enum SpecLoadError {
    /// The payload could not be serialized.
    #[error("spec serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Loader-specific failure.
    #[error("spec loader error: {0}")]
    Loader(String),
}

impl SpecLoadError {
    /// Create a loader-specific error.
    #[must_use]
    pub fn loader(msg: impl Into<String>) -> Self {
        Self::Loader(msg.into())
    }
}

/// Encoder for runtime-specific artifact specs.
pub trait RuntimeSpecLoader: Send + Sync {
    /// Encodes the artifact spec into the runtime's byte payload.
    fn encode_spec(&self, spec: &toml::Value) -> Result<Vec<u8>, SpecLoadError>;
}

/// Encoder for artifact-specific instance configurations.
pub trait InstanceSpecLoader: Send + Sync {
    /// Encodes the instance's declared config into the service's byte
    /// payload. Called only when the instance declares a config.
    fn encode_config(&self, instance: &Instance) -> Result<Vec<u8>, SpecLoadError>;
}

/// Spec encoder for the baseline rust runtime.
///
/// Rust artifacts carry no spec; the payload is empty.
#[derive(Debug, Default)]
pub struct NoopSpecLoader;

impl RuntimeSpecLoader for NoopSpecLoader {
    fn encode_spec(&self, _spec: &toml::Value) -> Result<Vec<u8>, SpecLoadError> {
        Ok(Vec::new())
    }
}

/// Default instance config encoder.
///
/// Renders the declared config as canonical JSON. Services with a richer
/// wire schema bind their own loader through the plan's plugin table.
#[derive(Debug, Default)]
pub struct DefaultInstanceSpecLoader;

impl InstanceSpecLoader for DefaultInstanceSpecLoader {
    fn encode_config(&self, instance: &Instance) -> Result<Vec<u8>, SpecLoadError> {
        match &instance.config {
            Some(config) => Ok(serde_json::to_vec(config)?),
            None => Ok(Vec::new()),
        }
    }
}

/// Startup-time registry binding plugin names to loader implementations.
///
/// Plans reference loaders by name in their `plugins` table; unknown names
/// are rejected when the engine resolves the plan.
#[derive(Default)]
pub struct LoaderRegistry {
    runtime_loaders: HashMap<String, Arc<dyn RuntimeSpecLoader>>,
    instance_loaders: HashMap<String, Arc<dyn InstanceSpecLoader>>,
}

impl LoaderRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry with the built-in loaders: `noop` (empty
    /// payload) and `json` (canonical JSON config rendering).
    #[must_use]
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register_runtime_loader("noop", Arc::new(NoopSpecLoader));
        registry.register_instance_loader("json", Arc::new(DefaultInstanceSpecLoader));
        registry
    }

    /// Registers a runtime spec loader under a plugin name.
    ///
    /// Re-registering a name replaces the previous binding.
    pub fn register_runtime_loader(
        &mut self,
        name: impl Into<String>,
        loader: Arc<dyn RuntimeSpecLoader>,
    ) {
        self.runtime_loaders.insert(name.into(), loader);
    }

    /// Registers an instance spec loader under a plugin name.
    pub fn register_instance_loader(
        &mut self,
        name: impl Into<String>,
        loader: Arc<dyn InstanceSpecLoader>,
    ) {
        self.instance_loaders.insert(name.into(), loader);
    }

    /// Looks up a runtime spec loader by plugin name.
    #[must_use]
    pub fn runtime_loader(&self, name: &str) -> Option<Arc<dyn RuntimeSpecLoader>> {
        self.runtime_loaders.get(name).map(Arc::clone)
    }

    /// Looks up an instance spec loader by plugin name.
    #[must_use]
    pub fn instance_loader(&self, name: &str) -> Option<Arc<dyn InstanceSpecLoader>> {
        self.instance_loaders.get(name).map(Arc::clone)
    }
}

impl std::fmt::Debug for LoaderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoaderRegistry")
            .field("runtime_loaders", &self.runtime_loaders.keys())
            .field("instance_loaders", &self.instance_loaders.keys())
            .finish()
    }
}
