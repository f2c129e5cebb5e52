//! Runtime registry: name → numeric runtime id.
//!
//! The ledger identifies execution environments by small integer ids. The
//! registry is constructed once per process, seeded with the baseline
//! `rust` runtime, optionally extended with additional runtimes, and then
//! frozen by the first plan build. Declaring a runtime after the freeze is
//! an error.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use thiserror::Error;
use tracing::debug;

/// Numeric runtime identifier understood by the ledger.
pub type RuntimeId = u32;

/// The baseline runtime present in every registry.
pub const RUST_RUNTIME: &str = "rust";

/// Errors that can occur during runtime registry operations.
#[derive(Debug, Error)]
pub enum RuntimeRegistryError {
    /// A runtime with this name is already declared.
    #[error("runtime '{name}' is already declared with id {id}")]
    AlreadyDeclared {
        /// Runtime name.
        name: String,
        /// The id it was declared with.
        id: RuntimeId,
    },

    /// The registry was frozen by a plan build.
    #[error("runtime registry is frozen; declare runtimes before building a plan")]
    Frozen,

    /// The requested runtime is not declared.
    #[error("unknown runtime: {0}")]
    Unknown(String),
}

/// Registry of runtime names and their numeric ids.
#[derive(Debug)]
pub struct RuntimeRegistry {
    runtimes: HashMap<String, RuntimeId>,
    frozen: AtomicBool,
}

impl RuntimeRegistry {
    /// Creates a registry containing the baseline `rust = 0` entry.
    #[must_use]
    pub fn new() -> Self {
        let mut runtimes = HashMap::new();
        runtimes.insert(RUST_RUNTIME.to_owned(), 0);
        Self {
            runtimes,
            frozen: AtomicBool::new(false),
        }
    }

    /// Declares an additional runtime.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is already declared or the registry is
    /// frozen.
    pub fn declare(&mut self, name: &str, id: RuntimeId) -> Result<(), RuntimeRegistryError> {
        if self.frozen.load(Ordering::Acquire) {
            return Err(RuntimeRegistryError::Frozen);
        }

        if let Some(existing) = self.runtimes.get(name) {
            return Err(RuntimeRegistryError::AlreadyDeclared {
                name: name.to_owned(),
                id: *existing,
            });
        }

        debug!(runtime = %name, id, "runtime declared");
        self.runtimes.insert(name.to_owned(), id);
        Ok(())
    }

    /// Looks up a runtime id by name.
    ///
    /// # Errors
    ///
    /// Returns an error if the runtime is not declared.
    pub fn resolve(&self, name: &str) -> Result<RuntimeId, RuntimeRegistryError> {
        self.runtimes
            .get(name)
            .copied()
            .ok_or_else(|| RuntimeRegistryError::Unknown(name.to_owned()))
    }

    /// Freezes the registry. Later `declare` calls fail.
    ///
    /// Called by the first plan build; repeated lookups after the freeze
    /// are stable for the process lifetime.
    pub fn freeze(&self) {
        self.frozen.store(true, Ordering::Release);
    }

    /// Returns true once the registry has been frozen.
    #[must_use]
    pub fn is_frozen(&self) -> bool {
        self.frozen.load(Ordering::Acquire)
    }

    /// Returns a copy of the declared runtimes.
    #[must_use]
    pub fn runtimes(&self) -> HashMap<String, RuntimeId> {
        self.runtimes.clone()
    }
}

impl Default for RuntimeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn baseline_rust_runtime() {
        let registry = RuntimeRegistry::new();
        assert_eq!(registry.resolve("rust").unwrap(), 0);
    }

    #[test]
    fn declare_and_resolve() {
        let mut registry = RuntimeRegistry::new();
        registry.declare("java", 1).unwrap();

        assert_eq!(registry.resolve("java").unwrap(), 1);
        assert_eq!(registry.resolve("rust").unwrap(), 0);
    }

    #[test]
    fn resolution_is_stable() {
        let mut registry = RuntimeRegistry::new();
        registry.declare("wasm", 3).unwrap();

        let first = registry.resolve("wasm").unwrap();
        let second = registry.resolve("wasm").unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn duplicate_declaration_fails() {
        let mut registry = RuntimeRegistry::new();
        registry.declare("java", 1).unwrap();

        let result = registry.declare("java", 2);
        assert!(matches!(
            result,
            Err(RuntimeRegistryError::AlreadyDeclared { id: 1, .. })
        ));
    }

    #[test]
    fn frozen_registry_rejects_declarations() {
        let mut registry = RuntimeRegistry::new();
        registry.freeze();

        let result = registry.declare("java", 1);
        assert!(matches!(result, Err(RuntimeRegistryError::Frozen)));
    }

    #[test]
    fn unknown_runtime_fails() {
        let registry = RuntimeRegistry::new();
        assert!(matches!(
            registry.resolve("cobol"),
            Err(RuntimeRegistryError::Unknown(_))
        ));
    }
}
