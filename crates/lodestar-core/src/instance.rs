//! Instance: a named running (or to-be-running) instantiation of an
//! artifact.

use std::fmt;
use std::sync::OnceLock;

use crate::action::InstanceAction;
use crate::artifact::Artifact;

/// Numeric service instance id assigned by the ledger.
pub type InstanceId = u32;

/// A named instantiation of an [`Artifact`].
///
/// The numeric instance id is unknown until the ledger assigns one; it is
/// resolved on demand and cached, so resolution is idempotent and only the
/// first successful lookup requires a round-trip.
#[derive(Debug, Clone)]
pub struct Instance {
    /// The artifact this instance runs.
    pub artifact: Artifact,
    /// Instance name, unique on the ledger.
    pub name: String,
    /// What to do with this instance.
    pub action: InstanceAction,
    /// Declared configuration. Absence is distinct from an empty config.
    pub config: Option<toml::Value>,
    id: OnceLock<InstanceId>,
}

impl Instance {
    /// Creates an instance with an unresolved id.
    #[must_use]
    pub fn new(
        artifact: Artifact,
        name: impl Into<String>,
        action: InstanceAction,
        config: Option<toml::Value>,
    ) -> Self {
        Self {
            artifact,
            name: name.into(),
            action,
            config,
            id: OnceLock::new(),
        }
    }

    /// Returns the cached instance id, if resolved.
    #[must_use]
    pub fn instance_id(&self) -> Option<InstanceId> {
        self.id.get().copied()
    }

    /// Caches a resolved instance id.
    ///
    /// The first caller wins; later calls with a different id are ignored
    /// and the originally cached value is returned.
    pub fn cache_instance_id(&self, id: InstanceId) -> InstanceId {
        *self.id.get_or_init(|| id)
    }
}

impl fmt::Display for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.artifact)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::ArtifactAction;

    fn test_instance() -> Instance {
        let artifact = Artifact {
            runtime_id: 0,
            runtime: "rust".to_owned(),
            name: "example-token".to_owned(),
            version: "1.0.0".to_owned(),
            spec: toml::Value::Table(toml::map::Map::new()),
            deadline_height: 10_000,
            action: ArtifactAction::Deploy,
        };
        Instance::new(artifact, "xnm-token", InstanceAction::Start, None)
    }

    #[test]
    fn id_starts_unresolved() {
        let instance = test_instance();
        assert_eq!(instance.instance_id(), None);
    }

    #[test]
    fn id_resolution_is_idempotent() {
        let instance = test_instance();

        assert_eq!(instance.cache_instance_id(7), 7);
        assert_eq!(instance.cache_instance_id(9), 7);
        assert_eq!(instance.instance_id(), Some(7));
    }
}
