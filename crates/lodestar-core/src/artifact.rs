//! Artifact: a deployable unit on the ledger.

use std::fmt;
use std::hash::{Hash, Hasher};

use serde::Serialize;

use crate::action::ArtifactAction;
use crate::runtime::RuntimeId;

/// A deployable unit, identified on the ledger by runtime + name + version.
///
/// Identity is exactly `(runtime_id, name, version)`: two values with the
/// same identity are interchangeable as map keys regardless of their spec
/// payload, deadline or action tag.
#[derive(Debug, Clone, Serialize)]
pub struct Artifact {
    /// Numeric runtime id, resolved through the runtime registry.
    pub runtime_id: RuntimeId,
    /// Runtime name the id was resolved from.
    pub runtime: String,
    /// Artifact name.
    pub name: String,
    /// Artifact version.
    pub version: String,
    /// Free-form artifact spec, encoded by a runtime spec loader before
    /// submission.
    #[serde(skip)]
    pub spec: toml::Value,
    /// Ledger height by which the action must complete.
    pub deadline_height: u64,
    /// What to do with this artifact.
    pub action: ArtifactAction,
}

impl Artifact {
    /// Returns true if the plan asks for this artifact to be deployed.
    #[must_use]
    pub fn is_deploy(&self) -> bool {
        self.action == ArtifactAction::Deploy
    }

    /// Returns true if the plan asks for this artifact to be unloaded.
    #[must_use]
    pub fn is_unload(&self) -> bool {
        self.action == ArtifactAction::Unload
    }
}

impl PartialEq for Artifact {
    fn eq(&self, other: &Self) -> bool {
        self.runtime_id == other.runtime_id
            && self.name == other.name
            && self.version == other.version
    }
}

impl Eq for Artifact {}

impl Hash for Artifact {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.runtime_id.hash(state);
        self.name.hash(state);
        self.version.hash(state);
    }
}

impl fmt::Display for Artifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.runtime_id, self.name, self.version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn artifact(action: ArtifactAction) -> Artifact {
        Artifact {
            runtime_id: 0,
            runtime: "rust".to_owned(),
            name: "example-token".to_owned(),
            version: "1.0.0".to_owned(),
            spec: toml::Value::Table(toml::map::Map::new()),
            deadline_height: 10_000,
            action,
        }
    }

    #[test]
    fn identity_ignores_non_key_fields() {
        let a = artifact(ArtifactAction::Deploy);
        let mut b = artifact(ArtifactAction::Unload);
        b.deadline_height = 99;

        assert_eq!(a, b);

        let mut map = HashMap::new();
        map.insert(a, 1);
        assert_eq!(map.get(&b), Some(&1));
    }

    #[test]
    fn identity_distinguishes_versions() {
        let a = artifact(ArtifactAction::Deploy);
        let mut b = artifact(ArtifactAction::Deploy);
        b.version = "2.0.0".to_owned();

        assert_ne!(a, b);
    }

    #[test]
    fn display_format() {
        let a = artifact(ArtifactAction::Deploy);
        assert_eq!(a.to_string(), "0:example-token:1.0.0");
    }
}
