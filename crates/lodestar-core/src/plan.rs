//! Deployment plan loading and validation.
//!
//! A plan is written as a TOML file and parsed into the read-only [`Plan`]
//! aggregate consumed by the engine. Parsing resolves every artifact's
//! runtime through the [`RuntimeRegistry`] and validates cross-references
//! (instance → artifact, plugin binding → declared runtime or artifact)
//! up front, so the engine never sees a dangling reference.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::action::{ArtifactAction, InstanceAction};
use crate::artifact::Artifact;
use crate::instance::Instance;
use crate::runtime::{RuntimeId, RuntimeRegistry, RuntimeRegistryError};

/// Errors that can occur while loading a plan.
#[derive(Debug, Error)]
pub enum PlanError {
    /// The plan file could not be read.
    #[error("failed to read plan file: {0}")]
    Io(#[from] std::io::Error),

    /// The plan file is not valid TOML or does not match the schema.
    #[error("failed to parse plan: {0}")]
    Parse(#[from] toml::de::Error),

    /// Runtime declaration or resolution failed.
    #[error(transparent)]
    Runtime(#[from] RuntimeRegistryError),

    /// The plan declares no networks.
    #[error("plan declares no networks")]
    NoNetworks,

    /// An instance references an artifact the plan does not declare.
    #[error("instance '{instance}' references unknown artifact '{artifact}'")]
    UnknownArtifact {
        /// Instance name.
        instance: String,
        /// The dangling artifact alias.
        artifact: String,
    },

    /// A plugin binding references an undeclared runtime or artifact.
    #[error("plugin binding for {kind} '{name}' does not match any declaration in the plan")]
    UnknownPluginReference {
        /// "runtime" or "artifact".
        kind: &'static str,
        /// The dangling name.
        name: String,
    },

    /// An artifact that must be submitted has no deadline height.
    #[error("artifact '{0}' has no deadline_height (set it on the artifact or at the plan top level)")]
    MissingDeadlineHeight(String),
}

/// Supervisor operating mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SupervisorMode {
    /// Single-authority mode; proposals take effect directly.
    #[default]
    Simple,
    /// Multi-validator confirmation mode.
    Decentralized,
}

/// Connection descriptor for one ledger node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkNode {
    /// Host name or address.
    pub host: String,
    /// Port of the public API.
    pub public_api_port: u16,
    /// Port of the private (administrative) API.
    pub private_api_port: u16,
    /// Whether to connect over TLS.
    #[serde(default)]
    pub ssl: bool,
}

impl NetworkNode {
    fn scheme(&self) -> &'static str {
        if self.ssl {
            "https"
        } else {
            "http"
        }
    }

    /// Base URL of the node's public API.
    #[must_use]
    pub fn public_url(&self) -> String {
        format!("{}://{}:{}", self.scheme(), self.host, self.public_api_port)
    }

    /// Base URL of the node's private API.
    #[must_use]
    pub fn private_url(&self) -> String {
        format!("{}://{}:{}", self.scheme(), self.host, self.private_api_port)
    }
}

/// Validator key pair declared in the consensus block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatorKeys {
    /// Consensus key, hex-encoded.
    pub consensus_key: String,
    /// Service key, hex-encoded.
    pub service_key: String,
}

/// Consensus parameters submitted as part of a config proposal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsensusConfig {
    /// Validator key set.
    pub validator_keys: Vec<ValidatorKeys>,
    /// First round timeout in milliseconds.
    pub first_round_timeout: u64,
    /// Status broadcast timeout in milliseconds.
    pub status_timeout: u64,
    /// Peer exchange timeout in milliseconds.
    pub peers_timeout: u64,
    /// Maximum number of transactions per block.
    pub txs_block_limit: u32,
    /// Maximum message length in bytes.
    pub max_message_len: u32,
    /// Minimal propose timeout in milliseconds.
    pub min_propose_timeout: u64,
    /// Maximal propose timeout in milliseconds.
    pub max_propose_timeout: u64,
    /// Transaction count that switches propose timeout to the minimum.
    pub propose_timeout_threshold: u32,
}

/// Plugin bindings: loader names keyed by runtime name or artifact alias.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginBindings {
    /// Runtime name → runtime spec loader name.
    #[serde(default)]
    pub runtime: HashMap<String, String>,
    /// Artifact alias → instance spec loader name.
    #[serde(default)]
    pub artifact: HashMap<String, String>,
}

/// The validated deployment plan.
///
/// Owned by the caller and read-only to the engine.
#[derive(Debug, Clone)]
pub struct Plan {
    /// Nodes the engine talks to.
    pub networks: Vec<NetworkNode>,
    /// Supervisor operating mode.
    pub supervisor_mode: SupervisorMode,
    /// Ledger height from which batched config changes take effect.
    pub actual_from: u64,
    /// Declared artifacts, keyed by plan alias.
    pub artifacts: BTreeMap<String, Artifact>,
    /// Declared service instances, in plan order.
    pub instances: Vec<Instance>,
    /// Migration targets: service name → new artifact.
    pub migrations: BTreeMap<String, Artifact>,
    /// Plugin bindings.
    pub plugins: PluginBindings,
    /// Optional consensus parameter change.
    pub consensus: Option<ConsensusConfig>,
}

impl Plan {
    /// Loads and validates a plan from a TOML file.
    ///
    /// Runtimes declared in the plan's `runtimes` table are added to the
    /// registry; the registry is frozen once the plan is built.
    pub fn from_file(
        path: impl AsRef<Path>,
        registry: &mut RuntimeRegistry,
    ) -> Result<Self, PlanError> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&raw, registry)
    }

    /// Parses and validates a plan from a TOML string.
    pub fn from_toml_str(
        raw: &str,
        registry: &mut RuntimeRegistry,
    ) -> Result<Self, PlanError> {
        let raw: RawPlan = toml::from_str(raw)?;
        Self::from_raw(raw, registry)
    }

    fn from_raw(raw: RawPlan, registry: &mut RuntimeRegistry) -> Result<Self, PlanError> {
        if raw.networks.is_empty() {
            return Err(PlanError::NoNetworks);
        }

        for (name, id) in &raw.runtimes {
            registry.declare(name, *id)?;
        }

        let mut artifacts = BTreeMap::new();
        for (alias, value) in raw.artifacts {
            let artifact = build_artifact(&alias, value, raw.deadline_height, registry)?;
            artifacts.insert(alias, artifact);
        }

        let mut instances = Vec::new();
        for (name, value) in raw.instances {
            let artifact =
                artifacts
                    .get(&value.artifact)
                    .ok_or_else(|| PlanError::UnknownArtifact {
                        instance: name.clone(),
                        artifact: value.artifact.clone(),
                    })?;
            instances.push(Instance::new(
                artifact.clone(),
                name,
                value.action,
                value.config,
            ));
        }

        let mut migrations = BTreeMap::new();
        for (service, value) in raw.migrations {
            let artifact = build_migration_artifact(&service, value, raw.deadline_height, registry)?;
            migrations.insert(service, artifact);
        }

        for runtime_name in raw.plugins.runtime.keys() {
            if registry.resolve(runtime_name).is_err() {
                return Err(PlanError::UnknownPluginReference {
                    kind: "runtime",
                    name: runtime_name.clone(),
                });
            }
        }
        for artifact_alias in raw.plugins.artifact.keys() {
            if !artifacts.contains_key(artifact_alias) {
                return Err(PlanError::UnknownPluginReference {
                    kind: "artifact",
                    name: artifact_alias.clone(),
                });
            }
        }

        // The registry must not change under a built plan.
        registry.freeze();

        Ok(Self {
            networks: raw.networks,
            supervisor_mode: raw.supervisor_mode,
            actual_from: raw.actual_from,
            artifacts,
            instances,
            migrations,
            plugins: raw.plugins,
            consensus: raw.consensus,
        })
    }

    /// Returns true if the plan runs in `Simple` supervisor mode.
    #[must_use]
    pub fn is_simple(&self) -> bool {
        self.supervisor_mode == SupervisorMode::Simple
    }

    /// Artifacts tagged for deployment, in plan order.
    pub fn deploy_artifacts(&self) -> impl Iterator<Item = &Artifact> {
        self.artifacts.values().filter(|a| a.is_deploy())
    }

    /// Artifacts tagged for unload, in plan order.
    pub fn unload_artifacts(&self) -> impl Iterator<Item = &Artifact> {
        self.artifacts.values().filter(|a| a.is_unload())
    }
}

fn build_artifact(
    alias: &str,
    raw: RawArtifact,
    plan_deadline: Option<u64>,
    registry: &RuntimeRegistry,
) -> Result<Artifact, PlanError> {
    let runtime_id = registry.resolve(&raw.runtime)?;

    // A per-artifact deadline overrides the plan-wide default. Artifacts
    // that are never submitted (action `none`) do not need one.
    let deadline = raw.deadline_height.or(plan_deadline);
    let deadline_height = match (deadline, raw.action) {
        (Some(height), _) => height,
        (None, ArtifactAction::None) => 0,
        (None, _) => return Err(PlanError::MissingDeadlineHeight(alias.to_owned())),
    };

    Ok(Artifact {
        runtime_id,
        runtime: raw.runtime,
        name: raw.name,
        version: raw.version,
        spec: raw
            .spec
            .unwrap_or_else(|| toml::Value::Table(toml::map::Map::new())),
        deadline_height,
        action: raw.action,
    })
}

fn build_migration_artifact(
    service: &str,
    raw: RawArtifact,
    plan_deadline: Option<u64>,
    registry: &RuntimeRegistry,
) -> Result<Artifact, PlanError> {
    let runtime_id = registry.resolve(&raw.runtime)?;

    // Migration requests always carry a deadline.
    let deadline_height = raw
        .deadline_height
        .or(plan_deadline)
        .ok_or_else(|| PlanError::MissingDeadlineHeight(service.to_owned()))?;

    Ok(Artifact {
        runtime_id,
        runtime: raw.runtime,
        name: raw.name,
        version: raw.version,
        spec: raw
            .spec
            .unwrap_or_else(|| toml::Value::Table(toml::map::Map::new())),
        deadline_height,
        action: ArtifactAction::None,
    })
}

// ---------------------------------------------------------------------------
// Raw (pre-validation) schema
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct RawPlan {
    networks: Vec<NetworkNode>,
    #[serde(default)]
    runtimes: BTreeMap<String, RuntimeId>,
    #[serde(default)]
    supervisor_mode: SupervisorMode,
    #[serde(default)]
    actual_from: u64,
    deadline_height: Option<u64>,
    #[serde(default)]
    plugins: PluginBindings,
    consensus: Option<ConsensusConfig>,
    #[serde(default)]
    artifacts: BTreeMap<String, RawArtifact>,
    #[serde(default)]
    instances: BTreeMap<String, RawInstance>,
    #[serde(default)]
    migrations: BTreeMap<String, RawArtifact>,
}

#[derive(Debug, Deserialize)]
struct RawArtifact {
    name: String,
    version: String,
    #[serde(default = "default_runtime")]
    runtime: String,
    spec: Option<toml::Value>,
    #[serde(default)]
    action: ArtifactAction,
    deadline_height: Option<u64>,
}

fn default_runtime() -> String {
    crate::runtime::RUST_RUNTIME.to_owned()
}

#[derive(Debug, Deserialize)]
struct RawInstance {
    artifact: String,
    #[serde(default)]
    action: InstanceAction,
    config: Option<toml::Value>,
}
