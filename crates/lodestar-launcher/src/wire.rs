//! Administrative request bodies and the wire codec seam.
//!
//! The engine builds typed request values; a [`WireCodec`] turns them into
//! the opaque byte payload the ledger expects. The shipped [`JsonCodec`]
//! renders deterministic JSON; deployments talking to a ledger with a
//! different wire format plug in their own codec.

use serde::Serialize;
use thiserror::Error;

use lodestar_core::{Artifact, ConsensusConfig, InstanceId};

/// Errors raised while encoding a request.
#[derive(Debug, Error)]
pub enum WireError {
    /// The request could not be serialized.
    #[error("wire encoding failed: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Ledger-side artifact identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArtifactRef {
    /// Numeric runtime id.
    pub runtime_id: u32,
    /// Artifact name.
    pub name: String,
    /// Artifact version.
    pub version: String,
}

impl From<&Artifact> for ArtifactRef {
    fn from(artifact: &Artifact) -> Self {
        Self {
            runtime_id: artifact.runtime_id,
            name: artifact.name.clone(),
            version: artifact.version.clone(),
        }
    }
}

/// Request to deploy an artifact.
///
/// The seed is a fresh random value letting the ledger tell a retried
/// submission apart from a duplicate.
#[derive(Debug, Clone, Serialize)]
pub struct DeployRequest {
    /// Artifact to deploy.
    pub artifact: ArtifactRef,
    /// Runtime-specific artifact spec, encoded by a spec loader.
    #[serde(with = "hex::serde")]
    pub spec: Vec<u8>,
    /// Ledger height by which the deployment must complete.
    pub deadline_height: u64,
    /// Anti-replay token.
    pub seed: u64,
}

/// One change inside a config proposal.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfigChange {
    /// Replace the consensus parameters.
    Consensus(ConsensusConfig),
    /// Start a new service instance.
    StartService {
        /// Artifact the instance runs.
        artifact: ArtifactRef,
        /// Instance name.
        name: String,
        /// Encoded instance configuration (empty when none declared).
        #[serde(with = "hex::serde")]
        config: Vec<u8>,
    },
    /// Stop a running instance.
    StopService {
        /// Resolved instance id.
        instance_id: InstanceId,
    },
    /// Resume a stopped instance.
    ResumeService {
        /// Resolved instance id.
        instance_id: InstanceId,
        /// Encoded resume parameters (empty when none declared).
        #[serde(with = "hex::serde")]
        params: Vec<u8>,
    },
    /// Freeze a running instance.
    FreezeService {
        /// Resolved instance id.
        instance_id: InstanceId,
    },
    /// Apply a new configuration to a running instance.
    Service {
        /// Resolved instance id.
        instance_id: InstanceId,
        /// Encoded configuration parameters.
        #[serde(with = "hex::serde")]
        params: Vec<u8>,
    },
    /// Unload an artifact.
    UnloadArtifact {
        /// Artifact to unload.
        artifact: ArtifactRef,
    },
}

/// Aggregate config proposal.
///
/// The configuration number is an optimistic-concurrency token: it must
/// match the node's current configuration sequence at apply time, so it is
/// fetched fresh immediately before every proposal build.
#[derive(Debug, Clone, Serialize)]
pub struct ConfigPropose {
    /// Height from which the changes take effect.
    pub actual_from: u64,
    /// Optimistic-concurrency token.
    pub configuration_number: u64,
    /// Ordered list of changes.
    pub changes: Vec<ConfigChange>,
}

/// Request to migrate a service's data to a newer artifact.
#[derive(Debug, Clone, Serialize)]
pub struct MigrationRequest {
    /// Artifact to migrate to.
    pub new_artifact: ArtifactRef,
    /// Name of the service being migrated.
    pub service: String,
    /// Ledger height by which the migration must complete.
    pub deadline_height: u64,
    /// Anti-replay token; status queries are keyed by the same seed.
    pub seed: u64,
}

/// Encodes administrative requests to the ledger's wire format.
pub trait WireCodec: Send + Sync {
    /// Encodes a deploy request.
    fn encode_deploy(&self, request: &DeployRequest) -> Result<Vec<u8>, WireError>;

    /// Encodes a config proposal.
    fn encode_proposal(&self, request: &ConfigPropose) -> Result<Vec<u8>, WireError>;

    /// Encodes a migration request.
    fn encode_migration(&self, request: &MigrationRequest) -> Result<Vec<u8>, WireError>;
}

/// Deterministic JSON wire encoding.
#[derive(Debug, Default)]
pub struct JsonCodec;

impl WireCodec for JsonCodec {
    fn encode_deploy(&self, request: &DeployRequest) -> Result<Vec<u8>, WireError> {
        Ok(serde_json::to_vec(request)?)
    }

    fn encode_proposal(&self, request: &ConfigPropose) -> Result<Vec<u8>, WireError> {
        Ok(serde_json::to_vec(request)?)
    }

    fn encode_migration(&self, request: &MigrationRequest) -> Result<Vec<u8>, WireError> {
        Ok(serde_json::to_vec(request)?)
    }
}
