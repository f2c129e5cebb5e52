//! Admin API capability and response types.
//!
//! One [`AdminApi`] implementation exists per configured node. The engine
//! only ever talks to a node through this trait, which keeps the HTTP
//! plumbing in one place and lets tests substitute a recording mock.

mod http;
mod mock;

pub use http::HttpNodeClient;
pub use mock::MockNodeClient;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use lodestar_core::InstanceId;

use crate::error::LauncherResult;
use crate::wire::ArtifactRef;

/// Hash of a submitted transaction, as reported by the admin API.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TxHash(String);

impl TxHash {
    /// Create a transaction hash from its hex string form.
    #[must_use]
    pub fn new(hash: impl Into<String>) -> Self {
        Self(hash.into())
    }

    /// Get the hash as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TxHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for TxHash {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Artifact entry in the dispatcher's artifact list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactEntry {
    /// Numeric runtime id.
    pub runtime_id: u32,
    /// Artifact name.
    pub name: String,
    /// Artifact version.
    pub version: String,
}

/// Running-service entry in the dispatcher's service list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceEntry {
    /// Instance specification.
    pub spec: ServiceSpec,
}

/// Specification of a running service instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceSpec {
    /// Assigned instance id.
    pub id: InstanceId,
    /// Instance name.
    pub name: String,
}

/// Dispatcher info: deployed artifacts and running services, as of the
/// most recently committed block.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DispatcherInfo {
    /// Deployed artifacts.
    #[serde(default)]
    pub artifacts: Vec<ArtifactEntry>,
    /// Running service instances.
    #[serde(default)]
    pub services: Vec<ServiceEntry>,
}

/// Observed status of a submitted transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TxStatus {
    /// Not yet committed (in pool, unknown, or the node has not seen it).
    NotCommitted,
    /// Committed; `success` reflects the execution outcome.
    Committed {
        /// Whether execution succeeded.
        success: bool,
        /// Execution outcome description ("OK" on success).
        description: String,
    },
}

/// State of a requested data migration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum MigrationState {
    /// Still running.
    Pending,
    /// Finished successfully.
    Succeed,
    /// Finished with an error.
    Failed {
        /// Error description reported by the ledger.
        description: String,
    },
}

/// Query parameters for a migration status lookup.
#[derive(Debug, Clone, Serialize)]
pub struct MigrationStatusQuery {
    /// Name of the service being migrated.
    pub service: String,
    /// Migration target, in `runtime_id:name:version` form.
    pub new_artifact: String,
    /// Deadline height of the migration request.
    pub deadline_height: u64,
    /// Seed of the migration request.
    pub seed: u64,
}

impl MigrationStatusQuery {
    /// Build a status query matching a previously submitted migration
    /// request.
    #[must_use]
    pub fn new(service: &str, artifact: &ArtifactRef, deadline_height: u64, seed: u64) -> Self {
        Self {
            service: service.to_owned(),
            new_artifact: format!(
                "{}:{}:{}",
                artifact.runtime_id, artifact.name, artifact.version
            ),
            deadline_height,
            seed,
        }
    }
}

/// Administrative endpoints accepting request submissions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdminEndpoint {
    /// Deploy an artifact.
    DeployArtifact,
    /// Propose an aggregate config change.
    ProposeConfig,
    /// Request a service data migration.
    Migrate,
}

impl AdminEndpoint {
    /// URL path segment of the endpoint.
    #[must_use]
    pub const fn path(self) -> &'static str {
        match self {
            Self::DeployArtifact => "deploy-artifact",
            Self::ProposeConfig => "propose-config",
            Self::Migrate => "migrate",
        }
    }
}

/// Capability interface to one ledger node's administrative API.
#[async_trait]
pub trait AdminApi: Send + Sync {
    /// Probe the node's private stats endpoint.
    ///
    /// Used at initialization to verify the node is reachable.
    async fn health_check(&self) -> LauncherResult<()>;

    /// Fetch the dispatcher's artifact and service lists.
    async fn dispatcher_info(&self) -> LauncherResult<DispatcherInfo>;

    /// Fetch the status of a transaction by hash.
    async fn transaction_status(&self, tx_hash: &TxHash) -> LauncherResult<TxStatus>;

    /// Fetch the node's current configuration sequence number.
    async fn configuration_number(&self) -> LauncherResult<u64>;

    /// Fetch the state of a requested migration.
    async fn migration_status(
        &self,
        query: &MigrationStatusQuery,
    ) -> LauncherResult<MigrationState>;

    /// Submit an encoded request to an administrative endpoint.
    ///
    /// One POST; no retry at this layer.
    async fn submit(&self, endpoint: AdminEndpoint, payload: &[u8]) -> LauncherResult<TxHash>;

    /// Suspend until the next block boundary (or the closest the
    /// transport can offer).
    async fn wait_for_block(&self) -> LauncherResult<()>;

    /// Human-readable node address for logs and error messages.
    fn address(&self) -> String;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn migration_state_parses_from_json() {
        let pending: MigrationState = serde_json::from_str(r#"{"state": "pending"}"#).unwrap();
        assert_eq!(pending, MigrationState::Pending);

        let succeed: MigrationState = serde_json::from_str(r#"{"state": "succeed"}"#).unwrap();
        assert_eq!(succeed, MigrationState::Succeed);

        let failed: MigrationState =
            serde_json::from_str(r#"{"state": "failed", "description": "schema mismatch"}"#)
                .unwrap();
        assert_eq!(
            failed,
            MigrationState::Failed {
                description: "schema mismatch".to_owned()
            }
        );
    }

    #[test]
    fn migration_query_formats_artifact() {
        let artifact = ArtifactRef {
            runtime_id: 0,
            name: "example-token".to_owned(),
            version: "2.0.0".to_owned(),
        };
        let query = MigrationStatusQuery::new("token-service", &artifact, 500, 42);

        assert_eq!(query.new_artifact, "0:example-token:2.0.0");
        assert_eq!(query.seed, 42);
    }

    #[test]
    fn dispatcher_info_tolerates_missing_lists() {
        let info: DispatcherInfo = serde_json::from_str("{}").unwrap();
        assert!(info.artifacts.is_empty());
        assert!(info.services.is_empty());
    }
}
