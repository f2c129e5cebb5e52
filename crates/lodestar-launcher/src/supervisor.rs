//! Request builder and submitter for the ledger's supervisor service.
//!
//! The Supervisor knows the shape of every administrative request and how
//! to address the admin API. Submission is one POST per configured node,
//! issued sequentially in node-list order; a node-level failure surfaces
//! as an error to the caller and is not retried here.

use std::sync::Arc;

use tracing::{debug, info};

use lodestar_core::{
    Artifact, ConsensusConfig, Instance, InstanceAction, InstanceId, InstanceSpecLoader,
    RuntimeSpecLoader, SupervisorMode,
};

use crate::api::{AdminApi, AdminEndpoint, MigrationState, MigrationStatusQuery, TxHash};
use crate::error::{LauncherError, LauncherResult};
use crate::explorer::Explorer;
use crate::wire::{
    ArtifactRef, ConfigChange, ConfigPropose, DeployRequest, MigrationRequest, WireCodec,
};

/// Builds administrative requests and delivers them to every configured
/// node.
pub struct Supervisor {
    clients: Vec<Arc<dyn AdminApi>>,
    codec: Arc<dyn WireCodec>,
}

impl Supervisor {
    /// Create a supervisor over the configured node clients.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if no clients are given.
    pub fn new(
        clients: Vec<Arc<dyn AdminApi>>,
        codec: Arc<dyn WireCodec>,
    ) -> LauncherResult<Self> {
        if clients.is_empty() {
            return Err(LauncherError::config("no admin clients configured"));
        }

        Ok(Self { clients, codec })
    }

    /// The node used for read-only queries (configuration number,
    /// migration status).
    fn main_client(&self) -> &dyn AdminApi {
        self.clients[0].as_ref()
    }

    /// Builds a deploy request for the artifact, encoding its spec with
    /// the runtime's spec loader.
    pub fn create_deploy_request(
        &self,
        artifact: &Artifact,
        spec_loader: &dyn RuntimeSpecLoader,
    ) -> LauncherResult<DeployRequest> {
        let spec = spec_loader.encode_spec(&artifact.spec)?;

        Ok(DeployRequest {
            artifact: ArtifactRef::from(artifact),
            spec,
            deadline_height: artifact.deadline_height,
            seed: random_seed(),
        })
    }

    /// Builds one aggregate config proposal covering an optional consensus
    /// change followed by one change per instance.
    ///
    /// The configuration number is fetched from the node immediately
    /// before building and never cached: it must match the node's current
    /// configuration sequence at apply time, and a stale number causes the
    /// ledger to reject the whole proposal.
    ///
    /// # Errors
    ///
    /// A configuration error in decentralized mode; a runtime error when a
    /// non-`start` instance cannot be resolved to a running id.
    pub async fn create_config_change_request(
        &self,
        explorer: &Explorer,
        consensus: Option<&ConsensusConfig>,
        instances: &[Instance],
        config_loaders: &[Arc<dyn InstanceSpecLoader>],
        actual_from: u64,
        mode: SupervisorMode,
    ) -> LauncherResult<ConfigPropose> {
        if mode == SupervisorMode::Decentralized {
            return Err(LauncherError::config(
                "config changes are not supported in decentralized mode",
            ));
        }

        let configuration_number = self.main_client().configuration_number().await?;
        debug!(configuration_number, "building config proposal");

        let mut changes = Vec::new();

        if let Some(consensus) = consensus {
            changes.push(ConfigChange::Consensus(consensus.clone()));
        }

        for (instance, loader) in instances.iter().zip(config_loaders) {
            changes.push(
                self.instance_change(explorer, instance, loader.as_ref())
                    .await?,
            );
        }

        Ok(ConfigPropose {
            actual_from,
            configuration_number,
            changes,
        })
    }

    async fn instance_change(
        &self,
        explorer: &Explorer,
        instance: &Instance,
        loader: &dyn InstanceSpecLoader,
    ) -> LauncherResult<ConfigChange> {
        let encoded_config = |loader: &dyn InstanceSpecLoader| -> LauncherResult<Vec<u8>> {
            if instance.config.is_some() {
                Ok(loader.encode_config(instance)?)
            } else {
                Ok(Vec::new())
            }
        };

        Ok(match instance.action {
            InstanceAction::Start => ConfigChange::StartService {
                artifact: ArtifactRef::from(&instance.artifact),
                name: instance.name.clone(),
                config: encoded_config(loader)?,
            },
            InstanceAction::Config => ConfigChange::Service {
                instance_id: self.resolve_instance_id(explorer, instance).await?,
                params: encoded_config(loader)?,
            },
            InstanceAction::Stop => ConfigChange::StopService {
                instance_id: self.resolve_instance_id(explorer, instance).await?,
            },
            InstanceAction::Resume => ConfigChange::ResumeService {
                instance_id: self.resolve_instance_id(explorer, instance).await?,
                params: encoded_config(loader)?,
            },
            InstanceAction::Freeze => ConfigChange::FreezeService {
                instance_id: self.resolve_instance_id(explorer, instance).await?,
            },
        })
    }

    /// Resolves the ledger-assigned id of an instance that must already
    /// be running.
    async fn resolve_instance_id(
        &self,
        explorer: &Explorer,
        instance: &Instance,
    ) -> LauncherResult<InstanceId> {
        explorer
            .get_instance_id(instance)
            .await?
            .ok_or_else(|| LauncherError::InstanceNotRunning(instance.name.clone()))
    }

    /// Builds an unload proposal covering every artifact tagged `unload`.
    ///
    /// Returns `None` when no artifact qualifies; callers must check
    /// before submitting.
    pub async fn create_unload_request(
        &self,
        artifacts: &[&Artifact],
        actual_from: u64,
    ) -> LauncherResult<Option<ConfigPropose>> {
        if artifacts.is_empty() {
            return Ok(None);
        }

        let configuration_number = self.main_client().configuration_number().await?;

        let changes = artifacts
            .iter()
            .map(|artifact| ConfigChange::UnloadArtifact {
                artifact: ArtifactRef::from(*artifact),
            })
            .collect();

        Ok(Some(ConfigPropose {
            actual_from,
            configuration_number,
            changes,
        }))
    }

    /// Builds a migration request, returning the seed so callers can
    /// query the migration status keyed by it later.
    #[must_use]
    pub fn create_migration_request(
        &self,
        service: &str,
        artifact: &Artifact,
    ) -> (MigrationRequest, u64) {
        let seed = random_seed();
        let request = MigrationRequest {
            new_artifact: ArtifactRef::from(artifact),
            service: service.to_owned(),
            deadline_height: artifact.deadline_height,
            seed,
        };

        (request, seed)
    }

    /// Submits a deploy request to every configured node.
    pub async fn send_deploy_request(
        &self,
        request: &DeployRequest,
    ) -> LauncherResult<Vec<TxHash>> {
        let payload = self.codec.encode_deploy(request)?;
        self.broadcast(AdminEndpoint::DeployArtifact, &payload).await
    }

    /// Submits a config proposal to every configured node.
    pub async fn send_config_proposal(
        &self,
        request: &ConfigPropose,
    ) -> LauncherResult<Vec<TxHash>> {
        let payload = self.codec.encode_proposal(request)?;
        self.broadcast(AdminEndpoint::ProposeConfig, &payload).await
    }

    /// Submits a migration request to every configured node.
    pub async fn send_migration_request(
        &self,
        request: &MigrationRequest,
    ) -> LauncherResult<Vec<TxHash>> {
        let payload = self.codec.encode_migration(request)?;
        self.broadcast(AdminEndpoint::Migrate, &payload).await
    }

    /// Fetches the state of a previously requested migration.
    pub async fn get_migration_state(
        &self,
        service: &str,
        artifact: &Artifact,
        seed: u64,
    ) -> LauncherResult<MigrationState> {
        let query = MigrationStatusQuery::new(
            service,
            &ArtifactRef::from(artifact),
            artifact.deadline_height,
            seed,
        );
        self.main_client().migration_status(&query).await
    }

    async fn broadcast(
        &self,
        endpoint: AdminEndpoint,
        payload: &[u8],
    ) -> LauncherResult<Vec<TxHash>> {
        let mut txs = Vec::with_capacity(self.clients.len());

        for client in &self.clients {
            let tx_hash = client.submit(endpoint, payload).await?;
            info!(
                node = %client.address(),
                endpoint = endpoint.path(),
                tx_hash = %tx_hash,
                "request submitted"
            );
            txs.push(tx_hash);
        }

        Ok(txs)
    }
}

impl std::fmt::Debug for Supervisor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Supervisor")
            .field("nodes", &self.clients.len())
            .finish_non_exhaustive()
    }
}

fn random_seed() -> u64 {
    rand::random()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{DispatcherInfo, MockNodeClient, ServiceEntry, ServiceSpec};
    use crate::settings::EngineSettings;
    use crate::wire::JsonCodec;
    use lodestar_core::{ArtifactAction, DefaultInstanceSpecLoader, NoopSpecLoader};

    fn fast_settings() -> EngineSettings {
        EngineSettings {
            retry_attempts: 2,
            retry_interval_ms: 0,
            propagation_delay_ms: 0,
            request_timeout_secs: 1,
        }
    }

    fn test_artifact() -> Artifact {
        Artifact {
            runtime_id: 0,
            runtime: "rust".to_owned(),
            name: "example-token".to_owned(),
            version: "1.0.0".to_owned(),
            spec: toml::Value::Table(toml::map::Map::new()),
            deadline_height: 100,
            action: ArtifactAction::Deploy,
        }
    }

    fn supervisor_over(mocks: &[Arc<MockNodeClient>]) -> Supervisor {
        let clients = mocks
            .iter()
            .map(|m| Arc::clone(m) as Arc<dyn AdminApi>)
            .collect();
        Supervisor::new(clients, Arc::new(JsonCodec)).unwrap()
    }

    fn explorer_over(mock: &Arc<MockNodeClient>) -> Explorer {
        Explorer::new(Arc::clone(mock) as Arc<dyn AdminApi>, fast_settings())
    }

    fn default_loaders(count: usize) -> Vec<Arc<dyn InstanceSpecLoader>> {
        (0..count)
            .map(|_| Arc::new(DefaultInstanceSpecLoader) as Arc<dyn InstanceSpecLoader>)
            .collect()
    }

    #[test]
    fn no_clients_is_a_configuration_error() {
        let result = Supervisor::new(Vec::new(), Arc::new(JsonCodec));
        assert!(matches!(result, Err(LauncherError::Config(_))));
    }

    #[test]
    fn deploy_request_carries_encoded_spec_and_fresh_seed() {
        let mock = Arc::new(MockNodeClient::new());
        let supervisor = supervisor_over(&[mock]);
        let artifact = test_artifact();

        let first = supervisor
            .create_deploy_request(&artifact, &NoopSpecLoader)
            .unwrap();
        let second = supervisor
            .create_deploy_request(&artifact, &NoopSpecLoader)
            .unwrap();

        assert_eq!(first.artifact, ArtifactRef::from(&artifact));
        assert_eq!(first.deadline_height, 100);
        assert!(first.spec.is_empty());
        assert_ne!(first.seed, second.seed);
    }

    #[tokio::test]
    async fn configuration_number_is_fetched_per_proposal() {
        let mock = Arc::new(MockNodeClient::new());
        let supervisor = supervisor_over(&[Arc::clone(&mock)]);
        let explorer = explorer_over(&mock);

        let first = supervisor
            .create_config_change_request(
                &explorer,
                None,
                &[],
                &[],
                0,
                SupervisorMode::Simple,
            )
            .await
            .unwrap();
        let second = supervisor
            .create_config_change_request(
                &explorer,
                None,
                &[],
                &[],
                0,
                SupervisorMode::Simple,
            )
            .await
            .unwrap();

        assert_eq!(mock.configuration_number_fetches(), 2);
        // The node's sequence advanced between the two fetches.
        assert_ne!(first.configuration_number, second.configuration_number);
    }

    #[tokio::test]
    async fn decentralized_mode_is_rejected() {
        let mock = Arc::new(MockNodeClient::new());
        let supervisor = supervisor_over(&[Arc::clone(&mock)]);
        let explorer = explorer_over(&mock);

        let result = supervisor
            .create_config_change_request(
                &explorer,
                None,
                &[],
                &[],
                0,
                SupervisorMode::Decentralized,
            )
            .await;

        assert!(matches!(result, Err(LauncherError::Config(_))));
        // Rejected before any node round-trip.
        assert_eq!(mock.configuration_number_fetches(), 0);
    }

    #[tokio::test]
    async fn consensus_change_comes_first() {
        let mock = Arc::new(MockNodeClient::new());
        mock.set_dispatcher_info(DispatcherInfo {
            artifacts: Vec::new(),
            services: vec![ServiceEntry {
                spec: ServiceSpec {
                    id: 5,
                    name: "frozen-service".to_owned(),
                },
            }],
        });
        let supervisor = supervisor_over(&[Arc::clone(&mock)]);
        let explorer = explorer_over(&mock);

        let consensus = ConsensusConfig {
            validator_keys: Vec::new(),
            first_round_timeout: 3000,
            status_timeout: 5000,
            peers_timeout: 10_000,
            txs_block_limit: 1000,
            max_message_len: 1_048_576,
            min_propose_timeout: 10,
            max_propose_timeout: 200,
            propose_timeout_threshold: 500,
        };
        let instances = vec![Instance::new(
            test_artifact(),
            "frozen-service",
            InstanceAction::Freeze,
            None,
        )];

        let proposal = supervisor
            .create_config_change_request(
                &explorer,
                Some(&consensus),
                &instances,
                &default_loaders(1),
                10,
                SupervisorMode::Simple,
            )
            .await
            .unwrap();

        assert_eq!(proposal.actual_from, 10);
        assert_eq!(proposal.changes.len(), 2);
        assert!(matches!(proposal.changes[0], ConfigChange::Consensus(_)));
        assert!(matches!(
            proposal.changes[1],
            ConfigChange::FreezeService { instance_id: 5 }
        ));
    }

    #[tokio::test]
    async fn non_start_action_requires_running_instance() {
        let mock = Arc::new(MockNodeClient::new());
        let supervisor = supervisor_over(&[Arc::clone(&mock)]);
        let explorer = explorer_over(&mock);

        let instances = vec![Instance::new(
            test_artifact(),
            "missing-service",
            InstanceAction::Stop,
            None,
        )];

        let result = supervisor
            .create_config_change_request(
                &explorer,
                None,
                &instances,
                &default_loaders(1),
                0,
                SupervisorMode::Simple,
            )
            .await;

        assert!(matches!(
            result,
            Err(LauncherError::InstanceNotRunning(name)) if name == "missing-service"
        ));
    }

    #[tokio::test]
    async fn unload_request_is_none_without_candidates() {
        let mock = Arc::new(MockNodeClient::new());
        let supervisor = supervisor_over(&[Arc::clone(&mock)]);

        let request = supervisor.create_unload_request(&[], 0).await.unwrap();

        assert!(request.is_none());
        // Nothing was fetched to build a request that does not exist.
        assert_eq!(mock.configuration_number_fetches(), 0);
    }

    #[tokio::test]
    async fn unload_request_covers_tagged_artifacts() {
        let mock = Arc::new(MockNodeClient::new());
        let supervisor = supervisor_over(&[Arc::clone(&mock)]);

        let mut artifact = test_artifact();
        artifact.action = ArtifactAction::Unload;

        let request = supervisor
            .create_unload_request(&[&artifact], 7)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(request.actual_from, 7);
        assert_eq!(request.changes.len(), 1);
        assert!(matches!(
            &request.changes[0],
            ConfigChange::UnloadArtifact { artifact } if artifact.name == "example-token"
        ));
    }

    #[tokio::test]
    async fn migration_state_query_is_read_only() {
        let mock = Arc::new(MockNodeClient::new());
        mock.script_migration_states(vec![MigrationState::Pending]);
        let supervisor = supervisor_over(&[Arc::clone(&mock)]);

        let state = supervisor
            .get_migration_state("token-service", &test_artifact(), 42)
            .await
            .unwrap();

        assert_eq!(state, MigrationState::Pending);
        assert_eq!(mock.submission_count(), 0);
    }

    #[test]
    fn migration_request_returns_matching_seed() {
        let mock = Arc::new(MockNodeClient::new());
        let supervisor = supervisor_over(&[mock]);
        let artifact = test_artifact();

        let (request, seed) = supervisor.create_migration_request("token-service", &artifact);

        assert_eq!(request.seed, seed);
        assert_eq!(request.service, "token-service");
        assert_eq!(request.deadline_height, 100);
    }

    #[tokio::test]
    async fn submission_addresses_every_node() {
        let mocks = [
            Arc::new(MockNodeClient::new()),
            Arc::new(MockNodeClient::new()),
        ];
        let supervisor = supervisor_over(&mocks);
        let artifact = test_artifact();

        let request = supervisor
            .create_deploy_request(&artifact, &NoopSpecLoader)
            .unwrap();
        let txs = supervisor.send_deploy_request(&request).await.unwrap();

        assert_eq!(txs.len(), 2);
        assert_eq!(mocks[0].submission_count(), 1);
        assert_eq!(mocks[1].submission_count(), 1);
        assert_eq!(mocks[0].submissions()[0].0, AdminEndpoint::DeployArtifact);
    }
}
