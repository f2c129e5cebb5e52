//! Top-level stage orchestrator.
//!
//! A run walks four stages in order: unload → deploy → migrate → start.
//! Each stage submits zero or more requests through the [`Supervisor`],
//! then blocks on the [`Explorer`] until the submitted transactions commit
//! and the expected side effect becomes observable. Outcomes land in the
//! [`LaunchState`]; the final [`RunReport`] summarises them per stage.
//!
//! Fatal errors (unbound plugins, decentralized-mode config changes,
//! non-commitment) abort the run. Per-artifact and per-service
//! confirmation failures do not: they are recorded as `Fail` and the
//! remaining work proceeds independently.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use lodestar_core::{
    ActionResult, Artifact, DefaultInstanceSpecLoader, InstanceAction, InstanceId,
    InstanceSpecLoader, LoaderRegistry, NoopSpecLoader, Plan, RuntimeSpecLoader, RUST_RUNTIME,
};

use crate::api::{AdminApi, HttpNodeClient};
use crate::error::{LauncherError, LauncherResult};
use crate::explorer::Explorer;
use crate::settings::EngineSettings;
use crate::state::{LaunchState, MigrationKey};
use crate::supervisor::Supervisor;
use crate::wire::{ArtifactRef, JsonCodec};

/// Per-artifact deploy outcome in the run report.
#[derive(Debug, Clone, Serialize)]
pub struct DeployOutcome {
    /// Artifact identity, in `runtime_id:name:version` form.
    pub artifact: String,
    /// Confirmation result.
    pub result: ActionResult,
}

/// Per-service migration outcome in the run report.
#[derive(Debug, Clone, Serialize)]
pub struct MigrationOutcome {
    /// Migrated service name.
    pub service: String,
    /// Confirmation result.
    pub result: ActionResult,
    /// Outcome description reported by the ledger.
    pub description: String,
}

/// Unload stage outcome in the run report.
#[derive(Debug, Clone, Serialize)]
pub struct UnloadOutcome {
    /// Commitment result; `Unknown` when nothing was tagged for unload.
    pub result: ActionResult,
    /// Failure description, if any.
    pub description: String,
}

/// Per-instance outcome in the run report.
#[derive(Debug, Clone, Serialize)]
pub struct InstanceOutcome {
    /// Instance name.
    pub name: String,
    /// Action the plan requested.
    pub action: InstanceAction,
    /// Resolved instance id, for `start` instances that came up.
    pub instance_id: Option<InstanceId>,
    /// Outcome. For non-`start` instances this mirrors the aggregate
    /// config result.
    pub result: ActionResult,
}

/// Stage-by-stage summary of a launcher run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    /// When the stages started.
    pub started_at: DateTime<Utc>,
    /// When the report was assembled.
    pub finished_at: DateTime<Utc>,
    /// Unload stage outcome.
    pub unload: UnloadOutcome,
    /// Deploy stage outcomes, sorted by artifact.
    pub deployments: Vec<DeployOutcome>,
    /// Migration stage outcomes, sorted by service.
    pub migrations: Vec<MigrationOutcome>,
    /// Aggregate config proposal outcome.
    pub config: ActionResult,
    /// Per-instance outcomes, in plan order.
    pub instances: Vec<InstanceOutcome>,
}

/// Orchestrates a deployment plan against the configured ledger nodes.
pub struct Launcher {
    plan: Plan,
    settings: EngineSettings,
    clients: Vec<Arc<dyn AdminApi>>,
    supervisor: Supervisor,
    explorer: Explorer,
    state: LaunchState,
    runtime_loaders: HashMap<String, Arc<dyn RuntimeSpecLoader>>,
    instance_loaders: HashMap<Artifact, Arc<dyn InstanceSpecLoader>>,
    instance_outcomes: Vec<InstanceOutcome>,
    initialized: bool,
}

impl Launcher {
    /// Create a launcher with HTTP clients for the plan's networks.
    ///
    /// In `Simple` supervisor mode only the first configured node is
    /// addressed.
    pub fn new(
        plan: Plan,
        settings: EngineSettings,
        loaders: &LoaderRegistry,
    ) -> LauncherResult<Self> {
        let mut clients: Vec<Arc<dyn AdminApi>> = Vec::new();
        for node in &plan.networks {
            clients.push(Arc::new(HttpNodeClient::new(node, &settings)?));
            if plan.is_simple() {
                break;
            }
        }

        Self::from_parts(plan, settings, clients, loaders)
    }

    /// Create a launcher over caller-supplied node clients.
    ///
    /// The same `Simple`-mode truncation applies as in [`Launcher::new`].
    pub fn with_clients(
        plan: Plan,
        settings: EngineSettings,
        mut clients: Vec<Arc<dyn AdminApi>>,
        loaders: &LoaderRegistry,
    ) -> LauncherResult<Self> {
        if plan.is_simple() {
            clients.truncate(1);
        }

        Self::from_parts(plan, settings, clients, loaders)
    }

    fn from_parts(
        plan: Plan,
        settings: EngineSettings,
        clients: Vec<Arc<dyn AdminApi>>,
        loaders: &LoaderRegistry,
    ) -> LauncherResult<Self> {
        let mut runtime_loaders: HashMap<String, Arc<dyn RuntimeSpecLoader>> = HashMap::new();
        for (runtime_name, plugin) in &plan.plugins.runtime {
            let loader = loaders.runtime_loader(plugin).ok_or_else(|| {
                LauncherError::config(format!(
                    "runtime spec loader '{plugin}' (for runtime '{runtime_name}') is not registered"
                ))
            })?;
            runtime_loaders.insert(runtime_name.clone(), loader);
        }
        // The baseline runtime always has its no-op encoder.
        runtime_loaders
            .entry(RUST_RUNTIME.to_owned())
            .or_insert_with(|| Arc::new(NoopSpecLoader));

        let mut instance_loaders: HashMap<Artifact, Arc<dyn InstanceSpecLoader>> = HashMap::new();
        for (alias, plugin) in &plan.plugins.artifact {
            let artifact = plan.artifacts.get(alias).ok_or_else(|| {
                LauncherError::config(format!("plugin binding for unknown artifact '{alias}'"))
            })?;
            let loader = loaders.instance_loader(plugin).ok_or_else(|| {
                LauncherError::config(format!(
                    "instance spec loader '{plugin}' (for artifact '{alias}') is not registered"
                ))
            })?;
            instance_loaders.insert(artifact.clone(), loader);
        }

        let first = clients
            .first()
            .cloned()
            .ok_or_else(|| LauncherError::config("plan declares no networks"))?;

        let supervisor = Supervisor::new(clients.clone(), Arc::new(JsonCodec))?;
        let explorer = Explorer::new(first, settings.clone());

        Ok(Self {
            plan,
            settings,
            clients,
            supervisor,
            explorer,
            state: LaunchState::new(),
            runtime_loaders,
            instance_loaders,
            instance_outcomes: Vec::new(),
            initialized: false,
        })
    }

    /// The plan being executed.
    #[must_use]
    pub fn plan(&self) -> &Plan {
        &self.plan
    }

    /// The launch state accumulated so far.
    #[must_use]
    pub fn launch_state(&self) -> &LaunchState {
        &self.state
    }

    /// The explorer used for confirmations.
    #[must_use]
    pub fn explorer(&self) -> &Explorer {
        &self.explorer
    }

    /// The engine settings in effect.
    #[must_use]
    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Verifies every configured node responds to API requests.
    ///
    /// Must be called before any stage; [`Launcher::run`] does so itself.
    pub async fn initialize(&mut self) -> LauncherResult<()> {
        for client in &self.clients {
            if let Err(e) = client.health_check().await {
                warn!(node = %client.address(), error = %e, "node failed initialization probe");
                return Err(e);
            }
        }

        self.initialized = true;
        info!(nodes = self.clients.len(), "launcher initialized");
        Ok(())
    }

    /// Releases the launcher. Paired with [`Launcher::initialize`].
    pub fn deinitialize(&mut self) {
        self.initialized = false;
        debug!("launcher deinitialized");
    }

    fn ensure_initialized(&self) -> LauncherResult<()> {
        if self.initialized {
            Ok(())
        } else {
            Err(LauncherError::NotInitialized)
        }
    }

    /// Runs all stages in order and returns the report.
    ///
    /// The launcher is deinitialized on every exit path, including stage
    /// errors.
    pub async fn run(&mut self) -> LauncherResult<RunReport> {
        self.initialize().await?;
        let result = self.execute_stages().await;
        self.deinitialize();
        result
    }

    async fn execute_stages(&mut self) -> LauncherResult<RunReport> {
        let started_at = Utc::now();

        self.unload_all().await?;
        self.wait_for_unload().await?;

        self.deploy_all().await?;
        self.wait_for_deploy().await?;

        self.migrate_all().await?;
        self.wait_for_migration().await?;

        self.start_all().await?;
        self.wait_for_start().await?;

        Ok(self.report(started_at))
    }

    /// Submits one unload proposal covering every artifact tagged
    /// `unload`. Skipped entirely when none qualify.
    pub async fn unload_all(&mut self) -> LauncherResult<()> {
        self.ensure_initialized()?;

        let artifacts: Vec<&Artifact> = self.plan.unload_artifacts().collect();
        let request = self
            .supervisor
            .create_unload_request(&artifacts, self.plan.actual_from)
            .await?;

        let Some(request) = request else {
            debug!("no artifacts tagged for unload");
            return Ok(());
        };

        let txs = self.supervisor.send_config_proposal(&request).await?;
        self.state.add_pending_unload(txs);
        Ok(())
    }

    /// Waits for the unload proposal to commit, recording the outcome.
    ///
    /// Commitment failures are recorded, not raised: an unload that did
    /// not apply leaves the rest of the plan runnable.
    pub async fn wait_for_unload(&mut self) -> LauncherResult<()> {
        self.ensure_initialized()?;

        let txs = self.state.pending_unloads();
        if txs.is_empty() {
            return Ok(());
        }

        match self.explorer.wait_for_txs(&txs).await {
            Ok(()) => {
                info!("unload proposal committed");
                self.state
                    .set_unload_status(ActionResult::Success, String::new());
            }
            Err(
                e @ (LauncherError::NotCommitted { .. } | LauncherError::ExecutionFailed { .. }),
            ) => {
                warn!(error = %e, "unload proposal failed");
                self.state
                    .set_unload_status(ActionResult::Fail, e.to_string());
            }
            Err(e) => return Err(e),
        }

        Ok(())
    }

    /// Builds and submits one deploy request per artifact tagged
    /// `deploy`.
    pub async fn deploy_all(&mut self) -> LauncherResult<()> {
        self.ensure_initialized()?;

        let artifacts: Vec<Artifact> = self.plan.deploy_artifacts().cloned().collect();
        for artifact in artifacts {
            let loader = self.runtime_loader_for(&artifact.runtime);
            let request = self
                .supervisor
                .create_deploy_request(&artifact, loader.as_ref())?;

            info!(artifact = %artifact, "submitting deploy request");
            let txs = self.supervisor.send_deploy_request(&request).await?;
            self.state.add_pending_deploy(artifact, txs);
        }

        Ok(())
    }

    /// Waits for every pending deployment: first for its transactions to
    /// commit, then for the artifact to appear in the dispatcher info.
    pub async fn wait_for_deploy(&mut self) -> LauncherResult<()> {
        self.ensure_initialized()?;

        let pending = self.state.pending_deployments();

        for txs in pending.values() {
            self.explorer.wait_for_txs(txs).await?;
        }

        for artifact in pending.keys() {
            let result = self.explorer.wait_for_deploy(artifact).await?;
            info!(artifact = %artifact, result = %result, "deployment confirmed");
            self.state.complete_deploy(artifact, result);
        }

        Ok(())
    }

    /// Builds and submits one migration request per declared migration.
    pub async fn migrate_all(&mut self) -> LauncherResult<()> {
        self.ensure_initialized()?;

        let migrations: Vec<(String, Artifact)> = self
            .plan
            .migrations
            .iter()
            .map(|(service, artifact)| (service.clone(), artifact.clone()))
            .collect();

        for (service, artifact) in migrations {
            let (request, seed) = self.supervisor.create_migration_request(&service, &artifact);

            info!(service = %service, target = %artifact, "submitting migration request");
            let txs = self.supervisor.send_migration_request(&request).await?;
            self.state
                .add_pending_migration(MigrationKey { service, artifact, seed }, txs);
        }

        Ok(())
    }

    /// Waits for every pending migration to commit and reach a terminal
    /// state.
    pub async fn wait_for_migration(&mut self) -> LauncherResult<()> {
        self.ensure_initialized()?;

        let pending = self.state.pending_migrations();

        for (key, txs) in &pending {
            self.explorer.wait_for_txs(txs).await?;

            let (result, description) = self
                .explorer
                .wait_for_migration(
                    &key.service,
                    &ArtifactRef::from(&key.artifact),
                    key.artifact.deadline_height,
                    key.seed,
                )
                .await?;

            if result.is_success() {
                info!(service = %key.service, "migration confirmed");
            } else {
                warn!(service = %key.service, description = %description, "migration failed");
            }

            self.state
                .complete_migration(&key.service, result, description);
        }

        Ok(())
    }

    /// Builds and submits the aggregate config proposal covering every
    /// instance's declared action (plus the consensus change, if any).
    ///
    /// One proposal covers the whole instance set, so a single unmet
    /// precondition (an unresolved id for a non-`start` action) aborts
    /// the entire stage before submission.
    pub async fn start_all(&mut self) -> LauncherResult<()> {
        self.ensure_initialized()?;

        if self.plan.instances.is_empty() && self.plan.consensus.is_none() {
            debug!("no instances or consensus change to propose");
            return Ok(());
        }

        let config_loaders: Vec<Arc<dyn InstanceSpecLoader>> = self
            .plan
            .instances
            .iter()
            .map(|instance| self.instance_loader_for(&instance.artifact))
            .collect();

        let proposal = self
            .supervisor
            .create_config_change_request(
                &self.explorer,
                self.plan.consensus.as_ref(),
                &self.plan.instances,
                &config_loaders,
                self.plan.actual_from,
                self.plan.supervisor_mode,
            )
            .await?;

        info!(changes = proposal.changes.len(), "submitting config proposal");
        let txs = self.supervisor.send_config_proposal(&proposal).await?;
        self.state.add_pending_config(txs);
        Ok(())
    }

    /// Waits for the config proposal to commit, then resolves each
    /// `start` instance's id for the report.
    ///
    /// The per-instance lookups are informational: a failed lookup is
    /// reported as a start failure but cannot revert the aggregate
    /// result.
    pub async fn wait_for_start(&mut self) -> LauncherResult<()> {
        self.ensure_initialized()?;

        if let Some(txs) = self.state.pending_config() {
            match self.explorer.wait_for_txs(&txs).await {
                Ok(()) => {
                    info!("config proposal committed");
                    self.state.complete_config(ActionResult::Success);
                }
                Err(
                    e @ (LauncherError::NotCommitted { .. }
                    | LauncherError::ExecutionFailed { .. }),
                ) => {
                    warn!(error = %e, "config proposal failed");
                    self.state.complete_config(ActionResult::Fail);
                }
                Err(e) => return Err(e),
            }
        }

        let config_result = self.state.completed_config_state();
        let mut outcomes = Vec::with_capacity(self.plan.instances.len());

        for instance in &self.plan.instances {
            let outcome = if instance.action == InstanceAction::Start {
                match self.explorer.wait_for_start(instance).await {
                    Ok(result) => InstanceOutcome {
                        name: instance.name.clone(),
                        action: instance.action,
                        instance_id: instance.instance_id(),
                        result,
                    },
                    Err(e) => {
                        warn!(instance = %instance.name, error = %e, "start lookup failed");
                        InstanceOutcome {
                            name: instance.name.clone(),
                            action: instance.action,
                            instance_id: None,
                            result: ActionResult::Fail,
                        }
                    }
                }
            } else {
                InstanceOutcome {
                    name: instance.name.clone(),
                    action: instance.action,
                    instance_id: instance.instance_id(),
                    result: config_result,
                }
            };
            outcomes.push(outcome);
        }

        self.instance_outcomes = outcomes;
        Ok(())
    }

    fn runtime_loader_for(&self, runtime: &str) -> Arc<dyn RuntimeSpecLoader> {
        self.runtime_loaders
            .get(runtime)
            .cloned()
            .unwrap_or_else(|| Arc::new(NoopSpecLoader))
    }

    fn instance_loader_for(&self, artifact: &Artifact) -> Arc<dyn InstanceSpecLoader> {
        self.instance_loaders
            .get(artifact)
            .cloned()
            .unwrap_or_else(|| Arc::new(DefaultInstanceSpecLoader))
    }

    fn report(&self, started_at: DateTime<Utc>) -> RunReport {
        let mut deployments: Vec<DeployOutcome> = self
            .state
            .completed_deployments()
            .into_iter()
            .map(|(artifact, result)| DeployOutcome {
                artifact: artifact.to_string(),
                result,
            })
            .collect();
        deployments.sort_by(|a, b| a.artifact.cmp(&b.artifact));

        let mut migrations: Vec<MigrationOutcome> = self
            .state
            .completed_migrations()
            .into_iter()
            .map(|(service, (result, description))| MigrationOutcome {
                service,
                result,
                description,
            })
            .collect();
        migrations.sort_by(|a, b| a.service.cmp(&b.service));

        let (unload_result, unload_description) = self.state.unload_status();

        RunReport {
            started_at,
            finished_at: Utc::now(),
            unload: UnloadOutcome {
                result: unload_result,
                description: unload_description,
            },
            deployments,
            migrations,
            config: self.state.completed_config_state(),
            instances: self.instance_outcomes.clone(),
        }
    }
}

impl std::fmt::Debug for Launcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Launcher")
            .field("nodes", &self.clients.len())
            .field("initialized", &self.initialized)
            .finish_non_exhaustive()
    }
}
