//! Bookkeeping of the launch process.
//!
//! Four independent pending/completed pairs track deployments, the config
//! proposal, migrations and the unload request. A pending entry is created
//! when a request is submitted and moved to the completed side once the
//! outcome is confirmed; no key is ever present on both sides at once.
//! Accessors return defensive copies, so callers cannot corrupt the
//! internal maps.

use std::collections::HashMap;

use lodestar_core::{ActionResult, Artifact};

use crate::api::TxHash;

/// Identity of a submitted migration: the service, the target artifact
/// and the request seed the status query is keyed by.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MigrationKey {
    /// Service being migrated.
    pub service: String,
    /// Migration target.
    pub artifact: Artifact,
    /// Seed of the submitted request.
    pub seed: u64,
}

/// State of the deploy & init process.
#[derive(Debug, Default)]
pub struct LaunchState {
    pending_deployments: HashMap<Artifact, Vec<TxHash>>,
    completed_deployments: HashMap<Artifact, ActionResult>,
    pending_config: Option<Vec<TxHash>>,
    completed_config: Option<ActionResult>,
    pending_migrations: HashMap<MigrationKey, Vec<TxHash>>,
    completed_migrations: HashMap<String, (ActionResult, String)>,
    pending_unload: Vec<TxHash>,
    unload_status: Option<(ActionResult, String)>,
}

impl LaunchState {
    /// Creates an empty launch state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a submitted deploy request.
    pub fn add_pending_deploy(&mut self, artifact: Artifact, txs: Vec<TxHash>) {
        self.pending_deployments.insert(artifact, txs);
    }

    /// Returns a copy of the pending deployments.
    #[must_use]
    pub fn pending_deployments(&self) -> HashMap<Artifact, Vec<TxHash>> {
        self.pending_deployments.clone()
    }

    /// Moves a deployment from pending to completed.
    ///
    /// # Panics
    ///
    /// Panics if the artifact has no pending deployment; completing work
    /// that was never submitted is a bug in the caller.
    pub fn complete_deploy(&mut self, artifact: &Artifact, result: ActionResult) {
        let pending = self.pending_deployments.remove(artifact);
        assert!(
            pending.is_some(),
            "no pending deployment for artifact {artifact}"
        );
        self.completed_deployments.insert(artifact.clone(), result);
    }

    /// Returns a copy of the completed deployments.
    #[must_use]
    pub fn completed_deployments(&self) -> HashMap<Artifact, ActionResult> {
        self.completed_deployments.clone()
    }

    /// Records a submitted config proposal.
    pub fn add_pending_config(&mut self, txs: Vec<TxHash>) {
        self.pending_config = Some(txs);
    }

    /// Returns a copy of the pending config proposal's transactions.
    #[must_use]
    pub fn pending_config(&self) -> Option<Vec<TxHash>> {
        self.pending_config.clone()
    }

    /// Records the config proposal's outcome, clearing the pending entry.
    pub fn complete_config(&mut self, result: ActionResult) {
        self.pending_config = None;
        self.completed_config = Some(result);
    }

    /// Outcome of the config proposal; `Unknown` if none was completed.
    #[must_use]
    pub fn completed_config_state(&self) -> ActionResult {
        self.completed_config.unwrap_or(ActionResult::Unknown)
    }

    /// Records a submitted migration request.
    pub fn add_pending_migration(&mut self, key: MigrationKey, txs: Vec<TxHash>) {
        self.pending_migrations.insert(key, txs);
    }

    /// Returns a copy of the pending migrations.
    #[must_use]
    pub fn pending_migrations(&self) -> HashMap<MigrationKey, Vec<TxHash>> {
        self.pending_migrations.clone()
    }

    /// Records a migration's outcome and clears its pending entry.
    pub fn complete_migration(&mut self, service: &str, result: ActionResult, description: String) {
        self.pending_migrations.retain(|key, _| key.service != service);
        self.completed_migrations
            .insert(service.to_owned(), (result, description));
    }

    /// Returns a copy of the completed migrations.
    #[must_use]
    pub fn completed_migrations(&self) -> HashMap<String, (ActionResult, String)> {
        self.completed_migrations.clone()
    }

    /// Records a submitted unload request.
    pub fn add_pending_unload(&mut self, txs: Vec<TxHash>) {
        self.pending_unload = txs;
    }

    /// Returns a copy of the pending unload transactions.
    #[must_use]
    pub fn pending_unloads(&self) -> Vec<TxHash> {
        self.pending_unload.clone()
    }

    /// Records the unload outcome and clears the pending transactions.
    pub fn set_unload_status(&mut self, result: ActionResult, description: String) {
        self.pending_unload.clear();
        self.unload_status = Some((result, description));
    }

    /// Outcome of the unload stage; `Unknown` if nothing was unloaded.
    #[must_use]
    pub fn unload_status(&self) -> (ActionResult, String) {
        self.unload_status
            .clone()
            .unwrap_or((ActionResult::Unknown, String::new()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lodestar_core::ArtifactAction;

    fn artifact(name: &str) -> Artifact {
        Artifact {
            runtime_id: 0,
            runtime: "rust".to_owned(),
            name: name.to_owned(),
            version: "1.0.0".to_owned(),
            spec: toml::Value::Table(toml::map::Map::new()),
            deadline_height: 100,
            action: ArtifactAction::Deploy,
        }
    }

    fn txs() -> Vec<TxHash> {
        vec![TxHash::new("aa"), TxHash::new("bb")]
    }

    #[test]
    fn deploy_moves_from_pending_to_completed() {
        let mut state = LaunchState::new();
        let a = artifact("token");

        state.add_pending_deploy(a.clone(), txs());
        assert_eq!(state.pending_deployments().len(), 1);
        assert!(state.completed_deployments().is_empty());

        state.complete_deploy(&a, ActionResult::Success);

        // Never present on both sides at once.
        assert!(state.pending_deployments().is_empty());
        assert_eq!(
            state.completed_deployments().get(&a),
            Some(&ActionResult::Success)
        );
    }

    #[test]
    #[should_panic(expected = "no pending deployment")]
    fn completing_unsubmitted_deploy_panics() {
        let mut state = LaunchState::new();
        state.complete_deploy(&artifact("token"), ActionResult::Success);
    }

    #[test]
    fn accessors_return_defensive_copies() {
        let mut state = LaunchState::new();
        state.add_pending_deploy(artifact("token"), txs());

        let mut copy = state.pending_deployments();
        copy.clear();

        assert_eq!(state.pending_deployments().len(), 1);
    }

    #[test]
    fn config_state_defaults_to_unknown() {
        let state = LaunchState::new();
        assert_eq!(state.completed_config_state(), ActionResult::Unknown);
    }

    #[test]
    fn config_completion_clears_pending() {
        let mut state = LaunchState::new();
        state.add_pending_config(txs());
        assert!(state.pending_config().is_some());

        state.complete_config(ActionResult::Fail);
        assert!(state.pending_config().is_none());
        assert_eq!(state.completed_config_state(), ActionResult::Fail);
    }

    #[test]
    fn migration_completion_clears_pending_entry() {
        let mut state = LaunchState::new();
        let key = MigrationKey {
            service: "token-service".to_owned(),
            artifact: artifact("token"),
            seed: 42,
        };

        state.add_pending_migration(key, txs());
        state.complete_migration("token-service", ActionResult::Success, "Success".to_owned());

        assert!(state.pending_migrations().is_empty());
        assert_eq!(
            state.completed_migrations()["token-service"],
            (ActionResult::Success, "Success".to_owned())
        );
    }

    #[test]
    fn unload_status_defaults_to_unknown() {
        let state = LaunchState::new();
        assert_eq!(state.unload_status().0, ActionResult::Unknown);
    }

    #[test]
    fn unload_status_records_outcome() {
        let mut state = LaunchState::new();
        state.add_pending_unload(txs());

        state.set_unload_status(ActionResult::Fail, "deadline passed".to_owned());

        assert!(state.pending_unloads().is_empty());
        assert_eq!(
            state.unload_status(),
            (ActionResult::Fail, "deadline passed".to_owned())
        );
    }
}
