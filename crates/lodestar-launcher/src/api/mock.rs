//! Scripted in-memory admin API for testing.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::{LauncherError, LauncherResult};

use super::{
    AdminApi, AdminEndpoint, DispatcherInfo, MigrationState, MigrationStatusQuery, TxHash, TxStatus,
};

#[derive(Debug, Default)]
struct MockState {
    healthy: bool,
    dispatcher: DispatcherInfo,
    dispatcher_fetches: u32,
    tx_scripts: HashMap<String, VecDeque<TxStatus>>,
    tx_polls: HashMap<String, u32>,
    migration_script: VecDeque<MigrationState>,
    migration_polls: u32,
    configuration_number: u64,
    configuration_number_fetches: u32,
    submissions: Vec<(AdminEndpoint, Vec<u8>)>,
    block_waits: u32,
}

/// Scripted [`AdminApi`] implementation.
///
/// Records every call so tests can assert on what the engine actually
/// submitted and how often it polled. Responses are scripted per query:
/// transaction statuses and migration states are consumed from queues
/// (the last element is sticky), and the configuration number increments
/// on every fetch, mimicking a node whose state advances between calls.
#[derive(Debug, Default)]
pub struct MockNodeClient {
    state: Mutex<MockState>,
}

impl MockNodeClient {
    /// Creates a healthy mock with an empty dispatcher view.
    #[must_use]
    pub fn new() -> Self {
        let mock = Self::default();
        mock.lock().healthy = true;
        mock
    }

    /// Creates a mock whose health probe fails.
    #[must_use]
    pub fn unhealthy() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Replaces the dispatcher view served to the engine.
    pub fn set_dispatcher_info(&self, info: DispatcherInfo) {
        self.lock().dispatcher = info;
    }

    /// Scripts the status sequence served for a transaction hash. The
    /// last status keeps being served once the queue drains.
    pub fn script_tx_status(&self, tx_hash: &TxHash, statuses: Vec<TxStatus>) {
        self.lock()
            .tx_scripts
            .insert(tx_hash.as_str().to_owned(), statuses.into());
    }

    /// Scripts the migration state sequence. The last state is sticky.
    pub fn script_migration_states(&self, states: Vec<MigrationState>) {
        self.lock().migration_script = states.into();
    }

    /// Number of status polls observed for a transaction hash.
    #[must_use]
    pub fn tx_poll_count(&self, tx_hash: &TxHash) -> u32 {
        self.lock()
            .tx_polls
            .get(tx_hash.as_str())
            .copied()
            .unwrap_or(0)
    }

    /// Number of migration status polls observed.
    #[must_use]
    pub fn migration_poll_count(&self) -> u32 {
        self.lock().migration_polls
    }

    /// Number of configuration-number fetches observed.
    #[must_use]
    pub fn configuration_number_fetches(&self) -> u32 {
        self.lock().configuration_number_fetches
    }

    /// Number of dispatcher-info fetches observed.
    #[must_use]
    pub fn dispatcher_fetches(&self) -> u32 {
        self.lock().dispatcher_fetches
    }

    /// Every submission the engine made, in order.
    #[must_use]
    pub fn submissions(&self) -> Vec<(AdminEndpoint, Vec<u8>)> {
        self.lock().submissions.clone()
    }

    /// Number of submissions the engine made.
    #[must_use]
    pub fn submission_count(&self) -> usize {
        self.lock().submissions.len()
    }

    /// Number of block-boundary waits observed.
    #[must_use]
    pub fn block_wait_count(&self) -> u32 {
        self.lock().block_waits
    }
}

#[async_trait]
impl AdminApi for MockNodeClient {
    async fn health_check(&self) -> LauncherResult<()> {
        if self.lock().healthy {
            Ok(())
        } else {
            Err(LauncherError::Api {
                status: 503,
                message: "node unavailable".to_owned(),
            })
        }
    }

    async fn dispatcher_info(&self) -> LauncherResult<DispatcherInfo> {
        let mut state = self.lock();
        state.dispatcher_fetches += 1;
        Ok(state.dispatcher.clone())
    }

    async fn transaction_status(&self, tx_hash: &TxHash) -> LauncherResult<TxStatus> {
        let mut state = self.lock();
        *state.tx_polls.entry(tx_hash.as_str().to_owned()).or_insert(0) += 1;

        let status = match state.tx_scripts.get_mut(tx_hash.as_str()) {
            Some(script) => {
                if script.len() > 1 {
                    script.pop_front().unwrap_or(TxStatus::NotCommitted)
                } else {
                    script.front().cloned().unwrap_or(TxStatus::NotCommitted)
                }
            }
            // Unscripted transactions commit immediately.
            None => TxStatus::Committed {
                success: true,
                description: "OK".to_owned(),
            },
        };

        Ok(status)
    }

    async fn configuration_number(&self) -> LauncherResult<u64> {
        let mut state = self.lock();
        state.configuration_number_fetches += 1;
        let number = state.configuration_number;
        // The node's configuration sequence advances between fetches.
        state.configuration_number += 1;
        Ok(number)
    }

    async fn migration_status(
        &self,
        _query: &MigrationStatusQuery,
    ) -> LauncherResult<MigrationState> {
        let mut state = self.lock();
        state.migration_polls += 1;

        let status = if state.migration_script.len() > 1 {
            state
                .migration_script
                .pop_front()
                .unwrap_or(MigrationState::Pending)
        } else {
            state
                .migration_script
                .front()
                .cloned()
                .unwrap_or(MigrationState::Pending)
        };

        Ok(status)
    }

    async fn submit(&self, endpoint: AdminEndpoint, payload: &[u8]) -> LauncherResult<TxHash> {
        let mut state = self.lock();
        let tx_hash = TxHash::new(format!("tx-{}", state.submissions.len()));
        state.submissions.push((endpoint, payload.to_vec()));
        Ok(tx_hash)
    }

    async fn wait_for_block(&self) -> LauncherResult<()> {
        self.lock().block_waits += 1;
        Ok(())
    }

    fn address(&self) -> String {
        "mock://node".to_owned()
    }
}
