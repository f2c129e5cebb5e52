//! Read-only status oracle against eventually-consistent ledger state.
//!
//! The admin API only reflects state as of the most recently committed
//! block, and its read model can lag commitment by a further block or
//! more. Every question the Explorer answers is therefore a bounded poll:
//! transaction commitment and "effect visible in the read model" are two
//! distinct, sequential confirmation steps.

use std::future::Future;
use std::sync::Arc;

use rand::Rng;
use tracing::{debug, warn};

use lodestar_core::{ActionResult, Artifact, Instance, InstanceId};

use crate::api::{AdminApi, MigrationState, MigrationStatusQuery, TxHash, TxStatus};
use crate::error::{LauncherError, LauncherResult};
use crate::settings::EngineSettings;
use crate::wire::ArtifactRef;

/// Inter-attempt wait strategy of a poll loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PollDelay {
    /// Suspend until the next block boundary.
    NextBlock,
    /// Give the read model time to catch up, then wait for a block.
    ///
    /// Used for deploy and migration confirmation, where the dispatcher
    /// info lags commitment. The extra delay is jittered so repeated runs
    /// do not hammer the API in lockstep.
    PropagationLag,
}

/// Status oracle over one node's [`AdminApi`].
pub struct Explorer {
    api: Arc<dyn AdminApi>,
    settings: EngineSettings,
}

impl Explorer {
    /// Create an explorer over a node client.
    #[must_use]
    pub fn new(api: Arc<dyn AdminApi>, settings: EngineSettings) -> Self {
        Self { api, settings }
    }

    /// Returns true if the artifact is visible in the dispatcher's
    /// artifact list.
    pub async fn is_deployed(&self, artifact: &Artifact) -> LauncherResult<bool> {
        let info = self.api.dispatcher_info().await?;

        Ok(info.artifacts.iter().any(|entry| {
            entry.runtime_id == artifact.runtime_id
                && entry.name == artifact.name
                && entry.version == artifact.version
        }))
    }

    /// Resolves the instance's ledger-assigned id, caching it on the
    /// instance. Only the first successful resolution costs a round-trip.
    pub async fn get_instance_id(&self, instance: &Instance) -> LauncherResult<Option<InstanceId>> {
        if let Some(id) = instance.instance_id() {
            return Ok(Some(id));
        }

        let info = self.api.dispatcher_info().await?;

        Ok(info
            .services
            .iter()
            .find(|entry| entry.spec.name == instance.name)
            .map(|entry| instance.cache_instance_id(entry.spec.id)))
    }

    /// Fetches the status of a transaction.
    pub async fn get_tx_status(&self, tx_hash: &TxHash) -> LauncherResult<TxStatus> {
        self.api.transaction_status(tx_hash).await
    }

    /// Blocks until the transaction commits successfully.
    ///
    /// # Errors
    ///
    /// [`LauncherError::ExecutionFailed`] if the transaction committed
    /// with an error, [`LauncherError::NotCommitted`] if the retry budget
    /// runs out first.
    pub async fn wait_for_tx(&self, tx_hash: &TxHash) -> LauncherResult<()> {
        let committed = self
            .poll_until(PollDelay::NextBlock, || async move {
                match self.api.transaction_status(tx_hash).await? {
                    TxStatus::Committed { success: true, .. } => Ok(Some(())),
                    TxStatus::Committed {
                        success: false,
                        description,
                    } => Err(LauncherError::ExecutionFailed {
                        tx_hash: tx_hash.to_string(),
                        description,
                    }),
                    TxStatus::NotCommitted => Ok(None),
                }
            })
            .await?;

        match committed {
            Some(()) => Ok(()),
            None => Err(LauncherError::NotCommitted {
                tx_hash: tx_hash.to_string(),
            }),
        }
    }

    /// Blocks until every transaction in the list commits.
    pub async fn wait_for_txs(&self, txs: &[TxHash]) -> LauncherResult<()> {
        for tx_hash in txs {
            self.wait_for_tx(tx_hash).await?;
        }
        Ok(())
    }

    /// Waits for the artifact to appear in the dispatcher's artifact
    /// list. Budget exhaustion is a recoverable, reportable outcome.
    pub async fn wait_for_deploy(&self, artifact: &Artifact) -> LauncherResult<ActionResult> {
        let deployed = self
            .poll_until(PollDelay::PropagationLag, || async move {
                Ok(self.is_deployed(artifact).await?.then_some(()))
            })
            .await?;

        Ok(match deployed {
            Some(()) => ActionResult::Success,
            None => {
                warn!(artifact = %artifact, "artifact did not appear in dispatcher info");
                ActionResult::Fail
            }
        })
    }

    /// Waits for the instance's id to become resolvable.
    pub async fn wait_for_start(&self, instance: &Instance) -> LauncherResult<ActionResult> {
        let resolved = self
            .poll_until(PollDelay::NextBlock, || async move {
                self.get_instance_id(instance).await
            })
            .await?;

        Ok(match resolved {
            Some(_) => ActionResult::Success,
            None => {
                warn!(instance = %instance.name, "instance did not appear in service list");
                ActionResult::Fail
            }
        })
    }

    /// Polls the migration status until it reaches a terminal state.
    ///
    /// Returns the outcome with its description: `("Success", ...)` on a
    /// succeeded migration, the ledger's error description on a failed
    /// one, and an empty description when the budget runs out.
    pub async fn wait_for_migration(
        &self,
        service: &str,
        artifact: &ArtifactRef,
        deadline_height: u64,
        seed: u64,
    ) -> LauncherResult<(ActionResult, String)> {
        let query = MigrationStatusQuery::new(service, artifact, deadline_height, seed);
        let query = &query;

        let outcome = self
            .poll_until(PollDelay::PropagationLag, || async move {
                Ok(match self.api.migration_status(query).await? {
                    MigrationState::Succeed => {
                        Some((ActionResult::Success, "Success".to_owned()))
                    }
                    MigrationState::Failed { description } => {
                        Some((ActionResult::Fail, description))
                    }
                    MigrationState::Pending => None,
                })
            })
            .await?;

        Ok(outcome.unwrap_or((ActionResult::Fail, String::new())))
    }

    /// Bounded poll loop shared by every wait operation.
    ///
    /// The probe is attempted up to the configured retry budget. `None`
    /// results and transient connection errors both consume an attempt;
    /// any other error aborts the poll. Returns `None` if the budget is
    /// exhausted without the probe succeeding.
    async fn poll_until<T, F, Fut>(&self, delay: PollDelay, mut probe: F) -> LauncherResult<Option<T>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = LauncherResult<Option<T>>>,
    {
        let attempts = self.settings.retry_attempts;

        for attempt in 1..=attempts {
            match probe().await {
                Ok(Some(value)) => return Ok(Some(value)),
                Ok(None) => {
                    debug!(attempt, attempts, "condition not met, waiting");
                    self.wait(delay).await?;
                }
                Err(e) if e.is_transient() => {
                    // The API server may be rebooting; treat as "not yet".
                    debug!(attempt, attempts, error = %e, "transient API error");
                    tokio::time::sleep(self.settings.retry_interval()).await;
                }
                Err(e) => return Err(e),
            }
        }

        Ok(None)
    }

    async fn wait(&self, delay: PollDelay) -> LauncherResult<()> {
        if delay == PollDelay::PropagationLag {
            let jitter = rand::thread_rng().gen_range(0..=self.settings.retry_interval_ms / 2);
            let lag = self.settings.propagation_delay() + std::time::Duration::from_millis(jitter);
            tokio::time::sleep(lag).await;
        }

        self.api.wait_for_block().await
    }
}

impl std::fmt::Debug for Explorer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Explorer")
            .field("node", &self.api.address())
            .finish_non_exhaustive()
    }
}
