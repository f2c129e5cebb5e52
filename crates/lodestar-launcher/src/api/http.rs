//! HTTP client for a node's administrative API.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use tracing::debug;

use lodestar_core::NetworkNode;

use crate::error::{LauncherError, LauncherResult};
use crate::settings::EngineSettings;

use super::{
    AdminApi, AdminEndpoint, DispatcherInfo, MigrationState, MigrationStatusQuery, TxHash, TxStatus,
};

/// Response body of a request submission.
#[derive(Deserialize)]
struct SubmitResponse {
    tx_hash: TxHash,
}

/// Raw transaction info as served by the explorer endpoint.
#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
enum RawTxInfo {
    Committed { status: RawExecStatus },
    InPool,
    #[serde(other)]
    Unknown,
}

#[derive(Deserialize)]
struct RawExecStatus {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    description: String,
}

/// HTTP implementation of [`AdminApi`] for one node.
///
/// Requests are routed to the node's public or private API per endpoint;
/// the private API carries every administrative mutation.
#[derive(Debug, Clone)]
pub struct HttpNodeClient {
    client: Client,
    public_url: String,
    private_url: String,
    block_interval: Duration,
}

impl HttpNodeClient {
    /// Create a client for a node from the plan's network descriptor.
    pub fn new(node: &NetworkNode, settings: &EngineSettings) -> LauncherResult<Self> {
        Self::with_urls(node.public_url(), node.private_url(), settings)
    }

    /// Create a client with explicit public/private base URLs.
    pub fn with_urls(
        public_url: impl Into<String>,
        private_url: impl Into<String>,
        settings: &EngineSettings,
    ) -> LauncherResult<Self> {
        let client = Client::builder()
            .timeout(settings.request_timeout())
            .build()
            .map_err(LauncherError::Http)?;

        Ok(Self {
            client,
            public_url: public_url.into().trim_end_matches('/').to_owned(),
            private_url: private_url.into().trim_end_matches('/').to_owned(),
            block_interval: settings.retry_interval(),
        })
    }

    fn supervisor_public(&self, endpoint: &str) -> String {
        format!("{}/api/services/supervisor/{endpoint}", self.public_url)
    }

    fn supervisor_private(&self, endpoint: &str) -> String {
        format!("{}/api/services/supervisor/{endpoint}", self.private_url)
    }

    async fn check_success(response: Response) -> LauncherResult<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let message = response.text().await.unwrap_or_default();
        Err(LauncherError::Api {
            status: status.as_u16(),
            message: if message.is_empty() {
                status.to_string()
            } else {
                message
            },
        })
    }
}

#[async_trait]
impl AdminApi for HttpNodeClient {
    async fn health_check(&self) -> LauncherResult<()> {
        let url = format!("{}/api/system/v1/stats", self.private_url);
        let response = self.client.get(&url).send().await?;
        Self::check_success(response).await?;
        Ok(())
    }

    async fn dispatcher_info(&self) -> LauncherResult<DispatcherInfo> {
        let url = self.supervisor_public("services");
        let response = self.client.get(&url).send().await?;
        let response = Self::check_success(response).await?;
        Ok(response.json().await?)
    }

    async fn transaction_status(&self, tx_hash: &TxHash) -> LauncherResult<TxStatus> {
        let url = format!("{}/api/explorer/v1/transactions", self.public_url);
        let response = self
            .client
            .get(&url)
            .query(&[("hash", tx_hash.as_str())])
            .send()
            .await?;

        // The node answers 404 for transactions it has not seen yet.
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(TxStatus::NotCommitted);
        }

        let response = Self::check_success(response).await?;
        let info: RawTxInfo = response.json().await?;

        Ok(match info {
            RawTxInfo::Committed { status } if status.kind == "success" => TxStatus::Committed {
                success: true,
                description: "OK".to_owned(),
            },
            RawTxInfo::Committed { status } => TxStatus::Committed {
                success: false,
                description: status.description,
            },
            RawTxInfo::InPool | RawTxInfo::Unknown => TxStatus::NotCommitted,
        })
    }

    async fn configuration_number(&self) -> LauncherResult<u64> {
        let url = self.supervisor_private("configuration-number");
        let response = self.client.get(&url).send().await?;
        let response = Self::check_success(response).await?;
        Ok(response.json().await?)
    }

    async fn migration_status(
        &self,
        query: &MigrationStatusQuery,
    ) -> LauncherResult<MigrationState> {
        let url = self.supervisor_private("migration-status");
        let response = self.client.get(&url).query(query).send().await?;
        let response = Self::check_success(response).await?;
        Ok(response.json().await?)
    }

    async fn submit(&self, endpoint: AdminEndpoint, payload: &[u8]) -> LauncherResult<TxHash> {
        let url = self.supervisor_private(endpoint.path());

        debug!(url = %url, bytes = payload.len(), "submitting request");

        // The admin API takes the payload hex-armored in a JSON string.
        let response = self.client.post(&url).json(&hex::encode(payload)).send().await?;
        let response = Self::check_success(response).await?;

        let submitted: SubmitResponse = response.json().await?;
        Ok(submitted.tx_hash)
    }

    async fn wait_for_block(&self) -> LauncherResult<()> {
        // Plain HTTP offers no block subscription; a fixed delay in the
        // order of the block interval stands in for one.
        tokio::time::sleep(self.block_interval).await;
        Ok(())
    }

    fn address(&self) -> String {
        self.public_url.clone()
    }
}
