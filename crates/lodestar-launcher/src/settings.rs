//! Engine settings.
//!
//! Settings are loaded in the following order (later sources override
//! earlier): defaults, `lodestar.toml` in the current directory,
//! environment variables with `LODESTAR_` prefix.

use std::time::Duration;

use figment::providers::{Env, Format, Toml};
use figment::Figment;
use serde::Deserialize;

use crate::error::{LauncherError, LauncherResult};

/// Tunable parameters of the engine's wait loops and HTTP client.
#[derive(Debug, Clone, Deserialize)]
pub struct EngineSettings {
    /// Attempts per wait loop before giving up.
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,

    /// Sleep between attempts after a transient connection error, in
    /// milliseconds.
    #[serde(default = "default_retry_interval_ms")]
    pub retry_interval_ms: u64,

    /// Extra delay before re-checking deploy/migration effects, in
    /// milliseconds. The admin API's read model can lag the committed
    /// chain by several seconds; raise this on slow networks.
    #[serde(default = "default_propagation_delay_ms")]
    pub propagation_delay_ms: u64,

    /// Per-request HTTP timeout in seconds.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

const fn default_retry_attempts() -> u32 {
    10
}

const fn default_retry_interval_ms() -> u64 {
    500
}

const fn default_propagation_delay_ms() -> u64 {
    2000
}

const fn default_request_timeout_secs() -> u64 {
    10
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            retry_attempts: default_retry_attempts(),
            retry_interval_ms: default_retry_interval_ms(),
            propagation_delay_ms: default_propagation_delay_ms(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl EngineSettings {
    /// Load settings from the default sources.
    pub fn load() -> LauncherResult<Self> {
        Figment::new()
            .merge(Toml::file("lodestar.toml"))
            .merge(Env::prefixed("LODESTAR_"))
            .extract()
            .map_err(|e| LauncherError::config(e.to_string()))
    }

    /// Sleep between attempts after a transient error.
    #[must_use]
    pub const fn retry_interval(&self) -> Duration {
        Duration::from_millis(self.retry_interval_ms)
    }

    /// Read-model propagation delay.
    #[must_use]
    pub const fn propagation_delay(&self) -> Duration {
        Duration::from_millis(self.propagation_delay_ms)
    }

    /// Per-request HTTP timeout.
    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
