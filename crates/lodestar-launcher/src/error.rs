//! Error types for the orchestration engine.
//!
//! The taxonomy separates fatal configuration errors (never retried) from
//! submission failures (propagated to the caller) and non-commitment (a
//! hard failure of a wait call). Confirmation failures are not errors at
//! all: they surface as [`ActionResult::Fail`] in the launch state.
//!
//! [`ActionResult::Fail`]: lodestar_core::ActionResult::Fail

use lodestar_core::SpecLoadError;

use crate::wire::WireError;

/// Result type alias using [`LauncherError`].
pub type LauncherResult<T> = Result<T, LauncherError>;

/// Errors that can occur in the orchestration engine.
#[derive(Debug, thiserror::Error)]
pub enum LauncherError {
    /// Fatal configuration error (unbound plugin, unsupported mode, ...).
    #[error("configuration error: {0}")]
    Config(String),

    /// HTTP failure while talking to a node.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The admin API answered with a non-success status.
    #[error("admin API error ({status}): {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Response body or status text.
        message: String,
    },

    /// A submitted transaction did not commit within the retry budget.
    #[error("transaction [{tx_hash}] was not committed")]
    NotCommitted {
        /// Hash of the transaction that never committed.
        tx_hash: String,
    },

    /// A submitted transaction committed, but its execution failed.
    #[error("transaction [{tx_hash}] committed with error: {description}")]
    ExecutionFailed {
        /// Hash of the failed transaction.
        tx_hash: String,
        /// Execution failure description reported by the ledger.
        description: String,
    },

    /// An instance that must already be running could not be found.
    #[error("instance '{0}' is not running on the ledger")]
    InstanceNotRunning(String),

    /// Wire encoding failure.
    #[error(transparent)]
    Wire(#[from] WireError),

    /// Spec loader failure.
    #[error(transparent)]
    SpecLoad(#[from] SpecLoadError),

    /// A stage was invoked before `initialize()`.
    #[error("launcher is not initialized")]
    NotInitialized,
}

impl LauncherError {
    /// Create a configuration error.
    #[must_use]
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Returns true for errors the poll loops swallow and retry: the node
    /// may be rebooting or momentarily unreachable, which counts as "not
    /// yet" rather than a distinct failure.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Http(e) => e.is_connect() || e.is_timeout(),
            Self::Api { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_errors_are_transient() {
        let error = LauncherError::Api {
            status: 503,
            message: "rebooting".to_owned(),
        };
        assert!(error.is_transient());
    }

    #[test]
    fn client_errors_are_not_transient() {
        let error = LauncherError::Api {
            status: 400,
            message: "bad request".to_owned(),
        };
        assert!(!error.is_transient());
    }

    #[test]
    fn config_errors_are_not_transient() {
        assert!(!LauncherError::config("boom").is_transient());
        assert!(!LauncherError::NotCommitted {
            tx_hash: "ab".to_owned()
        }
        .is_transient());
    }
}
