//! Action tags and outcome values.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Terminal outcome of an asynchronous stage.
///
/// `Unknown` is the initial value for work that was never submitted (for
/// example an unload stage with nothing to unload). Callers must use
/// [`ActionResult::is_success`] rather than relying on any implicit
/// conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionResult {
    /// The action was confirmed on the ledger.
    Success,
    /// The action was submitted but could not be confirmed.
    Fail,
    /// The action was never attempted.
    Unknown,
}

impl ActionResult {
    /// Returns true only for [`ActionResult::Success`].
    #[must_use]
    pub const fn is_success(self) -> bool {
        matches!(self, Self::Success)
    }

    /// Get the result as a static string.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Fail => "fail",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ActionResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// What the plan asks the engine to do with an artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactAction {
    /// The artifact is referenced only (already on the ledger).
    None,
    /// Deploy the artifact.
    #[default]
    Deploy,
    /// Unload the artifact.
    Unload,
}

/// What the plan asks the engine to do with a service instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstanceAction {
    /// Start a new instance.
    #[default]
    Start,
    /// Stop a running instance.
    Stop,
    /// Apply a new configuration to a running instance.
    Config,
    /// Resume a stopped instance.
    Resume,
    /// Freeze a running instance.
    Freeze,
}

impl InstanceAction {
    /// Actions other than `Start` address an instance that must already be
    /// running, so they require a resolved instance id.
    #[must_use]
    pub const fn requires_instance_id(self) -> bool {
        !matches!(self, Self::Start)
    }

    /// Get the action name as a static string.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Stop => "stop",
            Self::Config => "config",
            Self::Resume => "resume",
            Self::Freeze => "freeze",
        }
    }
}

impl fmt::Display for InstanceAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
