//! Lodestar deployment orchestration engine.
//!
//! The engine turns a validated deployment [`Plan`](lodestar_core::Plan)
//! into a sequence of administrative requests against the ledger's admin
//! API and reconciles eventual on-ledger state with local expectations
//! through bounded retry/poll loops.
//!
//! # Architecture
//!
//! - [`api`]: the `AdminApi` capability (one implementation per node) and
//!   the HTTP client backing it
//! - [`wire`]: administrative request bodies and the wire codec seam
//! - [`Supervisor`]: builds wire-ready requests and submits them to every
//!   configured node
//! - [`Explorer`]: read-only status oracle with bounded retry/poll
//! - [`LaunchState`]: bookkeeping of requested vs. confirmed work
//! - [`Launcher`]: stage orchestrator (unload → deploy → migrate → start)
//!
//! Execution is strictly sequential: stages run one at a time and node
//! submissions are issued in node-list order. The engine never spawns
//! tasks or fans out requests.

pub mod api;
pub mod error;
pub mod explorer;
pub mod launcher;
pub mod settings;
pub mod state;
pub mod supervisor;
pub mod wire;

pub use api::{AdminApi, AdminEndpoint, HttpNodeClient, MigrationState, TxHash, TxStatus};
pub use error::{LauncherError, LauncherResult};
pub use explorer::Explorer;
pub use launcher::{InstanceOutcome, Launcher, RunReport};
pub use settings::EngineSettings;
pub use state::{LaunchState, MigrationKey};
pub use supervisor::Supervisor;
pub use wire::{JsonCodec, WireCodec};
