//! Core model for Lodestar.
//!
//! This crate provides the shared building blocks consumed by the
//! orchestration engine:
//!
//! - **Plan**: the validated, read-only deployment plan (networks,
//!   artifacts, instances, migrations, plugin bindings)
//! - **RuntimeRegistry**: the explicit runtime name → id registry
//! - **Spec loaders**: pluggable encoders turning declarative artifact and
//!   instance specs into opaque byte payloads

pub mod action;
pub mod artifact;
pub mod instance;
pub mod loaders;
pub mod plan;
pub mod runtime;

pub use action::{ActionResult, ArtifactAction, InstanceAction};
pub use artifact::Artifact;
pub use instance::{Instance, InstanceId};
pub use loaders::{
    DefaultInstanceSpecLoader, InstanceSpecLoader, LoaderRegistry, NoopSpecLoader,
    RuntimeSpecLoader, SpecLoadError,
};
pub use plan::{ConsensusConfig, NetworkNode, Plan, PlanError, SupervisorMode};
pub use runtime::{RuntimeId, RuntimeRegistry, RuntimeRegistryError, RUST_RUNTIME};
