//! Shared fixtures for launcher integration tests.

use std::sync::Arc;

use lodestar_core::{LoaderRegistry, Plan, RuntimeRegistry};
use lodestar_launcher::api::{AdminApi, MockNodeClient};
use lodestar_launcher::{EngineSettings, Launcher};

/// Settings with zeroed delays so poll loops spin instantly.
pub fn fast_settings() -> EngineSettings {
    EngineSettings {
        retry_attempts: 10,
        retry_interval_ms: 0,
        propagation_delay_ms: 0,
        request_timeout_secs: 1,
    }
}

/// Parses a plan from TOML against a fresh runtime registry.
pub fn plan_from(toml: &str) -> Plan {
    let mut registry = RuntimeRegistry::new();
    Plan::from_toml_str(toml, &mut registry).expect("test plan must parse")
}

/// Builds a launcher over the given mock nodes with no custom loaders.
pub fn launcher_over(plan: Plan, mocks: &[Arc<MockNodeClient>]) -> Launcher {
    let clients = mocks
        .iter()
        .map(|mock| Arc::clone(mock) as Arc<dyn AdminApi>)
        .collect();

    Launcher::with_clients(plan, fast_settings(), clients, &LoaderRegistry::new())
        .expect("launcher must build")
}

/// A minimal single-node network block.
pub const NETWORK_BLOCK: &str = r#"
    [[networks]]
    host = "127.0.0.1"
    public_api_port = 8080
    private_api_port = 8081
"#;
