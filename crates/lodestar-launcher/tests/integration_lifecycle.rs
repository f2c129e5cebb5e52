//! Launcher lifecycle and configuration-error behaviour.

mod common;

use std::sync::Arc;

use common::{fast_settings, launcher_over, plan_from, NETWORK_BLOCK};
use lodestar_core::{LoaderRegistry, Plan, RuntimeRegistry};
use lodestar_launcher::api::{AdminApi, MockNodeClient};
use lodestar_launcher::{Launcher, LauncherError};

fn empty_plan() -> Plan {
    plan_from(NETWORK_BLOCK)
}

#[tokio::test]
async fn stages_require_initialization() {
    let mock = Arc::new(MockNodeClient::new());
    let mut launcher = launcher_over(empty_plan(), &[mock]);

    let result = launcher.deploy_all().await;
    assert!(matches!(result, Err(LauncherError::NotInitialized)));
}

#[tokio::test]
async fn initialization_probes_every_node() {
    let mock = Arc::new(MockNodeClient::unhealthy());
    let mut launcher = launcher_over(empty_plan(), &[Arc::clone(&mock)]);

    let result = launcher.run().await;

    assert!(result.is_err());
    assert_eq!(mock.submission_count(), 0);
}

#[tokio::test]
async fn run_deinitializes_on_success_and_failure() {
    // Success path.
    let mock = Arc::new(MockNodeClient::new());
    let mut launcher = launcher_over(empty_plan(), &[mock]);
    launcher.run().await.unwrap();

    let result = launcher.deploy_all().await;
    assert!(matches!(result, Err(LauncherError::NotInitialized)));

    // Failure path: a stop instance that cannot be resolved.
    let plan = plan_from(&format!(
        r#"
        {NETWORK_BLOCK}

        [artifacts.token]
        name = "example-token"
        version = "1.0.0"
        action = "none"

        [instances.xnm-token]
        artifact = "token"
        action = "stop"
        "#
    ));
    let mock = Arc::new(MockNodeClient::new());
    let mut launcher = launcher_over(plan, &[mock]);
    assert!(launcher.run().await.is_err());

    let result = launcher.deploy_all().await;
    assert!(matches!(result, Err(LauncherError::NotInitialized)));
}

#[tokio::test]
async fn simple_mode_addresses_only_the_first_node() {
    let plan = plan_from(
        r#"
        supervisor_mode = "simple"

        [[networks]]
        host = "127.0.0.1"
        public_api_port = 8080
        private_api_port = 8081

        [[networks]]
        host = "127.0.0.2"
        public_api_port = 8080
        private_api_port = 8081

        [artifacts.token]
        name = "example-token"
        version = "1.0.0"
        action = "deploy"
        deadline_height = 10000
        "#,
    );

    let mocks = [
        Arc::new(MockNodeClient::new()),
        Arc::new(MockNodeClient::new()),
    ];
    let mut launcher = launcher_over(plan, &mocks);
    launcher.run().await.unwrap();

    assert_eq!(mocks[0].submission_count(), 1);
    assert_eq!(mocks[1].submission_count(), 0);
}

#[test]
fn unbound_plugin_is_a_fatal_configuration_error() {
    let mut registry = RuntimeRegistry::new();
    let plan = Plan::from_toml_str(
        &format!(
            r#"
            {NETWORK_BLOCK}

            [runtimes]
            java = 1

            [plugins.runtime]
            java = "java-loader"
            "#
        ),
        &mut registry,
    )
    .unwrap();

    let clients = vec![Arc::new(MockNodeClient::new()) as Arc<dyn AdminApi>];

    // No loader named "java-loader" was registered.
    let result = Launcher::with_clients(plan, fast_settings(), clients, &LoaderRegistry::new());

    assert!(matches!(result, Err(LauncherError::Config(_))));
}
