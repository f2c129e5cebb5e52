//! Implementation of the `lodestar run` command.

use std::path::Path;

use thiserror::Error;

use lodestar_core::{
    ActionResult, InstanceAction, LoaderRegistry, Plan, PlanError, RuntimeId, RuntimeRegistry,
    RuntimeRegistryError,
};
use lodestar_launcher::{EngineSettings, Launcher, LauncherError, RunReport};

#[derive(Error, Debug)]
pub enum RunError {
    #[error("invalid runtime declaration '{0}': expected `name=id`")]
    InvalidRuntime(String),

    #[error(transparent)]
    Registry(#[from] RuntimeRegistryError),

    #[error(transparent)]
    Plan(#[from] PlanError),

    #[error(transparent)]
    Launcher(#[from] LauncherError),

    #[error("failed to render report: {0}")]
    Render(#[from] serde_json::Error),
}

pub async fn run(plan_path: &Path, runtimes: &[String], json: bool) -> Result<(), RunError> {
    let mut registry = RuntimeRegistry::new();
    for declaration in runtimes {
        let (name, id) = parse_runtime_declaration(declaration)?;
        registry.declare(name, id)?;
    }

    let plan = Plan::from_file(plan_path, &mut registry)?;
    let settings = EngineSettings::load()?;
    let loaders = LoaderRegistry::with_builtins();

    let mut launcher = Launcher::new(plan, settings, &loaders)?;
    let report = launcher.run().await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }

    Ok(())
}

fn parse_runtime_declaration(declaration: &str) -> Result<(&str, RuntimeId), RunError> {
    let invalid = || RunError::InvalidRuntime(declaration.to_owned());

    let (name, id) = declaration.split_once('=').ok_or_else(invalid)?;
    if name.is_empty() {
        return Err(invalid());
    }
    let id: RuntimeId = id.parse().map_err(|_| invalid())?;

    Ok((name, id))
}

fn print_report(report: &RunReport) {
    match report.unload.result {
        ActionResult::Success => println!("Artifacts unload status: success"),
        ActionResult::Fail => println!(
            "Artifacts unload status: fail, with error: {}",
            report.unload.description
        ),
        ActionResult::Unknown => {}
    }

    for deployment in &report.deployments {
        let status = if deployment.result.is_success() {
            "succeed"
        } else {
            "failed"
        };
        println!("Artifact {} -> deploy status: {status}", deployment.artifact);
    }

    for migration in &report.migrations {
        if migration.result.is_success() {
            println!("Service {} -> migrate status: success", migration.service);
        } else {
            println!(
                "Service {} -> migrate status: fail, with error: {}",
                migration.service, migration.description
            );
        }
    }

    if report.config == ActionResult::Fail {
        println!("Applying of config -> FAIL");
    }

    for instance in &report.instances {
        match instance.action {
            InstanceAction::Start => match instance.instance_id {
                Some(id) => println!("Instance {} -> started with ID {id}", instance.name),
                None => println!("Instance {} -> start failed", instance.name),
            },
            InstanceAction::Stop => println!("Instance {} stopped", instance.name),
            InstanceAction::Resume => println!("Instance {} resumed", instance.name),
            InstanceAction::Freeze => println!("Instance {} frozen", instance.name),
            InstanceAction::Config => {
                println!("Instance {} -> config applied", instance.name);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn runtime_declaration_parsing() {
        assert_eq!(parse_runtime_declaration("java=1").unwrap(), ("java", 1));
        assert_eq!(parse_runtime_declaration("wasm=42").unwrap(), ("wasm", 42));

        assert!(parse_runtime_declaration("java").is_err());
        assert!(parse_runtime_declaration("java=x").is_err());
        assert!(parse_runtime_declaration("=1").is_err());
    }
}
