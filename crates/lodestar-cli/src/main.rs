//! Lodestar CLI - apply declarative deployment plans to a ledger.

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "lodestar")]
#[command(about = "Deploy, migrate and manage ledger services from a declarative plan")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply a deployment plan
    Run {
        /// Path to the TOML deployment plan
        #[arg(short = 'i', long = "input")]
        plan: PathBuf,

        /// Additional runtimes, e.g. `--runtime java=1 --runtime wasm=3`
        #[arg(long = "runtime", value_name = "NAME=ID")]
        runtimes: Vec<String>,

        /// Print the run report as JSON
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .init();

    let cli = Cli::parse();

    let result: Result<(), anyhow::Error> = match cli.command {
        Commands::Run {
            plan,
            runtimes,
            json,
        } => commands::run::run(&plan, &runtimes, json).await.map_err(Into::into),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
