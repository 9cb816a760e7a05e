//! Gridsweep CLI
//!
//! Command-line interface for running hyperparameter sweeps on a Kubernetes
//! cluster and deploying the winning model.

mod commands;
mod config;
mod grid_file;

use anyhow::Result;
use clap::Parser;
use commands::{Commands, handle_command};
use config::Config;
use gridsweep_orchestrator::SweepConfig;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "gridsweep")]
#[command(about = "Hyperparameter grid sweeps on Kubernetes", long_about = None)]
struct Cli {
    /// Prefix of generated job names
    #[arg(long, env = "SWEEP_JOB_PREFIX")]
    job_prefix: Option<String>,

    /// Root under which each job writes its artifacts
    #[arg(long, env = "SWEEP_ARTIFACT_ROOT")]
    artifact_root: Option<String>,

    /// Training worker image
    #[arg(long, env = "SWEEP_TRAINING_IMAGE")]
    image: Option<String>,

    /// Kubernetes namespace for training jobs
    #[arg(long, env = "SWEEP_NAMESPACE")]
    namespace: Option<String>,

    /// kubectl binary
    #[arg(long, env = "GRIDSWEEP_KUBECTL", default_value = "kubectl")]
    kubectl: String,

    /// Read and write artifacts under this directory instead of Cloud Storage
    #[arg(long, env = "GRIDSWEEP_LOCAL_ARTIFACTS")]
    local_artifacts: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "gridsweep_orchestrator=info,gridsweep_cli=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    let mut sweep = SweepConfig::from_env();
    if let Some(prefix) = cli.job_prefix {
        sweep.job_prefix = prefix;
    }
    if let Some(root) = cli.artifact_root {
        sweep.artifact_root = root;
    }
    if let Some(image) = cli.image {
        sweep.training_image = image;
    }
    if cli.namespace.is_some() {
        sweep.namespace = cli.namespace;
    }

    let config = Config {
        sweep,
        kubectl: cli.kubectl,
        local_artifacts: cli.local_artifacts,
    };

    handle_command(cli.command, &config).await
}
