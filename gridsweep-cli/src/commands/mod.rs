//! Commands module
//!
//! Defines all CLI commands and their handlers.

mod grid;
mod job;
mod sweep;

use anyhow::Result;
use clap::Subcommand;
use std::path::PathBuf;

use crate::config::Config;

/// Top-level CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// List the configurations a grid file expands to
    Grid {
        /// Grid file (YAML or JSON)
        file: PathBuf,

        /// Only list the first N configurations
        #[arg(short, long)]
        limit: Option<usize>,
    },
    /// Write one Kubernetes job manifest per configuration without submitting
    Manifests {
        /// Grid file (YAML or JSON)
        file: PathBuf,

        /// Output directory
        #[arg(short, long, default_value = "manifests")]
        out: PathBuf,

        /// Only render the first N configurations
        #[arg(short, long)]
        limit: Option<usize>,
    },
    /// Run a sweep and report the best job
    Run {
        /// Grid file (YAML or JSON)
        file: PathBuf,

        /// Only submit the first N configurations
        #[arg(short, long)]
        limit: Option<usize>,

        /// Deploy the winning model once the sweep finishes
        #[arg(long)]
        deploy: bool,
    },
    /// Extract the metrics of one finished job
    Metrics {
        /// Job name, e.g. sweep-3
        job_id: String,
    },
    /// Deploy the model of one finished job
    Deploy {
        /// Job name, e.g. sweep-3
        job_id: String,
    },
}

/// Handle a CLI command
///
/// Routes the command to the appropriate handler module.
pub async fn handle_command(command: Commands, config: &Config) -> Result<()> {
    match command {
        Commands::Grid { file, limit } => grid::list_configurations(&file, limit, config).await,
        Commands::Manifests { file, out, limit } => {
            grid::write_manifests(&file, &out, limit, config).await
        }
        Commands::Run {
            file,
            limit,
            deploy,
        } => sweep::run(&file, limit, deploy, config).await,
        Commands::Metrics { job_id } => job::show_metrics(&job_id, config).await,
        Commands::Deploy { job_id } => job::deploy(&job_id, config).await,
    }
}
