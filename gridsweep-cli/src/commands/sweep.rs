//! Sweep command handler

use anyhow::{Context, Result};
use colored::*;
use gridsweep_core::domain::sweep::{JobOutcome, SweepResult};
use gridsweep_orchestrator::repository::{VertexServingPlatform, check_kubectl_available};
use gridsweep_orchestrator::service::DeploymentTrigger;
use gridsweep_orchestrator::{DeployConfig, SweepRunner};
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

use super::job::print_deployment;
use crate::config::Config;
use crate::grid_file::load_grid;

/// Run a sweep, print the summary and optionally deploy the winner
pub async fn run(file: &Path, limit: Option<usize>, deploy: bool, config: &Config) -> Result<()> {
    let store = config.artifact_store();
    let runner = SweepRunner::new(config.sweep.clone(), config.scheduler(), Arc::clone(&store))
        .context("Invalid sweep configuration")?;

    // Fail before submitting anything if the deployment could not run
    let deploy_config = if deploy {
        let deploy_config = DeployConfig::from_env()?;
        deploy_config
            .validate()
            .context("Invalid deploy configuration")?;
        warn_on_artifact_mismatch(&config.sweep.artifact_root, &deploy_config);
        Some(deploy_config)
    } else {
        None
    };

    let grid = load_grid(file).await?;
    check_kubectl_available(&config.kubectl).await?;

    info!("Running sweep over {}", file.display());
    let result = runner.run_sweep_limited(&grid, limit).await;

    print_summary(&result);

    if let Some(deploy_config) = deploy_config {
        let platform = Arc::new(VertexServingPlatform::from_config(&deploy_config));
        let trigger = DeploymentTrigger::new(deploy_config, store, platform);

        let report = trigger.deploy_result(&result).await?;
        println!();
        print_deployment(&report);
    }

    Ok(())
}

/// Metrics are read from the sweep's artifact root, not the deploy bucket
fn warn_on_artifact_mismatch(sweep_root: &str, deploy_config: &DeployConfig) -> bool {
    let deploy_root = deploy_config.artifact_root();
    if sweep_root.trim_end_matches('/') == deploy_root {
        return false;
    }

    warn!(
        "Sweep artifacts live under {} but the deploy bucket is {}; the winner is read from {}",
        sweep_root, deploy_root, sweep_root
    );
    true
}

fn print_summary(result: &SweepResult) {
    println!();
    println!("{}", format!("Sweep {}", result.sweep_id).bold());
    println!(
        "  Duration: {}s",
        (result.finished_at - result.started_at).num_seconds()
    );
    println!("{}", "─".repeat(80).dimmed());

    let best_id = result.best_descriptor().map(|d| d.job_id.as_str());

    for report in &result.jobs {
        let job_id = &report.descriptor.job_id;
        let marker = if Some(job_id.as_str()) == best_id {
            "★".yellow().bold()
        } else {
            "▸".cyan()
        };

        let metrics = match report.outcome.metrics() {
            Some(m) => format!("RMSE {:.4}  MSE {:.4}", m.rmse, m.mse),
            None => String::new(),
        };

        println!(
            "  {} {:<16} {:<24} {}",
            marker,
            job_id,
            colorize_outcome(&report.outcome),
            metrics
        );
        println!("      {}", report.descriptor.configuration.to_string().dimmed());
        if let JobOutcome::SubmissionFailed { reason } = &report.outcome {
            println!("      {}", reason.red());
        }
    }

    println!("{}", "─".repeat(80).dimmed());

    match &result.best {
        Some(best) => println!(
            "{} Best job {} with RMSE {} ({} of {} scored)",
            "✓".green(),
            best.descriptor.job_id.bold(),
            best.metrics.rmse,
            result.scored_jobs(),
            result.jobs.len()
        ),
        None => println!("{}", "✗ No job completed with metrics.".red()),
    }
}

fn colorize_outcome(outcome: &JobOutcome) -> ColoredString {
    match outcome {
        JobOutcome::Completed { metrics: Some(_) } => outcome.label().green(),
        JobOutcome::Completed { metrics: None } => outcome.label().yellow(),
        JobOutcome::TimedOut { .. } => outcome.label().yellow(),
        JobOutcome::Failed | JobOutcome::SubmissionFailed { .. } => outcome.label().red(),
    }
}
