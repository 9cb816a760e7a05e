//! Job command handlers
//!
//! Commands that act on a single job submitted earlier.

use anyhow::{Context, Result};
use colored::*;
use gridsweep_orchestrator::DeployConfig;
use gridsweep_orchestrator::repository::VertexServingPlatform;
use gridsweep_orchestrator::service::{
    DeploymentReport, DeploymentTrigger, MetricsExtractor, SmokeTestOutcome,
};
use std::sync::Arc;

use crate::config::Config;

/// Extract and print the metrics of one job
pub async fn show_metrics(job_id: &str, config: &Config) -> Result<()> {
    let descriptor = config.existing_job(job_id, &config.sweep.artifact_root);

    let mut extractor = MetricsExtractor::new(config.scheduler());
    if config.sweep.structured_metrics {
        extractor = extractor.with_structured_metrics(config.artifact_store());
    }

    match extractor.extract(&descriptor).await {
        Some(metrics) => {
            println!("{}", format!("Metrics for job {}:", job_id).bold());
            println!("  RMSE: {}", metrics.rmse.to_string().green());
            println!("  MSE:  {}", metrics.mse.to_string().green());
        }
        None => println!(
            "{}",
            format!("No metrics available for job {}.", job_id).yellow()
        ),
    }

    Ok(())
}

/// Deploy the model of one job to its endpoint
pub async fn deploy(job_id: &str, config: &Config) -> Result<()> {
    let deploy_config = DeployConfig::from_env()?;
    deploy_config
        .validate()
        .context("Invalid deploy configuration")?;

    let descriptor = config.existing_job(job_id, &deploy_config.artifact_root());
    let platform = Arc::new(VertexServingPlatform::from_config(&deploy_config));
    let trigger = DeploymentTrigger::new(deploy_config, config.artifact_store(), platform);

    let report = trigger.deploy_best(&descriptor).await?;
    print_deployment(&report);

    Ok(())
}

pub fn print_deployment(report: &DeploymentReport) {
    println!("{}", format!("Deployed job {}", report.job_id).bold());
    println!(
        "  Endpoint: {} {}",
        report.endpoint.display_name.cyan(),
        if report.endpoint_created {
            "(created)".dimmed()
        } else {
            "(existing)".dimmed()
        }
    );
    println!("            {}", report.endpoint.id.dimmed());
    println!("  Model:    {}", report.model.display_name.cyan());
    println!("            {}", report.model.id.dimmed());
    println!(
        "  Metrics:  RMSE {}  MSE {}",
        report.metrics.rmse, report.metrics.mse
    );
    if !report.undeployed.is_empty() {
        println!("  Replaced: {}", report.undeployed.join(", ").dimmed());
    }

    match &report.smoke_test {
        SmokeTestOutcome::Skipped => {}
        SmokeTestOutcome::Passed { predictions } => println!(
            "  {} Smoke test returned {} prediction(s)",
            "✓".green(),
            predictions
        ),
        SmokeTestOutcome::Failed { reason } => {
            println!("  {} Smoke test failed: {}", "⚠".yellow(), reason)
        }
    }

    println!(
        "{} {} serves 100% of traffic on {}",
        "✓".green(),
        report.model.display_name.bold(),
        report.endpoint.display_name.bold()
    );
}
