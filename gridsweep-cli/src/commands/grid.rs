//! Grid command handlers
//!
//! Offline commands: nothing here talks to the cluster.

use anyhow::{Context, Result};
use colored::*;
use std::path::Path;

use crate::config::Config;
use crate::grid_file::load_grid;

/// Print every configuration with the job name it would run under
pub async fn list_configurations(file: &Path, limit: Option<usize>, config: &Config) -> Result<()> {
    let grid = load_grid(file).await?;
    let builder = config.builder();

    println!(
        "{}",
        format!(
            "Grid has {} parameter(s) and {} configuration(s):",
            grid.parameters().len(),
            grid.len()
        )
        .bold()
    );
    for param in grid.parameters() {
        let values: Vec<String> = param.values.iter().map(|v| v.to_string()).collect();
        println!("  {}: [{}]", param.name.cyan(), values.join(", "));
    }
    println!();

    for descriptor in builder.build_all(&grid, limit) {
        println!(
            "  {} {}  {}",
            "▸".cyan(),
            descriptor.job_id.bold(),
            descriptor.configuration.to_string().dimmed()
        );
    }

    if let Some(limit) = limit.filter(|l| *l < grid.len()) {
        println!();
        println!(
            "{}",
            format!("Showing the first {} of {}.", limit, grid.len()).yellow()
        );
    }

    Ok(())
}

/// Write `{job_id}.yaml` for each configuration into `out`
pub async fn write_manifests(
    file: &Path,
    out: &Path,
    limit: Option<usize>,
    config: &Config,
) -> Result<()> {
    config.sweep.validate().context("Invalid sweep configuration")?;

    let grid = load_grid(file).await?;
    let builder = config.builder();
    let template = config.template();

    tokio::fs::create_dir_all(out)
        .await
        .with_context(|| format!("Failed to create {}", out.display()))?;

    let mut written = 0;
    for descriptor in builder.build_all(&grid, limit) {
        let yaml = template
            .render_yaml(&descriptor)
            .with_context(|| format!("Failed to render manifest for {}", descriptor.job_id))?;

        let path = out.join(format!("{}.yaml", descriptor.job_id));
        tokio::fs::write(&path, yaml)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?;

        println!("{} {}", "✓".green(), path.display());
        written += 1;
    }

    println!();
    println!(
        "{}",
        format!("Wrote {} manifest(s) to {}", written, out.display()).bold()
    );
    println!(
        "{}",
        format!("Submit them with: kubectl apply -f {}", out.display()).dimmed()
    );

    Ok(())
}
