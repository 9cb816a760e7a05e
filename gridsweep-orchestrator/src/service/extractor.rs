//! Metrics extractor
//!
//! Recovers a job's RMSE and MSE after it completed, either from the
//! `metrics.json` the worker persisted or from the worker's log output.

use gridsweep_core::domain::job::JobDescriptor;
use gridsweep_core::domain::metrics::MetricsRecord;
use regex::Regex;
use std::sync::{Arc, LazyLock};
use tracing::{debug, info, warn};

use crate::repository::{ArtifactStore, JobScheduler};

static RMSE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"RMSE:\s*([0-9]+(?:\.[0-9]+)?(?:[eE][-+]?[0-9]+)?)").expect("valid RMSE pattern")
});

// The word boundary keeps "RMSE:" from matching as "MSE:"
static MSE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\bMSE:\s*([0-9]+(?:\.[0-9]+)?(?:[eE][-+]?[0-9]+)?)").expect("valid MSE pattern")
});

fn first_number(pattern: &Regex, text: &str) -> Option<f64> {
    pattern
        .captures(text)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// Parses the first `RMSE:` and `MSE:` values out of log text
///
/// Returns None unless both are present.
pub fn parse_metrics(text: &str) -> Option<MetricsRecord> {
    let rmse = first_number(&RMSE_PATTERN, text)?;
    let mse = first_number(&MSE_PATTERN, text)?;
    Some(MetricsRecord::new(rmse, mse))
}

pub struct MetricsExtractor {
    scheduler: Arc<dyn JobScheduler>,
    store: Option<Arc<dyn ArtifactStore>>,
}

impl MetricsExtractor {
    /// Extractor that scrapes job logs only
    pub fn new(scheduler: Arc<dyn JobScheduler>) -> Self {
        Self {
            scheduler,
            store: None,
        }
    }

    /// Reads `metrics.json` from the store first, falling back to the logs
    pub fn with_structured_metrics(mut self, store: Arc<dyn ArtifactStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Extracts the metrics of a completed job
    ///
    /// A miss is not an error: the job simply contributes no candidate.
    pub async fn extract(&self, descriptor: &JobDescriptor) -> Option<MetricsRecord> {
        let job_id = &descriptor.job_id;

        if let Some(store) = &self.store {
            let path = descriptor.metrics_path();
            match store.read_blob(&path).await {
                Ok(bytes) => match MetricsRecord::from_json(&bytes) {
                    Ok(record) => {
                        debug!("Read metrics of job {} from {}", job_id, path);
                        return Some(record);
                    }
                    Err(e) => warn!("Malformed metrics file {}: {}", path, e),
                },
                Err(e) => debug!("No metrics file for job {}: {}", job_id, e),
            }
        }

        let logs = match self.scheduler.log_text(job_id).await {
            Ok(logs) => logs,
            Err(e) => {
                warn!("Failed to fetch logs of job {}: {:#}", job_id, e);
                return None;
            }
        };

        let metrics = parse_metrics(&logs);
        match &metrics {
            Some(m) => info!("Job {} metrics: RMSE={}, MSE={}", job_id, m.rmse, m.mse),
            None => info!("No metrics available for job {}", job_id),
        }
        metrics
    }
}
