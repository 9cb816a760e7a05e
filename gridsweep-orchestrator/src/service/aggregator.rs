//! Sweep aggregator
//!
//! Tracks the best job seen so far and collects per-job reports.
//! Owned by a single consumer; jobs may be fed in any order.

use gridsweep_core::domain::job::JobDescriptor;
use gridsweep_core::domain::metrics::MetricsRecord;
use gridsweep_core::domain::sweep::{BestJob, JobReport, SweepResult};
use tracing::{debug, info};
use uuid::Uuid;

pub struct SweepAggregator {
    sweep_id: Uuid,
    started_at: chrono::DateTime<chrono::Utc>,
    best: Option<BestJob>,
    reports: Vec<JobReport>,
}

impl SweepAggregator {
    pub fn new() -> Self {
        Self {
            sweep_id: Uuid::new_v4(),
            started_at: chrono::Utc::now(),
            best: None,
            reports: Vec::new(),
        }
    }

    pub fn sweep_id(&self) -> Uuid {
        self.sweep_id
    }

    pub fn best(&self) -> Option<&BestJob> {
        self.best.as_ref()
    }

    /// Offers a job as a candidate for best
    ///
    /// A strictly lower RMSE wins. On equal RMSE the job enumerated first
    /// keeps the title, whatever order the jobs arrive in. Missing or NaN
    /// metrics never compete.
    ///
    /// # Returns
    /// true if the job became the new best
    pub fn consider(&mut self, descriptor: &JobDescriptor, metrics: Option<MetricsRecord>) -> bool {
        let Some(metrics) = metrics.filter(MetricsRecord::is_comparable) else {
            debug!("Job {} has no comparable metrics", descriptor.job_id);
            return false;
        };

        let wins = match &self.best {
            None => true,
            Some(best) => {
                metrics.rmse < best.metrics.rmse
                    || (metrics.rmse == best.metrics.rmse
                        && descriptor.index < best.descriptor.index)
            }
        };

        if wins {
            info!(
                "New best job {} with RMSE {} ({})",
                descriptor.job_id, metrics.rmse, descriptor.configuration
            );
            self.best = Some(BestJob {
                descriptor: descriptor.clone(),
                metrics,
            });
        }

        wins
    }

    /// Records a finished job and offers it as a candidate
    pub fn record(&mut self, report: JobReport) {
        let metrics = report.outcome.metrics().copied();
        self.consider(&report.descriptor, metrics);
        self.reports.push(report);
    }

    /// Produces the sweep result, reports in enumeration order
    pub fn finalize(mut self) -> SweepResult {
        self.reports.sort_by_key(|r| r.descriptor.index);

        SweepResult {
            sweep_id: self.sweep_id,
            started_at: self.started_at,
            finished_at: chrono::Utc::now(),
            best: self.best,
            jobs: self.reports,
        }
    }
}

impl Default for SweepAggregator {
    fn default() -> Self {
        Self::new()
    }
}
