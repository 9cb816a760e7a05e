//! Sweep runner
//!
//! Runs one sweep over a grid:
//! - submits every job up front in enumeration order
//! - polls each accepted job in its own task, bounded by a semaphore
//! - streams finished jobs through a channel into the aggregator
//!
//! Deployment is not part of the run; callers pass the result to a
//! [`DeploymentTrigger`](crate::service::DeploymentTrigger).

use gridsweep_core::domain::grid::HyperparameterGrid;
use gridsweep_core::domain::job::JobDescriptor;
use gridsweep_core::domain::sweep::{JobOutcome, JobReport, SweepResult};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::{Semaphore, mpsc};
use tracing::{debug, error, info, warn};

use crate::config::SweepConfig;
use crate::repository::{ArtifactStore, JobScheduler};
use crate::service::{
    CompletionPoller, JobDescriptorBuilder, JobSubmitter, MetricsExtractor, PollOutcome,
    SweepAggregator,
};

pub struct SweepRunner {
    config: SweepConfig,
    builder: JobDescriptorBuilder,
    submitter: JobSubmitter,
    poller: Arc<CompletionPoller>,
    extractor: Arc<MetricsExtractor>,
}

impl SweepRunner {
    /// Creates a runner from a validated configuration
    ///
    /// The artifact store is only read when structured metrics are enabled.
    pub fn new(
        config: SweepConfig,
        scheduler: Arc<dyn JobScheduler>,
        store: Arc<dyn ArtifactStore>,
    ) -> anyhow::Result<Self> {
        config.validate()?;

        let mut extractor = MetricsExtractor::new(Arc::clone(&scheduler));
        if config.structured_metrics {
            extractor = extractor.with_structured_metrics(store);
        }

        Ok(Self {
            builder: JobDescriptorBuilder::from_config(&config),
            submitter: JobSubmitter::new(Arc::clone(&scheduler)),
            poller: Arc::new(CompletionPoller::new(scheduler, config.poll.clone())),
            extractor: Arc::new(extractor),
            config,
        })
    }

    /// Runs a sweep over every configuration of the grid
    pub async fn run_sweep(&self, grid: &HyperparameterGrid) -> SweepResult {
        self.run_sweep_limited(grid, None).await
    }

    /// Runs a sweep over at most `limit` configurations
    pub async fn run_sweep_limited(
        &self,
        grid: &HyperparameterGrid,
        limit: Option<usize>,
    ) -> SweepResult {
        let mut aggregator = SweepAggregator::new();
        let descriptors: Vec<JobDescriptor> = self.builder.build_all(grid, limit).collect();

        info!(
            "Starting sweep {} with {} job(s) (grid size {}, max {} concurrent poll(s))",
            aggregator.sweep_id(),
            descriptors.len(),
            grid.len(),
            self.config.max_concurrent_polls
        );

        let (tx, mut rx) = mpsc::channel::<JobReport>(descriptors.len().max(1));
        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrent_polls));
        let mut handles = Vec::new();
        let mut accepted = Vec::new();

        for descriptor in descriptors {
            match self.submitter.submit(&descriptor).await {
                Ok(_) => {
                    accepted.push(descriptor.clone());
                    handles.push(self.spawn_job_task(descriptor, Arc::clone(&semaphore), tx.clone()));
                }
                Err(e) => aggregator.record(JobReport {
                    descriptor,
                    outcome: JobOutcome::SubmissionFailed {
                        reason: e.to_string(),
                    },
                }),
            }
        }

        // The loop below ends once every task has dropped its sender
        drop(tx);

        let mut reported = HashSet::new();
        while let Some(report) = rx.recv().await {
            reported.insert(report.descriptor.index);
            aggregator.record(report);
        }

        for handle in handles {
            if let Err(e) = handle.await {
                warn!("Job task panicked: {}", e);
            }
        }

        for descriptor in accepted {
            if !reported.contains(&descriptor.index) {
                error!("Job {} produced no report, recording it as failed", descriptor.job_id);
                aggregator.record(JobReport {
                    descriptor,
                    outcome: JobOutcome::Failed,
                });
            }
        }

        let result = aggregator.finalize();

        match &result.best {
            Some(best) => info!(
                "Sweep {} finished: best job {} with RMSE {} ({} of {} job(s) scored)",
                result.sweep_id,
                best.descriptor.job_id,
                best.metrics.rmse,
                result.scored_jobs(),
                result.jobs.len()
            ),
            None => warn!(
                "Sweep {} finished without a successful job ({} job(s))",
                result.sweep_id,
                result.jobs.len()
            ),
        }

        result
    }

    /// Spawns the task that polls one job and extracts its metrics
    fn spawn_job_task(
        &self,
        descriptor: JobDescriptor,
        semaphore: Arc<Semaphore>,
        tx: mpsc::Sender<JobReport>,
    ) -> tokio::task::JoinHandle<()> {
        let poller = Arc::clone(&self.poller);
        let extractor = Arc::clone(&self.extractor);

        tokio::spawn(async move {
            let Ok(_permit) = semaphore.acquire_owned().await else {
                error!("Poll semaphore closed before job {} was polled", descriptor.job_id);
                return;
            };

            let polled = poller.wait(&descriptor.job_id).await;
            debug!(
                "Job {} stopped polling after {} attempt(s)",
                descriptor.job_id,
                polled.attempts()
            );

            let outcome = match polled {
                PollOutcome::Completed { .. } => JobOutcome::Completed {
                    metrics: extractor.extract(&descriptor).await,
                },
                PollOutcome::Failed { .. } => JobOutcome::Failed,
                PollOutcome::TimedOut {
                    attempts, elapsed, ..
                } => JobOutcome::TimedOut {
                    attempts,
                    elapsed_ms: elapsed.as_millis() as u64,
                },
            };

            let job_id = descriptor.job_id.clone();
            if tx.send(JobReport { descriptor, outcome }).await.is_err() {
                warn!("Sweep stopped listening before job {} reported", job_id);
            }
            // Permit is released when dropped
        })
    }
}
