//! Sweep result types

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::job::JobDescriptor;
use crate::domain::metrics::MetricsRecord;

/// How a single job ended up
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum JobOutcome {
    /// The scheduler rejected the descriptor; the job never ran
    SubmissionFailed { reason: String },
    /// The job completed; metrics are absent when extraction found nothing
    Completed { metrics: Option<MetricsRecord> },
    /// The scheduler reported the job as failed
    Failed,
    /// The poll policy was exhausted before a terminal state was observed
    TimedOut { attempts: u32, elapsed_ms: u64 },
}

impl JobOutcome {
    pub fn metrics(&self) -> Option<&MetricsRecord> {
        match self {
            Self::Completed { metrics } => metrics.as_ref(),
            _ => None,
        }
    }

    /// Short label for summaries
    pub fn label(&self) -> &'static str {
        match self {
            Self::SubmissionFailed { .. } => "submission failed",
            Self::Completed { metrics: Some(_) } => "completed",
            Self::Completed { metrics: None } => "completed (no metrics)",
            Self::Failed => "failed",
            Self::TimedOut { .. } => "timed out",
        }
    }
}

/// Per-job entry of a sweep result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobReport {
    pub descriptor: JobDescriptor,
    pub outcome: JobOutcome,
}

/// The winning job and its metrics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BestJob {
    pub descriptor: JobDescriptor,
    pub metrics: MetricsRecord,
}

/// Final result of one sweep run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepResult {
    pub sweep_id: Uuid,
    pub started_at: chrono::DateTime<chrono::Utc>,
    pub finished_at: chrono::DateTime<chrono::Utc>,
    /// None when every job failed or produced no metrics
    pub best: Option<BestJob>,
    /// Reports in enumeration order
    pub jobs: Vec<JobReport>,
}

impl SweepResult {
    pub fn has_winner(&self) -> bool {
        self.best.is_some()
    }

    pub fn best_descriptor(&self) -> Option<&JobDescriptor> {
        self.best.as_ref().map(|b| &b.descriptor)
    }

    pub fn best_metrics(&self) -> Option<&MetricsRecord> {
        self.best.as_ref().map(|b| &b.metrics)
    }

    /// Number of jobs that completed with usable metrics
    pub fn scored_jobs(&self) -> usize {
        self.jobs
            .iter()
            .filter(|r| r.outcome.metrics().is_some_and(MetricsRecord::is_comparable))
            .count()
    }
}
