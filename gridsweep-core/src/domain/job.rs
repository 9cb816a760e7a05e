//! Job domain types

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::grid::JobConfiguration;

/// A fully specified training job
///
/// Built once per grid configuration and submitted exactly once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobDescriptor {
    /// Position of the configuration in enumeration order
    pub index: usize,
    /// Scheduler-facing job name, `{prefix}-{index}`
    pub job_id: String,
    pub configuration: JobConfiguration,
    /// Storage path under which the worker persists the model and metrics
    pub artifact_destination: String,
}

impl JobDescriptor {
    /// Path of the metrics file the worker writes next to the model
    pub fn metrics_path(&self) -> String {
        format!(
            "{}/metrics.json",
            self.artifact_destination.trim_end_matches('/')
        )
    }
}

/// Handle returned by the scheduler for an accepted job
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobHandle {
    pub job_id: String,
    pub submitted_at: chrono::DateTime<chrono::Utc>,
}

/// Job status as reported by the cluster scheduler
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "Pending",
            Self::Running => "Running",
            Self::Completed => "Completed",
            Self::Failed => "Failed",
        };
        f.write_str(s)
    }
}

/// Scheduler condition types the poller queries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConditionType {
    /// The job has been picked up and started
    Started,
    /// The job finished successfully
    Complete,
    /// The job exhausted its retries
    Failed,
}

impl ConditionType {
    /// Kubernetes condition type name
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Started => "Started",
            Self::Complete => "Complete",
            Self::Failed => "Failed",
        }
    }
}

/// Tri-state condition value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConditionStatus {
    True,
    False,
    Unknown,
}

impl ConditionStatus {
    /// Parses a condition status string, treating anything unrecognized as Unknown
    pub fn parse(raw: &str) -> Self {
        match raw.trim() {
            "True" => Self::True,
            "False" => Self::False,
            _ => Self::Unknown,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_path_handles_trailing_slash() {
        let descriptor = JobDescriptor {
            index: 0,
            job_id: "sweep-0".to_string(),
            configuration: JobConfiguration::new(vec![]),
            artifact_destination: "gs://bucket/sweep-0/".to_string(),
        };
        assert_eq!(descriptor.metrics_path(), "gs://bucket/sweep-0/metrics.json");
    }

    #[test]
    fn test_condition_status_parse() {
        assert_eq!(ConditionStatus::parse("True"), ConditionStatus::True);
        assert_eq!(ConditionStatus::parse(" False\n"), ConditionStatus::False);
        assert_eq!(ConditionStatus::parse(""), ConditionStatus::Unknown);
    }
}
