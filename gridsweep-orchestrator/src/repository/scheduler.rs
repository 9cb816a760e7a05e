//! Scheduler repository
//!
//! Handles communication with the cluster scheduler:
//! - Submitting rendered job manifests
//! - Querying job conditions
//! - Fetching the log text of a job's pod

use anyhow::{Context, Result};
use async_trait::async_trait;
use gridsweep_core::domain::job::{ConditionStatus, ConditionType, JobDescriptor, JobHandle};
use std::process::Stdio;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, info};

use crate::service::ManifestTemplate;

/// Reasons a job never reached the scheduler's queue
#[derive(Debug, Error)]
pub enum SubmissionError {
    /// The scheduler refused the descriptor (malformed manifest, quota, name clash)
    #[error("scheduler rejected job {job_id}: {reason}")]
    Rejected { job_id: String, reason: String },

    /// The descriptor could not be turned into a submittable manifest
    #[error("failed to render job {job_id}: {reason}")]
    Render { job_id: String, reason: String },

    /// The scheduler could not be reached at all
    #[error("scheduler unavailable: {0}")]
    Unavailable(String),
}

/// Repository trait for the cluster scheduler
#[async_trait]
pub trait JobScheduler: Send + Sync {
    /// Submits a job without waiting for it to run
    ///
    /// # Arguments
    /// * `descriptor` - The job to submit
    async fn submit(&self, descriptor: &JobDescriptor) -> Result<JobHandle, SubmissionError>;

    /// Reads one condition of a submitted job
    ///
    /// Querying has no effect on the job and may be repeated freely.
    ///
    /// # Arguments
    /// * `job_id` - The scheduler-facing job name
    /// * `condition` - Which condition to read
    async fn condition(&self, job_id: &str, condition: ConditionType) -> Result<ConditionStatus>;

    /// Fetches the full log text of the job's execution unit
    async fn log_text(&self, job_id: &str) -> Result<String>;
}

/// Captured output of one kubectl invocation
struct CommandOutput {
    stdout: String,
    stderr: String,
    exit_code: i32,
}

impl CommandOutput {
    fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Checks if kubectl is installed and available
pub async fn check_kubectl_available(kubectl: &str) -> Result<()> {
    let output = Command::new(kubectl)
        .arg("version")
        .arg("--client")
        .output()
        .await
        .with_context(|| {
            format!("Failed to execute '{} version --client'. Is kubectl installed?", kubectl)
        })?;

    if !output.status.success() {
        anyhow::bail!("{} is not working correctly", kubectl);
    }

    let version = String::from_utf8_lossy(&output.stdout);
    info!("kubectl is available: {}", version.trim());

    Ok(())
}

/// Kubernetes implementation of JobScheduler driven through kubectl
pub struct KubectlScheduler {
    kubectl: String,
    namespace: Option<String>,
    template: ManifestTemplate,
}

impl KubectlScheduler {
    /// Creates a scheduler that renders jobs with the given template
    pub fn new(template: ManifestTemplate) -> Self {
        Self {
            kubectl: "kubectl".to_string(),
            namespace: None,
            template,
        }
    }

    /// Targets a namespace other than the kubectl context default
    pub fn with_namespace(mut self, namespace: Option<String>) -> Self {
        self.namespace = namespace;
        self
    }

    /// Uses a specific kubectl binary
    pub fn with_binary(mut self, kubectl: impl Into<String>) -> Self {
        self.kubectl = kubectl.into();
        self
    }

    /// Runs kubectl with the namespace flag applied, optionally feeding stdin
    async fn run(&self, args: &[&str], stdin: Option<Vec<u8>>) -> Result<CommandOutput> {
        let mut command = Command::new(&self.kubectl);
        if let Some(namespace) = &self.namespace {
            command.arg("--namespace").arg(namespace);
        }
        command
            .args(args)
            .stdin(if stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        debug!("Running {} {:?}", self.kubectl, args);

        let mut child = command
            .spawn()
            .with_context(|| format!("Failed to execute {}", self.kubectl))?;

        if let Some(input) = stdin {
            let mut pipe = child
                .stdin
                .take()
                .context("kubectl stdin was not captured")?;
            pipe.write_all(&input)
                .await
                .context("Failed to write manifest to kubectl")?;
            // Closing stdin lets kubectl see end of input
            drop(pipe);
        }

        let output = child
            .wait_with_output()
            .await
            .context("Failed to wait for kubectl")?;

        let result = CommandOutput {
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            exit_code: output.status.code().unwrap_or(-1),
        };

        if !result.stderr.trim().is_empty() {
            debug!("kubectl stderr: {}", result.stderr.trim());
        }

        Ok(result)
    }

    /// Runs kubectl and fails on a non-zero exit code
    async fn run_checked(&self, args: &[&str]) -> Result<String> {
        let output = self.run(args, None).await?;

        if !output.success() {
            anyhow::bail!(
                "kubectl {} failed: exit_code={}, stderr='{}'",
                args.first().copied().unwrap_or_default(),
                output.exit_code,
                output.stderr.trim()
            );
        }

        Ok(output.stdout)
    }
}

#[async_trait]
impl JobScheduler for KubectlScheduler {
    async fn submit(&self, descriptor: &JobDescriptor) -> Result<JobHandle, SubmissionError> {
        let manifest = self.template.render_yaml(descriptor).map_err(|e| {
            SubmissionError::Render {
                job_id: descriptor.job_id.clone(),
                reason: e.to_string(),
            }
        })?;

        let output = self
            .run(&["apply", "-f", "-"], Some(manifest.into_bytes()))
            .await
            .map_err(|e| SubmissionError::Unavailable(format!("{:#}", e)))?;

        if !output.success() {
            return Err(SubmissionError::Rejected {
                job_id: descriptor.job_id.clone(),
                reason: output.stderr.trim().to_string(),
            });
        }

        debug!("kubectl apply: {}", output.stdout.trim());

        Ok(JobHandle {
            job_id: descriptor.job_id.clone(),
            submitted_at: chrono::Utc::now(),
        })
    }

    async fn condition(&self, job_id: &str, condition: ConditionType) -> Result<ConditionStatus> {
        let jsonpath = match condition {
            // Jobs have no "Started" condition; a start time means the pod was scheduled
            ConditionType::Started => "jsonpath={.status.startTime}".to_string(),
            _ => format!(
                "jsonpath={{.status.conditions[?(@.type=='{}')].status}}",
                condition.as_str()
            ),
        };

        let stdout = self
            .run_checked(&["get", "job", job_id, "-o", &jsonpath])
            .await
            .with_context(|| format!("Failed to read {:?} condition of job {}", condition, job_id))?;

        let status = match condition {
            ConditionType::Started if !stdout.trim().is_empty() => ConditionStatus::True,
            ConditionType::Started => ConditionStatus::Unknown,
            _ => ConditionStatus::parse(&stdout),
        };

        Ok(status)
    }

    async fn log_text(&self, job_id: &str) -> Result<String> {
        let selector = format!("--selector=job-name={}", job_id);
        let pods = self
            .run_checked(&[
                "get",
                "pods",
                &selector,
                "--sort-by=.metadata.creationTimestamp",
                "-o",
                "jsonpath={.items[*].metadata.name}",
            ])
            .await
            .with_context(|| format!("Failed to list pods of job {}", job_id))?;

        // Newest pod is the attempt that produced the terminal state
        let pod = pods
            .split_whitespace()
            .last()
            .ok_or_else(|| anyhow::anyhow!("Job {} has no pods", job_id))?
            .to_string();

        debug!("Fetching logs of pod {} for job {}", pod, job_id);

        self.run_checked(&["logs", &pod])
            .await
            .with_context(|| format!("Failed to fetch logs of pod {}", pod))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SweepConfig;
    use crate::service::JobDescriptorBuilder;
    use gridsweep_core::domain::grid::{HyperparameterGrid, ParamValue};

    fn descriptor() -> JobDescriptor {
        let grid = HyperparameterGrid::from_pairs([("max_depth", vec![ParamValue::Int(3)])]).unwrap();
        let builder = JobDescriptorBuilder::from_config(&SweepConfig::default());
        builder.build(grid.iter().next().unwrap(), 0)
    }

    /// Stand-in kubectl that answers from canned output and records its argv
    const FAKE_KUBECTL: &str = r##"#!/bin/sh
dir=$(dirname "$0")
echo "$*" >> "$dir/calls.log"

if [ "$1" = "logs" ]; then
  case "$2" in
    done-job-new) echo "RMSE: 2.5"; echo "MSE: 6.25" ;;
    *) echo "logs from $2" ;;
  esac
  exit 0
fi

case "$1 $2 $3" in
  "get job queued-job") ;;
  "get job running-job")
    case "$5" in *startTime*) echo "2025-01-01T00:00:00Z" ;; esac ;;
  "get job done-job")
    case "$5" in *Complete*) echo "True" ;; *startTime*) echo "2025-01-01T00:00:00Z" ;; esac ;;
  "get job broken-job")
    case "$5" in *Complete*) echo "False" ;; *Failed*) echo "True" ;; esac ;;
  "get pods --selector=job-name=done-job") echo "done-job-old done-job-new" ;;
  "get pods --selector=job-name=queued-job") ;;
  *) echo "Error from server (NotFound): $*" >&2; exit 1 ;;
esac
"##;

    #[cfg(unix)]
    fn fake_kubectl() -> (tempfile::TempDir, KubectlScheduler) {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kubectl");
        std::fs::write(&path, FAKE_KUBECTL).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();

        let scheduler = KubectlScheduler::new(ManifestTemplate::from_config(&SweepConfig::default()))
            .with_binary(path.to_string_lossy().to_string());
        (dir, scheduler)
    }

    #[cfg(unix)]
    fn calls(dir: &tempfile::TempDir) -> Vec<String> {
        std::fs::read_to_string(dir.path().join("calls.log"))
            .unwrap_or_default()
            .lines()
            .map(str::to_string)
            .collect()
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_start_time_maps_to_started() {
        let (_dir, scheduler) = fake_kubectl();

        assert_eq!(
            scheduler
                .condition("running-job", ConditionType::Started)
                .await
                .unwrap(),
            ConditionStatus::True
        );
        assert_eq!(
            scheduler
                .condition("queued-job", ConditionType::Started)
                .await
                .unwrap(),
            ConditionStatus::Unknown
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_condition_status_is_parsed() {
        let (dir, scheduler) = fake_kubectl();

        let cases = [
            ("done-job", ConditionType::Complete, ConditionStatus::True),
            ("broken-job", ConditionType::Complete, ConditionStatus::False),
            ("broken-job", ConditionType::Failed, ConditionStatus::True),
            ("running-job", ConditionType::Complete, ConditionStatus::Unknown),
        ];
        for (job, condition, expected) in cases {
            let status = scheduler.condition(job, condition).await.unwrap();
            assert_eq!(status, expected, "{} {:?}", job, condition);
        }

        let calls = calls(&dir);
        assert!(calls.contains(
            &"get job done-job -o jsonpath={.status.conditions[?(@.type=='Complete')].status}"
                .to_string()
        ));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_unknown_job_fails_condition_query() {
        let (_dir, scheduler) = fake_kubectl();

        let err = scheduler
            .condition("missing-job", ConditionType::Complete)
            .await
            .unwrap_err();
        assert!(format!("{:#}", err).contains("NotFound"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_logs_come_from_newest_pod() {
        let (dir, scheduler) = fake_kubectl();

        let text = scheduler.log_text("done-job").await.unwrap();

        assert_eq!(text, "RMSE: 2.5\nMSE: 6.25\n");
        let calls = calls(&dir);
        assert_eq!(calls.last().map(String::as_str), Some("logs done-job-new"));
        assert!(!calls.iter().any(|c| c == "logs done-job-old"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_job_without_pods_has_no_logs() {
        let (_dir, scheduler) = fake_kubectl();

        let err = scheduler.log_text("queued-job").await.unwrap_err();
        assert!(err.to_string().contains("has no pods"));
    }

    #[tokio::test]
    async fn test_missing_binary_is_unavailable() {
        let scheduler = KubectlScheduler::new(ManifestTemplate::from_config(&SweepConfig::default()))
            .with_binary("/nonexistent/kubectl-for-tests");

        let err = scheduler.submit(&descriptor()).await.unwrap_err();
        assert!(matches!(err, SubmissionError::Unavailable(_)));
    }

    #[tokio::test]
    async fn test_availability_check_fails_without_binary() {
        assert!(check_kubectl_available("/nonexistent/kubectl-for-tests").await.is_err());
    }

    #[tokio::test]
    async fn test_missing_binary_fails_condition_query() {
        let scheduler = KubectlScheduler::new(ManifestTemplate::from_config(&SweepConfig::default()))
            .with_binary("/nonexistent/kubectl-for-tests");

        assert!(
            scheduler
                .condition("sweep-0", ConditionType::Complete)
                .await
                .is_err()
        );
    }
}
