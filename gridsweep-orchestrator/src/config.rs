//! Sweep configuration
//!
//! Defines every tunable of a sweep run (job naming, artifact layout, worker
//! image, polling policy, concurrency) and of the deployment step (project,
//! region, bucket, serving image).

use std::time::Duration;

/// Polling policy for a single job
///
/// The interval grows by `backoff_factor` after every non-terminal check,
/// capped at `max_interval`. Either bound may be left unset, but an unset
/// pair polls forever.
#[derive(Debug, Clone, PartialEq)]
pub struct PollPolicy {
    /// Wait between the first and second check
    pub interval: Duration,

    /// Upper bound for the grown interval
    pub max_interval: Duration,

    /// Multiplier applied to the interval after each check (1.0 = fixed)
    pub backoff_factor: f64,

    /// Give up after this many checks
    pub max_attempts: Option<u32>,

    /// Give up once this much time has passed since the first check
    pub max_duration: Option<Duration>,
}

impl PollPolicy {
    /// Fixed interval, no bounds
    pub fn fixed(interval: Duration) -> Self {
        Self {
            interval,
            max_interval: interval,
            backoff_factor: 1.0,
            max_attempts: None,
            max_duration: None,
        }
    }

    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = Some(attempts);
        self
    }

    pub fn with_max_duration(mut self, duration: Duration) -> Self {
        self.max_duration = Some(duration);
        self
    }

    pub fn with_backoff(mut self, factor: f64, max_interval: Duration) -> Self {
        self.backoff_factor = factor;
        self.max_interval = max_interval;
        self
    }

    /// Interval to wait after `current`
    ///
    /// A product too large for a `Duration` is capped at `max_interval`.
    pub fn next_interval(&self, current: Duration) -> Duration {
        Duration::try_from_secs_f64(current.as_secs_f64() * self.backoff_factor)
            .unwrap_or(self.max_interval)
            .min(self.max_interval)
    }

    /// Validates the policy
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.interval.is_zero() {
            anyhow::bail!("poll interval must be greater than 0");
        }

        if self.max_interval < self.interval {
            anyhow::bail!("poll max_interval cannot be shorter than the interval");
        }

        if !self.backoff_factor.is_finite() || self.backoff_factor < 1.0 {
            anyhow::bail!("poll backoff_factor must be a finite number >= 1.0");
        }

        if self.max_attempts == Some(0) {
            anyhow::bail!("poll max_attempts must be greater than 0");
        }

        Ok(())
    }
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self::fixed(Duration::from_secs(10))
            .with_backoff(1.5, Duration::from_secs(60))
            .with_max_duration(Duration::from_secs(12 * 60 * 60))
    }
}

/// Sweep configuration
#[derive(Debug, Clone)]
pub struct SweepConfig {
    /// Prefix of generated job names (`{prefix}-{index}`)
    pub job_prefix: String,

    /// Root under which each job persists `{job_id}/model.*` and `{job_id}/metrics.json`
    pub artifact_root: String,

    /// Training worker image
    pub training_image: String,

    /// Worker entry command; hyperparameters are appended as `--name value`
    pub training_command: Vec<String>,

    /// Service account the worker pod runs as
    pub service_account: Option<String>,

    /// Scheduler-side retries before a job is marked failed
    pub backoff_limit: u32,

    /// Kubernetes namespace for jobs (None = kubectl default)
    pub namespace: Option<String>,

    /// How each job is polled for completion
    pub poll: PollPolicy,

    /// Maximum number of jobs polled at the same time
    pub max_concurrent_polls: usize,

    /// Read `metrics.json` from the artifact store before scraping logs
    pub structured_metrics: bool,
}

impl SweepConfig {
    /// Creates configuration from environment variables
    ///
    /// Recognized environment variables (all optional):
    /// - SWEEP_JOB_PREFIX (default: sweep)
    /// - SWEEP_ARTIFACT_ROOT (default: gs://gridsweep-artifacts)
    /// - SWEEP_TRAINING_IMAGE
    /// - SWEEP_SERVICE_ACCOUNT
    /// - SWEEP_NAMESPACE
    /// - SWEEP_BACKOFF_LIMIT (default: 4)
    /// - SWEEP_POLL_INTERVAL (seconds, default: 10)
    /// - SWEEP_POLL_MAX_INTERVAL (seconds, default: 60)
    /// - SWEEP_POLL_BACKOFF (default: 1.5)
    /// - SWEEP_POLL_MAX_ATTEMPTS (default: unbounded)
    /// - SWEEP_POLL_TIMEOUT (seconds, default: 43200, 0 = unbounded)
    /// - SWEEP_MAX_CONCURRENT_POLLS (default: 4)
    /// - SWEEP_STRUCTURED_METRICS (true/false, 1/0, yes/no, on/off; default: false)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let default_poll = defaults.poll.clone();

        let interval = env_secs("SWEEP_POLL_INTERVAL").unwrap_or(default_poll.interval);
        let max_interval = env_secs("SWEEP_POLL_MAX_INTERVAL")
            .unwrap_or(default_poll.max_interval)
            .max(interval);

        let poll = PollPolicy {
            interval,
            max_interval,
            backoff_factor: env_parse("SWEEP_POLL_BACKOFF").unwrap_or(default_poll.backoff_factor),
            max_attempts: env_parse("SWEEP_POLL_MAX_ATTEMPTS"),
            max_duration: match env_parse::<u64>("SWEEP_POLL_TIMEOUT") {
                Some(0) => None,
                Some(secs) => Some(Duration::from_secs(secs)),
                None => default_poll.max_duration,
            },
        };

        Self {
            job_prefix: env_string("SWEEP_JOB_PREFIX").unwrap_or(defaults.job_prefix),
            artifact_root: env_string("SWEEP_ARTIFACT_ROOT").unwrap_or(defaults.artifact_root),
            training_image: env_string("SWEEP_TRAINING_IMAGE").unwrap_or(defaults.training_image),
            training_command: defaults.training_command,
            service_account: env_string("SWEEP_SERVICE_ACCOUNT"),
            backoff_limit: env_parse("SWEEP_BACKOFF_LIMIT").unwrap_or(defaults.backoff_limit),
            namespace: env_string("SWEEP_NAMESPACE"),
            poll,
            max_concurrent_polls: env_parse("SWEEP_MAX_CONCURRENT_POLLS")
                .unwrap_or(defaults.max_concurrent_polls),
            structured_metrics: env_bool("SWEEP_STRUCTURED_METRICS")
                .unwrap_or(defaults.structured_metrics),
        }
    }

    /// Validates the configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.job_prefix.is_empty() {
            anyhow::bail!("job_prefix cannot be empty");
        }

        // Job names end up as Kubernetes object names
        if !self
            .job_prefix
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
        {
            anyhow::bail!("job_prefix may only contain lowercase letters, digits and '-'");
        }

        if self.artifact_root.trim_end_matches('/').is_empty() {
            anyhow::bail!("artifact_root cannot be empty");
        }

        if self.training_image.is_empty() {
            anyhow::bail!("training_image cannot be empty");
        }

        if self.training_command.is_empty() {
            anyhow::bail!("training_command cannot be empty");
        }

        if self.max_concurrent_polls == 0 {
            anyhow::bail!("max_concurrent_polls must be greater than 0");
        }

        self.poll.validate()
    }
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            job_prefix: "sweep".to_string(),
            artifact_root: "gs://gridsweep-artifacts".to_string(),
            training_image: "gridsweep/trainer:latest".to_string(),
            training_command: vec!["python".to_string(), "train.py".to_string()],
            service_account: None,
            backoff_limit: 4,
            namespace: None,
            poll: PollPolicy::default(),
            max_concurrent_polls: 4,
            structured_metrics: false,
        }
    }
}

/// Deployment configuration
///
/// Passed to the deployment trigger at construction; nothing in the
/// deployment path reads ambient settings.
#[derive(Debug, Clone)]
pub struct DeployConfig {
    pub project_id: String,
    pub region: String,

    /// Bucket holding job artifacts (`gs://{bucket}/{job_id}/...`)
    pub artifact_bucket: String,

    /// Container image that serves the registered model
    pub serving_image: String,

    /// Machine type backing the deployed model
    pub machine_type: String,

    /// Optional instance sent as a prediction smoke test after deploying
    pub smoke_test_instance: Option<serde_json::Value>,

    /// Deploy the new model before removing the old ones
    pub deploy_before_undeploy: bool,
}

impl DeployConfig {
    pub fn new(
        project_id: impl Into<String>,
        region: impl Into<String>,
        artifact_bucket: impl Into<String>,
        serving_image: impl Into<String>,
    ) -> Self {
        Self {
            project_id: project_id.into(),
            region: region.into(),
            artifact_bucket: artifact_bucket.into(),
            serving_image: serving_image.into(),
            machine_type: "n1-standard-2".to_string(),
            smoke_test_instance: None,
            deploy_before_undeploy: false,
        }
    }

    /// Creates configuration from environment variables
    ///
    /// Expected environment variables:
    /// - DEPLOY_PROJECT_ID (required)
    /// - DEPLOY_REGION (required)
    /// - DEPLOY_ARTIFACT_BUCKET (required)
    /// - DEPLOY_SERVING_IMAGE (required)
    /// - DEPLOY_MACHINE_TYPE (optional, default: n1-standard-2)
    /// - DEPLOY_SMOKE_TEST_INSTANCE (optional, JSON object)
    /// - DEPLOY_BEFORE_UNDEPLOY (optional, true/false, 1/0, yes/no, on/off)
    pub fn from_env() -> anyhow::Result<Self> {
        let required = |name: &str| {
            env_string(name).ok_or_else(|| anyhow::anyhow!("{} environment variable not set", name))
        };

        let mut config = Self::new(
            required("DEPLOY_PROJECT_ID")?,
            required("DEPLOY_REGION")?,
            required("DEPLOY_ARTIFACT_BUCKET")?,
            required("DEPLOY_SERVING_IMAGE")?,
        );

        if let Some(machine_type) = env_string("DEPLOY_MACHINE_TYPE") {
            config.machine_type = machine_type;
        }

        if let Some(raw) = env_string("DEPLOY_SMOKE_TEST_INSTANCE") {
            let instance = serde_json::from_str(&raw).map_err(|e| {
                anyhow::anyhow!("DEPLOY_SMOKE_TEST_INSTANCE is not valid JSON: {}", e)
            })?;
            config.smoke_test_instance = Some(instance);
        }

        config.deploy_before_undeploy =
            env_bool("DEPLOY_BEFORE_UNDEPLOY").unwrap_or(config.deploy_before_undeploy);

        Ok(config)
    }

    /// Artifact root matching the configured bucket
    pub fn artifact_root(&self) -> String {
        format!("gs://{}", self.artifact_bucket)
    }

    /// Validates the configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.project_id.is_empty() {
            anyhow::bail!("project_id cannot be empty");
        }

        if self.region.is_empty() {
            anyhow::bail!("region cannot be empty");
        }

        if self.artifact_bucket.is_empty() || self.artifact_bucket.contains('/') {
            anyhow::bail!("artifact_bucket must be a bare bucket name");
        }

        if self.serving_image.is_empty() {
            anyhow::bail!("serving_image cannot be empty");
        }

        Ok(())
    }
}

fn env_string(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|s| !s.trim().is_empty())
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    env_string(name).and_then(|s| s.trim().parse::<T>().ok())
}

fn env_bool(name: &str) -> Option<bool> {
    env_string(name).and_then(|s| parse_bool(&s))
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn env_secs(name: &str) -> Option<Duration> {
    env_parse::<u64>(name).map(Duration::from_secs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SweepConfig::default();
        assert_eq!(config.job_prefix, "sweep");
        assert_eq!(config.poll.interval, Duration::from_secs(10));
        assert_eq!(config.max_concurrent_polls, 4);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = SweepConfig::default();

        config.job_prefix = String::new();
        assert!(config.validate().is_err());

        config.job_prefix = "Bad_Prefix".to_string();
        assert!(config.validate().is_err());

        config.job_prefix = "xgboost-train".to_string();
        assert!(config.validate().is_ok());

        config.max_concurrent_polls = 0;
        assert!(config.validate().is_err());

        config.max_concurrent_polls = 1;
        config.poll.interval = Duration::ZERO;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_backoff_is_capped() {
        let policy =
            PollPolicy::fixed(Duration::from_secs(10)).with_backoff(2.0, Duration::from_secs(30));

        let second = policy.next_interval(policy.interval);
        let third = policy.next_interval(second);
        let fourth = policy.next_interval(third);

        assert_eq!(second, Duration::from_secs(20));
        assert_eq!(third, Duration::from_secs(30));
        assert_eq!(fourth, Duration::from_secs(30));
    }

    #[test]
    fn test_huge_backoff_caps_at_max_interval() {
        let policy =
            PollPolicy::fixed(Duration::from_secs(10)).with_backoff(1e18, Duration::from_secs(60));
        assert!(policy.validate().is_ok());

        let second = policy.next_interval(policy.interval);
        let third = policy.next_interval(second);
        let fourth = policy.next_interval(third);

        assert_eq!(second, Duration::from_secs(60));
        assert_eq!(third, Duration::from_secs(60));
        assert_eq!(fourth, Duration::from_secs(60));
    }

    #[test]
    fn test_bool_spellings() {
        for truthy in ["true", "TRUE", "1", "yes", " on "] {
            assert_eq!(parse_bool(truthy), Some(true), "{}", truthy);
        }
        for falsy in ["false", "0", "No", "off"] {
            assert_eq!(parse_bool(falsy), Some(false), "{}", falsy);
        }
        assert_eq!(parse_bool("maybe"), None);
    }

    #[test]
    fn test_fixed_policy_never_grows() {
        let policy = PollPolicy::fixed(Duration::from_millis(5));
        assert_eq!(policy.next_interval(policy.interval), Duration::from_millis(5));
    }

    #[test]
    fn test_poll_policy_validation() {
        assert!(PollPolicy::default().validate().is_ok());
        assert!(
            PollPolicy::fixed(Duration::from_secs(1))
                .with_max_attempts(0)
                .validate()
                .is_err()
        );
        assert!(
            PollPolicy::fixed(Duration::from_secs(1))
                .with_backoff(0.5, Duration::from_secs(5))
                .validate()
                .is_err()
        );
    }

    #[test]
    fn test_deploy_config_validation() {
        let config = DeployConfig::new("proj", "australia-southeast1", "bucket", "image:latest");
        assert!(config.validate().is_ok());
        assert_eq!(config.artifact_root(), "gs://bucket");

        let bad = DeployConfig::new("proj", "region", "gs://bucket", "image");
        assert!(bad.validate().is_err());

        let bad = DeployConfig::new("", "region", "bucket", "image");
        assert!(bad.validate().is_err());
    }
}
