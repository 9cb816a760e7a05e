//! Job descriptor builder
//!
//! Turns grid configurations into job descriptors and renders the manifest
//! the cluster scheduler runs for each descriptor.

use gridsweep_core::domain::grid::{HyperparameterGrid, JobConfiguration};
use gridsweep_core::domain::job::JobDescriptor;
use gridsweep_core::dto::manifest::{Container, JobManifest};

use crate::config::SweepConfig;

/// Builds descriptors named `{prefix}-{index}`
#[derive(Debug, Clone)]
pub struct JobDescriptorBuilder {
    prefix: String,
    artifact_root: String,
}

impl JobDescriptorBuilder {
    pub fn new(prefix: impl Into<String>, artifact_root: impl Into<String>) -> Self {
        let artifact_root = artifact_root.into();
        Self {
            prefix: prefix.into(),
            artifact_root: artifact_root.trim_end_matches('/').to_string(),
        }
    }

    pub fn from_config(config: &SweepConfig) -> Self {
        Self::new(config.job_prefix.clone(), config.artifact_root.clone())
    }

    /// Job name for an enumeration index
    pub fn job_id(&self, index: usize) -> String {
        format!("{}-{}", self.prefix, index)
    }

    /// Artifact folder of a job
    pub fn artifact_destination(&self, job_id: &str) -> String {
        format!("{}/{}", self.artifact_root, job_id)
    }

    pub fn build(&self, configuration: JobConfiguration, index: usize) -> JobDescriptor {
        let job_id = self.job_id(index);
        JobDescriptor {
            index,
            artifact_destination: self.artifact_destination(&job_id),
            job_id,
            configuration,
        }
    }

    /// Builds one descriptor per grid configuration in enumeration order
    ///
    /// `limit` caps the number of descriptors (smoke-test runs).
    pub fn build_all<'a>(
        &'a self,
        grid: &'a HyperparameterGrid,
        limit: Option<usize>,
    ) -> impl Iterator<Item = JobDescriptor> + 'a {
        grid.iter()
            .take(limit.unwrap_or(usize::MAX))
            .enumerate()
            .map(|(index, configuration)| self.build(configuration, index))
    }
}

/// Renders the scheduler manifest of a descriptor
#[derive(Debug, Clone)]
pub struct ManifestTemplate {
    pub image: String,
    pub command: Vec<String>,
    pub service_account: Option<String>,
    pub backoff_limit: u32,
}

impl ManifestTemplate {
    pub fn from_config(config: &SweepConfig) -> Self {
        Self {
            image: config.training_image.clone(),
            command: config.training_command.clone(),
            service_account: config.service_account.clone(),
            backoff_limit: config.backoff_limit,
        }
    }

    /// Worker arguments: `--{name} {value}` per hyperparameter, then job identity
    pub fn worker_args(&self, descriptor: &JobDescriptor) -> Vec<String> {
        let mut args = Vec::with_capacity(descriptor.configuration.len() * 2 + 4);
        for (name, value) in descriptor.configuration.iter() {
            args.push(format!("--{}", name));
            args.push(value.to_string());
        }
        args.push("--job_name".to_string());
        args.push(descriptor.job_id.clone());
        args.push("--artifact_dir".to_string());
        args.push(descriptor.artifact_destination.clone());
        args
    }

    pub fn render(&self, descriptor: &JobDescriptor) -> JobManifest {
        let container = Container {
            name: "trainer".to_string(),
            image: self.image.clone(),
            command: self.command.clone(),
            args: self.worker_args(descriptor),
        };

        let manifest = JobManifest::new(descriptor.job_id.clone(), container, self.backoff_limit)
            .with_label("gridsweep/index", descriptor.index.to_string());

        match &self.service_account {
            Some(account) => manifest.with_service_account(account.clone()),
            None => manifest,
        }
    }

    pub fn render_yaml(&self, descriptor: &JobDescriptor) -> Result<String, serde_yaml::Error> {
        serde_yaml::to_string(&self.render(descriptor))
    }
}
