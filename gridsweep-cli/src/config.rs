//! Configuration module
//!
//! Holds the resolved sweep settings and builds the collaborators the
//! commands run against.

use gridsweep_client::StorageClient;
use gridsweep_core::domain::grid::JobConfiguration;
use gridsweep_core::domain::job::JobDescriptor;
use gridsweep_orchestrator::SweepConfig;
use gridsweep_orchestrator::repository::{
    ArtifactStore, GcsArtifactStore, JobScheduler, KubectlScheduler, LocalArtifactStore,
};
use gridsweep_orchestrator::service::{JobDescriptorBuilder, ManifestTemplate};
use std::path::PathBuf;
use std::sync::Arc;

/// CLI configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub sweep: SweepConfig,

    /// kubectl binary used for every cluster call
    pub kubectl: String,

    /// Local mirror of the artifact bucket, if any
    pub local_artifacts: Option<PathBuf>,
}

impl Config {
    pub fn builder(&self) -> JobDescriptorBuilder {
        JobDescriptorBuilder::from_config(&self.sweep)
    }

    pub fn template(&self) -> ManifestTemplate {
        ManifestTemplate::from_config(&self.sweep)
    }

    pub fn scheduler(&self) -> Arc<dyn JobScheduler> {
        Arc::new(
            KubectlScheduler::new(self.template())
                .with_namespace(self.sweep.namespace.clone())
                .with_binary(self.kubectl.clone()),
        )
    }

    pub fn artifact_store(&self) -> Arc<dyn ArtifactStore> {
        match &self.local_artifacts {
            Some(root) => Arc::new(LocalArtifactStore::new(root.clone())),
            None => Arc::new(GcsArtifactStore::new(StorageClient::new())),
        }
    }

    /// Descriptor of an already-submitted job, rooted at `artifact_root`
    ///
    /// Only the identity and artifact location are known, so the
    /// configuration is left empty.
    pub fn existing_job(&self, job_id: &str, artifact_root: &str) -> JobDescriptor {
        JobDescriptor {
            index: 0,
            job_id: job_id.to_string(),
            configuration: JobConfiguration::new(Vec::new()),
            artifact_destination: JobDescriptorBuilder::new("", artifact_root)
                .artifact_destination(job_id),
        }
    }
}
