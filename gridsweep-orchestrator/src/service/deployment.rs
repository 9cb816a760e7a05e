//! Deployment trigger
//!
//! Publishes the winning job's model behind its own endpoint:
//! 1. Read the job's persisted metrics
//! 2. Find or create `endpoint-{job_id}`
//! 3. Register `model-{job_id}` from the job's artifact folder
//! 4. Undeploy whatever the endpoint currently serves
//! 5. Deploy the new model at 100% traffic
//! 6. Optionally send one smoke-test prediction
//!
//! Steps 2-5 are attempted once each. A failure stops the remaining steps and
//! nothing is rolled back.
//!
//! Each undeploy call carries the traffic split of the models left behind, so
//! a model is never removed while it still receives traffic.

use gridsweep_core::domain::job::JobDescriptor;
use gridsweep_core::domain::metrics::MetricsRecord;
use gridsweep_core::domain::sweep::SweepResult;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::config::DeployConfig;
use crate::repository::{ArtifactStore, EndpointRef, ModelRef, ServingPlatform};

/// Failure of a deployment, tagged with the step that failed
#[derive(Debug, Error)]
pub enum DeployError {
    #[error("sweep produced no successful job to deploy")]
    NoWinner,

    #[error("metrics of job {job_id} are unavailable: {reason}")]
    MetricsUnavailable { job_id: String, reason: String },

    #[error("failed to resolve endpoint {endpoint}")]
    ResolveEndpoint {
        endpoint: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("failed to register model {model}")]
    RegisterModel {
        model: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("failed to undeploy current models from {endpoint}")]
    Undeploy {
        endpoint: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("failed to deploy {model} to {endpoint}")]
    Deploy {
        endpoint: String,
        model: String,
        #[source]
        source: anyhow::Error,
    },
}

impl DeployError {
    /// Name of the step that failed
    pub fn step(&self) -> &'static str {
        match self {
            Self::NoWinner => "select",
            Self::MetricsUnavailable { .. } => "read metrics",
            Self::ResolveEndpoint { .. } => "resolve endpoint",
            Self::RegisterModel { .. } => "register model",
            Self::Undeploy { .. } => "undeploy",
            Self::Deploy { .. } => "deploy",
        }
    }
}

/// Result of the optional post-deploy prediction
#[derive(Debug, Clone, PartialEq)]
pub enum SmokeTestOutcome {
    /// No smoke-test instance configured
    Skipped,
    Passed { predictions: usize },
    /// Logged only; the deployment stands
    Failed { reason: String },
}

/// What a successful deployment did
#[derive(Debug, Clone, PartialEq)]
pub struct DeploymentReport {
    pub job_id: String,
    pub metrics: MetricsRecord,
    pub endpoint: EndpointRef,
    pub endpoint_created: bool,
    pub model: ModelRef,
    pub deployed_model_id: String,
    /// Deployed-model ids removed from the endpoint
    pub undeployed: Vec<String>,
    pub smoke_test: SmokeTestOutcome,
}

pub struct DeploymentTrigger {
    config: DeployConfig,
    store: Arc<dyn ArtifactStore>,
    platform: Arc<dyn ServingPlatform>,
}

impl DeploymentTrigger {
    pub fn new(
        config: DeployConfig,
        store: Arc<dyn ArtifactStore>,
        platform: Arc<dyn ServingPlatform>,
    ) -> Self {
        Self {
            config,
            store,
            platform,
        }
    }

    pub fn endpoint_name(job_id: &str) -> String {
        format!("endpoint-{}", job_id)
    }

    pub fn model_name(job_id: &str) -> String {
        format!("model-{}", job_id)
    }

    /// Deploys the winner of a sweep
    ///
    /// A result without a winner is rejected before any collaborator is
    /// contacted.
    pub async fn deploy_result(&self, result: &SweepResult) -> Result<DeploymentReport, DeployError> {
        let Some(best) = result.best_descriptor() else {
            error!("Sweep {} has no successful job, nothing to deploy", result.sweep_id);
            return Err(DeployError::NoWinner);
        };

        self.deploy_best(best).await
    }

    /// Deploys one job's model
    pub async fn deploy_best(&self, descriptor: &JobDescriptor) -> Result<DeploymentReport, DeployError> {
        let result = self.run_steps(descriptor).await;

        if let Err(e) = &result {
            match std::error::Error::source(e) {
                Some(cause) => error!(
                    "Deployment of job {} failed at step '{}': {}: {}",
                    descriptor.job_id,
                    e.step(),
                    e,
                    cause
                ),
                None => error!(
                    "Deployment of job {} failed at step '{}': {}",
                    descriptor.job_id,
                    e.step(),
                    e
                ),
            }
        }

        result
    }

    async fn run_steps(&self, descriptor: &JobDescriptor) -> Result<DeploymentReport, DeployError> {
        let job_id = &descriptor.job_id;
        info!("Deploying job {} from {}", job_id, descriptor.artifact_destination);

        let metrics = self.read_metrics(descriptor).await?;
        info!("Job {} metrics: RMSE={}, MSE={}", job_id, metrics.rmse, metrics.mse);

        let endpoint_name = Self::endpoint_name(job_id);
        let (endpoint, endpoint_created) = self.resolve_endpoint(&endpoint_name).await?;

        let model_name = Self::model_name(job_id);
        let model = self
            .platform
            .register_model(&model_name, &descriptor.artifact_destination)
            .await
            .map_err(|source| DeployError::RegisterModel {
                model: model_name.clone(),
                source,
            })?;
        info!("Registered model {} ({})", model.display_name, model.id);

        let attached = self
            .platform
            .list_deployed_models(&endpoint)
            .await
            .map_err(|source| DeployError::Undeploy {
                endpoint: endpoint_name.clone(),
                source,
            })?;

        let mut split: HashMap<String, u32> = attached
            .iter()
            .map(|m| (m.id.clone(), m.traffic_percent))
            .collect();
        let existing: Vec<String> = attached.into_iter().map(|m| m.id).collect();

        let deployed_model_id = if self.config.deploy_before_undeploy {
            let id = self.deploy(&endpoint, &model).await?;
            // The new model took all of the traffic
            split.values_mut().for_each(|t| *t = 0);
            split.insert(id.clone(), 100);
            self.undeploy_all(&endpoint, &existing, split).await?;
            id
        } else {
            self.undeploy_all(&endpoint, &existing, split).await?;
            self.deploy(&endpoint, &model).await?
        };

        let smoke_test = self.smoke_test(&endpoint).await;

        info!(
            "Model {} is serving on {} at 100% traffic",
            model.display_name, endpoint.display_name
        );

        Ok(DeploymentReport {
            job_id: job_id.clone(),
            metrics,
            endpoint,
            endpoint_created,
            model,
            deployed_model_id,
            undeployed: existing,
            smoke_test,
        })
    }

    async fn read_metrics(&self, descriptor: &JobDescriptor) -> Result<MetricsRecord, DeployError> {
        let path = descriptor.metrics_path();
        let unavailable = |reason: String| DeployError::MetricsUnavailable {
            job_id: descriptor.job_id.clone(),
            reason,
        };

        let bytes = self
            .store
            .read_blob(&path)
            .await
            .map_err(|e| unavailable(e.to_string()))?;

        MetricsRecord::from_json(&bytes)
            .map_err(|e| unavailable(format!("malformed {}: {}", path, e)))
    }

    async fn resolve_endpoint(&self, name: &str) -> Result<(EndpointRef, bool), DeployError> {
        let resolve_err = |source| DeployError::ResolveEndpoint {
            endpoint: name.to_string(),
            source,
        };

        if let Some(endpoint) = self.platform.find_endpoint(name).await.map_err(resolve_err)? {
            info!("Using existing endpoint {} ({})", name, endpoint.id);
            return Ok((endpoint, false));
        }

        let endpoint = self
            .platform
            .create_endpoint(name)
            .await
            .map_err(resolve_err)?;
        info!("Created endpoint {} ({})", name, endpoint.id);

        Ok((endpoint, true))
    }

    async fn undeploy_all(
        &self,
        endpoint: &EndpointRef,
        ids: &[String],
        mut split: HashMap<String, u32>,
    ) -> Result<(), DeployError> {
        for id in ids {
            split = split_without(&split, id);
            self.platform
                .undeploy(endpoint, id, &split)
                .await
                .map_err(|source| DeployError::Undeploy {
                    endpoint: endpoint.display_name.clone(),
                    source,
                })?;
            info!("Undeployed {} from {}", id, endpoint.display_name);
        }
        Ok(())
    }

    async fn deploy(&self, endpoint: &EndpointRef, model: &ModelRef) -> Result<String, DeployError> {
        self.platform
            .deploy(endpoint, model, 100)
            .await
            .map_err(|source| DeployError::Deploy {
                endpoint: endpoint.display_name.clone(),
                model: model.display_name.clone(),
                source,
            })
    }

    async fn smoke_test(&self, endpoint: &EndpointRef) -> SmokeTestOutcome {
        let Some(instance) = &self.config.smoke_test_instance else {
            return SmokeTestOutcome::Skipped;
        };

        match self.platform.predict(endpoint, vec![instance.clone()]).await {
            Ok(predictions) => {
                info!(
                    "Smoke test against {} returned {:?}",
                    endpoint.display_name, predictions
                );
                SmokeTestOutcome::Passed {
                    predictions: predictions.len(),
                }
            }
            Err(e) => {
                warn!("Smoke test against {} failed: {:#}", endpoint.display_name, e);
                SmokeTestOutcome::Failed {
                    reason: format!("{:#}", e),
                }
            }
        }
    }
}

/// Traffic split left after removing one deployed model
///
/// The removed share moves onto the remaining models in proportion to their
/// current traffic. If none of them has traffic, the first id in sorted order
/// takes all of it. The result sums to 100 unless no model remains.
fn split_without(split: &HashMap<String, u32>, removed: &str) -> HashMap<String, u32> {
    let mut remaining: Vec<(String, u32)> = split
        .iter()
        .filter(|(id, _)| id.as_str() != removed)
        .map(|(id, traffic)| (id.clone(), *traffic))
        .collect();
    remaining.sort_by(|a, b| a.0.cmp(&b.0));

    let total: u32 = remaining.iter().map(|(_, traffic)| traffic).sum();
    if total == 0 {
        if let Some(first) = remaining.first_mut() {
            first.1 = 100;
        }
        return remaining.into_iter().collect();
    }

    let mut shares: Vec<(String, u32)> = remaining
        .iter()
        .map(|(id, traffic)| (id.clone(), traffic * 100 / total))
        .collect();

    // Rounding leftovers go to the model with the most traffic
    let assigned: u32 = shares.iter().map(|(_, share)| share).sum();
    let largest = remaining
        .iter()
        .enumerate()
        .max_by(|(i, a), (j, b)| a.1.cmp(&b.1).then(j.cmp(i)))
        .map(|(i, _)| i);
    if let Some(i) = largest {
        shares[i].1 += 100 - assigned;
    }

    shares.into_iter().collect()
}
