//! Serving platform repository
//!
//! Publishes registered models behind named endpoints.

use anyhow::{Context, Result};
use async_trait::async_trait;
use gridsweep_client::ServingClient;
use gridsweep_core::dto::serving::Endpoint;
use std::collections::HashMap;

use crate::config::DeployConfig;

/// A serving endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointRef {
    /// Platform identifier (full resource name)
    pub id: String,
    pub display_name: String,
}

impl From<Endpoint> for EndpointRef {
    fn from(endpoint: Endpoint) -> Self {
        Self {
            id: endpoint.name,
            display_name: endpoint.display_name,
        }
    }
}

/// A registered model version
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelRef {
    /// Platform identifier (full resource name)
    pub id: String,
    pub display_name: String,
}

/// A model currently deployed on an endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployedModelRef {
    /// Deployed-model id assigned by the platform
    pub id: String,
    pub traffic_percent: u32,
}

/// Repository trait for the model serving platform
#[async_trait]
pub trait ServingPlatform: Send + Sync {
    /// Finds an endpoint by display name
    async fn find_endpoint(&self, name: &str) -> Result<Option<EndpointRef>>;

    /// Creates a new endpoint
    async fn create_endpoint(&self, name: &str) -> Result<EndpointRef>;

    /// Registers an artifact folder as a new model version
    ///
    /// # Arguments
    /// * `name` - Display name of the model
    /// * `artifact_path` - Storage folder holding the model artifact
    async fn register_model(&self, name: &str, artifact_path: &str) -> Result<ModelRef>;

    /// Lists the models currently attached to an endpoint with their traffic
    async fn list_deployed_models(&self, endpoint: &EndpointRef) -> Result<Vec<DeployedModelRef>>;

    /// Detaches one deployed model from an endpoint
    ///
    /// # Arguments
    /// * `deployed_model_id` - The model to detach
    /// * `remaining_split` - Traffic of the models that stay attached. It
    ///   must not route to the detached model and is empty when none stay.
    async fn undeploy(
        &self,
        endpoint: &EndpointRef,
        deployed_model_id: &str,
        remaining_split: &HashMap<String, u32>,
    ) -> Result<()>;

    /// Deploys a model on an endpoint
    ///
    /// # Returns
    /// The deployed-model id assigned by the platform
    async fn deploy(
        &self,
        endpoint: &EndpointRef,
        model: &ModelRef,
        traffic_percent: u32,
    ) -> Result<String>;

    /// Sends prediction instances to an endpoint
    async fn predict(
        &self,
        endpoint: &EndpointRef,
        instances: Vec<serde_json::Value>,
    ) -> Result<Vec<serde_json::Value>>;
}

/// Vertex AI implementation of ServingPlatform
pub struct VertexServingPlatform {
    client: ServingClient,
    serving_image: String,
    machine_type: String,
}

impl VertexServingPlatform {
    /// Creates a platform for the project and region of a deploy config
    pub fn from_config(config: &DeployConfig) -> Self {
        Self::new(
            ServingClient::new(&config.project_id, &config.region),
            config,
        )
    }

    /// Creates a platform around a preconfigured client
    pub fn new(client: ServingClient, config: &DeployConfig) -> Self {
        Self {
            client,
            serving_image: config.serving_image.clone(),
            machine_type: config.machine_type.clone(),
        }
    }
}

#[async_trait]
impl ServingPlatform for VertexServingPlatform {
    async fn find_endpoint(&self, name: &str) -> Result<Option<EndpointRef>> {
        let endpoint = self
            .client
            .find_endpoint(name)
            .await
            .with_context(|| format!("Failed to look up endpoint {}", name))?;

        Ok(endpoint.map(EndpointRef::from))
    }

    async fn create_endpoint(&self, name: &str) -> Result<EndpointRef> {
        let endpoint = self
            .client
            .create_endpoint(name)
            .await
            .with_context(|| format!("Failed to create endpoint {}", name))?;

        Ok(endpoint.into())
    }

    async fn register_model(&self, name: &str, artifact_path: &str) -> Result<ModelRef> {
        let id = self
            .client
            .upload_model(name, artifact_path, &self.serving_image)
            .await
            .with_context(|| format!("Failed to upload model {}", name))?;

        Ok(ModelRef {
            id,
            display_name: name.to_string(),
        })
    }

    async fn list_deployed_models(&self, endpoint: &EndpointRef) -> Result<Vec<DeployedModelRef>> {
        let current = self
            .client
            .get_endpoint(&endpoint.id)
            .await
            .with_context(|| format!("Failed to read endpoint {}", endpoint.display_name))?;

        Ok(deployed_models(current))
    }

    async fn undeploy(
        &self,
        endpoint: &EndpointRef,
        deployed_model_id: &str,
        remaining_split: &HashMap<String, u32>,
    ) -> Result<()> {
        self.client
            .undeploy_model(&endpoint.id, deployed_model_id, remaining_split.clone())
            .await
            .with_context(|| {
                format!(
                    "Failed to undeploy {} from {}",
                    deployed_model_id, endpoint.display_name
                )
            })
    }

    async fn deploy(
        &self,
        endpoint: &EndpointRef,
        model: &ModelRef,
        traffic_percent: u32,
    ) -> Result<String> {
        let deployed = self
            .client
            .deploy_model(
                &endpoint.id,
                &model.id,
                &model.display_name,
                &self.machine_type,
                traffic_percent,
            )
            .await
            .with_context(|| {
                format!(
                    "Failed to deploy {} to {}",
                    model.display_name, endpoint.display_name
                )
            })?;

        Ok(deployed.id)
    }

    async fn predict(
        &self,
        endpoint: &EndpointRef,
        instances: Vec<serde_json::Value>,
    ) -> Result<Vec<serde_json::Value>> {
        let response = self
            .client
            .predict(&endpoint.id, instances)
            .await
            .with_context(|| format!("Prediction against {} failed", endpoint.display_name))?;

        Ok(response.predictions)
    }
}

/// Pairs each deployed model with its share of the endpoint's traffic
fn deployed_models(endpoint: Endpoint) -> Vec<DeployedModelRef> {
    let split = endpoint.traffic_split;
    endpoint
        .deployed_models
        .into_iter()
        .map(|m| DeployedModelRef {
            traffic_percent: split.get(&m.id).copied().unwrap_or(0),
            id: m.id,
        })
        .collect()
}
