//! Endpoint-related API calls

use crate::error::{ClientError, Result};
use crate::{ServingClient, handle_response};
use gridsweep_core::dto::serving::{
    CreateEndpointRequest, DedicatedResources, DeployModelRequest, DeployModelResponse,
    DeployedModel, Endpoint, ListEndpointsResponse, MachineSpec, Operation, PredictRequest,
    PredictResponse, UndeployModelRequest,
};
use std::collections::HashMap;
use tracing::debug;

impl ServingClient {
    // =============================================================================
    // Endpoint Lookup & Creation
    // =============================================================================

    /// Find the most recently created endpoint with a display name
    ///
    /// # Returns
    /// `None` if no endpoint carries that display name
    pub async fn find_endpoint(&self, display_name: &str) -> Result<Option<Endpoint>> {
        let url = self.collection_url("endpoints");
        let filter = format!("display_name=\"{}\"", display_name);
        let response = self
            .client
            .get(&url)
            .query(&[("filter", filter.as_str()), ("orderBy", "create_time desc")])
            .send()
            .await?;

        let list: ListEndpointsResponse = handle_response(response).await?;
        Ok(list.endpoints.into_iter().next())
    }

    /// Get an endpoint by its full resource name
    pub async fn get_endpoint(&self, name: &str) -> Result<Endpoint> {
        let url = self.resource_url(name);
        let response = self.client.get(&url).send().await?;

        handle_response(response).await
    }

    /// Create an endpoint and wait for it to exist
    pub async fn create_endpoint(&self, display_name: &str) -> Result<Endpoint> {
        let url = self.collection_url("endpoints");
        let response = self
            .client
            .post(&url)
            .json(&CreateEndpointRequest {
                display_name: display_name.to_string(),
            })
            .send()
            .await?;

        let operation: Operation = handle_response(response).await?;
        let operation = self.wait_operation(operation).await?;
        self.operation_response(&operation)
    }

    // =============================================================================
    // Deployment
    // =============================================================================

    /// Deploy a registered model on an endpoint
    ///
    /// # Arguments
    /// * `endpoint` - Full resource name of the endpoint
    /// * `model` - Full resource name of the registered model
    /// * `display_name` - Display name of the deployed model
    /// * `machine_type` - Machine type backing the deployment
    /// * `traffic_percent` - Share of endpoint traffic routed to the new model
    pub async fn deploy_model(
        &self,
        endpoint: &str,
        model: &str,
        display_name: &str,
        machine_type: &str,
        traffic_percent: u32,
    ) -> Result<DeployedModel> {
        if traffic_percent > 100 {
            return Err(ClientError::InvalidRequest(format!(
                "traffic percent {} exceeds 100",
                traffic_percent
            )));
        }

        let url = format!("{}:deployModel", self.resource_url(endpoint));

        // "0" addresses the model being deployed by this request
        let mut traffic_split = HashMap::new();
        traffic_split.insert("0".to_string(), traffic_percent);

        let request = DeployModelRequest {
            deployed_model: DeployedModel {
                id: String::new(),
                model: model.to_string(),
                display_name: Some(display_name.to_string()),
                dedicated_resources: Some(DedicatedResources {
                    machine_spec: MachineSpec {
                        machine_type: machine_type.to_string(),
                    },
                    min_replica_count: 1,
                    max_replica_count: 1,
                }),
            },
            traffic_split,
        };

        debug!("Deploying {} to {}", model, endpoint);
        let response = self.client.post(&url).json(&request).send().await?;

        let operation: Operation = handle_response(response).await?;
        let operation = self.wait_operation(operation).await?;
        let deployed: DeployModelResponse = self.operation_response(&operation)?;
        Ok(deployed.deployed_model)
    }

    /// Remove a deployed model from an endpoint
    ///
    /// # Arguments
    /// * `endpoint` - Full resource name of the endpoint
    /// * `deployed_model_id` - Deployed model to remove
    /// * `traffic_split` - Split of the models that stay; empty when none stay
    pub async fn undeploy_model(
        &self,
        endpoint: &str,
        deployed_model_id: &str,
        traffic_split: HashMap<String, u32>,
    ) -> Result<()> {
        if traffic_split.contains_key(deployed_model_id) {
            return Err(ClientError::InvalidRequest(format!(
                "traffic split still routes to {}",
                deployed_model_id
            )));
        }

        let url = format!("{}:undeployModel", self.resource_url(endpoint));
        debug!("Undeploying {} from {} ({:?})", deployed_model_id, endpoint, traffic_split);
        let response = self
            .client
            .post(&url)
            .json(&UndeployModelRequest {
                deployed_model_id: deployed_model_id.to_string(),
                traffic_split,
            })
            .send()
            .await?;

        let operation: Operation = handle_response(response).await?;
        self.wait_operation(operation).await?;
        Ok(())
    }

    // =============================================================================
    // Prediction
    // =============================================================================

    /// Send prediction instances to an endpoint
    pub async fn predict(
        &self,
        endpoint: &str,
        instances: Vec<serde_json::Value>,
    ) -> Result<PredictResponse> {
        let url = format!("{}:predict", self.resource_url(endpoint));
        let response = self
            .client
            .post(&url)
            .json(&PredictRequest { instances })
            .send()
            .await?;

        handle_response(response).await
    }
}
