//! Model serving REST DTOs
//!
//! Request and response bodies of the Vertex AI v1 REST surface used to
//! publish a trained model behind an endpoint.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// An endpoint resource
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Endpoint {
    /// Full resource name, `projects/{p}/locations/{l}/endpoints/{id}`
    #[serde(default)]
    pub name: String,
    pub display_name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub deployed_models: Vec<DeployedModel>,
    /// Deployed model id to percentage of traffic
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub traffic_split: HashMap<String, u32>,
}

/// A model deployed on an endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeployedModel {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    /// Resource name of the underlying model
    pub model: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dedicated_resources: Option<DedicatedResources>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DedicatedResources {
    pub machine_spec: MachineSpec,
    pub min_replica_count: u32,
    pub max_replica_count: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MachineSpec {
    pub machine_type: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListEndpointsResponse {
    #[serde(default)]
    pub endpoints: Vec<Endpoint>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateEndpointRequest {
    pub display_name: String,
}

/// Model registration payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Model {
    pub display_name: String,
    pub artifact_uri: String,
    pub container_spec: ModelContainerSpec,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelContainerSpec {
    pub image_uri: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadModelRequest {
    pub model: Model,
}

/// Operation response of `models:upload`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadModelResponse {
    /// Resource name of the registered model
    pub model: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeployModelRequest {
    pub deployed_model: DeployedModel,
    /// Deployed model id (`"0"` for the model being deployed) to percentage
    pub traffic_split: HashMap<String, u32>,
}

/// Operation response of `:deployModel`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeployModelResponse {
    pub deployed_model: DeployedModel,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UndeployModelRequest {
    pub deployed_model_id: String,
    /// Split of the models left behind; must not mention the removed model
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub traffic_split: HashMap<String, u32>,
}

/// Long-running operation envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Operation {
    pub name: String,
    #[serde(default)]
    pub done: bool,
    #[serde(default)]
    pub error: Option<OperationError>,
    #[serde(default)]
    pub response: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationError {
    #[serde(default)]
    pub code: i32,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictRequest {
    pub instances: Vec<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PredictResponse {
    #[serde(default)]
    pub predictions: Vec<serde_json::Value>,
    #[serde(default)]
    pub deployed_model_id: Option<String>,
}
