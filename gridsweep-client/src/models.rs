//! Model registry API calls

use crate::error::Result;
use crate::{ServingClient, handle_response};
use gridsweep_core::dto::serving::{
    Model, ModelContainerSpec, Operation, UploadModelRequest, UploadModelResponse,
};

impl ServingClient {
    /// Register a model artifact with a serving container
    ///
    /// # Arguments
    /// * `display_name` - Display name of the model
    /// * `artifact_uri` - Storage folder holding the model artifact
    /// * `serving_image` - Container image that serves the artifact
    ///
    /// # Returns
    /// The full resource name of the registered model
    pub async fn upload_model(
        &self,
        display_name: &str,
        artifact_uri: &str,
        serving_image: &str,
    ) -> Result<String> {
        let url = self.collection_url("models:upload");
        let request = UploadModelRequest {
            model: Model {
                display_name: display_name.to_string(),
                artifact_uri: artifact_uri.to_string(),
                container_spec: ModelContainerSpec {
                    image_uri: serving_image.to_string(),
                },
            },
        };

        let response = self.client.post(&url).json(&request).send().await?;

        let operation: Operation = handle_response(response).await?;
        let operation = self.wait_operation(operation).await?;
        let uploaded: UploadModelResponse = self.operation_response(&operation)?;
        Ok(uploaded.model)
    }
}
