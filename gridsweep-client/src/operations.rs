//! Long-running operation handling

use crate::error::{ClientError, Result};
use crate::{ServingClient, handle_response};
use gridsweep_core::dto::serving::Operation;
use serde::de::DeserializeOwned;
use tracing::debug;

impl ServingClient {
    /// Wait until an operation reports `done`
    ///
    /// Returns the finished operation, or an error if it finished with an
    /// error or did not finish within the configured number of checks.
    pub async fn wait_operation(&self, mut operation: Operation) -> Result<Operation> {
        let mut polls = 0;

        while !operation.done {
            if polls >= self.operation_max_polls {
                return Err(ClientError::OperationTimeout(operation.name));
            }
            polls += 1;

            tokio::time::sleep(self.operation_poll_interval).await;

            debug!("Checking operation {} (check {})", operation.name, polls);
            let url = self.resource_url(&operation.name);
            let response = self.client.get(&url).send().await?;
            operation = handle_response(response).await?;
        }

        if let Some(error) = &operation.error {
            return Err(ClientError::OperationFailed {
                name: operation.name.clone(),
                message: error.message.clone(),
            });
        }

        Ok(operation)
    }

    /// Decode the response payload of a finished operation
    pub(crate) fn operation_response<T: DeserializeOwned>(&self, operation: &Operation) -> Result<T> {
        let payload = operation.response.clone().ok_or_else(|| {
            ClientError::ParseError(format!("Operation {} has no response", operation.name))
        })?;

        serde_json::from_value(payload).map_err(|e| {
            ClientError::ParseError(format!(
                "Failed to parse response of operation {}: {}",
                operation.name, e
            ))
        })
    }
}
