//! Gridsweep HTTP Client
//!
//! Type-safe HTTP clients for the two cloud collaborators of a sweep:
//! - [`ServingClient`]: the Vertex AI v1 REST surface (endpoints, model
//!   registration, deployment, prediction, long-running operations)
//! - [`StorageClient`]: the Cloud Storage JSON API (object download/upload)
//!
//! Credentials are not handled here. Pass a preconfigured `reqwest::Client`
//! (e.g. with default authorization headers) through `with_client`.
//!
//! # Example
//!
//! ```no_run
//! use gridsweep_client::ServingClient;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let client = ServingClient::new("my-project", "australia-southeast1");
//!
//!     if let Some(endpoint) = client.find_endpoint("endpoint-sweep-1").await? {
//!         println!("Found endpoint: {}", endpoint.name);
//!     }
//!     Ok(())
//! }
//! ```

pub mod error;
mod endpoints;
mod models;
mod operations;
mod storage;

// Re-export commonly used types
pub use error::{ClientError, Result};
pub use storage::{StorageClient, parse_gcs_uri};

use reqwest::Client;
use serde::de::DeserializeOwned;
use std::time::Duration;

/// HTTP client for the model serving REST API
///
/// Resource methods are grouped by concern:
/// - Endpoints (find, create, get, undeploy, deploy, predict)
/// - Models (upload/register)
/// - Operations (waiting on long-running operations)
#[derive(Debug, Clone)]
pub struct ServingClient {
    /// API root (e.g., "https://us-central1-aiplatform.googleapis.com/v1")
    base_url: String,
    /// Parent resource, `projects/{project}/locations/{region}`
    parent: String,
    /// How often to re-check a pending operation
    operation_poll_interval: Duration,
    /// Maximum number of operation checks before giving up
    operation_max_polls: u32,
    /// HTTP client instance
    client: Client,
}

impl ServingClient {
    /// Create a client for the regional Vertex AI endpoint of a project
    ///
    /// # Example
    /// ```
    /// use gridsweep_client::ServingClient;
    ///
    /// let client = ServingClient::new("my-project", "us-central1");
    /// assert_eq!(client.parent(), "projects/my-project/locations/us-central1");
    /// ```
    pub fn new(project_id: &str, region: &str) -> Self {
        Self::with_client(
            format!("https://{}-aiplatform.googleapis.com/v1", region),
            project_id,
            region,
            Client::new(),
        )
    }

    /// Create a client with a custom API root and HTTP client
    ///
    /// This allows you to configure timeouts, proxies, default headers, or to
    /// point at a local emulator.
    ///
    /// # Arguments
    /// * `base_url` - The API root (without the `projects/...` parent)
    /// * `project_id` - Cloud project that owns the resources
    /// * `region` - Location of the resources
    /// * `client` - A configured reqwest Client
    pub fn with_client(
        base_url: impl Into<String>,
        project_id: &str,
        region: &str,
        client: Client,
    ) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            parent: format!("projects/{}/locations/{}", project_id, region),
            operation_poll_interval: Duration::from_secs(5),
            operation_max_polls: 360,
            client,
        }
    }

    /// Override how long-running operations are awaited
    pub fn with_operation_polling(mut self, interval: Duration, max_polls: u32) -> Self {
        self.operation_poll_interval = interval;
        self.operation_max_polls = max_polls;
        self
    }

    /// Get the API root
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Get the parent resource name
    pub fn parent(&self) -> &str {
        &self.parent
    }

    /// URL of a resource given its full name
    fn resource_url(&self, name: &str) -> String {
        format!("{}/{}", self.base_url, name.trim_start_matches('/'))
    }

    /// URL of a collection under the parent
    fn collection_url(&self, collection: &str) -> String {
        format!("{}/{}/{}", self.base_url, self.parent, collection)
    }
}

// =============================================================================
// Response Handlers
// =============================================================================

/// Handle an API response and deserialize JSON
///
/// Checks the status code and returns an appropriate error if the request
/// failed, or deserializes the response body if successful.
pub(crate) async fn handle_response<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
    let response = check_status(response).await?;

    response
        .json()
        .await
        .map_err(|e| ClientError::ParseError(format!("Failed to parse JSON response: {}", e)))
}

/// Handle an API response whose body is raw bytes
pub(crate) async fn handle_bytes_response(response: reqwest::Response) -> Result<Vec<u8>> {
    let response = check_status(response).await?;
    let bytes = response.bytes().await?;
    Ok(bytes.to_vec())
}

/// Handle an API response that returns no useful content
pub(crate) async fn handle_empty_response(response: reqwest::Response) -> Result<()> {
    check_status(response).await?;
    Ok(())
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();

    if status == reqwest::StatusCode::NOT_FOUND {
        let url = response.url().to_string();
        return Err(ClientError::NotFound(url));
    }

    if !status.is_success() {
        let error_text = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        return Err(ClientError::api_error(status.as_u16(), error_text));
    }

    Ok(response)
}
