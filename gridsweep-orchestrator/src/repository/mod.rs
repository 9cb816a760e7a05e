//! Repository layer
//!
//! Repositories wrap the external collaborators of a sweep behind narrow,
//! trait-based interfaces without any sweep logic:
//! - [`JobScheduler`]: the cluster scheduler (submit, conditions, logs)
//! - [`ArtifactStore`]: durable blob storage for models and metrics
//! - [`ServingPlatform`]: the model serving platform
//!
//! All repositories are trait-based to enable testing and mocking.

mod artifacts;
mod scheduler;
mod serving;

// Re-export traits
pub use artifacts::ArtifactStore;
pub use scheduler::JobScheduler;
pub use serving::ServingPlatform;

// Re-export implementations
pub use artifacts::{GcsArtifactStore, LocalArtifactStore};
pub use scheduler::{KubectlScheduler, check_kubectl_available};
pub use serving::VertexServingPlatform;

// Re-export supporting types
pub use artifacts::StoreError;
pub use scheduler::SubmissionError;
pub use serving::{DeployedModelRef, EndpointRef, ModelRef};
