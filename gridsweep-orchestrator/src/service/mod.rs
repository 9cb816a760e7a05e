//! Service layer
//!
//! Services hold the sweep logic. They use the repositories to talk to the
//! outside world and implement the individual sweep stages:
//! descriptor building, submission, completion polling, metric extraction,
//! best-result selection and deployment.

mod aggregator;
mod builder;
mod deployment;
mod extractor;
mod poller;
mod submitter;

pub use aggregator::SweepAggregator;
pub use builder::{JobDescriptorBuilder, ManifestTemplate};
pub use deployment::{DeployError, DeploymentReport, DeploymentTrigger, SmokeTestOutcome};
pub use extractor::{MetricsExtractor, parse_metrics};
pub use poller::{CompletionPoller, PollOutcome, PollState};
pub use submitter::JobSubmitter;
