//! Hyperparameter sweep engine
//!
//! Fans a hyperparameter grid out into training jobs on a cluster scheduler,
//! waits for them, picks the job with the lowest RMSE and deploys its model
//! to a serving endpoint.
//!
//! Layers:
//! - [`repository`]: traits and implementations for the scheduler, the
//!   artifact store and the serving platform
//! - [`service`]: the individual sweep stages
//! - [`SweepRunner`]: drives a whole sweep

pub mod config;
pub mod repository;
pub mod service;
mod sweep;

#[cfg(test)]
mod testing;

pub use config::{DeployConfig, PollPolicy, SweepConfig};
pub use sweep::SweepRunner;
