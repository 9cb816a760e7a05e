//! Job submitter
//!
//! Hands descriptors to the scheduler without waiting for them to run.

use gridsweep_core::domain::job::{JobDescriptor, JobHandle};
use std::sync::Arc;
use tracing::{info, warn};

use crate::repository::{JobScheduler, SubmissionError};

pub struct JobSubmitter {
    scheduler: Arc<dyn JobScheduler>,
}

impl JobSubmitter {
    pub fn new(scheduler: Arc<dyn JobScheduler>) -> Self {
        Self { scheduler }
    }

    /// Submits one descriptor
    ///
    /// A rejection is returned to the caller, who records the job as failed
    /// and carries on with the rest of the sweep.
    pub async fn submit(&self, descriptor: &JobDescriptor) -> Result<JobHandle, SubmissionError> {
        match self.scheduler.submit(descriptor).await {
            Ok(handle) => {
                info!(
                    "Submitted job {} ({})",
                    descriptor.job_id, descriptor.configuration
                );
                Ok(handle)
            }
            Err(e) => {
                warn!("Submission of job {} failed: {}", descriptor.job_id, e);
                Err(e)
            }
        }
    }
}
