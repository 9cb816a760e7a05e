//! Completion poller
//!
//! Waits for a submitted job to reach a terminal state by repeatedly reading
//! its scheduler conditions. How long to keep trying is decided by the
//! injected [`PollPolicy`].

use gridsweep_core::domain::job::{ConditionStatus, ConditionType};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::config::PollPolicy;
use crate::repository::JobScheduler;

/// Poller view of a job
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollState {
    /// Nothing observed yet
    Unknown,
    Pending,
    Running,
    Completed,
    Failed,
}

/// How polling a job ended
#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome {
    Completed { attempts: u32 },
    Failed { attempts: u32 },
    /// The policy ran out before a terminal state was observed
    TimedOut {
        last_state: PollState,
        attempts: u32,
        elapsed: Duration,
    },
}

impl PollOutcome {
    pub fn attempts(&self) -> u32 {
        match self {
            Self::Completed { attempts }
            | Self::Failed { attempts }
            | Self::TimedOut { attempts, .. } => *attempts,
        }
    }
}

pub struct CompletionPoller {
    scheduler: Arc<dyn JobScheduler>,
    policy: PollPolicy,
}

impl CompletionPoller {
    pub fn new(scheduler: Arc<dyn JobScheduler>, policy: PollPolicy) -> Self {
        Self { scheduler, policy }
    }

    /// Polls a job until it is Completed or Failed, or the policy gives up
    ///
    /// Query errors are logged and count as an attempt; they never end the
    /// poll on their own.
    pub async fn wait(&self, job_id: &str) -> PollOutcome {
        let started = Instant::now();
        let mut state = PollState::Unknown;
        let mut attempts: u32 = 0;
        let mut delay = self.policy.interval;

        loop {
            attempts += 1;

            match self.observe(job_id).await {
                Ok(observed) => {
                    if observed != state {
                        debug!("Job {} is {:?} (was {:?})", job_id, observed, state);
                        state = observed;
                    }
                }
                Err(e) => {
                    warn!(
                        "Failed to query job {} (attempt {}): {:#}",
                        job_id, attempts, e
                    );
                }
            }

            match state {
                PollState::Completed => {
                    info!("Job {} completed successfully.", job_id);
                    return PollOutcome::Completed { attempts };
                }
                PollState::Failed => {
                    warn!("Job {} failed.", job_id);
                    return PollOutcome::Failed { attempts };
                }
                _ => {}
            }

            let elapsed = started.elapsed();
            let out_of_attempts = self.policy.max_attempts.is_some_and(|max| attempts >= max);
            let out_of_time = self.policy.max_duration.is_some_and(|max| elapsed >= max);

            if out_of_attempts || out_of_time {
                warn!(
                    "Giving up on job {} after {} attempt(s) over {:?} (last state {:?})",
                    job_id, attempts, elapsed, state
                );
                return PollOutcome::TimedOut {
                    last_state: state,
                    attempts,
                    elapsed,
                };
            }

            debug!("Job {} is still {:?}, checking again in {:?}", job_id, state, delay);

            // Never sleep past the deadline
            let sleep_for = match self.policy.max_duration {
                Some(max) => delay.min(max.saturating_sub(elapsed)),
                None => delay,
            };
            tokio::time::sleep(sleep_for).await;
            delay = self.policy.next_interval(delay);
        }
    }

    /// Reads the conditions of a job once and derives its state
    async fn observe(&self, job_id: &str) -> anyhow::Result<PollState> {
        match self
            .scheduler
            .condition(job_id, ConditionType::Complete)
            .await?
        {
            ConditionStatus::True => return Ok(PollState::Completed),
            ConditionStatus::False => return Ok(PollState::Failed),
            ConditionStatus::Unknown => {}
        }

        if self
            .scheduler
            .condition(job_id, ConditionType::Failed)
            .await?
            == ConditionStatus::True
        {
            return Ok(PollState::Failed);
        }

        let started = self
            .scheduler
            .condition(job_id, ConditionType::Started)
            .await?;

        Ok(if started == ConditionStatus::True {
            PollState::Running
        } else {
            PollState::Pending
        })
    }
}
