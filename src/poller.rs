//! Cooperative status polling
//!
//! Drives [`JobController::check_status`] on a timer. Checks run one after
//! another, so the controller sees the same states as with manual checks.

use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{info, warn};

use crate::config::PollingConfig;
use crate::controller::JobController;
use crate::error::{CallError, ClientError, PreconditionError, Result};
use crate::job::{Job, LifecycleState};

/// Where polling stopped
#[derive(Debug, Clone)]
pub struct PollOutcome {
    pub job: Job,
    pub state: LifecycleState,
    pub attempts: u32,
}

impl PollOutcome {
    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }
}

#[derive(Debug, Clone)]
pub struct StatusPoller {
    interval: Duration,
    max_attempts: u32,
    max_consecutive_failures: u32,
}

impl StatusPoller {
    pub fn new(config: &PollingConfig) -> Self {
        Self {
            interval: config.interval(),
            max_attempts: config.max_attempts,
            max_consecutive_failures: config.max_consecutive_failures.max(1),
        }
    }

    /// Poll until the job is terminal or a limit is reached. `on_update` sees
    /// every job snapshot after a successful check.
    pub async fn run<F>(&self, controller: &mut JobController, task_id: &str, mut on_update: F) -> Result<PollOutcome>
    where
        F: FnMut(&Job, LifecycleState),
    {
        let mut ticker = interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut attempts = 0u32;
        let mut failures = 0u32;

        loop {
            ticker.tick().await;
            attempts += 1;

            match controller.check_status(task_id).await {
                // the service answered, but not with a status we understand
                Ok(job) if job.is_stale() => {
                    failures += 1;
                    let reason = job
                        .last_check_error
                        .clone()
                        .unwrap_or_else(|| "status check did not produce a usable status".to_string());
                    warn!("Status check {} unusable ({}/{}): {}", attempts, failures, self.max_consecutive_failures, reason);
                    if failures >= self.max_consecutive_failures {
                        return Err(ClientError::StatusCheckFailed(CallError::Decode(reason)));
                    }
                }
                Ok(job) => {
                    failures = 0;
                    on_update(&job, controller.state());
                    if controller.state().is_terminal() {
                        info!("Polling finished after {} checks: {}", attempts, controller.state());
                        return Ok(PollOutcome {
                            job,
                            state: controller.state(),
                            attempts,
                        });
                    }
                }
                Err(e) if e.call_error().is_some() => {
                    failures += 1;
                    warn!("Status check {} failed ({}/{}): {}", attempts, failures, self.max_consecutive_failures, e);
                    if failures >= self.max_consecutive_failures {
                        return Err(e);
                    }
                }
                Err(e) => return Err(e),
            }

            if self.max_attempts > 0 && attempts >= self.max_attempts {
                let job = controller
                    .job()
                    .cloned()
                    .ok_or(PreconditionError::NoActiveJob)?;
                info!("Polling stopped after {} checks without a terminal status", attempts);
                return Ok(PollOutcome {
                    job,
                    state: controller.state(),
                    attempts,
                });
            }
        }
    }
}
