//! Single-consumer job loop.
//!
//! Claims the oldest queued job, dispatches it and records the outcome. When
//! the queue is empty the loop sleeps; a [`ShutdownToken`] ends it between
//! jobs. Exactly one poller per database is supported.

use crate::dispatch::{JobDispatcher, Outcome};
use crate::error::Result;
use crate::queue::JobQueue;
use crate::shutdown::ShutdownToken;
use filmdesk_db::{Job, JobStatus, TerminalTransition};
use std::time::Duration;
use tracing::{error, info, warn};

pub const DEFAULT_SLEEP: Duration = Duration::from_secs(5);

/// How the loop runs.
#[derive(Debug, Clone, Copy)]
pub struct PollerConfig {
    /// Process at most one job, then return.
    pub once: bool,
    /// Idle sleep between empty polls.
    pub sleep: Duration,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            once: false,
            sleep: DEFAULT_SLEEP,
        }
    }
}

/// Totals for one run of the loop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PollerStats {
    pub completed: u64,
    pub failed: u64,
}

pub struct Poller {
    queue: JobQueue,
    dispatcher: JobDispatcher,
    config: PollerConfig,
}

impl Poller {
    pub fn new(queue: JobQueue, dispatcher: JobDispatcher, config: PollerConfig) -> Self {
        Self {
            queue,
            dispatcher,
            config,
        }
    }

    /// Claim and run one job. `None` when the queue was empty.
    ///
    /// The claimed job always ends terminal, whatever the handler did.
    pub async fn process_next(&self) -> Result<Option<Job>> {
        let Some(job) = self.queue.claim_next().await? else {
            return Ok(None);
        };

        let transition = match self.dispatcher.dispatch(&job).await {
            Outcome::Success(output) => match self.queue.complete(&job.id, &output).await {
                Ok(transition) => transition,
                Err(e) => {
                    warn!(
                        job_id = %job.id,
                        error = %e,
                        "Failed to record job output; marking it failed"
                    );
                    let message = format!("Failed to record job result: {}", e);
                    self.fail_or_strand(&job, &message).await?
                }
            },
            Outcome::Failure(message) => self.fail_or_strand(&job, &message).await?,
        };

        let finished = transition.into_job();
        match finished.status {
            JobStatus::Completed => {
                info!(job_id = %finished.id, kind = %finished.kind, "Job completed")
            }
            _ => warn!(
                job_id = %finished.id,
                kind = %finished.kind,
                error = finished.error_message.as_deref().unwrap_or_default(),
                "Job failed"
            ),
        }
        Ok(Some(finished))
    }

    /// Last attempt at a terminal state. A job that cannot even be failed
    /// stays `processing`; nothing re-claims it.
    async fn fail_or_strand(&self, job: &Job, message: &str) -> Result<TerminalTransition> {
        self.queue.fail(&job.id, message).await.map_err(|e| {
            error!(
                job_id = %job.id,
                kind = %job.kind,
                error = %e,
                "Job left in processing; finalize it by hand"
            );
            e
        })
    }

    /// Run until shutdown (or after one job with `once`).
    ///
    /// Store errors while polling are logged and retried after the idle
    /// sleep rather than ending the loop.
    pub async fn run(&self, shutdown: ShutdownToken) -> PollerStats {
        let mut stats = PollerStats::default();
        info!(
            once = self.config.once,
            sleep_secs = self.config.sleep.as_secs(),
            "Agent poller started"
        );

        loop {
            if shutdown.is_requested() {
                info!("Shutdown requested");
                break;
            }

            let idle = match self.process_next().await {
                Ok(Some(job)) => {
                    if job.status == JobStatus::Completed {
                        stats.completed += 1;
                    } else {
                        stats.failed += 1;
                    }
                    false
                }
                Ok(None) => true,
                Err(e) => {
                    error!(error = %e, "Polling failed");
                    true
                }
            };

            if self.config.once {
                break;
            }

            if idle {
                tokio::select! {
                    biased;
                    _ = shutdown.requested() => {
                        info!("Shutdown requested");
                        break;
                    }
                    _ = tokio::time::sleep(self.config.sleep) => {}
                }
            }
        }

        info!(completed = stats.completed, failed = stats.failed, "Agent poller stopped");
        stats
    }
}
