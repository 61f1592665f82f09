//! FIFO agent job queue.
//!
//! A thin validating layer over the `agent_jobs` table. Designed for exactly
//! one consumer: the claim is guarded against double-claiming within a
//! transaction, but several pollers sharing a database are unsupported.

use crate::error::{AgentError, Result};
use filmdesk_db::{
    FilmDb, Job, JobFilter, JobId, JobStatus, ProjectId, QueueStats, TerminalTransition,
};
use std::collections::BTreeMap;
use tracing::{info, warn};

#[derive(Debug, Clone)]
pub struct JobQueue {
    db: FilmDb,
}

impl JobQueue {
    pub fn new(db: FilmDb) -> Self {
        Self { db }
    }

    /// Enqueue a job for a project.
    ///
    /// The kind is stored verbatim; unregistered kinds are accepted here and
    /// rejected at dispatch so they remain visible in the job history.
    pub async fn enqueue(
        &self,
        kind: &str,
        project_id: &ProjectId,
        params: BTreeMap<String, String>,
    ) -> Result<Job> {
        let kind = kind.trim();
        if kind.is_empty() {
            return Err(AgentError::validation("Job kind must not be empty"));
        }
        if self.db.projects_get(project_id).await?.is_none() {
            return Err(AgentError::NotFound(format!("Project {}", project_id)));
        }

        let job = self.db.jobs_insert(project_id, kind, &params).await?;
        info!(job_id = %job.id, kind, project_id = %project_id, "Job enqueued");
        Ok(job)
    }

    /// Claim the oldest queued job, if any.
    pub async fn claim_next(&self) -> Result<Option<Job>> {
        Ok(self.db.jobs_claim_next().await?)
    }

    /// Mark a claimed job completed with its output.
    pub async fn complete(
        &self,
        job: &JobId,
        output: &serde_json::Value,
    ) -> Result<TerminalTransition> {
        let transition = self
            .db
            .jobs_finish(job, JobStatus::Completed, Some(output), None)
            .await?;
        log_if_noop(&transition);
        Ok(transition)
    }

    /// Mark a claimed job failed.
    pub async fn fail(&self, job: &JobId, error: &str) -> Result<TerminalTransition> {
        let transition = self
            .db
            .jobs_finish(job, JobStatus::Failed, None, Some(error))
            .await?;
        log_if_noop(&transition);
        Ok(transition)
    }

    pub async fn get(&self, id: &JobId) -> Result<Job> {
        self.db
            .jobs_get(id)
            .await?
            .ok_or_else(|| AgentError::NotFound(format!("Job {}", id)))
    }

    pub async fn list(&self, filter: &JobFilter) -> Result<Vec<Job>> {
        Ok(self.db.jobs_list(filter).await?)
    }

    pub async fn stats(&self) -> Result<QueueStats> {
        Ok(self.db.jobs_stats().await?)
    }
}

fn log_if_noop(transition: &TerminalTransition) {
    if let TerminalTransition::AlreadyTerminal(job) = transition {
        warn!(job_id = %job.id, status = %job.status, "Job already terminal; left unchanged");
    }
}
