//! Agent job queue storage.
//!
//! Claiming is a guarded `UPDATE ... WHERE status = 'queued'` inside a
//! transaction. That is enough for the single poller this store is built
//! for; several concurrent pollers against one database are not supported.

use crate::error::{DbError, Result};
use crate::types::*;
use crate::{decode, json, FilmDb};
use serde::Serialize;
use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Row, Sqlite};
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Outcome of moving a job to a terminal state.
#[derive(Debug, Clone)]
pub enum TerminalTransition {
    /// The job was `processing` and is now terminal.
    Applied(Job),
    /// The job was already terminal; nothing changed.
    AlreadyTerminal(Job),
}

impl TerminalTransition {
    pub fn job(&self) -> &Job {
        match self {
            Self::Applied(job) | Self::AlreadyTerminal(job) => job,
        }
    }

    pub fn into_job(self) -> Job {
        match self {
            Self::Applied(job) | Self::AlreadyTerminal(job) => job,
        }
    }

    pub fn was_applied(&self) -> bool {
        matches!(self, Self::Applied(_))
    }
}

/// Job counts per status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct QueueStats {
    pub total: i64,
    pub queued: i64,
    pub processing: i64,
    pub completed: i64,
    pub failed: i64,
}

const JOB_COLUMNS: &str = "id, project_id, kind, status, input_params_json, output_data_json, \
     error_message, created_at, started_at, completed_at";

impl FilmDb {
    // ========================================================================
    // Producer side
    // ========================================================================

    /// Insert a new `queued` job.
    pub async fn jobs_insert(
        &self,
        project_id: &ProjectId,
        kind: &str,
        input_params: &BTreeMap<String, String>,
    ) -> Result<Job> {
        let id = JobId::new();
        let now = Self::now_millis();

        sqlx::query(
            r#"
            INSERT INTO agent_jobs
                (id, project_id, kind, status, input_params_json, output_data_json, created_at)
            VALUES (?, ?, ?, 'queued', ?, '{}', ?)
            "#,
        )
        .bind(id.as_str())
        .bind(project_id.as_str())
        .bind(kind)
        .bind(json::encode(input_params)?)
        .bind(now)
        .execute(&self.pool)
        .await?;

        debug!(job_id = %id, kind, project_id = %project_id, "Job inserted");

        self.jobs_get(&id)
            .await?
            .ok_or_else(|| DbError::not_found("Job not found after creation"))
    }

    // ========================================================================
    // Consumer side
    // ========================================================================

    /// Claim the oldest queued job and mark it `processing`.
    ///
    /// Oldest means smallest `created_at`, ties broken by insertion order.
    /// Returns `None` when the queue is empty.
    pub async fn jobs_claim_next(&self) -> Result<Option<Job>> {
        let mut tx = self.pool.begin().await?;

        let job_id: Option<String> = sqlx::query_scalar(
            r#"
            SELECT id FROM agent_jobs
            WHERE status = 'queued'
            ORDER BY created_at ASC, seq ASC
            LIMIT 1
            "#,
        )
        .fetch_optional(&mut *tx)
        .await?;

        let Some(job_id) = job_id else {
            tx.commit().await?;
            return Ok(None);
        };

        let now = Self::now_millis();
        let rows_affected = sqlx::query(
            r#"
            UPDATE agent_jobs
            SET status = 'processing',
                started_at = ?
            WHERE id = ? AND status = 'queued'
            "#,
        )
        .bind(now)
        .bind(&job_id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if rows_affected == 0 {
            // Claimed elsewhere between SELECT and UPDATE
            tx.commit().await?;
            return Ok(None);
        }

        let row = sqlx::query(&format!("SELECT {JOB_COLUMNS} FROM agent_jobs WHERE id = ?"))
            .bind(&job_id)
            .fetch_one(&mut *tx)
            .await?;
        let job = row_to_job(&row)?;

        tx.commit().await?;
        info!(job_id = %job.id, kind = %job.kind, project_id = %job.project_id, "Claimed job");

        Ok(Some(job))
    }

    /// Move a `processing` job to `completed` or `failed`.
    ///
    /// Terminal jobs are left untouched and reported as
    /// [`TerminalTransition::AlreadyTerminal`]. A `queued` job cannot be
    /// finished without being claimed first.
    pub async fn jobs_finish(
        &self,
        id: &JobId,
        status: JobStatus,
        output: Option<&serde_json::Value>,
        error_message: Option<&str>,
    ) -> Result<TerminalTransition> {
        if !status.is_terminal() {
            return Err(DbError::invalid_state(format!(
                "'{}' is not a terminal job status",
                status
            )));
        }

        let mut tx = self.pool.begin().await?;

        let row = sqlx::query(&format!("SELECT {JOB_COLUMNS} FROM agent_jobs WHERE id = ?"))
            .bind(id.as_str())
            .fetch_optional(&mut *tx)
            .await?;
        let Some(row) = row else {
            tx.commit().await?;
            return Err(DbError::not_found(format!("Job {}", id)));
        };
        let current = row_to_job(&row)?;

        match current.status {
            JobStatus::Completed | JobStatus::Failed => {
                tx.commit().await?;
                debug!(job_id = %id, status = %current.status, "Job already terminal");
                return Ok(TerminalTransition::AlreadyTerminal(current));
            }
            JobStatus::Queued => {
                tx.commit().await?;
                return Err(DbError::invalid_state(format!(
                    "Job {} is queued and must be claimed before it can be {}",
                    id, status
                )));
            }
            JobStatus::Processing => {}
        }

        let output_json = match output {
            Some(value) => json::encode(value)?,
            None => "{}".to_string(),
        };

        let now = Self::now_millis();
        sqlx::query(
            r#"
            UPDATE agent_jobs
            SET status = ?,
                output_data_json = ?,
                error_message = ?,
                completed_at = ?
            WHERE id = ? AND status = 'processing'
            "#,
        )
        .bind(status.as_str())
        .bind(output_json)
        .bind(error_message)
        .bind(now)
        .bind(id.as_str())
        .execute(&mut *tx)
        .await?;

        let row = sqlx::query(&format!("SELECT {JOB_COLUMNS} FROM agent_jobs WHERE id = ?"))
            .bind(id.as_str())
            .fetch_one(&mut *tx)
            .await?;
        let job = row_to_job(&row)?;

        tx.commit().await?;

        match status {
            JobStatus::Failed => info!(
                job_id = %id,
                error = error_message.unwrap_or_default(),
                "Job failed"
            ),
            _ => info!(job_id = %id, "Job completed"),
        }

        Ok(TerminalTransition::Applied(job))
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// Get a job by ID
    pub async fn jobs_get(&self, id: &JobId) -> Result<Option<Job>> {
        let row = sqlx::query(&format!("SELECT {JOB_COLUMNS} FROM agent_jobs WHERE id = ?"))
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(row_to_job).transpose()
    }

    /// List jobs, newest first.
    pub async fn jobs_list(&self, filter: &JobFilter) -> Result<Vec<Job>> {
        let mut qb: QueryBuilder<Sqlite> =
            QueryBuilder::new(format!("SELECT {JOB_COLUMNS} FROM agent_jobs WHERE 1 = 1"));

        if let Some(status) = filter.status {
            qb.push(" AND status = ").push_bind(status.as_str());
        }
        if let Some(project_id) = &filter.project_id {
            qb.push(" AND project_id = ")
                .push_bind(project_id.as_str().to_string());
        }
        if let Some(kind) = &filter.kind {
            qb.push(" AND kind = ").push_bind(kind.clone());
        }
        qb.push(" ORDER BY created_at DESC, seq DESC");
        if let Some(limit) = filter.limit {
            qb.push(" LIMIT ").push_bind(limit as i64);
        }

        let rows = qb.build().fetch_all(&self.pool).await?;
        rows.iter().map(row_to_job).collect()
    }

    /// Count jobs per status.
    pub async fn jobs_stats(&self) -> Result<QueueStats> {
        let rows = sqlx::query("SELECT status, COUNT(*) AS n FROM agent_jobs GROUP BY status")
            .fetch_all(&self.pool)
            .await?;

        let mut stats = QueueStats::default();
        for row in rows {
            let status: String = row.get("status");
            let n: i64 = row.get("n");
            stats.total += n;
            match JobStatus::parse(&status) {
                Some(JobStatus::Queued) => stats.queued = n,
                Some(JobStatus::Processing) => stats.processing = n,
                Some(JobStatus::Completed) => stats.completed = n,
                Some(JobStatus::Failed) => stats.failed = n,
                None => {}
            }
        }
        Ok(stats)
    }
}

fn row_to_job(row: &SqliteRow) -> Result<Job> {
    let id: String = row.get("id");
    let project_id: String = row.get("project_id");
    let status: String = row.get("status");

    Ok(Job {
        id: decode::parse(&id, "agent_jobs.id")?,
        project_id: decode::parse(&project_id, "agent_jobs.project_id")?,
        kind: row.get("kind"),
        status: decode::parse(&status, "agent_jobs.status")?,
        input_params: json::decode(row.get("input_params_json"))?,
        output_data: json::decode(row.get("output_data_json"))?,
        error_message: row.get("error_message"),
        created_at: row.get("created_at"),
        started_at: row.get("started_at"),
        completed_at: row.get("completed_at"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn db_with_project() -> (FilmDb, ProjectId) {
        let db = FilmDb::open_in_memory().await.unwrap();
        let project = Project::new("Night Shift", ProjectType::Short, "drama");
        db.projects_insert(&project).await.unwrap();
        (db, project.id)
    }

    #[tokio::test]
    async fn test_claim_is_fifo_with_insertion_tiebreak() {
        let (db, project_id) = db_with_project().await;
        let params = BTreeMap::new();

        let first = db.jobs_insert(&project_id, "budget_generation", &params).await.unwrap();
        let second = db.jobs_insert(&project_id, "schedule_generation", &params).await.unwrap();
        let third = db.jobs_insert(&project_id, "grant_match", &params).await.unwrap();

        // Force identical timestamps; only seq can order them now.
        sqlx::query("UPDATE agent_jobs SET created_at = 1000")
            .execute(db.pool())
            .await
            .unwrap();

        let claimed: Vec<JobId> = vec![
            db.jobs_claim_next().await.unwrap().unwrap().id,
            db.jobs_claim_next().await.unwrap().unwrap().id,
            db.jobs_claim_next().await.unwrap().unwrap().id,
        ];
        assert_eq!(claimed, vec![first.id, second.id, third.id]);
        assert!(db.jobs_claim_next().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_claim_prefers_earlier_created_at() {
        let (db, project_id) = db_with_project().await;
        let params = BTreeMap::new();

        let newer = db.jobs_insert(&project_id, "grant_scrape", &params).await.unwrap();
        let older = db.jobs_insert(&project_id, "festival_scrape", &params).await.unwrap();
        sqlx::query("UPDATE agent_jobs SET created_at = 5 WHERE id = ?")
            .bind(older.id.as_str())
            .execute(db.pool())
            .await
            .unwrap();

        let claimed = db.jobs_claim_next().await.unwrap().unwrap();
        assert_eq!(claimed.id, older.id);
        assert_eq!(claimed.status, JobStatus::Processing);
        assert!(claimed.started_at.is_some());

        let next = db.jobs_claim_next().await.unwrap().unwrap();
        assert_eq!(next.id, newer.id);
    }

    #[tokio::test]
    async fn test_empty_queue_never_errors() {
        let db = FilmDb::open_in_memory().await.unwrap();
        for _ in 0..5 {
            assert!(db.jobs_claim_next().await.unwrap().is_none());
        }
    }

    #[tokio::test]
    async fn test_finish_requires_processing() {
        let (db, project_id) = db_with_project().await;
        let job = db
            .jobs_insert(&project_id, "budget_generation", &BTreeMap::new())
            .await
            .unwrap();

        let err = db
            .jobs_finish(&job.id, JobStatus::Completed, None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::InvalidState(_)));

        let still = db.jobs_get(&job.id).await.unwrap().unwrap();
        assert_eq!(still.status, JobStatus::Queued);
        assert!(still.completed_at.is_none());
    }

    #[tokio::test]
    async fn test_finish_is_idempotent() {
        let (db, project_id) = db_with_project().await;
        db.jobs_insert(&project_id, "budget_generation", &BTreeMap::new())
            .await
            .unwrap();
        let job = db.jobs_claim_next().await.unwrap().unwrap();

        let output = serde_json::json!({"total_budget": 1200.0});
        let first = db
            .jobs_finish(&job.id, JobStatus::Completed, Some(&output), None)
            .await
            .unwrap();
        assert!(first.was_applied());
        assert_eq!(first.job().status, JobStatus::Completed);
        assert_eq!(first.job().output_data, output);
        let completed_at = first.job().completed_at;
        assert!(completed_at.is_some());

        let second = db
            .jobs_finish(&job.id, JobStatus::Failed, None, Some("late failure"))
            .await
            .unwrap();
        assert!(!second.was_applied());
        assert_eq!(second.job().status, JobStatus::Completed);
        assert_eq!(second.job().completed_at, completed_at);
        assert!(second.job().error_message.is_none());
    }

    #[tokio::test]
    async fn test_finish_unknown_job() {
        let db = FilmDb::open_in_memory().await.unwrap();
        let err = db
            .jobs_finish(&JobId::new(), JobStatus::Failed, None, Some("boom"))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_list_and_stats() {
        let (db, project_id) = db_with_project().await;
        let mut params = BTreeMap::new();
        params.insert("source".to_string(), "cli".to_string());

        for kind in ["grant_scrape", "grant_match", "festival_scrape"] {
            db.jobs_insert(&project_id, kind, &params).await.unwrap();
        }
        let claimed = db.jobs_claim_next().await.unwrap().unwrap();
        db.jobs_finish(&claimed.id, JobStatus::Failed, None, Some("boom"))
            .await
            .unwrap();

        let stats = db.jobs_stats().await.unwrap();
        assert_eq!(
            stats,
            QueueStats {
                total: 3,
                queued: 2,
                processing: 0,
                completed: 0,
                failed: 1,
            }
        );

        let failed = db
            .jobs_list(&JobFilter {
                status: Some(JobStatus::Failed),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].error_message.as_deref(), Some("boom"));
        assert_eq!(failed[0].input_params.get("source").map(String::as_str), Some("cli"));

        let limited = db
            .jobs_list(&JobFilter {
                limit: Some(2),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(limited.len(), 2);
    }

    #[tokio::test]
    async fn test_raw_kind_is_preserved() {
        let (db, project_id) = db_with_project().await;
        let job = db.jobs_insert(&project_id, "xyz", &BTreeMap::new()).await.unwrap();
        assert_eq!(job.kind, "xyz");
    }
}
