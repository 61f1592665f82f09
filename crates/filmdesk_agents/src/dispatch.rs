//! Routes claimed jobs to their handlers.
//!
//! Nothing a handler does escapes [`JobDispatcher::dispatch`]: errors and
//! panics both come back as [`Outcome::Failure`].

use crate::handlers::{self, HandlerContext};
use crate::kind::JobKind;
use async_trait::async_trait;
use filmdesk_db::{ActivityAction, ActivitySection, FilmDb, Job, ProjectId};
use serde_json::Value;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Result of running one job.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Success(Value),
    Failure(String),
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }
}

/// Receives an audit entry for every successful job.
#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn record(
        &self,
        project_id: &ProjectId,
        section: ActivitySection,
        description: &str,
    ) -> crate::error::Result<()>;
}

#[async_trait]
impl AuditSink for FilmDb {
    async fn record(
        &self,
        project_id: &ProjectId,
        section: ActivitySection,
        description: &str,
    ) -> crate::error::Result<()> {
        self.activity_append(project_id, ActivityAction::Generate, section, description)
            .await?;
        Ok(())
    }
}

#[derive(Clone)]
pub struct JobDispatcher {
    ctx: HandlerContext,
    audit: Arc<dyn AuditSink>,
}

impl JobDispatcher {
    /// Dispatcher that audits into the context's database.
    pub fn new(ctx: HandlerContext) -> Self {
        let audit: Arc<dyn AuditSink> = Arc::new(ctx.db.clone());
        Self { ctx, audit }
    }

    pub fn with_audit(mut self, audit: Arc<dyn AuditSink>) -> Self {
        self.audit = audit;
        self
    }

    pub async fn dispatch(&self, job: &Job) -> Outcome {
        let Some(kind) = JobKind::parse(&job.kind) else {
            warn!(job_id = %job.id, kind = %job.kind, "Unknown job kind");
            return Outcome::Failure(format!("Unknown agent type: {}", job.kind));
        };

        info!(job_id = %job.id, kind = %kind, project_id = %job.project_id, "Processing job");

        // Spawned only to contain panics; awaited immediately.
        let task = {
            let ctx = self.ctx.clone();
            let job = job.clone();
            tokio::spawn(async move { handlers::run(kind, &ctx, &job).await })
        };

        let output = match task.await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                error!(job_id = %job.id, kind = %kind, error = %e, "Job handler failed");
                return Outcome::Failure(format!("Processing error: {}", e));
            }
            Err(join_err) => {
                let detail = panic_message(join_err);
                error!(job_id = %job.id, kind = %kind, error = %detail, "Job handler panicked");
                return Outcome::Failure(format!("Processing error: {}", detail));
            }
        };

        let description = format!("Agent job {} completed", kind);
        if let Err(e) = self.audit.record(&job.project_id, kind.section(), &description).await {
            // The work is done; a missing audit line does not fail the job.
            warn!(job_id = %job.id, error = %e, "Failed to append activity record");
        }

        Outcome::Success(output)
    }
}

fn panic_message(err: tokio::task::JoinError) -> String {
    if !err.is_panic() {
        return err.to_string();
    }
    let payload = err.into_panic();
    if let Some(msg) = payload.downcast_ref::<&str>() {
        format!("handler panicked: {}", msg)
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        format!("handler panicked: {}", msg)
    } else {
        "handler panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use filmdesk_db::{Project, ProjectType};
    use std::collections::BTreeMap;

    async fn setup() -> (FilmDb, Project) {
        let db = FilmDb::open_in_memory().await.unwrap();
        let project = Project::new("Dispatch", ProjectType::Feature, "drama");
        db.projects_insert(&project).await.unwrap();
        (db, project)
    }

    #[tokio::test]
    async fn unknown_kind_fails_without_running_anything() {
        let (db, project) = setup().await;
        let job = db.jobs_insert(&project.id, "xyz", &BTreeMap::new()).await.unwrap();

        let dispatcher = JobDispatcher::new(HandlerContext::new(db.clone()));
        assert_eq!(
            dispatcher.dispatch(&job).await,
            Outcome::Failure("Unknown agent type: xyz".into())
        );
        assert!(db.activity_for_project(&project.id, 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn success_appends_an_audit_record() {
        let (db, project) = setup().await;
        let job = db
            .jobs_insert(&project.id, "budget", &BTreeMap::new())
            .await
            .unwrap();

        let dispatcher = JobDispatcher::new(HandlerContext::new(db.clone()));
        let outcome = dispatcher.dispatch(&job).await;
        let Outcome::Success(output) = outcome else {
            panic!("expected success, got {:?}", outcome);
        };
        assert_eq!(output["items_created"], 19);

        let log = db.activity_for_project(&project.id, 10).await.unwrap();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].action, ActivityAction::Generate);
        assert_eq!(log[0].section, ActivitySection::Budget);
        assert_eq!(log[0].description, "Agent job budget_generation completed");
    }

    #[tokio::test]
    async fn handler_errors_become_failures() {
        let (db, project) = setup().await;
        let mut params = BTreeMap::new();
        params.insert("contingency_percent".to_string(), "ten".to_string());
        let job = db
            .jobs_insert(&project.id, "budget_generation", &params)
            .await
            .unwrap();

        let outcome = JobDispatcher::new(HandlerContext::new(db)).dispatch(&job).await;
        match outcome {
            Outcome::Failure(msg) => {
                assert!(msg.starts_with("Processing error: "), "{}", msg);
                assert!(msg.contains("contingency_percent"));
            }
            other => panic!("expected failure, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn panic_payloads_are_readable() {
        let err = tokio::spawn(async {
            panic!("boom");
        })
        .await
        .unwrap_err();
        assert_eq!(panic_message(err), "handler panicked: boom");

        let owned = String::from("owned boom");
        let err = tokio::spawn(async move {
            panic!("{}", owned);
        })
        .await
        .unwrap_err();
        assert_eq!(panic_message(err), "handler panicked: owned boom");
    }
}
