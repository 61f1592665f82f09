//! Jobs command - enqueue agent jobs and inspect the queue.

use super::error::HelpfulError;
use super::output::{
    format_opt_millis, print_json, print_table, print_table_colored, status_color, truncate,
};
use super::{block_on, open_db};
use clap::Subcommand;
use filmdesk_agents::{AgentError, JobKind, JobQueue};
use filmdesk_db::{Job, JobFilter, JobId, JobStatus, ProjectId};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;

#[derive(Subcommand, Debug)]
pub enum JobsAction {
    /// Queue a job for the agent poller
    Enqueue {
        /// Job kind (e.g. grant_match, budget_generation)
        kind: String,

        /// Project the job runs against
        #[arg(short, long)]
        project: ProjectId,

        /// Input parameter as key=value (repeatable)
        #[arg(long = "param", value_name = "KEY=VALUE")]
        params: Vec<String>,

        #[arg(long)]
        json: bool,
    },

    /// Show one job's status
    Status {
        id: JobId,

        #[arg(long)]
        json: bool,
    },

    /// List jobs, newest first
    List {
        #[arg(long)]
        status: Option<JobStatus>,

        #[arg(short, long)]
        project: Option<ProjectId>,

        #[arg(long)]
        kind: Option<String>,

        #[arg(short = 'n', long, default_value = "50")]
        limit: usize,

        #[arg(long)]
        json: bool,
    },

    /// Counts per status
    Stats {
        #[arg(long)]
        json: bool,
    },
}

impl JobsAction {
    pub fn wants_json(&self) -> bool {
        match self {
            Self::Enqueue { json, .. }
            | Self::Status { json, .. }
            | Self::List { json, .. }
            | Self::Stats { json } => *json,
        }
    }
}

#[derive(Debug, Serialize)]
struct JobStatusView<'a> {
    id: &'a JobId,
    kind: &'a str,
    project_id: &'a ProjectId,
    status: JobStatus,
    created_at: i64,
    started_at: Option<i64>,
    completed_at: Option<i64>,
    error_message: Option<&'a str>,
    output_data: &'a serde_json::Value,
}

impl<'a> From<&'a Job> for JobStatusView<'a> {
    fn from(job: &'a Job) -> Self {
        Self {
            id: &job.id,
            kind: &job.kind,
            project_id: &job.project_id,
            status: job.status,
            created_at: job.created_at,
            started_at: job.started_at,
            completed_at: job.completed_at,
            error_message: job.error_message.as_deref(),
            output_data: &job.output_data,
        }
    }
}

pub fn run(action: JobsAction, db_path: &Path) -> anyhow::Result<()> {
    block_on(async move {
        let queue = JobQueue::new(open_db(db_path).await?);
        match action {
            JobsAction::Enqueue {
                kind,
                project,
                params,
                json,
            } => enqueue(&queue, &kind, &project, &params, json).await,
            JobsAction::Status { id, json } => status(&queue, &id, json).await,
            JobsAction::List {
                status,
                project,
                kind,
                limit,
                json,
            } => {
                let filter = JobFilter {
                    status,
                    project_id: project,
                    kind,
                    limit: Some(limit),
                };
                list(&queue, &filter, json).await
            }
            JobsAction::Stats { json } => stats(&queue, json).await,
        }
    })
}

/// Split `key=value` pairs. Later keys win.
pub fn parse_params(raw: &[String]) -> Result<BTreeMap<String, String>, HelpfulError> {
    let mut params = BTreeMap::new();
    for pair in raw {
        match pair.split_once('=') {
            Some((key, value)) if !key.trim().is_empty() => {
                params.insert(key.trim().to_string(), value.to_string());
            }
            _ => {
                return Err(HelpfulError::invalid_argument(
                    "parameter",
                    pair,
                    "Use --param key=value, e.g. --param contingency_percent=15",
                ))
            }
        }
    }
    Ok(params)
}

async fn enqueue(
    queue: &JobQueue,
    kind: &str,
    project: &ProjectId,
    raw_params: &[String],
    json: bool,
) -> anyhow::Result<()> {
    let params = parse_params(raw_params)?;
    if JobKind::parse(kind).is_none() {
        tracing::warn!(kind, "Enqueuing unregistered job kind; it will fail at dispatch");
    }

    let job = queue.enqueue(kind, project, params).await.map_err(|e| match e {
        AgentError::NotFound(_) => HelpfulError::project_not_found(project.as_str()),
        other => HelpfulError::from_agent(other),
    })?;

    if json {
        print_json(&serde_json::json!({ "id": job.id, "status": job.status }))?;
    } else {
        println!("Queued {} job {}", job.kind, job.id);
        println!("Run it with: filmdesk agents run --once");
    }
    Ok(())
}

async fn status(queue: &JobQueue, id: &JobId, json: bool) -> anyhow::Result<()> {
    let job = queue.get(id).await.map_err(|e| match e {
        AgentError::NotFound(_) => HelpfulError::job_not_found(id.as_str()),
        other => HelpfulError::from_agent(other),
    })?;

    if json {
        return print_json(&JobStatusView::from(&job));
    }

    println!("Job:        {}", job.id);
    println!("Kind:       {}", job.kind);
    println!("Project:    {}", job.project_id);
    println!("Status:     {}", job.status);
    println!("Created:    {}", format_opt_millis(Some(job.created_at)));
    println!("Started:    {}", format_opt_millis(job.started_at));
    println!("Completed:  {}", format_opt_millis(job.completed_at));
    if let Some(error) = &job.error_message {
        println!("Error:      {}", error);
    }
    if job.status == JobStatus::Completed && !job.output_data.is_null() {
        println!("Output:     {}", job.output_data);
    }
    Ok(())
}

async fn list(queue: &JobQueue, filter: &JobFilter, json: bool) -> anyhow::Result<()> {
    let jobs = queue.list(filter).await.map_err(HelpfulError::from_agent)?;

    if json {
        let views: Vec<JobStatusView<'_>> = jobs.iter().map(JobStatusView::from).collect();
        return print_json(&views);
    }

    if jobs.is_empty() {
        println!("No jobs found.");
        return Ok(());
    }

    let rows = jobs
        .iter()
        .map(|job| {
            vec![
                (job.id.to_string(), None),
                (job.kind.clone(), None),
                (job.status.to_string(), Some(status_color(job.status))),
                (format_opt_millis(Some(job.created_at)), None),
                (format_opt_millis(job.completed_at), None),
                (truncate(job.error_message.as_deref().unwrap_or(""), 40), None),
            ]
        })
        .collect();
    print_table_colored(&["ID", "KIND", "STATUS", "CREATED", "COMPLETED", "ERROR"], rows);
    Ok(())
}

async fn stats(queue: &JobQueue, json: bool) -> anyhow::Result<()> {
    let stats = queue.stats().await.map_err(HelpfulError::from_agent)?;
    if json {
        return print_json(&stats);
    }
    print_table(
        &["TOTAL", "QUEUED", "PROCESSING", "COMPLETED", "FAILED"],
        vec![vec![
            stats.total.to_string(),
            stats.queued.to_string(),
            stats.processing.to_string(),
            stats.completed.to_string(),
            stats.failed.to_string(),
        ]],
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_params() {
        let params =
            parse_params(&["a=1".to_string(), "b=x=y".to_string(), "a=2".to_string()]).unwrap();
        assert_eq!(params.get("a").map(String::as_str), Some("2"));
        assert_eq!(params.get("b").map(String::as_str), Some("x=y"));
    }

    #[test]
    fn test_parse_params_rejects_missing_key() {
        assert!(parse_params(&["=1".to_string()]).is_err());
        assert!(parse_params(&["novalue".to_string()]).is_err());
    }
}
