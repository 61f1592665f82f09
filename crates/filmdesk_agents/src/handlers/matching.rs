use super::HandlerContext;
use crate::error::Result;
use filmdesk_db::{Job, ProgressFlag};
use serde_json::{json, Value};

pub(super) async fn grants(ctx: &HandlerContext, job: &Job) -> Result<Value> {
    let project = ctx.db.projects_require(&job.project_id).await?;
    let created = ctx.engine.discover_grants(&project).await?;
    let total = ctx.db.grant_matches_count(&project.id).await?;
    ctx.db
        .projects_mark_progress(&project.id, ProgressFlag::GrantsMatched)
        .await?;
    Ok(json!({ "matches_created": created, "total_matches": total }))
}

pub(super) async fn festivals(ctx: &HandlerContext, job: &Job) -> Result<Value> {
    let project = ctx.db.projects_require(&job.project_id).await?;
    let created = ctx.engine.discover_festivals(&project).await?;
    let total = ctx.db.festival_matches_count(&project.id).await?;
    ctx.db
        .projects_mark_progress(&project.id, ProgressFlag::FestivalsMatched)
        .await?;
    Ok(json!({ "matches_created": created, "total_matches": total }))
}
