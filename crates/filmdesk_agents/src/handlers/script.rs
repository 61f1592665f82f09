use super::HandlerContext;
use crate::error::{AgentError, Result};
use crate::script_parser::parse_scenes;
use filmdesk_db::{Job, ProgressFlag, Scene, SceneId};
use serde_json::{json, Value};
use tracing::{info, warn};

/// Break the project's script into scenes.
///
/// Falls back to the sample scenes when no script is stored, no object store
/// is configured, or the script has no recognisable headings.
pub(super) async fn analyze(ctx: &HandlerContext, job: &Job) -> Result<Value> {
    let project = ctx.db.projects_require(&job.project_id).await?;
    ctx.db.breakdown_get_or_create(&project.id).await?;

    let parsed = match (&project.script_path, &ctx.storage) {
        (Some(path), Some(storage)) => {
            let bytes = storage.download(path).await?;
            let text = String::from_utf8(bytes)
                .map_err(|_| AgentError::handler(format!("Script {} is not valid UTF-8", path)))?;
            let scenes = parse_scenes(&text);
            if scenes.is_empty() {
                warn!(
                    project_id = %project.id,
                    path,
                    "No scene headings found; using sample scenes"
                );
            }
            scenes
        }
        (Some(path), None) => {
            warn!(
                project_id = %project.id,
                path,
                "No object store configured; using sample scenes"
            );
            Vec::new()
        }
        (None, _) => Vec::new(),
    };
    let scenes = if parsed.is_empty() { sample_scenes() } else { parsed };

    let created = ctx.db.scenes_replace(&project.id, &scenes).await?;
    ctx.db
        .projects_mark_progress(&project.id, ProgressFlag::ScriptAnalyzed)
        .await?;

    info!(project_id = %project.id, scenes = created, "Script analyzed");
    let scene_ids: Vec<&str> = scenes.iter().map(|s| s.id.as_str()).collect();
    Ok(json!({
        "scenes_created": created,
        "scene_ids": scene_ids,
        "total_scenes": created,
    }))
}

/// Three placeholder scenes used when no script can be parsed.
pub fn sample_scenes() -> Vec<Scene> {
    let scene = |number: u32,
                 slug: &str,
                 int_ext: &str,
                 day_night: &str,
                 location: &str,
                 characters: &[&str],
                 hours: f64,
                 complexity: &str,
                 notes: &str| Scene {
        id: SceneId::new(),
        number,
        slug: slug.to_string(),
        int_ext: int_ext.to_string(),
        day_night: day_night.to_string(),
        location: location.to_string(),
        characters: characters.iter().map(|c| c.to_string()).collect(),
        est_shoot_hours: hours,
        complexity: complexity.to_string(),
        notes: notes.to_string(),
    };

    vec![
        scene(
            1,
            "INT. COFFEE SHOP - DAY",
            "INT",
            "DAY",
            "Coffee Shop",
            &["SARAH", "MIKE"],
            2.5,
            "simple",
            "Dialogue-heavy scene with two characters",
        ),
        scene(
            2,
            "EXT. CITY STREET - DAY",
            "EXT",
            "DAY",
            "City Street",
            &["SARAH"],
            1.0,
            "medium",
            "Walking scene with background action",
        ),
        scene(
            3,
            "INT. SARAH'S APARTMENT - NIGHT",
            "INT",
            "NIGHT",
            "Sarah's Apartment",
            &["SARAH", "ROOMMATE"],
            3.0,
            "complex",
            "Emotional scene with special lighting",
        ),
    ]
}
