use super::HandlerContext;
use crate::error::Result;
use filmdesk_db::{Job, ProgressFlag, Scene, ShootDay};
use serde_json::{json, Value};
use tracing::info;

/// Shoot hours that fit in one day.
pub const MAX_HOURS_PER_DAY: f64 = 10.0;

const DEFAULT_CALL_TIME: &str = "08:00";

pub(super) async fn generate(ctx: &HandlerContext, job: &Job) -> Result<Value> {
    let project = ctx.db.projects_require(&job.project_id).await?;

    let days = match ctx.db.breakdown_find(&project.id).await? {
        Some(breakdown) if !breakdown.scenes.is_empty() => plan_shoot_days(&breakdown.scenes),
        _ => sample_shoot_days(),
    };

    let schedule = ctx.db.schedules_create_with_days(&project.id, &days).await?;
    ctx.db
        .projects_mark_progress(&project.id, ProgressFlag::ScheduleGenerated)
        .await?;

    info!(
        project_id = %project.id,
        schedule_id = %schedule.id,
        days = schedule.total_days,
        "Schedule generated"
    );
    Ok(json!({
        "schedule_id": schedule.id,
        "total_days": schedule.total_days,
        "shoot_days_created": days.len(),
    }))
}

/// Group scenes by location, in order of first appearance, and split a
/// location across days once its scenes exceed [`MAX_HOURS_PER_DAY`].
pub fn plan_shoot_days(scenes: &[Scene]) -> Vec<ShootDay> {
    let mut by_location: Vec<(&str, Vec<&Scene>)> = Vec::new();
    for scene in scenes {
        match by_location.iter_mut().find(|(loc, _)| *loc == scene.location) {
            Some((_, group)) => group.push(scene),
            None => by_location.push((scene.location.as_str(), vec![scene])),
        }
    }

    let mut days: Vec<ShootDay> = Vec::new();
    for (location, group) in by_location {
        let mut current: Vec<u32> = Vec::new();
        let mut hours = 0.0;
        for scene in group {
            if !current.is_empty() && hours + scene.est_shoot_hours > MAX_HOURS_PER_DAY {
                push_day(&mut days, location, std::mem::take(&mut current));
                hours = 0.0;
            }
            current.push(scene.number);
            hours += scene.est_shoot_hours;
        }
        if !current.is_empty() {
            push_day(&mut days, location, current);
        }
    }
    days
}

fn push_day(days: &mut Vec<ShootDay>, location: &str, scenes: Vec<u32>) {
    let first = scenes.iter().min().copied().unwrap_or_default();
    let last = scenes.iter().max().copied().unwrap_or_default();
    let index = days.len() as u32;
    days.push(ShootDay {
        day_number: index + 1,
        location: location.to_string(),
        scenes,
        call_time: Some(DEFAULT_CALL_TIME.to_string()),
        notes: format!("Scenes {}-{}", first, last),
        order_index: index,
    });
}

fn sample_shoot_days() -> Vec<ShootDay> {
    [
        ("Coffee Shop", 1, "Interior dialogue scenes"),
        ("City Street", 2, "Exterior walking sequences"),
        ("Sarah's Apartment", 3, "Interior night scenes"),
    ]
    .into_iter()
    .enumerate()
    .map(|(idx, (location, scene, notes))| ShootDay {
        day_number: idx as u32 + 1,
        location: location.to_string(),
        scenes: vec![scene],
        call_time: Some(DEFAULT_CALL_TIME.to_string()),
        notes: notes.to_string(),
        order_index: idx as u32,
    })
    .collect()
}
