//! Festivals command - discovery, preferences and listings.

use super::error::HelpfulError;
use super::output::{
    format_money, print_json, print_table, print_table_colored, quality_color, truncate,
};
use super::{block_on, open_db};
use clap::Subcommand;
use filmdesk_agents::{DiscoveryTarget, MatchEngine};
use filmdesk_db::{
    ActivityAction, ActivitySection, FestivalPreferences, FestivalTier, FilmDb, ProjectId,
};
use serde_json::json;
use std::path::Path;

#[derive(Subcommand, Debug)]
pub enum FestivalsAction {
    /// Score open festivals for a project and store the good matches
    Discover {
        #[arg(short, long)]
        project: ProjectId,

        #[arg(long)]
        json: bool,
    },

    /// Show or update a project's festival discovery preferences
    Prefs {
        #[arg(short, long)]
        project: ProjectId,

        #[command(flatten)]
        update: FestivalPrefsUpdate,

        #[arg(long)]
        json: bool,
    },

    /// List a project's matches, or the festival catalog without --project
    List {
        #[arg(short, long)]
        project: Option<ProjectId>,

        #[arg(short = 'n', long, default_value = "50")]
        limit: usize,

        #[arg(long)]
        json: bool,
    },
}

impl FestivalsAction {
    pub fn wants_json(&self) -> bool {
        match self {
            Self::Discover { json, .. } | Self::Prefs { json, .. } | Self::List { json, .. } => {
                *json
            }
        }
    }
}

/// Preference fields to change. Absent flags keep the stored value.
#[derive(clap::Args, Debug, Default)]
pub struct FestivalPrefsUpdate {
    /// Tiers that earn a scoring bonus (comma separated)
    #[arg(long = "tier", value_delimiter = ',')]
    pub tiers: Option<Vec<FestivalTier>>,

    /// Skip festivals whose next entry fee is above this
    #[arg(long)]
    pub max_fee: Option<f64>,

    /// Skip windows due sooner than this many days (0 disables)
    #[arg(long)]
    pub lead_time_days: Option<u32>,

    /// Start from the defaults instead of the stored preferences
    #[arg(long)]
    pub reset: bool,
}

impl FestivalPrefsUpdate {
    pub fn is_empty(&self) -> bool {
        !self.reset
            && self.tiers.is_none()
            && self.max_fee.is_none()
            && self.lead_time_days.is_none()
    }

    /// Apply onto `current` (or the defaults with `--reset`) and validate.
    pub fn apply(self, current: FestivalPreferences) -> Result<FestivalPreferences, HelpfulError> {
        let mut prefs = if self.reset { FestivalPreferences::default() } else { current };
        if let Some(tiers) = self.tiers {
            prefs.preferred_tiers = tiers;
        }
        if let Some(fee) = self.max_fee {
            if !fee.is_finite() || fee < 0.0 {
                return Err(HelpfulError::invalid_argument(
                    "--max-fee",
                    &fee.to_string(),
                    "Use a non-negative fee, e.g. --max-fee 75",
                ));
            }
            prefs.max_entry_fee = Some(fee);
        }
        if let Some(days) = self.lead_time_days {
            prefs.lead_time_days = days;
        }
        Ok(prefs)
    }
}

pub fn run(action: FestivalsAction, db_path: &Path) -> anyhow::Result<()> {
    block_on(async move {
        let db = open_db(db_path).await?;
        match action {
            FestivalsAction::Discover { project, json } => {
                let summary = MatchEngine::new(db)
                    .trigger_discovery(&project, DiscoveryTarget::Festivals)
                    .await
                    .map_err(HelpfulError::from_agent)?;
                if json {
                    return print_json(&summary);
                }
                println!("Found {} new festival match(es)", summary.matches_found);
                Ok(())
            }
            FestivalsAction::Prefs {
                project,
                update,
                json,
            } => prefs(&db, &project, update, json).await,
            FestivalsAction::List {
                project: Some(project),
                json,
                ..
            } => list_matches(&db, &project, json).await,
            FestivalsAction::List {
                project: None,
                limit,
                json,
            } => list_catalog(&db, limit, json).await,
        }
    })
}

async fn prefs(
    db: &FilmDb,
    project: &ProjectId,
    update: FestivalPrefsUpdate,
    json: bool,
) -> anyhow::Result<()> {
    db.projects_get(project)
        .await?
        .ok_or_else(|| HelpfulError::project_not_found(project.as_str()))?;
    let stored = db.festival_preferences_get(project).await?;

    let (prefs, saved) = if update.is_empty() {
        let exists = stored.is_some();
        (stored.unwrap_or_default(), exists)
    } else {
        let prefs = update.apply(stored.unwrap_or_default())?;
        db.festival_preferences_set(project, &prefs).await?;
        db.activity_append(
            project,
            ActivityAction::Update,
            ActivitySection::Festival,
            "Festival preferences updated",
        )
        .await?;
        (prefs, true)
    };

    if json {
        return print_json(&json!({
            "project_id": project,
            "saved": saved,
            "preferences": prefs,
        }));
    }
    if !saved {
        println!("No festival preferences saved; any open window qualifies.");
        println!("Set some: filmdesk festivals prefs --project {} --tier a_list", project);
        return Ok(());
    }

    let tiers: Vec<&str> = prefs.preferred_tiers.iter().map(|t| t.as_str()).collect();
    let tiers = if tiers.is_empty() { "any".to_string() } else { tiers.join(", ") };
    println!("Tiers:       {}", tiers);
    println!(
        "Max fee:     {}",
        prefs.max_entry_fee.map(format_money).unwrap_or_else(|| "none".to_string())
    );
    println!("Lead time:   {} day(s)", prefs.lead_time_days);
    Ok(())
}

async fn list_matches(db: &FilmDb, project: &ProjectId, json: bool) -> anyhow::Result<()> {
    db.projects_get(project)
        .await?
        .ok_or_else(|| HelpfulError::project_not_found(project.as_str()))?;
    let matches = db.festival_matches_for_project(project).await?;

    if json {
        return print_json(&matches);
    }
    if matches.is_empty() {
        println!("No festival matches yet. Try: filmdesk festivals discover --project {}", project);
        return Ok(());
    }

    let today = chrono::Utc::now().date_naive();
    let mut rows = Vec::with_capacity(matches.len());
    for m in &matches {
        let (name, next) = match db.festivals_get(&m.festival_id).await? {
            Some(festival) => {
                let next = festival
                    .next_window(today)
                    .map(|w| match w.fee {
                        Some(fee) => format!("{} ({})", w.deadline, format_money(fee)),
                        None => w.deadline.to_string(),
                    })
                    .unwrap_or_else(|| "closed".to_string());
                (festival.name, next)
            }
            None => (m.festival_id.to_string(), "-".to_string()),
        };
        rows.push(vec![
            (truncate(&name, 36), None),
            (m.score.to_string(), None),
            (m.quality.to_string(), Some(quality_color(m.quality))),
            (next, None),
            (truncate(&m.reasoning, 60), None),
        ]);
    }
    print_table_colored(&["FESTIVAL", "SCORE", "QUALITY", "NEXT DEADLINE", "REASONING"], rows);
    Ok(())
}

async fn list_catalog(db: &FilmDb, limit: usize, json: bool) -> anyhow::Result<()> {
    let festivals = db.festivals_list(Some(limit)).await?;

    if json {
        return print_json(&festivals);
    }
    if festivals.is_empty() {
        println!(
            "No festivals in the catalog. \
             Queue a refresh: filmdesk jobs enqueue festival_scrape --project <id>"
        );
        return Ok(());
    }

    let today = chrono::Utc::now().date_naive();
    let rows = festivals
        .iter()
        .map(|f| {
            vec![
                f.id.to_string(),
                truncate(&f.name, 36),
                truncate(&f.location, 24),
                f.tier.to_string(),
                f.prestige_score.to_string(),
                f.next_window(today)
                    .map(|w| w.deadline.to_string())
                    .unwrap_or_else(|| "closed".to_string()),
            ]
        })
        .collect();
    print_table(&["ID", "NAME", "LOCATION", "TIER", "PRESTIGE", "NEXT DEADLINE"], rows);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_sets_tiers_and_fee() {
        let update = FestivalPrefsUpdate {
            tiers: Some(vec![FestivalTier::AList, FestivalTier::Genre]),
            max_fee: Some(60.0),
            ..Default::default()
        };
        assert!(!update.is_empty());
        let prefs = update.apply(FestivalPreferences::default()).unwrap();
        assert_eq!(prefs.preferred_tiers, vec![FestivalTier::AList, FestivalTier::Genre]);
        assert_eq!(prefs.max_entry_fee, Some(60.0));
        assert_eq!(prefs.lead_time_days, FestivalPreferences::default().lead_time_days);
    }

    #[test]
    fn test_negative_fee_is_rejected() {
        let update = FestivalPrefsUpdate {
            max_fee: Some(-5.0),
            ..Default::default()
        };
        let err = update.apply(FestivalPreferences::default()).unwrap_err();
        assert_eq!(err.message, "Invalid --max-fee: '-5'");
    }
}
