//! Grants command - discovery, quick apply, preferences and listings.

use super::error::HelpfulError;
use super::output::{
    format_amount_range, print_json, print_table, print_table_colored, quality_color, truncate,
};
use super::{block_on, open_db};
use clap::Subcommand;
use filmdesk_agents::{DiscoveryTarget, MatchEngine};
use filmdesk_db::{
    ActivityAction, ActivitySection, FilmDb, FundingType, GrantFilter, GrantId, GrantPreferences,
    GrantType, ProjectId,
};
use serde_json::json;
use std::path::Path;

#[derive(Subcommand, Debug)]
pub enum GrantsAction {
    /// Score open grants for a project and store the good matches
    Discover {
        #[arg(short, long)]
        project: ProjectId,

        #[arg(long)]
        json: bool,
    },

    /// Add a grant to a project's matches as "interested"
    Apply {
        grant: GrantId,

        #[arg(short, long)]
        project: ProjectId,

        #[arg(long)]
        json: bool,
    },

    /// Show or update a project's grant discovery preferences
    Prefs {
        #[arg(short, long)]
        project: ProjectId,

        #[command(flatten)]
        update: GrantPrefsUpdate,

        #[arg(long)]
        json: bool,
    },

    /// List a project's matches, or the open grant catalog without --project
    List {
        #[arg(short, long)]
        project: Option<ProjectId>,

        /// Text in title, organization or description
        #[arg(long)]
        search: Option<String>,

        #[arg(long)]
        grant_type: Option<GrantType>,

        #[arg(long)]
        funding_type: Option<FundingType>,

        /// Minimum award (grants without a minimum are kept)
        #[arg(long)]
        min: Option<f64>,

        /// Maximum award (grants without a maximum are kept)
        #[arg(long)]
        max: Option<f64>,

        /// Include grants whose deadline has passed
        #[arg(long)]
        all: bool,

        #[arg(short = 'n', long, default_value = "50")]
        limit: usize,

        #[arg(long)]
        json: bool,
    },
}

impl GrantsAction {
    pub fn wants_json(&self) -> bool {
        match self {
            Self::Discover { json, .. }
            | Self::Apply { json, .. }
            | Self::Prefs { json, .. }
            | Self::List { json, .. } => *json,
        }
    }
}

/// Preference fields to change. Absent flags keep the stored value.
#[derive(clap::Args, Debug, Default)]
pub struct GrantPrefsUpdate {
    /// Allowed funding types (comma separated)
    #[arg(long = "funding-type", value_delimiter = ',')]
    pub funding_types: Option<Vec<FundingType>>,

    /// Grant types that earn a priority bonus (comma separated)
    #[arg(long = "priority", value_delimiter = ',')]
    pub priorities: Option<Vec<GrantType>>,

    /// Smallest award worth considering
    #[arg(long)]
    pub min: Option<f64>,

    /// Largest award worth considering
    #[arg(long)]
    pub max: Option<f64>,

    /// Preferred regions (comma separated)
    #[arg(long = "region", value_delimiter = ',')]
    pub regions: Option<Vec<String>>,

    /// Skip grants due sooner than this many days (0 disables)
    #[arg(long)]
    pub lead_time_days: Option<u32>,

    /// Start from the defaults instead of the stored preferences
    #[arg(long)]
    pub reset: bool,
}

impl GrantPrefsUpdate {
    pub fn is_empty(&self) -> bool {
        !self.reset
            && self.funding_types.is_none()
            && self.priorities.is_none()
            && self.min.is_none()
            && self.max.is_none()
            && self.regions.is_none()
            && self.lead_time_days.is_none()
    }

    /// Apply onto `current` (or the defaults with `--reset`) and validate.
    pub fn apply(self, current: GrantPreferences) -> Result<GrantPreferences, HelpfulError> {
        let mut prefs = if self.reset { GrantPreferences::default() } else { current };
        if let Some(types) = self.funding_types {
            prefs.preferred_funding_types = types;
        }
        if let Some(priorities) = self.priorities {
            prefs.funding_priorities = priorities;
        }
        if let Some(min) = self.min {
            prefs.min_amount = Some(min);
        }
        if let Some(max) = self.max {
            prefs.max_amount = Some(max);
        }
        if let Some(regions) = self.regions {
            prefs.preferred_regions = regions
                .into_iter()
                .map(|r| r.trim().to_lowercase())
                .filter(|r| !r.is_empty())
                .collect();
        }
        if let Some(days) = self.lead_time_days {
            prefs.lead_time_days = days;
        }

        for (name, amount) in [("--min", prefs.min_amount), ("--max", prefs.max_amount)] {
            if let Some(value) = amount {
                if !value.is_finite() || value < 0.0 {
                    return Err(HelpfulError::invalid_argument(
                        name,
                        &value.to_string(),
                        "Use a non-negative amount, e.g. --min 5000",
                    ));
                }
            }
        }
        if let (Some(min), Some(max)) = (prefs.min_amount, prefs.max_amount) {
            if min > max {
                return Err(HelpfulError::new(format!(
                    "Minimum amount {} is above maximum amount {}",
                    min, max
                ))
                .with_suggestion("TRY: Lower --min or raise --max"));
            }
        }
        Ok(prefs)
    }
}

pub fn run(action: GrantsAction, db_path: &Path) -> anyhow::Result<()> {
    block_on(async move {
        let db = open_db(db_path).await?;
        match action {
            GrantsAction::Discover { project, json } => discover(db, &project, json).await,
            GrantsAction::Apply {
                grant,
                project,
                json,
            } => apply(db, &project, &grant, json).await,
            GrantsAction::Prefs {
                project,
                update,
                json,
            } => prefs(&db, &project, update, json).await,
            GrantsAction::List {
                project: Some(project),
                json,
                ..
            } => list_matches(&db, &project, json).await,
            GrantsAction::List {
                project: None,
                search,
                grant_type,
                funding_type,
                min,
                max,
                all,
                limit,
                json,
            } => {
                let filter = GrantFilter {
                    open_on: (!all).then(|| chrono::Utc::now().date_naive()),
                    search,
                    grant_type,
                    funding_type,
                    min_amount: min,
                    max_amount: max,
                    limit: Some(limit),
                };
                list_catalog(&db, &filter, json).await
            }
        }
    })
}

async fn discover(db: FilmDb, project: &ProjectId, json: bool) -> anyhow::Result<()> {
    let summary = MatchEngine::new(db)
        .trigger_discovery(project, DiscoveryTarget::Grants)
        .await
        .map_err(HelpfulError::from_agent)?;

    if json {
        return print_json(&summary);
    }
    println!("Found {} new grant match(es)", summary.matches_found);
    Ok(())
}

async fn apply(db: FilmDb, project: &ProjectId, grant: &GrantId, json: bool) -> anyhow::Result<()> {
    let stored = MatchEngine::new(db)
        .quick_apply_grant(project, grant)
        .await
        .map_err(HelpfulError::from_agent)?;

    if json {
        return print_json(&stored);
    }
    println!(
        "Added grant {} to project {} (score {}, {})",
        stored.grant_id, stored.project_id, stored.score, stored.quality
    );
    Ok(())
}

async fn prefs(
    db: &FilmDb,
    project: &ProjectId,
    update: GrantPrefsUpdate,
    json: bool,
) -> anyhow::Result<()> {
    db.projects_get(project)
        .await?
        .ok_or_else(|| HelpfulError::project_not_found(project.as_str()))?;
    let stored = db.grant_preferences_get(project).await?;

    let (prefs, saved) = if update.is_empty() {
        let exists = stored.is_some();
        (stored.unwrap_or_default(), exists)
    } else {
        let prefs = update.apply(stored.unwrap_or_default())?;
        db.grant_preferences_set(project, &prefs).await?;
        db.activity_append(
            project,
            ActivityAction::Update,
            ActivitySection::Grant,
            "Grant preferences updated",
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

    let list = |items: Vec<&str>| {
        if items.is_empty() {
            "any".to_string()
        } else {
            items.join(", ")
        }
    };
    if !saved {
        println!("No grant preferences saved; discovery uses no filters.");
        println!("Set some: filmdesk grants prefs --project {} --funding-type grant", project);
        return Ok(());
    }
    println!(
        "Funding types:  {}",
        list(prefs.preferred_funding_types.iter().map(|t| t.as_str()).collect())
    );
    println!(
        "Priorities:     {}",
        list(prefs.funding_priorities.iter().map(|t| t.as_str()).collect())
    );
    println!("Amount:         {}", format_amount_range(prefs.min_amount, prefs.max_amount));
    println!(
        "Regions:        {}",
        list(prefs.preferred_regions.iter().map(String::as_str).collect())
    );
    println!("Lead time:      {} day(s)", prefs.lead_time_days);
    Ok(())
}

async fn list_matches(db: &FilmDb, project: &ProjectId, json: bool) -> anyhow::Result<()> {
    db.projects_get(project)
        .await?
        .ok_or_else(|| HelpfulError::project_not_found(project.as_str()))?;
    let matches = db.grant_matches_for_project(project).await?;

    if json {
        return print_json(&matches);
    }
    if matches.is_empty() {
        println!("No grant matches yet. Try: filmdesk grants discover --project {}", project);
        return Ok(());
    }

    let mut rows = Vec::with_capacity(matches.len());
    for m in &matches {
        let title = match db.grants_get(&m.grant_id).await? {
            Some(grant) => grant.title,
            None => m.grant_id.to_string(),
        };
        rows.push(vec![
            (truncate(&title, 40), None),
            (m.score.to_string(), None),
            (m.quality.to_string(), Some(quality_color(m.quality))),
            (m.status.to_string(), None),
            (truncate(&m.reasoning, 60), None),
        ]);
    }
    print_table_colored(&["GRANT", "SCORE", "QUALITY", "STATUS", "REASONING"], rows);
    Ok(())
}

async fn list_catalog(db: &FilmDb, filter: &GrantFilter, json: bool) -> anyhow::Result<()> {
    let grants = db.grants_list(filter).await?;

    if json {
        return print_json(&grants);
    }
    if grants.is_empty() {
        println!(
            "No grants match. Queue a refresh: filmdesk jobs enqueue grant_scrape --project <id>"
        );
        return Ok(());
    }

    let rows = grants
        .iter()
        .map(|g| {
            vec![
                g.id.to_string(),
                truncate(&g.title, 40),
                truncate(&g.organization, 30),
                g.deadline.to_string(),
                format_amount_range(g.amount_min, g.amount_max),
                g.grant_type.to_string(),
            ]
        })
        .collect();
    print_table(&["ID", "TITLE", "ORGANIZATION", "DEADLINE", "AMOUNT", "TYPE"], rows);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_update_is_detected() {
        assert!(GrantPrefsUpdate::default().is_empty());
        let update = GrantPrefsUpdate {
            lead_time_days: Some(0),
            ..Default::default()
        };
        assert!(!update.is_empty());
    }

    #[test]
    fn test_update_keeps_unset_fields() {
        let current = GrantPreferences {
            preferred_funding_types: vec![FundingType::Grant],
            min_amount: Some(1_000.0),
            ..Default::default()
        };
        let update = GrantPrefsUpdate {
            priorities: Some(vec![GrantType::Production]),
            regions: Some(vec![" North_America ".into(), "".into()]),
            ..Default::default()
        };
        let prefs = update.apply(current).unwrap();
        assert_eq!(prefs.preferred_funding_types, vec![FundingType::Grant]);
        assert_eq!(prefs.funding_priorities, vec![GrantType::Production]);
        assert_eq!(prefs.min_amount, Some(1_000.0));
        assert_eq!(prefs.preferred_regions, vec!["north_america".to_string()]);
    }

    #[test]
    fn test_reset_starts_from_defaults() {
        let current = GrantPreferences {
            preferred_funding_types: vec![FundingType::Loan],
            lead_time_days: 5,
            ..Default::default()
        };
        let update = GrantPrefsUpdate {
            reset: true,
            ..Default::default()
        };
        let prefs = update.apply(current).unwrap();
        assert!(prefs.preferred_funding_types.is_empty());
        assert_eq!(prefs.lead_time_days, GrantPreferences::default().lead_time_days);
    }

    #[test]
    fn test_inverted_bounds_are_rejected() {
        let update = GrantPrefsUpdate {
            min: Some(50_000.0),
            max: Some(10_000.0),
            ..Default::default()
        };
        let err = update.apply(GrantPreferences::default()).unwrap_err();
        assert!(err.message.contains("above maximum"));

        let update = GrantPrefsUpdate {
            min: Some(-1.0),
            ..Default::default()
        };
        assert!(update.apply(GrantPreferences::default()).is_err());
    }
}
