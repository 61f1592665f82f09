//! Projects command - the subjects jobs and discovery run against.

use super::error::HelpfulError;
use super::output::{format_millis, format_money, print_json, print_table};
use super::{block_on, open_db};
use clap::Subcommand;
use filmdesk_db::{
    ActivityAction, ActivitySection, BudgetRange, Feature, FilmDb, Location, Project, ProjectId,
    ProjectStage, ProjectType,
};
use serde_json::json;
use std::path::Path;

#[derive(Subcommand, Debug)]
pub enum ProjectsAction {
    /// Create a project
    Create {
        name: String,

        #[arg(long = "type", default_value = "feature")]
        project_type: ProjectType,

        /// Primary genre, e.g. drama
        #[arg(long, default_value = "drama")]
        genre: String,

        #[arg(long, default_value = "development")]
        stage: ProjectStage,

        /// Estimated budget in dollars
        #[arg(long)]
        budget: Option<f64>,

        #[arg(long, default_value = "low")]
        budget_range: BudgetRange,

        /// Additional genres (comma separated)
        #[arg(long, value_delimiter = ',')]
        genres: Vec<String>,

        /// Themes such as community or environmental (comma separated)
        #[arg(long, value_delimiter = ',')]
        themes: Vec<String>,

        /// Diversity flags (comma separated)
        #[arg(long = "diversity", value_delimiter = ',')]
        diversity_flags: Vec<String>,

        /// Production state, e.g. CA
        #[arg(long)]
        state: Option<String>,

        /// Production country, e.g. USA
        #[arg(long)]
        country: Option<String>,

        /// Enabled features (comma separated); all when omitted
        #[arg(long, value_delimiter = ',')]
        features: Vec<Feature>,

        /// Object-store path of the script
        #[arg(long)]
        script_path: Option<String>,

        /// Leave setup incomplete (discovery stays disabled)
        #[arg(long)]
        draft: bool,

        #[arg(long)]
        json: bool,
    },

    /// List projects
    List {
        #[arg(long)]
        json: bool,
    },

    /// Show a project with its progress and recent activity
    Show {
        id: ProjectId,

        #[arg(long)]
        json: bool,
    },
}

impl ProjectsAction {
    pub fn wants_json(&self) -> bool {
        match self {
            Self::Create { json, .. } | Self::List { json } | Self::Show { json, .. } => *json,
        }
    }
}

pub fn run(action: ProjectsAction, db_path: &Path) -> anyhow::Result<()> {
    block_on(async move {
        let db = open_db(db_path).await?;
        match action {
            ProjectsAction::Create {
                name,
                project_type,
                genre,
                stage,
                budget,
                budget_range,
                genres,
                themes,
                diversity_flags,
                state,
                country,
                features,
                script_path,
                draft,
                json,
            } => {
                if name.trim().is_empty() {
                    return Err(HelpfulError::new("Project name must not be empty").into());
                }
                let mut project = Project::new(name.trim(), project_type, genre);
                project.stage = stage;
                project.estimated_budget = budget;
                project.budget_range = budget_range;
                project.genres = normalize(genres);
                project.themes = normalize(themes);
                project.diversity_flags = normalize(diversity_flags);
                project.production_location = Location::new(state.as_deref(), country.as_deref());
                if !features.is_empty() {
                    project.features_enabled = features;
                }
                project.script_path = script_path;
                project.setup_completed = !draft;
                create(&db, &project, json).await
            }
            ProjectsAction::List { json } => list(&db, json).await,
            ProjectsAction::Show { id, json } => show(&db, &id, json).await,
        }
    })
}

/// Lowercase, trim and drop empty entries.
fn normalize(values: Vec<String>) -> Vec<String> {
    values
        .into_iter()
        .map(|v| v.trim().to_lowercase())
        .filter(|v| !v.is_empty())
        .collect()
}

async fn create(db: &FilmDb, project: &Project, json: bool) -> anyhow::Result<()> {
    db.projects_insert(project).await?;
    db.activity_append(
        &project.id,
        ActivityAction::Create,
        ActivitySection::Project,
        &format!("Project {} created", project.name),
    )
    .await?;

    if json {
        return print_json(project);
    }
    println!("Created project {} ({})", project.name, project.id);
    Ok(())
}

async fn list(db: &FilmDb, json: bool) -> anyhow::Result<()> {
    let projects = db.projects_list().await?;
    if json {
        return print_json(&projects);
    }
    if projects.is_empty() {
        println!("No projects. Create one: filmdesk projects create <name> --type feature");
        return Ok(());
    }
    let rows = projects
        .iter()
        .map(|p| {
            vec![
                p.id.to_string(),
                p.name.clone(),
                p.project_type.to_string(),
                p.stage.to_string(),
                p.genre.clone(),
                p.estimated_budget.map(format_money).unwrap_or_else(|| "-".to_string()),
            ]
        })
        .collect();
    print_table(&["ID", "NAME", "TYPE", "STAGE", "GENRE", "BUDGET"], rows);
    Ok(())
}

async fn show(db: &FilmDb, id: &ProjectId, json: bool) -> anyhow::Result<()> {
    let project = db
        .projects_get(id)
        .await?
        .ok_or_else(|| HelpfulError::project_not_found(id.as_str()))?;
    let progress = db.projects_progress(id).await?;
    let activity = db.activity_for_project(id, 10).await?;
    let grant_matches = db.grant_matches_count(id).await?;
    let festival_matches = db.festival_matches_count(id).await?;

    if json {
        return print_json(&json!({
            "project": project,
            "progress": progress,
            "grant_matches": grant_matches,
            "festival_matches": festival_matches,
            "activity": activity,
        }));
    }

    let yes_no = |flag: bool| if flag { "yes" } else { "no" };
    let features: Vec<&str> = project.features_enabled.iter().map(|f| f.as_str()).collect();
    println!("Project:    {} ({})", project.name, project.id);
    println!("Type:       {} / {}", project.project_type, project.stage);
    println!("Genre:      {}", project.genre);
    println!(
        "Budget:     {} ({})",
        project.estimated_budget.map(format_money).unwrap_or_else(|| "-".to_string()),
        project.budget_range
    );
    println!("Features:   {}", features.join(", "));
    println!("Setup:      {}", if project.setup_completed { "complete" } else { "incomplete" });
    println!();
    println!("Script analyzed:     {}", yes_no(progress.script_analyzed));
    println!("Budget generated:    {}", yes_no(progress.budget_generated));
    println!("Schedule generated:  {}", yes_no(progress.schedule_generated));
    println!(
        "Grants matched:      {} ({} matches)",
        yes_no(progress.grants_matched),
        grant_matches
    );
    println!(
        "Festivals matched:   {} ({} matches)",
        yes_no(progress.festivals_matched),
        festival_matches
    );

    if !activity.is_empty() {
        println!();
        let rows = activity
            .iter()
            .map(|a| {
                vec![
                    format_millis(a.created_at),
                    a.section.to_string(),
                    a.description.clone(),
                ]
            })
            .collect();
        print_table(&["WHEN", "SECTION", "ACTIVITY"], rows);
    }
    Ok(())
}
