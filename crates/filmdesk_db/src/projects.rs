//! Project (match subject) and progress storage.

use crate::error::{DbError, Result};
use crate::types::*;
use crate::{decode, json, FilmDb};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use tracing::info;

impl FilmDb {
    /// Insert a project and its progress row.
    pub async fn projects_insert(&self, project: &Project) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO projects (
                id, name, project_type, stage, genre, genres_json, themes_json,
                diversity_flags_json, estimated_budget, budget_range, location_json,
                features_json, setup_completed, script_path, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(project.id.as_str())
        .bind(&project.name)
        .bind(project.project_type.as_str())
        .bind(project.stage.as_str())
        .bind(&project.genre)
        .bind(json::encode(&project.genres)?)
        .bind(json::encode(&project.themes)?)
        .bind(json::encode(&project.diversity_flags)?)
        .bind(project.estimated_budget)
        .bind(project.budget_range.as_str())
        .bind(json::encode(&project.production_location)?)
        .bind(json::encode(&project.features_enabled)?)
        .bind(project.setup_completed)
        .bind(project.script_path.as_deref())
        .bind(project.created_at)
        .bind(project.updated_at)
        .execute(&mut *tx)
        .await?;

        sqlx::query("INSERT INTO project_progress (project_id, updated_at) VALUES (?, ?)")
            .bind(project.id.as_str())
            .bind(project.created_at)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        info!(project_id = %project.id, name = %project.name, "Project created");
        Ok(())
    }

    /// Get a project by ID
    pub async fn projects_get(&self, id: &ProjectId) -> Result<Option<Project>> {
        let row = sqlx::query("SELECT * FROM projects WHERE id = ?")
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(row_to_project).transpose()
    }

    /// Get a project or fail with [`DbError::NotFound`].
    pub async fn projects_require(&self, id: &ProjectId) -> Result<Project> {
        self.projects_get(id)
            .await?
            .ok_or_else(|| DbError::not_found(format!("Project {}", id)))
    }

    /// List projects, most recently created first.
    pub async fn projects_list(&self) -> Result<Vec<Project>> {
        let rows = sqlx::query("SELECT * FROM projects ORDER BY created_at DESC, name ASC")
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(row_to_project).collect()
    }

    /// Persist mutable project attributes.
    pub async fn projects_update(&self, project: &Project) -> Result<()> {
        let now = Self::now_millis();
        let rows = sqlx::query(
            r#"
            UPDATE projects SET
                name = ?, project_type = ?, stage = ?, genre = ?, genres_json = ?,
                themes_json = ?, diversity_flags_json = ?, estimated_budget = ?,
                budget_range = ?, location_json = ?, features_json = ?,
                setup_completed = ?, script_path = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&project.name)
        .bind(project.project_type.as_str())
        .bind(project.stage.as_str())
        .bind(&project.genre)
        .bind(json::encode(&project.genres)?)
        .bind(json::encode(&project.themes)?)
        .bind(json::encode(&project.diversity_flags)?)
        .bind(project.estimated_budget)
        .bind(project.budget_range.as_str())
        .bind(json::encode(&project.production_location)?)
        .bind(json::encode(&project.features_enabled)?)
        .bind(project.setup_completed)
        .bind(project.script_path.as_deref())
        .bind(now)
        .bind(project.id.as_str())
        .execute(&self.pool)
        .await?
        .rows_affected();

        if rows == 0 {
            return Err(DbError::not_found(format!("Project {}", project.id)));
        }
        Ok(())
    }

    /// Delete a project. Everything it owns goes with it.
    pub async fn projects_delete(&self, id: &ProjectId) -> Result<bool> {
        let rows = sqlx::query("DELETE FROM projects WHERE id = ?")
            .bind(id.as_str())
            .execute(&self.pool)
            .await?
            .rows_affected();
        if rows > 0 {
            info!(project_id = %id, "Project deleted");
        }
        Ok(rows > 0)
    }

    // ========================================================================
    // Progress flags
    // ========================================================================

    pub async fn projects_progress(&self, id: &ProjectId) -> Result<ProjectProgress> {
        let row = sqlx::query("SELECT * FROM project_progress WHERE project_id = ?")
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Ok(ProjectProgress {
                script_analyzed: row.get("script_analyzed"),
                budget_generated: row.get("budget_generated"),
                schedule_generated: row.get("schedule_generated"),
                grants_matched: row.get("grants_matched"),
                festivals_matched: row.get("festivals_matched"),
            }),
            None => Ok(ProjectProgress::default()),
        }
    }

    /// Set one progress flag, creating the progress row if needed.
    pub async fn projects_mark_progress(&self, id: &ProjectId, flag: ProgressFlag) -> Result<()> {
        // Column names come from a closed enum, never from input.
        let sql = format!(
            r#"
            INSERT INTO project_progress (project_id, {col}, updated_at) VALUES (?, 1, ?)
            ON CONFLICT(project_id) DO UPDATE SET {col} = 1, updated_at = excluded.updated_at
            "#,
            col = flag.as_str()
        );
        sqlx::query(&sql)
            .bind(id.as_str())
            .bind(Self::now_millis())
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

fn row_to_project(row: &SqliteRow) -> Result<Project> {
    let id: String = row.get("id");
    let project_type: String = row.get("project_type");
    let stage: String = row.get("stage");
    let budget_range: String = row.get("budget_range");

    Ok(Project {
        id: decode::parse(&id, "projects.id")?,
        name: row.get("name"),
        project_type: decode::parse(&project_type, "projects.project_type")?,
        stage: decode::parse(&stage, "projects.stage")?,
        genre: row.get("genre"),
        genres: json::decode(row.get("genres_json"))?,
        themes: json::decode(row.get("themes_json"))?,
        diversity_flags: json::decode(row.get("diversity_flags_json"))?,
        estimated_budget: row.get("estimated_budget"),
        budget_range: decode::parse(&budget_range, "projects.budget_range")?,
        production_location: json::decode(row.get("location_json"))?,
        features_enabled: json::decode(row.get("features_json"))?,
        setup_completed: row.get("setup_completed"),
        script_path: row.get("script_path"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_project_roundtrip_keeps_attributes() {
        let db = FilmDb::open_in_memory().await.unwrap();

        let mut project = Project::new("River Keepers", ProjectType::Documentary, "Documentary");
        project.stage = ProjectStage::Production;
        project.genres = vec!["documentary".into(), "nature".into()];
        project.themes = vec!["environmental".into()];
        project.estimated_budget = Some(40_000.0);
        project.production_location = Location::new(Some("Oregon"), Some("USA"));
        project.features_enabled = vec![Feature::Grants];
        db.projects_insert(&project).await.unwrap();

        let loaded = db.projects_require(&project.id).await.unwrap();
        assert_eq!(loaded.genre, "documentary");
        assert_eq!(loaded.stage, ProjectStage::Production);
        assert_eq!(loaded.genres, project.genres);
        assert_eq!(loaded.estimated_budget, Some(40_000.0));
        assert_eq!(loaded.production_location, project.production_location);
        assert!(loaded.has_feature(Feature::Grants));
        assert!(!loaded.has_feature(Feature::Festivals));
    }

    #[tokio::test]
    async fn test_require_unknown_project() {
        let db = FilmDb::open_in_memory().await.unwrap();
        let err = db.projects_require(&ProjectId::new()).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_progress_flags() {
        let db = FilmDb::open_in_memory().await.unwrap();
        let project = Project::new("Flags", ProjectType::Short, "comedy");
        db.projects_insert(&project).await.unwrap();

        assert_eq!(
            db.projects_progress(&project.id).await.unwrap(),
            ProjectProgress::default()
        );

        db.projects_mark_progress(&project.id, ProgressFlag::BudgetGenerated)
            .await
            .unwrap();
        db.projects_mark_progress(&project.id, ProgressFlag::BudgetGenerated)
            .await
            .unwrap();

        let progress = db.projects_progress(&project.id).await.unwrap();
        assert!(progress.budget_generated);
        assert!(!progress.script_analyzed);
    }

    #[tokio::test]
    async fn test_update_and_delete() {
        let db = FilmDb::open_in_memory().await.unwrap();
        let mut project = Project::new("Draft", ProjectType::Feature, "thriller");
        db.projects_insert(&project).await.unwrap();

        project.setup_completed = false;
        project.budget_range = BudgetRange::Micro;
        db.projects_update(&project).await.unwrap();
        let loaded = db.projects_require(&project.id).await.unwrap();
        assert!(!loaded.setup_completed);
        assert_eq!(loaded.budget_range, BudgetRange::Micro);

        assert!(db.projects_delete(&project.id).await.unwrap());
        assert!(!db.projects_delete(&project.id).await.unwrap());
        assert!(db.projects_get(&project.id).await.unwrap().is_none());
    }
}
