//! Append-only project activity log.

use crate::error::Result;
use crate::types::*;
use crate::{decode, FilmDb};
use sqlx::Row;
use tracing::debug;

impl FilmDb {
    /// Append an activity record. Records are never updated.
    pub async fn activity_append(
        &self,
        project_id: &ProjectId,
        action: ActivityAction,
        section: ActivitySection,
        description: &str,
    ) -> Result<ActivityRecord> {
        let now = Self::now_millis();
        let id = sqlx::query(
            r#"
            INSERT INTO activity_log (project_id, action, section, description, created_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(project_id.as_str())
        .bind(action.as_str())
        .bind(section.as_str())
        .bind(description)
        .bind(now)
        .execute(&self.pool)
        .await?
        .last_insert_rowid();

        debug!(project_id = %project_id, %action, %section, "Activity recorded");

        Ok(ActivityRecord {
            id,
            project_id: project_id.clone(),
            action,
            section,
            description: description.to_string(),
            created_at: now,
        })
    }

    /// Activity for a project, newest first.
    pub async fn activity_for_project(
        &self,
        project_id: &ProjectId,
        limit: usize,
    ) -> Result<Vec<ActivityRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT id, project_id, action, section, description, created_at
            FROM activity_log
            WHERE project_id = ?
            ORDER BY created_at DESC, id DESC
            LIMIT ?
            "#,
        )
        .bind(project_id.as_str())
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                let project_id: String = row.get("project_id");
                let action: String = row.get("action");
                let section: String = row.get("section");
                Ok(ActivityRecord {
                    id: row.get("id"),
                    project_id: decode::parse(&project_id, "activity_log.project_id")?,
                    action: decode::parse(&action, "activity_log.action")?,
                    section: decode::parse(&section, "activity_log.section")?,
                    description: row.get("description"),
                    created_at: row.get("created_at"),
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_append_and_read_back_newest_first() {
        let db = FilmDb::open_in_memory().await.unwrap();
        let project = Project::new("Log", ProjectType::Feature, "drama");
        db.projects_insert(&project).await.unwrap();

        db.activity_append(&project.id, ActivityAction::Create, ActivitySection::Project, "created")
            .await
            .unwrap();
        db.activity_append(
            &project.id,
            ActivityAction::Generate,
            ActivitySection::Budget,
            "AI agent completed budget_generation",
        )
        .await
        .unwrap();

        let records = db.activity_for_project(&project.id, 10).await.unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].action, ActivityAction::Generate);
        assert_eq!(records[0].section, ActivitySection::Budget);
        assert_eq!(records[1].action, ActivityAction::Create);
    }
}
