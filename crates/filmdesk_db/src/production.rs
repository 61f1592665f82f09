//! Script breakdowns, budgets and shooting schedules.
//!
//! Every multi-row write here runs in a single transaction so a failure
//! part-way leaves no orphaned scenes, line items or shoot days.

use crate::error::{DbError, Result};
use crate::types::*;
use crate::{decode, json, FilmDb};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use tracing::info;

impl FilmDb {
    // ========================================================================
    // Script breakdowns
    // ========================================================================

    /// Create the project's (empty) breakdown if missing. Returns true if created.
    pub async fn breakdown_get_or_create(&self, project_id: &ProjectId) -> Result<bool> {
        let now = Self::now_millis();
        let rows = sqlx::query(
            r#"
            INSERT INTO script_breakdowns (project_id, created_at, updated_at)
            VALUES (?, ?, ?)
            ON CONFLICT(project_id) DO NOTHING
            "#,
        )
        .bind(project_id.as_str())
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?
        .rows_affected();
        Ok(rows > 0)
    }

    /// The project's breakdown, or `None` if the script was never analyzed.
    pub async fn breakdown_find(&self, project_id: &ProjectId) -> Result<Option<ScriptBreakdown>> {
        let row = sqlx::query("SELECT * FROM script_breakdowns WHERE project_id = ?")
            .bind(project_id.as_str())
            .fetch_optional(&self.pool)
            .await?;
        let Some(row) = row else {
            return Ok(None);
        };

        let scene_rows =
            sqlx::query("SELECT * FROM scenes WHERE project_id = ? ORDER BY number ASC")
                .bind(project_id.as_str())
                .fetch_all(&self.pool)
                .await?;
        let scenes = scene_rows.iter().map(row_to_scene).collect::<Result<Vec<_>>>()?;

        Ok(Some(ScriptBreakdown {
            project_id: project_id.clone(),
            scenes,
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        }))
    }

    /// Replace all scenes of the project's breakdown, creating the breakdown if needed.
    pub async fn scenes_replace(&self, project_id: &ProjectId, scenes: &[Scene]) -> Result<usize> {
        let now = Self::now_millis();
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO script_breakdowns (project_id, created_at, updated_at)
            VALUES (?, ?, ?)
            ON CONFLICT(project_id) DO UPDATE SET updated_at = excluded.updated_at
            "#,
        )
        .bind(project_id.as_str())
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM scenes WHERE project_id = ?")
            .bind(project_id.as_str())
            .execute(&mut *tx)
            .await?;

        for scene in scenes {
            sqlx::query(
                r#"
                INSERT INTO scenes (
                    id, project_id, number, slug, int_ext, day_night, location,
                    characters_json, est_shoot_hours, complexity, notes, created_at
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(scene.id.as_str())
            .bind(project_id.as_str())
            .bind(i64::from(scene.number))
            .bind(&scene.slug)
            .bind(&scene.int_ext)
            .bind(&scene.day_night)
            .bind(&scene.location)
            .bind(json::encode(&scene.characters)?)
            .bind(scene.est_shoot_hours)
            .bind(&scene.complexity)
            .bind(&scene.notes)
            .bind(now)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        info!(project_id = %project_id, scenes = scenes.len(), "Script breakdown replaced");
        Ok(scenes.len())
    }

    // ========================================================================
    // Budgets
    // ========================================================================

    /// Create the next budget version with its line items.
    ///
    /// The stored total is the sum of `quantity * rate` over `items`.
    pub async fn budgets_create_with_items(
        &self,
        project_id: &ProjectId,
        contingency_percent: u32,
        items: &[BudgetItem],
    ) -> Result<Budget> {
        let now = Self::now_millis();
        let id = BudgetId::new();
        let total: f64 = items.iter().map(BudgetItem::total).sum();

        let mut tx = self.pool.begin().await?;

        let existing: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM budgets WHERE project_id = ?")
            .bind(project_id.as_str())
            .fetch_one(&mut *tx)
            .await?;
        let version = existing + 1;

        sqlx::query(
            r#"
            INSERT INTO budgets
                (id, project_id, version, total_budget, contingency_percent, status, created_at)
            VALUES (?, ?, ?, ?, ?, 'draft', ?)
            "#,
        )
        .bind(id.as_str())
        .bind(project_id.as_str())
        .bind(version)
        .bind(total)
        .bind(i64::from(contingency_percent))
        .bind(now)
        .execute(&mut *tx)
        .await?;

        for item in items {
            sqlx::query(
                r#"
                INSERT INTO budget_items (
                    budget_id, category, subcategory, description, quantity, unit, rate,
                    total, order_index
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(id.as_str())
            .bind(&item.category)
            .bind(&item.subcategory)
            .bind(&item.description)
            .bind(item.quantity)
            .bind(&item.unit)
            .bind(item.rate)
            .bind(item.total())
            .bind(i64::from(item.order_index))
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        info!(project_id = %project_id, budget_id = %id, version, total, "Budget created");

        Ok(Budget {
            id,
            project_id: project_id.clone(),
            version: u32::try_from(version).map_err(|_| DbError::Decode("budget version".into()))?,
            total_budget: total,
            contingency_percent,
            status: "draft".to_string(),
            created_at: now,
        })
    }

    /// Budgets for a project, newest version first.
    pub async fn budgets_for_project(&self, project_id: &ProjectId) -> Result<Vec<Budget>> {
        let rows = sqlx::query("SELECT * FROM budgets WHERE project_id = ? ORDER BY version DESC")
            .bind(project_id.as_str())
            .fetch_all(&self.pool)
            .await?;

        rows.iter()
            .map(|row| {
                let id: String = row.get("id");
                let version: i64 = row.get("version");
                let contingency: i64 = row.get("contingency_percent");
                Ok(Budget {
                    id: decode::parse(&id, "budgets.id")?,
                    project_id: project_id.clone(),
                    version: version.max(0) as u32,
                    total_budget: row.get("total_budget"),
                    contingency_percent: contingency.max(0) as u32,
                    status: row.get("status"),
                    created_at: row.get("created_at"),
                })
            })
            .collect()
    }

    pub async fn budget_items(&self, budget_id: &BudgetId) -> Result<Vec<BudgetItem>> {
        let rows =
            sqlx::query("SELECT * FROM budget_items WHERE budget_id = ? ORDER BY order_index ASC")
                .bind(budget_id.as_str())
                .fetch_all(&self.pool)
                .await?;

        Ok(rows
            .iter()
            .map(|row| {
                let order_index: i64 = row.get("order_index");
                BudgetItem {
                    category: row.get("category"),
                    subcategory: row.get("subcategory"),
                    description: row.get("description"),
                    quantity: row.get("quantity"),
                    unit: row.get("unit"),
                    rate: row.get("rate"),
                    order_index: order_index.max(0) as u32,
                }
            })
            .collect())
    }

    // ========================================================================
    // Schedules
    // ========================================================================

    /// Create the next schedule version with its shoot days.
    pub async fn schedules_create_with_days(
        &self,
        project_id: &ProjectId,
        days: &[ShootDay],
    ) -> Result<Schedule> {
        let now = Self::now_millis();
        let id = ScheduleId::new();
        let total_days = u32::try_from(days.len())
            .map_err(|_| DbError::Decode("shoot day count".into()))?;

        let mut tx = self.pool.begin().await?;

        let existing: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM schedules WHERE project_id = ?")
                .bind(project_id.as_str())
                .fetch_one(&mut *tx)
                .await?;
        let version = existing + 1;

        sqlx::query(
            r#"
            INSERT INTO schedules (id, project_id, version, total_days, status, created_at)
            VALUES (?, ?, ?, ?, 'draft', ?)
            "#,
        )
        .bind(id.as_str())
        .bind(project_id.as_str())
        .bind(version)
        .bind(i64::from(total_days))
        .bind(now)
        .execute(&mut *tx)
        .await?;

        for day in days {
            sqlx::query(
                r#"
                INSERT INTO shoot_days (
                    schedule_id, day_number, location, scenes_json, call_time, notes, order_index
                ) VALUES (?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(id.as_str())
            .bind(i64::from(day.day_number))
            .bind(&day.location)
            .bind(json::encode(&day.scenes)?)
            .bind(day.call_time.as_deref())
            .bind(&day.notes)
            .bind(i64::from(day.order_index))
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        info!(project_id = %project_id, schedule_id = %id, version, total_days, "Schedule created");

        Ok(Schedule {
            id,
            project_id: project_id.clone(),
            version: version.max(0) as u32,
            total_days,
            status: "draft".to_string(),
            created_at: now,
        })
    }

    /// Schedules for a project, newest version first.
    pub async fn schedules_for_project(&self, project_id: &ProjectId) -> Result<Vec<Schedule>> {
        let rows = sqlx::query("SELECT * FROM schedules WHERE project_id = ? ORDER BY version DESC")
            .bind(project_id.as_str())
            .fetch_all(&self.pool)
            .await?;

        rows.iter()
            .map(|row| {
                let id: String = row.get("id");
                let version: i64 = row.get("version");
                let total_days: i64 = row.get("total_days");
                Ok(Schedule {
                    id: decode::parse(&id, "schedules.id")?,
                    project_id: project_id.clone(),
                    version: version.max(0) as u32,
                    total_days: total_days.max(0) as u32,
                    status: row.get("status"),
                    created_at: row.get("created_at"),
                })
            })
            .collect()
    }

    pub async fn shoot_days(&self, schedule_id: &ScheduleId) -> Result<Vec<ShootDay>> {
        let rows = sqlx::query(
            "SELECT * FROM shoot_days WHERE schedule_id = ? ORDER BY order_index ASC",
        )
        .bind(schedule_id.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                let day_number: i64 = row.get("day_number");
                let order_index: i64 = row.get("order_index");
                Ok(ShootDay {
                    day_number: day_number.max(0) as u32,
                    location: row.get("location"),
                    scenes: json::decode(row.get("scenes_json"))?,
                    call_time: row.get("call_time"),
                    notes: row.get("notes"),
                    order_index: order_index.max(0) as u32,
                })
            })
            .collect()
    }
}

fn row_to_scene(row: &SqliteRow) -> Result<Scene> {
    let id: String = row.get("id");
    let number: i64 = row.get("number");

    Ok(Scene {
        id: decode::parse(&id, "scenes.id")?,
        number: number.max(0) as u32,
        slug: row.get("slug"),
        int_ext: row.get("int_ext"),
        day_night: row.get("day_night"),
        location: row.get("location"),
        characters: json::decode(row.get("characters_json"))?,
        est_shoot_hours: row.get("est_shoot_hours"),
        complexity: row.get("complexity"),
        notes: row.get("notes"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scene(number: u32, location: &str, hours: f64) -> Scene {
        Scene {
            id: SceneId::new(),
            number,
            slug: format!("INT. {} - DAY", location.to_uppercase()),
            int_ext: "INT".into(),
            day_night: "DAY".into(),
            location: location.into(),
            characters: vec!["SARAH".into()],
            est_shoot_hours: hours,
            complexity: "simple".into(),
            notes: String::new(),
        }
    }

    async fn setup() -> (FilmDb, ProjectId) {
        let db = FilmDb::open_in_memory().await.unwrap();
        let project = Project::new("Prod", ProjectType::Feature, "drama");
        db.projects_insert(&project).await.unwrap();
        (db, project.id)
    }

    #[tokio::test]
    async fn test_breakdown_absent_until_created() {
        let (db, project_id) = setup().await;
        assert!(db.breakdown_find(&project_id).await.unwrap().is_none());

        assert!(db.breakdown_get_or_create(&project_id).await.unwrap());
        assert!(!db.breakdown_get_or_create(&project_id).await.unwrap());

        let breakdown = db.breakdown_find(&project_id).await.unwrap().unwrap();
        assert!(breakdown.scenes.is_empty());
    }

    #[tokio::test]
    async fn test_scenes_replace_swaps_whole_set() {
        let (db, project_id) = setup().await;
        db.scenes_replace(&project_id, &[scene(1, "Kitchen", 2.0), scene(2, "Garage", 1.5)])
            .await
            .unwrap();
        db.scenes_replace(&project_id, &[scene(1, "Roof", 3.0)])
            .await
            .unwrap();

        let breakdown = db.breakdown_find(&project_id).await.unwrap().unwrap();
        assert_eq!(breakdown.scenes.len(), 1);
        assert_eq!(breakdown.scenes[0].location, "Roof");
        assert_eq!(breakdown.scenes[0].characters, vec!["SARAH".to_string()]);
    }

    #[tokio::test]
    async fn test_scene_replace_is_atomic() {
        let (db, project_id) = setup().await;
        db.scenes_replace(&project_id, &[scene(1, "Kitchen", 2.0)])
            .await
            .unwrap();

        // Duplicate scene numbers violate UNIQUE(project_id, number).
        let err = db
            .scenes_replace(&project_id, &[scene(4, "Hall", 1.0), scene(4, "Hall", 1.0)])
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Constraint(_)));

        let breakdown = db.breakdown_find(&project_id).await.unwrap().unwrap();
        assert_eq!(breakdown.scenes.len(), 1);
        assert_eq!(breakdown.scenes[0].location, "Kitchen");
    }

    #[tokio::test]
    async fn test_budget_versions_and_totals() {
        let (db, project_id) = setup().await;
        let items = vec![
            BudgetItem {
                category: "above_line".into(),
                subcategory: "Producer".into(),
                description: "Producer Fee".into(),
                quantity: 1.0,
                unit: "project".into(),
                rate: 5000.0,
                order_index: 0,
            },
            BudgetItem {
                category: "below_line".into(),
                subcategory: "Cast".into(),
                description: "Lead Actor #1".into(),
                quantity: 5.0,
                unit: "day".into(),
                rate: 500.0,
                order_index: 1,
            },
        ];

        let first = db.budgets_create_with_items(&project_id, 10, &items).await.unwrap();
        let second = db.budgets_create_with_items(&project_id, 10, &items).await.unwrap();
        assert_eq!(first.version, 1);
        assert_eq!(second.version, 2);
        assert!((first.total_budget - 7500.0).abs() < f64::EPSILON);

        let stored = db.budget_items(&first.id).await.unwrap();
        assert_eq!(stored, items);
        assert_eq!(db.budgets_for_project(&project_id).await.unwrap()[0].version, 2);
    }

    #[tokio::test]
    async fn test_schedule_with_days() {
        let (db, project_id) = setup().await;
        let days = vec![
            ShootDay {
                day_number: 1,
                location: "Kitchen".into(),
                scenes: vec![1, 3],
                call_time: Some("08:00".into()),
                notes: "Scenes 1-3".into(),
                order_index: 0,
            },
            ShootDay {
                day_number: 2,
                location: "Garage".into(),
                scenes: vec![2],
                call_time: Some("08:00".into()),
                notes: "Scenes 2-2".into(),
                order_index: 1,
            },
        ];

        let schedule = db.schedules_create_with_days(&project_id, &days).await.unwrap();
        assert_eq!(schedule.version, 1);
        assert_eq!(schedule.total_days, 2);
        assert_eq!(db.shoot_days(&schedule.id).await.unwrap(), days);
    }
}
