//! Festival catalog, festival preferences and festival matches.

use crate::error::Result;
use crate::types::*;
use crate::{decode, json, FilmDb};
use chrono::NaiveDate;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use tracing::{debug, info};

impl FilmDb {
    // ========================================================================
    // Catalog
    // ========================================================================

    /// Insert a festival unless one with the same (name, location) exists.
    pub async fn festivals_get_or_create(&self, festival: &Festival) -> Result<(Festival, bool)> {
        let rows = sqlx::query(
            r#"
            INSERT INTO festivals (
                id, name, location, website_url, deadline_early, deadline_regular, deadline_late,
                fee_early, fee_regular, fee_late, currency, tier, genres_json, eligibility_json,
                awards_json, prestige_score, scraped_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(name, location) DO NOTHING
            "#,
        )
        .bind(festival.id.as_str())
        .bind(&festival.name)
        .bind(&festival.location)
        .bind(&festival.website_url)
        .bind(festival.deadline_early.map(decode::format_date))
        .bind(festival.deadline_regular.map(decode::format_date))
        .bind(festival.deadline_late.map(decode::format_date))
        .bind(festival.fee_early)
        .bind(festival.fee_regular)
        .bind(festival.fee_late)
        .bind(&festival.currency)
        .bind(festival.tier.as_str())
        .bind(json::encode(&festival.genres)?)
        .bind(json::encode(&festival.eligibility_criteria)?)
        .bind(json::encode(&festival.awards)?)
        .bind(festival.prestige_score)
        .bind(festival.scraped_at)
        .bind(festival.updated_at)
        .execute(&self.pool)
        .await?
        .rows_affected();

        let row = sqlx::query("SELECT * FROM festivals WHERE name = ? AND location = ?")
            .bind(&festival.name)
            .bind(&festival.location)
            .fetch_one(&self.pool)
            .await?;
        let stored = row_to_festival(&row)?;

        if rows > 0 {
            debug!(festival_id = %stored.id, name = %stored.name, "Festival created");
        }
        Ok((stored, rows > 0))
    }

    pub async fn festivals_get(&self, id: &FestivalId) -> Result<Option<Festival>> {
        let row = sqlx::query("SELECT * FROM festivals WHERE id = ?")
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(row_to_festival).transpose()
    }

    /// Festivals with at least one deadline on or after `today`.
    pub async fn festivals_list_open(&self, today: NaiveDate) -> Result<Vec<Festival>> {
        let today = decode::format_date(today);
        let rows = sqlx::query(
            r#"
            SELECT * FROM festivals
            WHERE deadline_early >= ?1 OR deadline_regular >= ?1 OR deadline_late >= ?1
            ORDER BY prestige_score DESC, name ASC
            "#,
        )
        .bind(today)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(row_to_festival).collect()
    }

    /// Every festival, most prestigious first.
    pub async fn festivals_list(&self, limit: Option<usize>) -> Result<Vec<Festival>> {
        let sql = match limit {
            Some(n) => format!(
                "SELECT * FROM festivals ORDER BY prestige_score DESC, name ASC LIMIT {}",
                n
            ),
            None => "SELECT * FROM festivals ORDER BY prestige_score DESC, name ASC".to_string(),
        };
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;
        rows.iter().map(row_to_festival).collect()
    }

    pub async fn festivals_count(&self) -> Result<i64> {
        let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM festivals")
            .fetch_one(&self.pool)
            .await?;
        Ok(n)
    }

    pub async fn festivals_delete(&self, id: &FestivalId) -> Result<bool> {
        let rows = sqlx::query("DELETE FROM festivals WHERE id = ?")
            .bind(id.as_str())
            .execute(&self.pool)
            .await?
            .rows_affected();
        Ok(rows > 0)
    }

    // ========================================================================
    // Preferences
    // ========================================================================

    pub async fn festival_preferences_get(
        &self,
        project_id: &ProjectId,
    ) -> Result<Option<FestivalPreferences>> {
        let row = sqlx::query("SELECT * FROM festival_preferences WHERE project_id = ?")
            .bind(project_id.as_str())
            .fetch_optional(&self.pool)
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let lead_time: i64 = row.get("lead_time_days");
        Ok(Some(FestivalPreferences {
            preferred_tiers: json::decode(row.get("preferred_tiers_json"))?,
            max_entry_fee: row.get("max_entry_fee"),
            lead_time_days: u32::try_from(lead_time.max(0)).unwrap_or(DEFAULT_LEAD_TIME_DAYS),
        }))
    }

    pub async fn festival_preferences_set(
        &self,
        project_id: &ProjectId,
        prefs: &FestivalPreferences,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO festival_preferences (
                project_id, preferred_tiers_json, max_entry_fee, lead_time_days, updated_at
            ) VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(project_id) DO UPDATE SET
                preferred_tiers_json = excluded.preferred_tiers_json,
                max_entry_fee = excluded.max_entry_fee,
                lead_time_days = excluded.lead_time_days,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(project_id.as_str())
        .bind(json::encode(&prefs.preferred_tiers)?)
        .bind(prefs.max_entry_fee)
        .bind(i64::from(prefs.lead_time_days))
        .bind(Self::now_millis())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    // ========================================================================
    // Matches
    // ========================================================================

    pub async fn festival_match_exists(
        &self,
        project_id: &ProjectId,
        festival_id: &FestivalId,
    ) -> Result<bool> {
        let found: Option<i64> = sqlx::query_scalar(
            "SELECT 1 FROM festival_matches WHERE project_id = ? AND festival_id = ?",
        )
        .bind(project_id.as_str())
        .bind(festival_id.as_str())
        .fetch_optional(&self.pool)
        .await?;
        Ok(found.is_some())
    }

    pub async fn festival_match_insert(
        &self,
        project_id: &ProjectId,
        festival_id: &FestivalId,
        new_match: &NewMatch,
        status: FestivalMatchStatus,
    ) -> Result<FestivalMatch> {
        let now = Self::now_millis();
        let quality = MatchQuality::from_score(new_match.score);

        let id = sqlx::query(
            r#"
            INSERT INTO festival_matches (
                project_id, festival_id, score, quality, reasoning, details_json, status,
                created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(project_id.as_str())
        .bind(festival_id.as_str())
        .bind(i64::from(new_match.score))
        .bind(quality.as_str())
        .bind(&new_match.reasoning)
        .bind(json::encode(&new_match.details)?)
        .bind(status.as_str())
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?
        .last_insert_rowid();

        info!(
            project_id = %project_id,
            festival_id = %festival_id,
            score = new_match.score,
            quality = %quality,
            "Festival match created"
        );

        Ok(FestivalMatch {
            id,
            project_id: project_id.clone(),
            festival_id: festival_id.clone(),
            score: new_match.score,
            quality,
            reasoning: new_match.reasoning.clone(),
            details: new_match.details.clone(),
            status,
            created_at: now,
            updated_at: now,
        })
    }

    pub async fn festival_matches_for_project(
        &self,
        project_id: &ProjectId,
    ) -> Result<Vec<FestivalMatch>> {
        let rows = sqlx::query(
            "SELECT * FROM festival_matches WHERE project_id = ? ORDER BY score DESC, created_at ASC",
        )
        .bind(project_id.as_str())
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(row_to_festival_match).collect()
    }

    pub async fn festival_matches_count(&self, project_id: &ProjectId) -> Result<i64> {
        let n: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM festival_matches WHERE project_id = ?")
                .bind(project_id.as_str())
                .fetch_one(&self.pool)
                .await?;
        Ok(n)
    }
}

fn row_to_festival(row: &SqliteRow) -> Result<Festival> {
    let id: String = row.get("id");
    let tier: String = row.get("tier");

    Ok(Festival {
        id: decode::parse(&id, "festivals.id")?,
        name: row.get("name"),
        location: row.get("location"),
        website_url: row.get("website_url"),
        deadline_early: decode::opt_date(row.get("deadline_early"), "festivals.deadline_early")?,
        deadline_regular: decode::opt_date(
            row.get("deadline_regular"),
            "festivals.deadline_regular",
        )?,
        deadline_late: decode::opt_date(row.get("deadline_late"), "festivals.deadline_late")?,
        fee_early: row.get("fee_early"),
        fee_regular: row.get("fee_regular"),
        fee_late: row.get("fee_late"),
        currency: row.get("currency"),
        tier: decode::parse(&tier, "festivals.tier")?,
        genres: json::decode(row.get("genres_json"))?,
        eligibility_criteria: json::decode(row.get("eligibility_json"))?,
        awards: json::decode(row.get("awards_json"))?,
        prestige_score: row.get("prestige_score"),
        scraped_at: row.get("scraped_at"),
        updated_at: row.get("updated_at"),
    })
}

fn row_to_festival_match(row: &SqliteRow) -> Result<FestivalMatch> {
    let project_id: String = row.get("project_id");
    let festival_id: String = row.get("festival_id");
    let quality: String = row.get("quality");
    let status: String = row.get("status");
    let score: i64 = row.get("score");

    Ok(FestivalMatch {
        id: row.get("id"),
        project_id: decode::parse(&project_id, "festival_matches.project_id")?,
        festival_id: decode::parse(&festival_id, "festival_matches.festival_id")?,
        score: score.clamp(0, 100) as u8,
        quality: decode::parse(&quality, "festival_matches.quality")?,
        reasoning: row.get("reasoning"),
        details: json::decode(row.get("details_json"))?,
        status: decode::parse(&status, "festival_matches.status")?,
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[tokio::test]
    async fn test_list_open_uses_any_deadline() {
        let db = FilmDb::open_in_memory().await.unwrap();

        let mut closed = Festival::new("Closed Fest", "Boise, ID", FestivalTier::Regional);
        closed.deadline_regular = Some(date(2026, 1, 1));
        let mut late_only = Festival::new("Late Fest", "Austin, TX", FestivalTier::Genre);
        late_only.deadline_early = Some(date(2026, 1, 1));
        late_only.deadline_late = Some(date(2026, 12, 1));
        let undated = Festival::new("Undated", "Online", FestivalTier::Online);

        for fest in [&closed, &late_only, &undated] {
            db.festivals_get_or_create(fest).await.unwrap();
        }

        let open = db.festivals_list_open(date(2026, 10, 18)).await.unwrap();
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].name, "Late Fest");
        assert_eq!(db.festivals_count().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_match_insert_and_cascade() {
        let db = FilmDb::open_in_memory().await.unwrap();
        let project = Project::new("Short", ProjectType::Short, "drama");
        db.projects_insert(&project).await.unwrap();
        let (fest, created) = db
            .festivals_get_or_create(&Festival::new(
                "Showcase",
                "Various Cities",
                FestivalTier::Regional,
            ))
            .await
            .unwrap();
        assert!(created);

        let new_match = NewMatch {
            score: 91,
            reasoning: "Strategy: fits".into(),
            details: serde_json::Map::new(),
        };
        let created = db
            .festival_match_insert(
                &project.id,
                &fest.id,
                &new_match,
                FestivalMatchStatus::Considering,
            )
            .await
            .unwrap();
        assert_eq!(created.quality, MatchQuality::Perfect);

        let listed = db.festival_matches_for_project(&project.id).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].festival_id, fest.id);

        db.projects_delete(&project.id).await.unwrap();
        assert_eq!(db.festival_matches_count(&project.id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_preferences_roundtrip() {
        let db = FilmDb::open_in_memory().await.unwrap();
        let project = Project::new("Short", ProjectType::Short, "drama");
        db.projects_insert(&project).await.unwrap();

        let prefs = FestivalPreferences {
            preferred_tiers: vec![FestivalTier::Regional, FestivalTier::Online],
            max_entry_fee: Some(30.0),
            lead_time_days: 14,
        };
        db.festival_preferences_set(&project.id, &prefs).await.unwrap();

        let loaded = db.festival_preferences_get(&project.id).await.unwrap().unwrap();
        assert_eq!(loaded.preferred_tiers, prefs.preferred_tiers);
        assert_eq!(loaded.max_entry_fee, Some(30.0));
        assert_eq!(loaded.lead_time_days, 14);
    }
}
