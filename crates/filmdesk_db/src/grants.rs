//! Grant catalog, grant preferences and grant matches.

use crate::error::{DbError, Result};
use crate::types::*;
use crate::{decode, json, FilmDb};
use chrono::NaiveDate;
use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Row, Sqlite};
use tracing::{debug, info};

impl FilmDb {
    // ========================================================================
    // Catalog
    // ========================================================================

    /// Insert a grant unless one with the same (title, organization) exists.
    ///
    /// Returns the stored grant and whether it was created by this call.
    pub async fn grants_get_or_create(&self, grant: &Grant) -> Result<(Grant, bool)> {
        let rows = sqlx::query(
            r#"
            INSERT INTO grants (
                id, title, organization, url, deadline, amount_min, amount_max, currency,
                grant_type, funding_type, eligibility_json, location_json, project_types_json,
                description, tags_json, source, scraped_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(title, organization) DO NOTHING
            "#,
        )
        .bind(grant.id.as_str())
        .bind(&grant.title)
        .bind(&grant.organization)
        .bind(&grant.url)
        .bind(decode::format_date(grant.deadline))
        .bind(grant.amount_min)
        .bind(grant.amount_max)
        .bind(&grant.currency)
        .bind(grant.grant_type.as_str())
        .bind(grant.funding_type.as_str())
        .bind(json::encode(&grant.eligibility_criteria)?)
        .bind(json::encode(&grant.location_restrictions)?)
        .bind(json::encode(&grant.project_types)?)
        .bind(&grant.description)
        .bind(json::encode(&grant.tags)?)
        .bind(&grant.source)
        .bind(grant.scraped_at)
        .bind(grant.updated_at)
        .execute(&self.pool)
        .await?
        .rows_affected();

        let row = sqlx::query("SELECT * FROM grants WHERE title = ? AND organization = ?")
            .bind(&grant.title)
            .bind(&grant.organization)
            .fetch_one(&self.pool)
            .await?;
        let stored = row_to_grant(&row)?;

        if rows > 0 {
            debug!(grant_id = %stored.id, title = %stored.title, "Grant created");
        }
        Ok((stored, rows > 0))
    }

    /// Get a grant by ID
    pub async fn grants_get(&self, id: &GrantId) -> Result<Option<Grant>> {
        let row = sqlx::query("SELECT * FROM grants WHERE id = ?")
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(row_to_grant).transpose()
    }

    pub async fn grants_require(&self, id: &GrantId) -> Result<Grant> {
        self.grants_get(id)
            .await?
            .ok_or_else(|| DbError::not_found(format!("Grant {}", id)))
    }

    /// Grants whose deadline is on or after `today`, soonest first.
    pub async fn grants_list_open(&self, today: NaiveDate) -> Result<Vec<Grant>> {
        let rows = sqlx::query(
            "SELECT * FROM grants WHERE deadline >= ? ORDER BY deadline ASC, title ASC",
        )
        .bind(decode::format_date(today))
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(row_to_grant).collect()
    }

    /// Catalog listing, soonest deadline first.
    pub async fn grants_list(&self, filter: &GrantFilter) -> Result<Vec<Grant>> {
        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new("SELECT * FROM grants WHERE 1 = 1");

        if let Some(today) = filter.open_on {
            qb.push(" AND deadline >= ").push_bind(decode::format_date(today));
        }
        if let Some(text) = filter.search.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
            let needle = text.to_lowercase();
            qb.push(" AND (instr(lower(title), ")
                .push_bind(needle.clone())
                .push(") > 0 OR instr(lower(organization), ")
                .push_bind(needle.clone())
                .push(") > 0 OR instr(lower(description), ")
                .push_bind(needle)
                .push(") > 0)");
        }
        if let Some(grant_type) = filter.grant_type {
            qb.push(" AND grant_type = ").push_bind(grant_type.as_str());
        }
        if let Some(funding_type) = filter.funding_type {
            qb.push(" AND funding_type = ").push_bind(funding_type.as_str());
        }
        if let Some(min) = filter.min_amount {
            qb.push(" AND (amount_min IS NULL OR amount_min >= ")
                .push_bind(min)
                .push(")");
        }
        if let Some(max) = filter.max_amount {
            qb.push(" AND (amount_max IS NULL OR amount_max <= ")
                .push_bind(max)
                .push(")");
        }
        qb.push(" ORDER BY deadline ASC, title ASC");
        if let Some(limit) = filter.limit {
            qb.push(" LIMIT ").push_bind(limit as i64);
        }

        let rows = qb.build().fetch_all(&self.pool).await?;
        rows.iter().map(row_to_grant).collect()
    }

    pub async fn grants_count(&self) -> Result<i64> {
        let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM grants")
            .fetch_one(&self.pool)
            .await?;
        Ok(n)
    }

    /// Delete a grant; its matches go with it.
    pub async fn grants_delete(&self, id: &GrantId) -> Result<bool> {
        let rows = sqlx::query("DELETE FROM grants WHERE id = ?")
            .bind(id.as_str())
            .execute(&self.pool)
            .await?
            .rows_affected();
        Ok(rows > 0)
    }

    // ========================================================================
    // Preferences
    // ========================================================================

    /// Preferences for a project. Absence is normal, not an error.
    pub async fn grant_preferences_get(
        &self,
        project_id: &ProjectId,
    ) -> Result<Option<GrantPreferences>> {
        let row = sqlx::query("SELECT * FROM grant_preferences WHERE project_id = ?")
            .bind(project_id.as_str())
            .fetch_optional(&self.pool)
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let lead_time: i64 = row.get("lead_time_days");
        Ok(Some(GrantPreferences {
            preferred_funding_types: json::decode(row.get("preferred_funding_types_json"))?,
            funding_priorities: json::decode(row.get("funding_priorities_json"))?,
            min_amount: row.get("min_amount"),
            max_amount: row.get("max_amount"),
            preferred_regions: json::decode(row.get("preferred_regions_json"))?,
            lead_time_days: u32::try_from(lead_time.max(0)).unwrap_or(DEFAULT_LEAD_TIME_DAYS),
        }))
    }

    /// Create or replace a project's grant preferences.
    pub async fn grant_preferences_set(
        &self,
        project_id: &ProjectId,
        prefs: &GrantPreferences,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO grant_preferences (
                project_id, preferred_funding_types_json, funding_priorities_json,
                min_amount, max_amount, preferred_regions_json, lead_time_days, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(project_id) DO UPDATE SET
                preferred_funding_types_json = excluded.preferred_funding_types_json,
                funding_priorities_json = excluded.funding_priorities_json,
                min_amount = excluded.min_amount,
                max_amount = excluded.max_amount,
                preferred_regions_json = excluded.preferred_regions_json,
                lead_time_days = excluded.lead_time_days,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(project_id.as_str())
        .bind(json::encode(&prefs.preferred_funding_types)?)
        .bind(json::encode(&prefs.funding_priorities)?)
        .bind(prefs.min_amount)
        .bind(prefs.max_amount)
        .bind(json::encode(&prefs.preferred_regions)?)
        .bind(i64::from(prefs.lead_time_days))
        .bind(Self::now_millis())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    // ========================================================================
    // Matches
    // ========================================================================

    pub async fn grant_match_exists(
        &self,
        project_id: &ProjectId,
        grant_id: &GrantId,
    ) -> Result<bool> {
        let found: Option<i64> =
            sqlx::query_scalar("SELECT 1 FROM grant_matches WHERE project_id = ? AND grant_id = ?")
                .bind(project_id.as_str())
                .bind(grant_id.as_str())
                .fetch_optional(&self.pool)
                .await?;
        Ok(found.is_some())
    }

    /// Insert a match. A second match for the same pair is a
    /// [`DbError::Constraint`].
    pub async fn grant_match_insert(
        &self,
        project_id: &ProjectId,
        grant_id: &GrantId,
        new_match: &NewMatch,
        status: GrantMatchStatus,
    ) -> Result<GrantMatch> {
        let now = Self::now_millis();
        let quality = MatchQuality::from_score(new_match.score);

        let id = sqlx::query(
            r#"
            INSERT INTO grant_matches (
                project_id, grant_id, score, quality, reasoning, details_json, status,
                created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(project_id.as_str())
        .bind(grant_id.as_str())
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
            grant_id = %grant_id,
            score = new_match.score,
            quality = %quality,
            "Grant match created"
        );

        Ok(GrantMatch {
            id,
            project_id: project_id.clone(),
            grant_id: grant_id.clone(),
            score: new_match.score,
            quality,
            reasoning: new_match.reasoning.clone(),
            details: new_match.details.clone(),
            status,
            created_at: now,
            updated_at: now,
        })
    }

    /// Matches for a project, best score first.
    pub async fn grant_matches_for_project(
        &self,
        project_id: &ProjectId,
    ) -> Result<Vec<GrantMatch>> {
        let rows = sqlx::query(
            r#"
            SELECT m.* FROM grant_matches m
            JOIN grants g ON g.id = m.grant_id
            WHERE m.project_id = ?
            ORDER BY m.score DESC, g.deadline ASC
            "#,
        )
        .bind(project_id.as_str())
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(row_to_grant_match).collect()
    }

    pub async fn grant_matches_count(&self, project_id: &ProjectId) -> Result<i64> {
        let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM grant_matches WHERE project_id = ?")
            .bind(project_id.as_str())
            .fetch_one(&self.pool)
            .await?;
        Ok(n)
    }
}

fn row_to_grant(row: &SqliteRow) -> Result<Grant> {
    let id: String = row.get("id");
    let deadline: String = row.get("deadline");
    let grant_type: String = row.get("grant_type");
    let funding_type: String = row.get("funding_type");

    Ok(Grant {
        id: decode::parse(&id, "grants.id")?,
        title: row.get("title"),
        organization: row.get("organization"),
        url: row.get("url"),
        deadline: decode::date(&deadline, "grants.deadline")?,
        amount_min: row.get("amount_min"),
        amount_max: row.get("amount_max"),
        currency: row.get("currency"),
        grant_type: decode::parse(&grant_type, "grants.grant_type")?,
        funding_type: decode::parse(&funding_type, "grants.funding_type")?,
        eligibility_criteria: json::decode(row.get("eligibility_json"))?,
        location_restrictions: json::decode(row.get("location_json"))?,
        project_types: json::decode(row.get("project_types_json"))?,
        description: row.get("description"),
        tags: json::decode(row.get("tags_json"))?,
        source: row.get("source"),
        scraped_at: row.get("scraped_at"),
        updated_at: row.get("updated_at"),
    })
}

fn row_to_grant_match(row: &SqliteRow) -> Result<GrantMatch> {
    let project_id: String = row.get("project_id");
    let grant_id: String = row.get("grant_id");
    let quality: String = row.get("quality");
    let status: String = row.get("status");
    let score: i64 = row.get("score");

    Ok(GrantMatch {
        id: row.get("id"),
        project_id: decode::parse(&project_id, "grant_matches.project_id")?,
        grant_id: decode::parse(&grant_id, "grant_matches.grant_id")?,
        score: score.clamp(0, 100) as u8,
        quality: decode::parse(&quality, "grant_matches.quality")?,
        reasoning: row.get("reasoning"),
        details: json::decode(row.get("details_json"))?,
        status: decode::parse(&status, "grant_matches.status")?,
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}
