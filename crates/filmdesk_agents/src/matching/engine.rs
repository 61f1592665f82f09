//! Discovery and quick-apply orchestration.

use super::filters::{festival_passes, grant_passes};
use super::noise::{NoiseSource, ZeroNoise, FESTIVAL_NOISE_CEILING, GRANT_NOISE_CEILING};
use super::scoring::{clamp_score, FestivalScorer, GrantScorer, ScoreCard, ScoringRule};
use crate::error::{AgentError, Result};
use chrono::NaiveDate;
use filmdesk_db::{
    DbError, Feature, FestivalMatchStatus, FilmDb, GrantId, GrantMatch, GrantMatchStatus, NewMatch,
    Project, ProjectId,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info};

/// Minimum score a discovered candidate needs to be stored.
pub const DISCOVERY_THRESHOLD: u8 = 50;

/// Which candidate pool a discovery run covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscoveryTarget {
    Grants,
    Festivals,
}

impl DiscoveryTarget {
    fn feature(self) -> Feature {
        match self {
            Self::Grants => Feature::Grants,
            Self::Festivals => Feature::Festivals,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DiscoverySummary {
    pub matches_found: usize,
}

/// Scores candidates for one project and stores the good ones.
#[derive(Clone)]
pub struct MatchEngine {
    db: FilmDb,
    noise: Arc<dyn NoiseSource>,
    today: Option<NaiveDate>,
}

impl std::fmt::Debug for MatchEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MatchEngine")
            .field("db", &self.db)
            .field("today", &self.today)
            .finish_non_exhaustive()
    }
}

impl MatchEngine {
    /// Engine without score noise.
    pub fn new(db: FilmDb) -> Self {
        Self {
            db,
            noise: Arc::new(ZeroNoise),
            today: None,
        }
    }

    pub fn with_noise(mut self, noise: Arc<dyn NoiseSource>) -> Self {
        self.noise = noise;
        self
    }

    /// Pin the calendar date used for deadline checks.
    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = Some(today);
        self
    }

    pub fn db(&self) -> &FilmDb {
        &self.db
    }

    fn today(&self) -> NaiveDate {
        self.today
            .unwrap_or_else(|| chrono::Utc::now().date_naive())
    }

    fn with_bonus(&self, card: ScoreCard, ceiling: u8) -> NewMatch {
        let bonus = self.noise.bonus(ceiling);
        NewMatch {
            score: clamp_score(i32::from(card.score) + i32::from(bonus)),
            reasoning: card.reasoning,
            details: card.details,
        }
    }

    /// Score open grants for `project` and store those at or above the
    /// threshold. Returns the number of matches created.
    pub async fn discover_grants(&self, project: &Project) -> Result<usize> {
        let today = self.today();
        let prefs = self.db.grant_preferences_get(&project.id).await?;
        let candidates = self.db.grants_list_open(today).await?;
        let pool_size = candidates.len();

        let mut created = 0;
        for grant in candidates {
            if let Some(prefs) = &prefs {
                if !grant_passes(&grant, prefs, today) {
                    continue;
                }
            }
            if self.db.grant_match_exists(&project.id, &grant.id).await? {
                continue;
            }

            let card = GrantScorer.score(&grant, project, prefs.as_ref());
            let new_match = self.with_bonus(card, GRANT_NOISE_CEILING);
            if new_match.score < DISCOVERY_THRESHOLD {
                debug!(grant_id = %grant.id, score = new_match.score, "Grant below threshold");
                continue;
            }

            match self
                .db
                .grant_match_insert(&project.id, &grant.id, &new_match, GrantMatchStatus::Suggested)
                .await
            {
                Ok(_) => created += 1,
                Err(DbError::Constraint(_)) => continue,
                Err(e) => return Err(e.into()),
            }
        }

        info!(project_id = %project.id, pool_size, created, "Grant discovery finished");
        Ok(created)
    }

    /// Festival counterpart of [`discover_grants`](Self::discover_grants).
    pub async fn discover_festivals(&self, project: &Project) -> Result<usize> {
        let today = self.today();
        let prefs = self.db.festival_preferences_get(&project.id).await?;
        let candidates = self.db.festivals_list_open(today).await?;
        let pool_size = candidates.len();

        let mut created = 0;
        for festival in candidates {
            if !festival_passes(&festival, prefs.as_ref(), today) {
                continue;
            }
            if self.db.festival_match_exists(&project.id, &festival.id).await? {
                continue;
            }

            let card = FestivalScorer.score(&festival, project, prefs.as_ref());
            let new_match = self.with_bonus(card, FESTIVAL_NOISE_CEILING);
            if new_match.score < DISCOVERY_THRESHOLD {
                debug!(
                    festival_id = %festival.id,
                    score = new_match.score,
                    "Festival below threshold"
                );
                continue;
            }

            match self
                .db
                .festival_match_insert(
                    &project.id,
                    &festival.id,
                    &new_match,
                    FestivalMatchStatus::Considering,
                )
                .await
            {
                Ok(_) => created += 1,
                Err(DbError::Constraint(_)) => continue,
                Err(e) => return Err(e.into()),
            }
        }

        info!(project_id = %project.id, pool_size, created, "Festival discovery finished");
        Ok(created)
    }

    /// Manually attach a grant to a project as `interested`.
    ///
    /// Skips the threshold and preference filters.
    pub async fn quick_apply_grant(
        &self,
        project_id: &ProjectId,
        grant_id: &GrantId,
    ) -> Result<GrantMatch> {
        let project = self.db.projects_require(project_id).await?;
        let grant = self.db.grants_require(grant_id).await?;

        if self.db.grant_match_exists(project_id, grant_id).await? {
            return Err(AgentError::validation("This grant is already in your project matches"));
        }

        let card = GrantScorer.score(&grant, &project, None);
        let new_match = NewMatch {
            score: card.score,
            reasoning: card.reasoning,
            details: card.details,
        };
        let stored = self
            .db
            .grant_match_insert(project_id, grant_id, &new_match, GrantMatchStatus::Interested)
            .await
            .map_err(|e| match e {
                DbError::Constraint(_) => {
                    AgentError::validation("This grant is already in your project matches")
                }
                other => other.into(),
            })?;
        Ok(stored)
    }

    /// Run discovery for a project on demand.
    pub async fn trigger_discovery(
        &self,
        project_id: &ProjectId,
        target: DiscoveryTarget,
    ) -> Result<DiscoverySummary> {
        let project = self.db.projects_require(project_id).await?;

        if !project.has_feature(target.feature()) {
            return Err(AgentError::precondition(format!(
                "The {} feature is not enabled for this project",
                target.feature()
            )));
        }
        if !project.setup_completed {
            return Err(AgentError::precondition(
                "Complete project setup before running discovery",
            ));
        }

        let matches_found = match target {
            DiscoveryTarget::Grants => self.discover_grants(&project).await?,
            DiscoveryTarget::Festivals => self.discover_festivals(&project).await?,
        };
        Ok(DiscoverySummary { matches_found })
    }
}
