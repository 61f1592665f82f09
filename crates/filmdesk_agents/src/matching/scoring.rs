//! Rule-based scoring of candidates against a project.
//!
//! Rules are evaluated in a fixed order. Only the first three triggered
//! reasons make it into the reasoning text, so reordering rules changes
//! user-visible output.

use filmdesk_db::{
    Festival, FestivalPreferences, FestivalTier, Grant, GrantPreferences, GrantType, Location,
    Project, ProjectStage, ProjectType,
};
use serde_json::{Map, Value};

/// Every candidate starts here.
pub const BASE_SCORE: i32 = 20;

const MAX_REASONS: usize = 3;

const SOCIAL_THEMES: [&str; 5] = [
    "social_justice",
    "environmental",
    "diversity",
    "community",
    "education",
];
const IMPACT_KEYWORDS: [&str; 4] = ["social", "community", "diversity", "impact"];
const DIVERSITY_KEYWORDS: [&str; 6] = [
    "diversity",
    "inclusion",
    "underrepresented",
    "emerging",
    "female",
    "poc",
];
const GENRE_KEYS: [&str; 3] = ["genre", "type", "category"];
const US_ALIASES: [&str; 3] = ["usa", "united states", "us"];

/// Result of scoring one candidate.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreCard {
    /// Clamped to 0..=100
    pub score: u8,
    /// Triggered reasons in evaluation order
    pub reasons: Vec<String>,
    /// Triggered predicates, e.g. `{"budget_match": true}`
    pub details: Map<String, Value>,
    pub reasoning: String,
}

impl ScoreCard {
    pub fn has_detail(&self, key: &str) -> bool {
        self.details.contains_key(key)
    }
}

/// A pure scoring function for one candidate type.
pub trait ScoringRule {
    type Candidate;
    type Preferences;

    fn score(
        &self,
        candidate: &Self::Candidate,
        project: &Project,
        preferences: Option<&Self::Preferences>,
    ) -> ScoreCard;
}

/// Accumulates points, reasons and details while rules run.
struct Tally {
    points: i32,
    reasons: Vec<String>,
    details: Map<String, Value>,
}

impl Tally {
    fn new() -> Self {
        Self {
            points: BASE_SCORE,
            reasons: Vec::new(),
            details: Map::new(),
        }
    }

    fn award(&mut self, points: i32, reason: impl Into<String>, detail: &str) {
        self.points += points;
        self.reasons.push(reason.into());
        self.details.insert(detail.to_string(), Value::Bool(true));
    }

    /// Points without a reason line.
    fn award_silently(&mut self, points: i32, detail: &str) {
        self.points += points;
        self.details.insert(detail.to_string(), Value::Bool(true));
    }

    fn finish(self, prefix: &str, fallback: &str) -> ScoreCard {
        let reasoning = if self.reasons.is_empty() {
            fallback.to_string()
        } else {
            let top: Vec<&str> = self
                .reasons
                .iter()
                .take(MAX_REASONS)
                .map(String::as_str)
                .collect();
            format!("{}{}", prefix, top.join("; "))
        };
        ScoreCard {
            score: clamp_score(self.points),
            reasons: self.reasons,
            details: self.details,
            reasoning,
        }
    }
}

pub fn clamp_score(points: i32) -> u8 {
    points.clamp(0, 100) as u8
}

fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|needle| haystack.contains(needle))
}

fn has_social_theme(project: &Project) -> bool {
    project
        .themes
        .iter()
        .any(|theme| SOCIAL_THEMES.contains(&theme.as_str()))
}

/// Lowercase text of a JSON value; strings without quotes.
fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.to_lowercase(),
        other => other.to_string().to_lowercase(),
    }
}

// ============================================================================
// Grants
// ============================================================================

/// Scores grants: type, genre, budget, themes, diversity, location, stage,
/// then preference bonuses.
#[derive(Debug, Clone, Copy, Default)]
pub struct GrantScorer;

impl GrantScorer {
    pub const REASONING_PREFIX: &'static str = "Strong match because: ";
    pub const FALLBACK_REASONING: &'static str =
        "Basic eligibility match - review grant details for specific requirements";
}

impl ScoringRule for GrantScorer {
    type Candidate = Grant;
    type Preferences = GrantPreferences;

    fn score(
        &self,
        grant: &Grant,
        project: &Project,
        preferences: Option<&GrantPreferences>,
    ) -> ScoreCard {
        let mut tally = Tally::new();

        if grant.project_types.contains(&project.project_type) {
            tally.award(
                15,
                format!("Project type '{}' is supported", project.project_type),
                "project_type_match",
            );
        }

        if !project.genres.is_empty() && grant_genre_hit(grant, &project.genres) {
            tally.award(10, "Genre alignment found in eligibility criteria", "genre_match");
        }

        if let (Some(budget), Some(min), Some(max)) =
            (project.estimated_budget, grant.amount_min, grant.amount_max)
        {
            if min <= budget && budget <= max {
                tally.award(15, "Budget aligns with grant amount range", "budget_match");
            } else if min <= budget * 0.5 {
                tally.award(
                    10,
                    "Grant could cover significant portion of budget",
                    "partial_budget_match",
                );
            }
        }

        let description = grant.description.to_lowercase();
        if has_social_theme(project) && contains_any(&description, &IMPACT_KEYWORDS) {
            tally.award(
                10,
                "Project themes align with grant's social impact focus",
                "theme_match",
            );
        }

        if !project.diversity_flags.is_empty() && contains_any(&description, &DIVERSITY_KEYWORDS) {
            tally.award(
                10,
                "Project diversity elements match grant priorities",
                "diversity_match",
            );
        }

        score_grant_location(
            &mut tally,
            &grant.location_restrictions,
            &project.production_location,
        );

        if let Some(stage) = stage_alignment(grant.grant_type, project.stage) {
            tally.award(
                12,
                format!("Grant type aligns with project {} stage", stage),
                "stage_match",
            );
        }

        if let Some(prefs) = preferences {
            if prefs.funding_priorities.contains(&grant.grant_type) {
                tally.award(8, "Matches your funding priorities", "priority_match");
            }
            // Any preferred region earns the bonus; regions are not compared.
            if !prefs.preferred_regions.is_empty() {
                tally.award_silently(5, "region_preference");
            }
        }

        tally.finish(Self::REASONING_PREFIX, Self::FALLBACK_REASONING)
    }
}

/// First eligibility entry whose key names a genre/type/category and whose
/// value mentions one of the project genres.
fn grant_genre_hit(grant: &Grant, genres: &[String]) -> bool {
    let genres: Vec<String> = genres.iter().map(|g| g.to_lowercase()).collect();
    grant.eligibility_criteria.iter().any(|(key, value)| {
        let key = key.to_lowercase();
        if !contains_any(&key, &GENRE_KEYS) {
            return false;
        }
        let text = value_text(value);
        genres.iter().any(|genre| text.contains(genre.as_str()))
    })
}

fn score_grant_location(tally: &mut Tally, grant: &Location, project: &Location) {
    if grant.is_empty() || project.is_empty() {
        return;
    }
    match (&grant.state, &project.state) {
        (Some(grant_state), Some(project_state)) => {
            if grant_state.eq_ignore_ascii_case(project_state) {
                tally.award(15, "Perfect location match", "location_match");
            }
        }
        _ => {
            let grant_country = grant.country.as_deref().unwrap_or_default().to_lowercase();
            let project_country = project.country.as_deref().unwrap_or_default().to_lowercase();
            if grant_country == "united states" && US_ALIASES.contains(&project_country.as_str()) {
                tally.award(8, "Country eligibility confirmed", "country_match");
            }
        }
    }
}

/// Stage label when the grant's funding stage fits the project's stage.
fn stage_alignment(grant_type: GrantType, stage: ProjectStage) -> Option<&'static str> {
    match (grant_type, stage) {
        (GrantType::Development, ProjectStage::Development) => Some("development"),
        (GrantType::Production, ProjectStage::PreProduction | ProjectStage::Production) => {
            Some("production")
        }
        (GrantType::PostProduction, ProjectStage::PostProduction) => Some("post-production"),
        _ => None,
    }
}

// ============================================================================
// Festivals
// ============================================================================

/// Scores festivals: genre, type/tier fit, themes, diversity, budget tier,
/// location, prestige, then preference bonuses.
#[derive(Debug, Clone, Copy, Default)]
pub struct FestivalScorer;

impl FestivalScorer {
    pub const REASONING_PREFIX: &'static str = "Strategy: ";
    pub const FALLBACK_REASONING: &'static str = "General festival compatibility";
    pub const PRESTIGE_THRESHOLD: i32 = 80;
}

impl ScoringRule for FestivalScorer {
    type Candidate = Festival;
    type Preferences = FestivalPreferences;

    fn score(
        &self,
        festival: &Festival,
        project: &Project,
        preferences: Option<&FestivalPreferences>,
    ) -> ScoreCard {
        let mut tally = Tally::new();
        let festival_genres: Vec<String> =
            festival.genres.iter().map(|g| g.to_lowercase()).collect();

        let genre_hit = std::iter::once(&project.genre)
            .chain(project.genres.iter())
            .map(|g| g.to_lowercase())
            .find(|g| !g.is_empty() && festival_genres.contains(g));
        if let Some(genre) = genre_hit {
            tally.award(15, format!("Genre ({}) matches festival focus", genre), "genre_match");
        }

        match (project.project_type, festival.tier) {
            (ProjectType::Feature, FestivalTier::AList) => {
                tally.award(15, "Feature film suitable for A-list festival", "tier_match");
            }
            (ProjectType::Short, FestivalTier::Regional | FestivalTier::Genre) => {
                tally.award(15, "Short film well-suited for regional/genre festival", "tier_match");
            }
            (ProjectType::Documentary, _) if festival_genres.iter().any(|g| g == "documentary") => {
                tally.award(15, "Documentary matches festival programming", "tier_match");
            }
            _ => {}
        }

        let programme = festival_programme_text(festival);
        if has_social_theme(project) && contains_any(&programme, &IMPACT_KEYWORDS) {
            tally.award(10, "Project themes fit the festival's impact programming", "theme_match");
        }

        if !project.diversity_flags.is_empty() && contains_any(&programme, &DIVERSITY_KEYWORDS) {
            tally.award(10, "Festival champions underrepresented voices", "diversity_match");
        }

        if project.budget_range.is_independent()
            && matches!(
                festival.tier,
                FestivalTier::Regional | FestivalTier::Online | FestivalTier::Student
            )
        {
            tally.award(10, "Budget-friendly festival for independent production", "budget_match");
        }

        if let Some(state) = project.production_location.state.as_deref() {
            if festival.location.to_lowercase().contains(&state.to_lowercase()) {
                tally.award(12, "Festival is held in your production state", "location_match");
            }
        }

        if festival.prestige_score >= Self::PRESTIGE_THRESHOLD {
            tally.award(8, "High-prestige festival for maximum exposure", "prestige_match");
        }

        if let Some(prefs) = preferences {
            if prefs.preferred_tiers.contains(&festival.tier) {
                tally.award(8, "Matches your preferred festival tiers", "tier_preference");
            }
        }

        tally.finish(Self::REASONING_PREFIX, Self::FALLBACK_REASONING)
    }
}

/// Lowercase text of eligibility criteria (keys and values) and awards.
fn festival_programme_text(festival: &Festival) -> String {
    let mut parts: Vec<String> = Vec::new();
    for (key, value) in &festival.eligibility_criteria {
        parts.push(key.to_lowercase());
        parts.push(value_text(value));
    }
    parts.extend(festival.awards.iter().map(|a| a.to_lowercase()));
    parts.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use filmdesk_db::{BudgetRange, FundingType};
    use serde_json::json;

    fn deadline() -> NaiveDate {
        NaiveDate::from_ymd_opt(2030, 1, 1).unwrap()
    }

    fn bare_project() -> Project {
        let mut project = Project::new("Bare", ProjectType::Commercial, "");
        project.stage = ProjectStage::Completed;
        project.budget_range = BudgetRange::High;
        project
    }

    #[test]
    fn empty_attributes_score_the_base() {
        let grant = Grant::new("Empty", "Org", deadline());
        let card = GrantScorer.score(&grant, &bare_project(), None);
        assert_eq!(card.score, 20);
        assert!(card.reasons.is_empty());
        assert_eq!(card.reasoning, GrantScorer::FALLBACK_REASONING);

        let mut festival = Festival::new("Empty", "", FestivalTier::Genre);
        festival.prestige_score = 0;
        let card = FestivalScorer.score(&festival, &bare_project(), None);
        assert_eq!(card.score, 20);
        assert_eq!(card.reasoning, FestivalScorer::FALLBACK_REASONING);
    }

    #[test]
    fn documentary_production_scenario() {
        let mut project = Project::new("Doc", ProjectType::Documentary, "documentary");
        project.estimated_budget = Some(40_000.0);
        project.stage = ProjectStage::Production;

        let mut grant = Grant::new("Doc Fund", "Alliance", deadline());
        grant.project_types = vec![ProjectType::Documentary];
        grant.amount_min = Some(10_000.0);
        grant.amount_max = Some(50_000.0);
        grant.grant_type = GrantType::Production;

        let card = GrantScorer.score(&grant, &project, None);
        assert!(card.score >= 62, "score was {}", card.score);
        assert_eq!(card.score, 62);

        let top: Vec<String> = card.reasons.iter().take(3).map(|r| r.to_lowercase()).collect();
        assert!(top.iter().any(|r| r.contains("project type")));
        assert!(top.iter().any(|r| r.contains("budget aligns")));
        assert!(card.reasoning.starts_with("Strong match because: "));
        assert!(card.has_detail("stage_match"));
    }

    #[test]
    fn partial_budget_match() {
        let mut project = bare_project();
        project.estimated_budget = Some(200_000.0);
        let mut grant = Grant::new("Small", "Org", deadline());
        grant.amount_min = Some(50_000.0);
        grant.amount_max = Some(80_000.0);

        let card = GrantScorer.score(&grant, &project, None);
        assert_eq!(card.score, 30);
        assert!(card.has_detail("partial_budget_match"));
        assert!(!card.has_detail("budget_match"));
    }

    #[test]
    fn budget_rule_needs_both_bounds() {
        let mut project = bare_project();
        project.estimated_budget = Some(20_000.0);
        let mut grant = Grant::new("Open-ended", "Org", deadline());
        grant.amount_min = Some(1_000.0);

        assert_eq!(GrantScorer.score(&grant, &project, None).score, 20);
    }

    #[test]
    fn genre_hit_uses_genre_like_keys_only() {
        let mut project = bare_project();
        project.genres = vec!["Horror".into()];

        let mut grant = Grant::new("Genre", "Org", deadline());
        grant.eligibility_criteria = json!({"notes": "horror welcome"})
            .as_object()
            .unwrap()
            .clone();
        assert!(!GrantScorer.score(&grant, &project, None).has_detail("genre_match"));

        grant.eligibility_criteria = json!({"Film_Category": ["Horror", "Sci-Fi"]})
            .as_object()
            .unwrap()
            .clone();
        let card = GrantScorer.score(&grant, &project, None);
        assert!(card.has_detail("genre_match"));
        assert_eq!(card.score, 30);
    }

    #[test]
    fn themes_and_diversity_read_the_description() {
        let mut project = bare_project();
        project.themes = vec!["environmental".into()];
        project.diversity_flags = vec!["female_director".into()];

        let mut grant = Grant::new("Impact", "Org", deadline());
        grant.description = "Supports community IMPACT and emerging female voices".into();

        let card = GrantScorer.score(&grant, &project, None);
        assert!(card.has_detail("theme_match"));
        assert!(card.has_detail("diversity_match"));
        assert_eq!(card.score, 40);
    }

    #[test]
    fn location_state_beats_country() {
        let mut project = bare_project();
        project.production_location = Location::new(Some("georgia"), Some("USA"));

        let mut grant = Grant::new("State", "Org", deadline());
        grant.location_restrictions = Location::new(Some("Georgia"), Some("United States"));
        let card = GrantScorer.score(&grant, &project, None);
        assert!(card.has_detail("location_match"));
        assert_eq!(card.score, 35);

        // Both declare a state but differ: no country fallback.
        grant.location_restrictions = Location::new(Some("Texas"), Some("United States"));
        assert_eq!(GrantScorer.score(&grant, &project, None).score, 20);

        grant.location_restrictions = Location::new(None, Some("United States"));
        let card = GrantScorer.score(&grant, &project, None);
        assert!(card.has_detail("country_match"));
        assert_eq!(card.score, 28);
    }

    #[test]
    fn stage_alignment_table() {
        assert_eq!(
            stage_alignment(GrantType::Production, ProjectStage::PreProduction),
            Some("production")
        );
        assert_eq!(
            stage_alignment(GrantType::PostProduction, ProjectStage::PostProduction),
            Some("post-production")
        );
        assert_eq!(stage_alignment(GrantType::Development, ProjectStage::Production), None);
        assert_eq!(stage_alignment(GrantType::Distribution, ProjectStage::Completed), None);
    }

    #[test]
    fn preference_bonuses() {
        let grant = {
            let mut g = Grant::new("Pref", "Org", deadline());
            g.grant_type = GrantType::Distribution;
            g
        };
        let prefs = GrantPreferences {
            preferred_funding_types: vec![FundingType::Grant],
            funding_priorities: vec![GrantType::Distribution],
            preferred_regions: vec!["Pacific Northwest".into()],
            ..Default::default()
        };

        let card = GrantScorer.score(&grant, &bare_project(), Some(&prefs));
        assert_eq!(card.score, 33);
        assert!(card.has_detail("region_preference"));
        // The region bonus adds no reason line.
        assert_eq!(card.reasons, vec!["Matches your funding priorities".to_string()]);
    }

    #[test]
    fn reasoning_keeps_first_three_in_order() {
        let mut project = Project::new("Everything", ProjectType::Feature, "drama");
        project.genres = vec!["drama".into()];
        project.estimated_budget = Some(30_000.0);
        project.stage = ProjectStage::Development;
        project.themes = vec!["community".into()];
        project.diversity_flags = vec!["poc".into()];
        project.production_location = Location::new(Some("CA"), Some("USA"));

        let mut grant = Grant::new("Max", "Org", deadline());
        grant.project_types = vec![ProjectType::Feature];
        grant.eligibility_criteria = json!({"genre": "drama"}).as_object().unwrap().clone();
        grant.amount_min = Some(10_000.0);
        grant.amount_max = Some(50_000.0);
        grant.description = "social impact and inclusion".into();
        grant.location_restrictions = Location::new(Some("ca"), None);
        grant.grant_type = GrantType::Development;
        let prefs = GrantPreferences {
            funding_priorities: vec![GrantType::Development],
            preferred_regions: vec!["West".into()],
            ..Default::default()
        };

        let card = GrantScorer.score(&grant, &project, Some(&prefs));
        // 20 + 15 + 10 + 15 + 10 + 10 + 15 + 12 + 8 + 5 = 120, clamped.
        assert_eq!(card.score, 100);
        assert_eq!(card.reasons.len(), 8);
        assert_eq!(
            card.reasoning,
            "Strong match because: Project type 'feature' is supported; \
             Genre alignment found in eligibility criteria; \
             Budget aligns with grant amount range"
        );
    }

    #[test]
    fn festival_scoring_rules() {
        let mut project = Project::new("Shorty", ProjectType::Short, "Drama");
        project.budget_range = BudgetRange::Micro;
        project.production_location = Location::new(Some("TX"), Some("USA"));
        project.themes = vec!["social_justice".into()];
        project.diversity_flags = vec!["lgbtq".into()];

        let mut festival = Festival::new("Regional Showcase", "Austin, TX", FestivalTier::Regional);
        festival.genres = vec!["drama".into(), "short".into()];
        festival.awards = vec!["Community Impact Award".into(), "Emerging Voices".into()];
        festival.prestige_score = 50;

        let prefs = FestivalPreferences {
            preferred_tiers: vec![FestivalTier::Regional],
            ..Default::default()
        };
        let card = FestivalScorer.score(&festival, &project, Some(&prefs));

        // 20 + 15 genre + 15 tier + 10 theme + 10 diversity + 10 budget + 12 state + 8 pref
        assert_eq!(card.score, 100);
        assert!(card.reasoning.starts_with("Strategy: Genre (drama) matches festival focus"));
        assert!(!card.has_detail("prestige_match"));
        assert!(card.has_detail("tier_preference"));
    }

    #[test]
    fn festival_documentary_and_prestige() {
        let mut project = Project::new("Doc", ProjectType::Documentary, "nature");
        project.budget_range = BudgetRange::High;

        let mut festival = Festival::new("Big Fest", "Park City, UT", FestivalTier::AList);
        festival.genres = vec!["Documentary".into()];
        festival.prestige_score = 95;

        let card = FestivalScorer.score(&festival, &project, None);
        assert_eq!(card.score, 20 + 15 + 8);
        assert!(card.has_detail("tier_match"));
        assert!(card.has_detail("prestige_match"));
        assert!(!card.has_detail("genre_match"));
    }
}
