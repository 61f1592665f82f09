//! Domain types for the FilmDesk store.
//!
//! Row-mapping happens in the per-domain modules; these types carry no SQL.

use chrono::{Datelike, NaiveDate};
pub use filmdesk_ids::{BudgetId, FestivalId, GrantId, JobId, ProjectId, ScheduleId, SceneId};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Closed string enum stored as TEXT.
///
/// Generates `as_str`, `parse` (case-insensitive), `ALL`, `Display` and `FromStr`.
macro_rules! string_enum {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident {
            $( $(#[$vmeta:meta])* $variant:ident => $text:literal ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        $vis enum $name {
            $( $(#[$vmeta])* #[serde(rename = $text)] $variant ),+
        }

        impl $name {
            pub const ALL: &'static [Self] = &[$(Self::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $text),+
                }
            }

            pub fn parse(s: &str) -> Option<Self> {
                match s.trim().to_lowercase().as_str() {
                    $($text => Some(Self::$variant),)+
                    _ => None,
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::parse(s).ok_or_else(|| {
                    let valid: Vec<&str> = Self::ALL.iter().map(|v| v.as_str()).collect();
                    format!(
                        "invalid {} '{}' (expected one of: {})",
                        stringify!($name),
                        s,
                        valid.join(", ")
                    )
                })
            }
        }
    };
}

// ============================================================================
// Agent jobs
// ============================================================================

string_enum! {
    /// Lifecycle state of an agent job.
    ///
    /// `queued -> processing -> {completed, failed}`; terminal states are final.
    pub enum JobStatus {
        Queued => "queued",
        Processing => "processing",
        Completed => "completed",
        Failed => "failed",
    }
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

/// A unit of background work.
///
/// `kind` is kept as the raw string the producer supplied so that
/// unregistered kinds survive until dispatch rejects them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub project_id: ProjectId,
    pub kind: String,
    pub status: JobStatus,
    pub input_params: BTreeMap<String, String>,
    pub output_data: Value,
    pub error_message: Option<String>,
    /// Milliseconds since epoch
    pub created_at: i64,
    pub started_at: Option<i64>,
    pub completed_at: Option<i64>,
}

/// Filter for listing jobs. Empty filter lists everything, newest first.
#[derive(Debug, Clone, Default)]
pub struct JobFilter {
    pub status: Option<JobStatus>,
    pub project_id: Option<ProjectId>,
    pub kind: Option<String>,
    pub limit: Option<usize>,
}

// ============================================================================
// Projects (match subjects)
// ============================================================================

string_enum! {
    pub enum ProjectType {
        Feature => "feature",
        Short => "short",
        Documentary => "documentary",
        Series => "series",
        Commercial => "commercial",
        MusicVideo => "music_video",
    }
}

string_enum! {
    pub enum ProjectStage {
        Development => "development",
        PreProduction => "pre_production",
        Production => "production",
        PostProduction => "post_production",
        Completed => "completed",
        Cancelled => "cancelled",
    }
}

string_enum! {
    pub enum BudgetRange {
        Micro => "micro",
        Low => "low",
        Medium => "medium",
        High => "high",
    }
}

impl BudgetRange {
    /// Independent productions (micro and low budgets).
    pub fn is_independent(&self) -> bool {
        matches!(self, Self::Micro | Self::Low)
    }
}

string_enum! {
    /// Optional workspace sections a project can switch on.
    pub enum Feature {
        Grants => "grants",
        Festivals => "festivals",
        Budget => "budget",
        Schedule => "schedule",
        Script => "script",
    }
}

/// State/country pair. Either side may be absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
}

impl Location {
    pub fn new(state: Option<&str>, country: Option<&str>) -> Self {
        let clean = |v: Option<&str>| {
            v.map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };
        Self {
            state: clean(state),
            country: clean(country),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.state.is_none() && self.country.is_none()
    }
}

/// A film project; the subject every grant and festival is matched against.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub id: ProjectId,
    pub name: String,
    pub project_type: ProjectType,
    pub stage: ProjectStage,
    /// Primary genre (lowercase keyword such as "drama")
    pub genre: String,
    pub genres: Vec<String>,
    pub themes: Vec<String>,
    pub diversity_flags: Vec<String>,
    pub estimated_budget: Option<f64>,
    pub budget_range: BudgetRange,
    pub production_location: Location,
    pub features_enabled: Vec<Feature>,
    pub setup_completed: bool,
    /// Object-store path of the uploaded script, if any
    pub script_path: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Project {
    /// New project in development with every feature enabled and setup done.
    pub fn new(
        name: impl Into<String>,
        project_type: ProjectType,
        genre: impl Into<String>,
    ) -> Self {
        let now = chrono::Utc::now().timestamp_millis();
        Self {
            id: ProjectId::new(),
            name: name.into(),
            project_type,
            stage: ProjectStage::Development,
            genre: genre.into().trim().to_lowercase(),
            genres: Vec::new(),
            themes: Vec::new(),
            diversity_flags: Vec::new(),
            estimated_budget: None,
            budget_range: BudgetRange::Low,
            production_location: Location::default(),
            features_enabled: Feature::ALL.to_vec(),
            setup_completed: true,
            script_path: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn has_feature(&self, feature: Feature) -> bool {
        self.features_enabled.contains(&feature)
    }
}

/// Per-project pipeline flags, one row per project.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectProgress {
    pub script_analyzed: bool,
    pub budget_generated: bool,
    pub schedule_generated: bool,
    pub grants_matched: bool,
    pub festivals_matched: bool,
}

string_enum! {
    /// Column of [`ProjectProgress`] a handler sets on success.
    pub enum ProgressFlag {
        ScriptAnalyzed => "script_analyzed",
        BudgetGenerated => "budget_generated",
        ScheduleGenerated => "schedule_generated",
        GrantsMatched => "grants_matched",
        FestivalsMatched => "festivals_matched",
    }
}

// ============================================================================
// Grants
// ============================================================================

string_enum! {
    pub enum GrantType {
        Development => "development",
        Production => "production",
        PostProduction => "post_production",
        Distribution => "distribution",
        General => "general",
    }
}

string_enum! {
    pub enum FundingType {
        Grant => "grant",
        TaxCredit => "tax_credit",
        Rebate => "rebate",
        Loan => "loan",
        Equity => "equity",
        Mixed => "mixed",
    }
}

/// A funding opportunity. Unique by (title, organization).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Grant {
    pub id: GrantId,
    pub title: String,
    pub organization: String,
    pub url: String,
    pub deadline: NaiveDate,
    pub amount_min: Option<f64>,
    pub amount_max: Option<f64>,
    pub currency: String,
    pub grant_type: GrantType,
    pub funding_type: FundingType,
    pub eligibility_criteria: Map<String, Value>,
    pub location_restrictions: Location,
    pub project_types: Vec<ProjectType>,
    pub description: String,
    pub tags: Vec<String>,
    pub source: String,
    pub scraped_at: i64,
    pub updated_at: i64,
}

impl Grant {
    pub fn new(
        title: impl Into<String>,
        organization: impl Into<String>,
        deadline: NaiveDate,
    ) -> Self {
        let now = chrono::Utc::now().timestamp_millis();
        Self {
            id: GrantId::new(),
            title: title.into(),
            organization: organization.into(),
            url: String::new(),
            deadline,
            amount_min: None,
            amount_max: None,
            currency: "USD".to_string(),
            grant_type: GrantType::General,
            funding_type: FundingType::Grant,
            eligibility_criteria: Map::new(),
            location_restrictions: Location::default(),
            project_types: Vec::new(),
            description: String::new(),
            tags: Vec::new(),
            source: "manual".to_string(),
            scraped_at: now,
            updated_at: now,
        }
    }
}

/// Optional per-project filters and weights for grant discovery.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GrantPreferences {
    pub preferred_funding_types: Vec<FundingType>,
    pub funding_priorities: Vec<GrantType>,
    pub min_amount: Option<f64>,
    pub max_amount: Option<f64>,
    pub preferred_regions: Vec<String>,
    pub lead_time_days: u32,
}

impl Default for GrantPreferences {
    fn default() -> Self {
        Self {
            preferred_funding_types: Vec::new(),
            funding_priorities: Vec::new(),
            min_amount: None,
            max_amount: None,
            preferred_regions: Vec::new(),
            lead_time_days: DEFAULT_LEAD_TIME_DAYS,
        }
    }
}

pub const DEFAULT_LEAD_TIME_DAYS: u32 = 30;

/// Catalog filter for listing grants. Empty filter lists everything.
///
/// Amount bounds keep grants that leave the compared bound unset.
#[derive(Debug, Clone, Default)]
pub struct GrantFilter {
    /// Only grants with a deadline on or after this date
    pub open_on: Option<NaiveDate>,
    /// Case-insensitive text in title, organization or description
    pub search: Option<String>,
    pub grant_type: Option<GrantType>,
    pub funding_type: Option<FundingType>,
    /// Keep grants whose `amount_min` is at least this
    pub min_amount: Option<f64>,
    /// Keep grants whose `amount_max` is at most this
    pub max_amount: Option<f64>,
    pub limit: Option<usize>,
}

// ============================================================================
// Festivals
// ============================================================================

string_enum! {
    pub enum FestivalTier {
        AList => "a_list",
        Regional => "regional",
        Genre => "genre",
        Online => "online",
        Student => "student",
    }
}

/// A festival submission opportunity. Unique by (name, location).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Festival {
    pub id: FestivalId,
    pub name: String,
    pub location: String,
    pub website_url: String,
    pub deadline_early: Option<NaiveDate>,
    pub deadline_regular: Option<NaiveDate>,
    pub deadline_late: Option<NaiveDate>,
    pub fee_early: Option<f64>,
    pub fee_regular: Option<f64>,
    pub fee_late: Option<f64>,
    pub currency: String,
    pub tier: FestivalTier,
    pub genres: Vec<String>,
    pub eligibility_criteria: Map<String, Value>,
    pub awards: Vec<String>,
    /// 0-100
    pub prestige_score: i32,
    pub scraped_at: i64,
    pub updated_at: i64,
}

/// The submission window that is still open on a given day.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SubmissionWindow {
    pub deadline: NaiveDate,
    pub fee: Option<f64>,
}

impl Festival {
    pub fn new(name: impl Into<String>, location: impl Into<String>, tier: FestivalTier) -> Self {
        let now = chrono::Utc::now().timestamp_millis();
        Self {
            id: FestivalId::new(),
            name: name.into(),
            location: location.into(),
            website_url: String::new(),
            deadline_early: None,
            deadline_regular: None,
            deadline_late: None,
            fee_early: None,
            fee_regular: None,
            fee_late: None,
            currency: "USD".to_string(),
            tier,
            genres: Vec::new(),
            eligibility_criteria: Map::new(),
            awards: Vec::new(),
            prestige_score: 50,
            scraped_at: now,
            updated_at: now,
        }
    }

    /// Earliest deadline on or after `today`, with the fee charged for it.
    pub fn next_window(&self, today: NaiveDate) -> Option<SubmissionWindow> {
        [
            (self.deadline_early, self.fee_early),
            (self.deadline_regular, self.fee_regular),
            (self.deadline_late, self.fee_late),
        ]
        .into_iter()
        .filter_map(|(deadline, fee)| deadline.map(|deadline| SubmissionWindow { deadline, fee }))
        .filter(|window| window.deadline >= today)
        .min_by_key(|window| window.deadline)
    }
}

/// Optional per-project filters and weights for festival discovery.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FestivalPreferences {
    pub preferred_tiers: Vec<FestivalTier>,
    pub max_entry_fee: Option<f64>,
    pub lead_time_days: u32,
}

impl Default for FestivalPreferences {
    fn default() -> Self {
        Self {
            preferred_tiers: Vec::new(),
            max_entry_fee: None,
            lead_time_days: DEFAULT_LEAD_TIME_DAYS,
        }
    }
}

/// Next occurrence of `month`/`day` on or after `today`.
///
/// Used to roll catalog deadlines forward; Feb 29 falls back to Feb 28.
pub fn next_occurrence(today: NaiveDate, month: u32, day: u32) -> NaiveDate {
    let on_year = |year: i32| {
        NaiveDate::from_ymd_opt(year, month, day)
            .or_else(|| NaiveDate::from_ymd_opt(year, month, day.saturating_sub(1)))
            .unwrap_or(today)
    };
    let this_year = on_year(today.year());
    if this_year >= today {
        this_year
    } else {
        on_year(today.year() + 1)
    }
}

// ============================================================================
// Matches
// ============================================================================

string_enum! {
    /// Discrete label derived from a match score.
    pub enum MatchQuality {
        Perfect => "perfect",
        Excellent => "excellent",
        Good => "good",
        Fair => "fair",
        Poor => "poor",
    }
}

impl MatchQuality {
    /// Lower bounds are inclusive: 90 is perfect, 89 is excellent.
    pub fn from_score(score: u8) -> Self {
        match score {
            90..=u8::MAX => Self::Perfect,
            80..=89 => Self::Excellent,
            70..=79 => Self::Good,
            60..=69 => Self::Fair,
            _ => Self::Poor,
        }
    }
}

string_enum! {
    pub enum GrantMatchStatus {
        Suggested => "suggested",
        Interested => "interested",
        Applied => "applied",
        UnderReview => "under_review",
        Awarded => "awarded",
        Rejected => "rejected",
        Withdrawn => "withdrawn",
    }
}

string_enum! {
    pub enum FestivalMatchStatus {
        Considering => "considering",
        Submitted => "submitted",
        Accepted => "accepted",
        Rejected => "rejected",
    }
}

/// Values shared by both match tables at insert time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewMatch {
    pub score: u8,
    pub reasoning: String,
    /// Triggered predicates, e.g. `{"budget_match": true}`
    pub details: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GrantMatch {
    pub id: i64,
    pub project_id: ProjectId,
    pub grant_id: GrantId,
    pub score: u8,
    pub quality: MatchQuality,
    pub reasoning: String,
    pub details: Map<String, Value>,
    pub status: GrantMatchStatus,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FestivalMatch {
    pub id: i64,
    pub project_id: ProjectId,
    pub festival_id: FestivalId,
    pub score: u8,
    pub quality: MatchQuality,
    pub reasoning: String,
    pub details: Map<String, Value>,
    pub status: FestivalMatchStatus,
    pub created_at: i64,
    pub updated_at: i64,
}

// ============================================================================
// Activity log
// ============================================================================

string_enum! {
    pub enum ActivityAction {
        Create => "create",
        Update => "update",
        Delete => "delete",
        Upload => "upload",
        Generate => "generate",
        Submit => "submit",
    }
}

string_enum! {
    pub enum ActivitySection {
        Project => "project",
        Script => "script",
        Budget => "budget",
        Schedule => "schedule",
        Grant => "grant",
        Festival => "festival",
    }
}

/// Append-only audit entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityRecord {
    pub id: i64,
    pub project_id: ProjectId,
    pub action: ActivityAction,
    pub section: ActivitySection,
    pub description: String,
    pub created_at: i64,
}

// ============================================================================
// Production artifacts
// ============================================================================

/// One scene of a script breakdown.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scene {
    pub id: SceneId,
    pub number: u32,
    /// Full heading, e.g. `INT. COFFEE SHOP - DAY`
    pub slug: String,
    pub int_ext: String,
    pub day_night: String,
    pub location: String,
    pub characters: Vec<String>,
    pub est_shoot_hours: f64,
    pub complexity: String,
    pub notes: String,
}

/// A project's scene breakdown. At most one per project.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScriptBreakdown {
    pub project_id: ProjectId,
    /// Ordered by scene number
    pub scenes: Vec<Scene>,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Budget {
    pub id: BudgetId,
    pub project_id: ProjectId,
    pub version: u32,
    pub total_budget: f64,
    pub contingency_percent: u32,
    pub status: String,
    pub created_at: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BudgetItem {
    pub category: String,
    pub subcategory: String,
    pub description: String,
    pub quantity: f64,
    pub unit: String,
    pub rate: f64,
    pub order_index: u32,
}

impl BudgetItem {
    pub fn total(&self) -> f64 {
        self.quantity * self.rate
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Schedule {
    pub id: ScheduleId,
    pub project_id: ProjectId,
    pub version: u32,
    pub total_days: u32,
    pub status: String,
    pub created_at: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShootDay {
    pub day_number: u32,
    pub location: String,
    /// Scene numbers shot on this day
    pub scenes: Vec<u32>,
    /// `HH:MM`
    pub call_time: Option<String>,
    pub notes: String,
    pub order_index: u32,
}
