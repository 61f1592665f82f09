//! Closed set of agent job kinds.

use filmdesk_db::ActivitySection;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    ScriptAnalysis,
    BudgetGeneration,
    ScheduleGeneration,
    GrantScrape,
    GrantMatch,
    FestivalScrape,
    FestivalMatch,
}

impl JobKind {
    pub const ALL: [JobKind; 7] = [
        Self::ScriptAnalysis,
        Self::BudgetGeneration,
        Self::ScheduleGeneration,
        Self::GrantScrape,
        Self::GrantMatch,
        Self::FestivalScrape,
        Self::FestivalMatch,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ScriptAnalysis => "script_analysis",
            Self::BudgetGeneration => "budget_generation",
            Self::ScheduleGeneration => "schedule_generation",
            Self::GrantScrape => "grant_scrape",
            Self::GrantMatch => "grant_match",
            Self::FestivalScrape => "festival_scrape",
            Self::FestivalMatch => "festival_match",
        }
    }

    /// Parse a kind string. `script`, `budget` and `schedule` are accepted
    /// as short aliases.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "script_analysis" | "script" => Some(Self::ScriptAnalysis),
            "budget_generation" | "budget" => Some(Self::BudgetGeneration),
            "schedule_generation" | "schedule" => Some(Self::ScheduleGeneration),
            "grant_scrape" => Some(Self::GrantScrape),
            "grant_match" => Some(Self::GrantMatch),
            "festival_scrape" => Some(Self::FestivalScrape),
            "festival_match" => Some(Self::FestivalMatch),
            _ => None,
        }
    }

    /// Activity-log section a successful job is recorded under.
    pub fn section(&self) -> ActivitySection {
        match self {
            Self::ScriptAnalysis => ActivitySection::Script,
            Self::BudgetGeneration => ActivitySection::Budget,
            Self::ScheduleGeneration => ActivitySection::Schedule,
            Self::GrantScrape | Self::GrantMatch => ActivitySection::Grant,
            Self::FestivalScrape | Self::FestivalMatch => ActivitySection::Festival,
        }
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_kind_parses_from_its_name() {
        for kind in JobKind::ALL {
            assert_eq!(JobKind::parse(kind.as_str()), Some(kind));
        }
    }

    #[test]
    fn legacy_aliases() {
        assert_eq!(JobKind::parse("script"), Some(JobKind::ScriptAnalysis));
        assert_eq!(JobKind::parse("Budget"), Some(JobKind::BudgetGeneration));
        assert_eq!(JobKind::parse("schedule"), Some(JobKind::ScheduleGeneration));
        assert_eq!(JobKind::parse("xyz"), None);
    }

    #[test]
    fn sections() {
        assert_eq!(JobKind::GrantMatch.section(), ActivitySection::Grant);
        assert_eq!(JobKind::FestivalScrape.section(), ActivitySection::Festival);
        assert_eq!(JobKind::ScriptAnalysis.section(), ActivitySection::Script);
    }
}
