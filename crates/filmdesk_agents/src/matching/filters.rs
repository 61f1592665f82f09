//! Candidate pool filters applied before scoring.

use chrono::{Duration, NaiveDate};
use filmdesk_db::{Festival, FestivalPreferences, Grant, GrantPreferences};

/// Whether an open grant passes the project's preferences.
///
/// Amount bounds are inclusive; a grant missing the compared bound passes.
pub fn grant_passes(grant: &Grant, prefs: &GrantPreferences, today: NaiveDate) -> bool {
    if !prefs.preferred_funding_types.is_empty()
        && !prefs.preferred_funding_types.contains(&grant.funding_type)
    {
        return false;
    }
    if let (Some(min), Some(max)) = (prefs.min_amount, grant.amount_max) {
        if max < min {
            return false;
        }
    }
    if let (Some(max), Some(min)) = (prefs.max_amount, grant.amount_min) {
        if min > max {
            return false;
        }
    }
    if prefs.lead_time_days > 0 && grant.deadline < lead_cutoff(today, prefs.lead_time_days) {
        return false;
    }
    true
}

/// Whether a festival still has an open window that passes the preferences.
///
/// Without preferences any window on or after `today` qualifies.
pub fn festival_passes(
    festival: &Festival,
    prefs: Option<&FestivalPreferences>,
    today: NaiveDate,
) -> bool {
    let Some(window) = festival.next_window(today) else {
        return false;
    };
    let Some(prefs) = prefs else {
        return true;
    };

    if let (Some(cap), Some(fee)) = (prefs.max_entry_fee, window.fee) {
        if fee > cap {
            return false;
        }
    }
    if prefs.lead_time_days > 0 && window.deadline < lead_cutoff(today, prefs.lead_time_days) {
        return false;
    }
    true
}

fn lead_cutoff(today: NaiveDate, days: u32) -> NaiveDate {
    today + Duration::days(i64::from(days))
}

#[cfg(test)]
mod tests {
    use super::*;
    use filmdesk_db::{FestivalTier, FundingType};

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 18).unwrap()
    }

    fn grant(min: Option<f64>, max: Option<f64>, days_out: i64) -> Grant {
        let mut g = Grant::new("G", "Org", today() + Duration::days(days_out));
        g.amount_min = min;
        g.amount_max = max;
        g
    }

    #[test]
    fn funding_type_allow_list() {
        let prefs = GrantPreferences {
            preferred_funding_types: vec![FundingType::TaxCredit],
            ..Default::default()
        };
        assert!(!grant_passes(&grant(None, None, 90), &prefs, today()));

        let mut credit = grant(None, None, 90);
        credit.funding_type = FundingType::TaxCredit;
        assert!(grant_passes(&credit, &prefs, today()));
    }

    #[test]
    fn amount_bounds_are_inclusive_and_null_tolerant() {
        let prefs = GrantPreferences {
            min_amount: Some(10_000.0),
            max_amount: Some(50_000.0),
            ..Default::default()
        };
        assert!(grant_passes(&grant(Some(50_000.0), Some(60_000.0), 90), &prefs, today()));
        assert!(grant_passes(&grant(Some(1_000.0), Some(10_000.0), 90), &prefs, today()));
        assert!(!grant_passes(&grant(Some(1_000.0), Some(9_999.0), 90), &prefs, today()));
        assert!(!grant_passes(&grant(Some(50_001.0), None, 90), &prefs, today()));
        assert!(grant_passes(&grant(None, None, 90), &prefs, today()));
    }

    #[test]
    fn lead_time() {
        let prefs = GrantPreferences::default();
        assert!(grant_passes(&grant(None, None, 30), &prefs, today()));
        assert!(!grant_passes(&grant(None, None, 29), &prefs, today()));

        let no_lead = GrantPreferences {
            lead_time_days: 0,
            ..Default::default()
        };
        assert!(grant_passes(&grant(None, None, 0), &no_lead, today()));
    }

    #[test]
    fn festival_windows_and_fees() {
        let mut fest = Festival::new("F", "Austin, TX", FestivalTier::Regional);
        assert!(!festival_passes(&fest, None, today()));

        fest.deadline_early = Some(today() - Duration::days(1));
        fest.fee_early = Some(10.0);
        fest.deadline_regular = Some(today() + Duration::days(45));
        fest.fee_regular = Some(60.0);
        assert!(festival_passes(&fest, None, today()));

        let cheap = FestivalPreferences {
            max_entry_fee: Some(50.0),
            ..Default::default()
        };
        assert!(!festival_passes(&fest, Some(&cheap), today()));

        let hurried = FestivalPreferences {
            lead_time_days: 60,
            ..Default::default()
        };
        assert!(!festival_passes(&fest, Some(&hurried), today()));
        assert!(festival_passes(&fest, Some(&FestivalPreferences::default()), today()));
    }
}
