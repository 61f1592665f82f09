//! Catalog refresh.
//!
//! No live sources are scraped; a fixed sample catalog is upserted by natural
//! key with deadlines rolled forward to their next occurrence.

use super::HandlerContext;
use crate::error::Result;
use chrono::NaiveDate;
use filmdesk_db::{
    next_occurrence, Festival, FestivalTier, FundingType, Grant, GrantType, ProjectType,
};
use serde_json::{json, Map, Value};
use tracing::info;

pub(super) async fn grants(ctx: &HandlerContext, today: NaiveDate) -> Result<Value> {
    let mut created = 0;
    for grant in sample_grants(today) {
        let (_, inserted) = ctx.db.grants_get_or_create(&grant).await?;
        if inserted {
            created += 1;
        }
    }
    let total = ctx.db.grants_count().await?;
    info!(created, total, "Grant catalog refreshed");
    Ok(json!({ "grants_scraped": created, "total_grants": total }))
}

pub(super) async fn festivals(ctx: &HandlerContext, today: NaiveDate) -> Result<Value> {
    let mut created = 0;
    for festival in sample_festivals(today) {
        let (_, inserted) = ctx.db.festivals_get_or_create(&festival).await?;
        if inserted {
            created += 1;
        }
    }
    let total = ctx.db.festivals_count().await?;
    info!(created, total, "Festival catalog refreshed");
    Ok(json!({ "festivals_scraped": created, "total_festivals": total }))
}

fn object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

pub fn sample_grants(today: NaiveDate) -> Vec<Grant> {
    let mut nfb = Grant::new(
        "National Film Board Production Grant",
        "National Film Board",
        next_occurrence(today, 12, 31),
    );
    nfb.url = "https://example.com/nfb-grant".into();
    nfb.amount_min = Some(10_000.0);
    nfb.amount_max = Some(50_000.0);
    nfb.grant_type = GrantType::Production;
    nfb.funding_type = FundingType::Grant;
    nfb.eligibility_criteria =
        object(json!({"citizenship": "US/Canada", "experience": "emerging"}));
    nfb.project_types = vec![ProjectType::Feature, ProjectType::Documentary, ProjectType::Short];
    nfb.description =
        "Production funding for emerging filmmakers telling distinctive stories.".into();
    nfb.source = "sample".into();

    let mut dev = Grant::new(
        "Independent Film Development Fund",
        "Film Development Corporation",
        next_occurrence(today, 6, 15),
    );
    dev.url = "https://example.com/dev-fund".into();
    dev.amount_min = Some(5_000.0);
    dev.amount_max = Some(25_000.0);
    dev.grant_type = GrantType::Development;
    dev.eligibility_criteria = object(json!({"budget_max": 1_000_000, "first_time": true}));
    dev.project_types = vec![ProjectType::Feature, ProjectType::Short];
    dev.description = "Script and package development for first-time independent producers.".into();
    dev.source = "sample".into();

    let mut doc = Grant::new(
        "Documentary Impact Grant",
        "Documentary Alliance",
        next_occurrence(today, 9, 30),
    );
    doc.url = "https://example.com/doc-impact".into();
    doc.amount_min = Some(15_000.0);
    doc.amount_max = Some(75_000.0);
    doc.grant_type = GrantType::Production;
    doc.eligibility_criteria = object(json!({"genre": "documentary", "social_impact": true}));
    doc.project_types = vec![ProjectType::Documentary];
    doc.description = "Supports documentaries with social impact and community engagement.".into();
    doc.source = "sample".into();

    vec![nfb, dev, doc]
}

pub fn sample_festivals(today: NaiveDate) -> Vec<Festival> {
    let mut sundance =
        Festival::new("Sundance Film Festival", "Park City, UT", FestivalTier::AList);
    sundance.website_url = "https://festival.sundance.org".into();
    sundance.deadline_early = Some(next_occurrence(today, 8, 15));
    sundance.deadline_regular = Some(next_occurrence(today, 9, 15));
    sundance.deadline_late = Some(next_occurrence(today, 10, 1));
    sundance.fee_early = Some(40.0);
    sundance.fee_regular = Some(65.0);
    sundance.fee_late = Some(85.0);
    sundance.genres = vec!["drama".into(), "documentary".into(), "comedy".into()];
    sundance.awards = vec!["Grand Jury Prize".into(), "Audience Award".into()];
    sundance.prestige_score = 95;

    let mut sxsw = Festival::new("SXSW Film Festival", "Austin, TX", FestivalTier::AList);
    sxsw.website_url = "https://www.sxsw.com".into();
    sxsw.deadline_early = Some(next_occurrence(today, 10, 15));
    sxsw.deadline_regular = Some(next_occurrence(today, 11, 15));
    sxsw.deadline_late = Some(next_occurrence(today, 12, 1));
    sxsw.fee_early = Some(25.0);
    sxsw.fee_regular = Some(40.0);
    sxsw.fee_late = Some(55.0);
    sxsw.genres = vec!["comedy".into(), "drama".into(), "thriller".into()];
    sxsw.awards = vec!["Grand Jury Award".into(), "Audience Award".into()];
    sxsw.prestige_score = 85;

    let mut regional =
        Festival::new("Regional Film Showcase", "Various Cities", FestivalTier::Regional);
    regional.website_url = "https://regionalfilmfest.com".into();
    regional.deadline_regular = Some(next_occurrence(today, 5, 30));
    regional.fee_regular = Some(15.0);
    regional.genres = vec!["drama".into(), "documentary".into(), "short".into()];
    regional.awards = vec!["Best Local Film".into(), "Emerging Filmmaker Award".into()];
    regional.prestige_score = 50;

    vec![sundance, sxsw, regional]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_deadlines_are_never_in_the_past() {
        let today = NaiveDate::from_ymd_opt(2026, 10, 18).unwrap();
        for grant in sample_grants(today) {
            assert!(grant.deadline >= today);
        }
        let nfb = &sample_grants(today)[0];
        assert_eq!(nfb.deadline, NaiveDate::from_ymd_opt(2026, 12, 31).unwrap());

        for festival in sample_festivals(today) {
            assert!(festival.next_window(today).is_some(), "{} closed", festival.name);
        }
    }
}
