//! End-to-end store behaviour against a file-backed database.

use chrono::NaiveDate;
use filmdesk_db::*;
use std::collections::BTreeMap;
use tempfile::TempDir;

async fn open_temp() -> (TempDir, FilmDb) {
    let tmp = TempDir::new().unwrap();
    let db = FilmDb::open(tmp.path().join("filmdesk.sqlite3")).await.unwrap();
    (tmp, db)
}

#[tokio::test]
async fn job_lifecycle_survives_reopen() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("filmdesk.sqlite3");

    let project = Project::new("Reopen", ProjectType::Feature, "drama");
    let job_id = {
        let db = FilmDb::open(&path).await.unwrap();
        db.projects_insert(&project).await.unwrap();
        let job = db
            .jobs_insert(&project.id, "budget_generation", &BTreeMap::new())
            .await
            .unwrap();
        db.close().await;
        job.id
    };

    let db = FilmDb::open(&path).await.unwrap();
    let claimed = db.jobs_claim_next().await.unwrap().unwrap();
    assert_eq!(claimed.id, job_id);

    let done = db
        .jobs_finish(&job_id, JobStatus::Completed, Some(&serde_json::json!({"ok": true})), None)
        .await
        .unwrap()
        .into_job();
    assert_eq!(done.status, JobStatus::Completed);
    assert!(done.started_at.unwrap() <= done.completed_at.unwrap());
    assert!(db.jobs_claim_next().await.unwrap().is_none());
}

#[tokio::test]
async fn deleting_project_cascades_everything_it_owns() {
    let (_tmp, db) = open_temp().await;

    let project = Project::new("Cascade", ProjectType::Documentary, "documentary");
    db.projects_insert(&project).await.unwrap();

    let deadline = NaiveDate::from_ymd_opt(2031, 1, 1).unwrap();
    let (grant, _) = db
        .grants_get_or_create(&Grant::new("Fund", "Org", deadline))
        .await
        .unwrap();
    let (festival, _) = db
        .festivals_get_or_create(&Festival::new("Fest", "Austin, TX", FestivalTier::Regional))
        .await
        .unwrap();
    let new_match = NewMatch {
        score: 64,
        reasoning: "Basic".into(),
        details: Default::default(),
    };

    db.grant_match_insert(&project.id, &grant.id, &new_match, GrantMatchStatus::Suggested)
        .await
        .unwrap();
    db.festival_match_insert(
        &project.id,
        &festival.id,
        &new_match,
        FestivalMatchStatus::Considering,
    )
    .await
        .unwrap();
    db.grant_preferences_set(&project.id, &GrantPreferences::default())
        .await
        .unwrap();
    db.jobs_insert(&project.id, "grant_match", &BTreeMap::new())
        .await
        .unwrap();
    db.activity_append(&project.id, ActivityAction::Create, ActivitySection::Project, "created")
        .await
        .unwrap();
    db.breakdown_get_or_create(&project.id).await.unwrap();

    assert!(db.projects_delete(&project.id).await.unwrap());

    assert_eq!(db.grant_matches_count(&project.id).await.unwrap(), 0);
    assert_eq!(db.festival_matches_count(&project.id).await.unwrap(), 0);
    assert!(db.grant_preferences_get(&project.id).await.unwrap().is_none());
    assert!(db.breakdown_find(&project.id).await.unwrap().is_none());
    assert!(db.activity_for_project(&project.id, 10).await.unwrap().is_empty());
    assert_eq!(db.jobs_stats().await.unwrap().total, 0);

    // Candidates are shared and survive.
    assert!(db.grants_get(&grant.id).await.unwrap().is_some());
    assert!(db.festivals_get(&festival.id).await.unwrap().is_some());
}

#[tokio::test]
async fn job_for_unknown_project_is_rejected() {
    let (_tmp, db) = open_temp().await;
    let err = db
        .jobs_insert(&ProjectId::new(), "grant_match", &BTreeMap::new())
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::Constraint(_)));
}
