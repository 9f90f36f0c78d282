use std::sync::Arc;

use bson::doc;
use bson::oid::ObjectId;
use chrono::{Duration, Utc};
use mediascribe_db::models::OperationType;
use mediascribe_services::AlertMonitor;

use crate::fixtures::test_app::TestApp;

fn window() -> (bson::DateTime, bson::DateTime) {
    let now = Utc::now();
    (
        bson::DateTime::from_chrono(now - Duration::hours(1)),
        bson::DateTime::from_chrono(now + Duration::hours(1)),
    )
}

#[tokio::test]
async fn record_is_idempotent_per_job_and_operation() {
    let app = TestApp::spawn().await;
    let user_id = ObjectId::new();
    let job_id = ObjectId::new();

    let first = app
        .state
        .ledger
        .record(user_id, job_id, OperationType::Transcription, 0.012)
        .await
        .unwrap();
    assert!(first.newly_recorded);

    let second = app
        .state
        .ledger
        .record(user_id, job_id, OperationType::Transcription, 0.012)
        .await
        .unwrap();
    assert!(!second.newly_recorded);
    assert_eq!(second.entry.id, first.entry.id);

    // A different operation on the same job is its own entry.
    let summary = app
        .state
        .ledger
        .record(user_id, job_id, OperationType::Summarization, 0.01)
        .await
        .unwrap();
    assert!(summary.newly_recorded);

    let entries = app.state.ledger.find_by_job(job_id).await.unwrap();
    assert_eq!(entries.len(), 2);
}

#[tokio::test]
async fn user_summary_groups_by_operation() {
    let app = TestApp::spawn().await;
    let user_id = ObjectId::new();

    for _ in 0..3 {
        app.state
            .ledger
            .record(user_id, ObjectId::new(), OperationType::Transcription, 0.012)
            .await
            .unwrap();
    }
    app.state
        .ledger
        .record(user_id, ObjectId::new(), OperationType::Summarization, 0.01)
        .await
        .unwrap();
    // Someone else's spend stays out of this user's summary.
    app.state
        .ledger
        .record(ObjectId::new(), ObjectId::new(), OperationType::Transcription, 5.0)
        .await
        .unwrap();

    let (from, to) = window();
    let summary = app.state.ledger.user_summary(user_id, from, to).await.unwrap();

    assert!((summary.total_cost_usd - 0.046).abs() < 1e-9);
    let transcription = &summary.operations["transcription"];
    assert_eq!(transcription.count, 3);
    assert!((transcription.cost_usd - 0.036).abs() < 1e-9);
    let summarization = &summary.operations["summarization"];
    assert_eq!(summarization.count, 1);
}

#[tokio::test]
async fn platform_summary_counts_distinct_users() {
    let app = TestApp::spawn().await;

    let alice = ObjectId::new();
    let bob = ObjectId::new();
    for user_id in [alice, alice, bob] {
        app.state
            .ledger
            .record(user_id, ObjectId::new(), OperationType::Transcription, 1.0)
            .await
            .unwrap();
    }

    let (from, to) = window();
    let summary = app.state.ledger.platform_summary(from, to).await.unwrap();

    assert!((summary.total_cost_usd - 3.0).abs() < 1e-9);
    assert_eq!(summary.user_count, 2);
    assert_eq!(summary.operations["transcription"].count, 3);
}

#[tokio::test]
async fn user_totals_ranked_by_spend() {
    let app = TestApp::spawn().await;

    let small = ObjectId::new();
    let big = ObjectId::new();
    app.state
        .ledger
        .record(small, ObjectId::new(), OperationType::Transcription, 0.5)
        .await
        .unwrap();
    app.state
        .ledger
        .record(big, ObjectId::new(), OperationType::Transcription, 9.0)
        .await
        .unwrap();
    app.state
        .ledger
        .record(big, ObjectId::new(), OperationType::Summarization, 1.0)
        .await
        .unwrap();

    let (from, to) = window();
    let totals = app.state.ledger.user_totals(from, to).await.unwrap();

    assert_eq!(totals.len(), 2);
    assert_eq!(totals[0].user_id, big);
    assert!((totals[0].total_cost_usd - 10.0).abs() < 1e-9);
    assert_eq!(totals[0].operation_count, 2);
    assert_eq!(totals[1].user_id, small);
}

#[tokio::test]
async fn reconciliation_repairs_drifted_rollup() {
    let app = TestApp::spawn().await;
    let user = app.seed_member("drift@test.dev").await;

    app.state
        .ledger
        .record(user.id, ObjectId::new(), OperationType::Transcription, 0.3)
        .await
        .unwrap();
    app.state
        .ledger
        .record(user.id, ObjectId::new(), OperationType::Summarization, 0.01)
        .await
        .unwrap();

    // Corrupt the materialized rollup.
    app.state
        .users
        .base
        .update_by_id(user.id, doc! { "$set": { "total_cost_usd": 99.0 } })
        .await
        .unwrap();

    let monitor = AlertMonitor::new(
        Arc::clone(&app.state.users),
        Arc::clone(&app.state.ledger),
        Arc::clone(&app.state.alerts),
        app.settings.alerts.clone(),
    );
    let repaired = monitor.reconcile_cost_rollups().await.unwrap();
    assert_eq!(repaired, 1);

    let fixed = app.state.users.find_by_id(user.id).await.unwrap();
    assert!((fixed.total_cost_usd - 0.31).abs() < 1e-9);

    // A second pass finds nothing to do.
    assert_eq!(monitor.reconcile_cost_rollups().await.unwrap(), 0);
}

#[tokio::test]
async fn ledger_rows_outlive_their_job() {
    let app = TestApp::spawn().await;
    let user = app.seed_member("history@test.dev").await;

    let job = app
        .state
        .jobs
        .create(
            user.id,
            "gone.mp3".to_string(),
            "mock://bucket/gone.mp3".to_string(),
            "en".to_string(),
            1024,
        )
        .await
        .unwrap();
    let job_id = job.id.unwrap();

    app.state
        .ledger
        .record(user.id, job_id, OperationType::Transcription, 0.012)
        .await
        .unwrap();

    assert!(app.state.jobs.delete(job_id).await.unwrap());

    let entries = app.state.ledger.find_by_job(job_id).await.unwrap();
    assert_eq!(entries.len(), 1);
    assert!(
        (app.state.ledger.total_cost_for_user(user.id).await.unwrap() - 0.012).abs() < 1e-9
    );
}
