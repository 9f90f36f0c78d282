use std::sync::Arc;

use bson::doc;
use bson::oid::ObjectId;
use mediascribe_db::models::{AlertKind, OperationType};
use mediascribe_services::AlertMonitor;
use serde_json::Value;

use crate::fixtures::test_app::TestApp;

fn monitor(app: &TestApp) -> AlertMonitor {
    AlertMonitor::new(
        Arc::clone(&app.state.users),
        Arc::clone(&app.state.ledger),
        Arc::clone(&app.state.alerts),
        app.settings.alerts.clone(),
    )
}

#[tokio::test]
async fn high_spenders_are_flagged_once_per_cooldown() {
    let app = TestApp::spawn().await;
    let user = app.seed_member("whale@test.dev").await;

    // Threshold is $50 over the lookback window.
    for _ in 0..6 {
        app.state
            .ledger
            .record(user.id, ObjectId::new(), OperationType::Transcription, 10.0)
            .await
            .unwrap();
    }

    let monitor = monitor(&app);
    let report = monitor.run_checks().await.unwrap();
    assert_eq!(report.high_cost_alerts, 1);

    let alerts = app.state.alerts.find_recent(10).await.unwrap();
    let alert = alerts
        .iter()
        .find(|a| a.kind == AlertKind::HighCost)
        .expect("High cost alert missing");
    assert_eq!(alert.user_id, Some(user.id));
    assert!((alert.amount_usd.unwrap() - 60.0).abs() < 1e-9);

    // Re-running inside the cooldown raises nothing new.
    let report = monitor.run_checks().await.unwrap();
    assert_eq!(report.high_cost_alerts, 0);
    let count = app.state.alerts.find_recent(10).await.unwrap().len();
    assert_eq!(count, 1);
}

#[tokio::test]
async fn spend_below_threshold_raises_nothing() {
    let app = TestApp::spawn().await;
    let user = app.seed_member("modest@test.dev").await;

    app.state
        .ledger
        .record(user.id, ObjectId::new(), OperationType::Transcription, 49.99)
        .await
        .unwrap();

    let report = monitor(&app).run_checks().await.unwrap();
    assert_eq!(report.high_cost_alerts, 0);
}

#[tokio::test]
async fn exhausted_quota_is_flagged_once_per_cooldown() {
    let app = TestApp::spawn().await;
    let user = app.seed_member("exhausted@test.dev").await;

    app.state
        .users
        .base
        .update_by_id(user.id, doc! { "$set": { "monthly_quota": 10, "monthly_usage": 10 } })
        .await
        .unwrap();

    let monitor = monitor(&app);
    let report = monitor.run_checks().await.unwrap();
    assert_eq!(report.quota_alerts, 1);

    let alerts = app.state.alerts.find_recent(10).await.unwrap();
    let alert = alerts
        .iter()
        .find(|a| a.kind == AlertKind::QuotaExceeded)
        .expect("Quota alert missing");
    assert_eq!(alert.user_id, Some(user.id));

    let report = monitor.run_checks().await.unwrap();
    assert_eq!(report.quota_alerts, 0);
}

#[tokio::test]
async fn alerts_endpoint_is_admin_only() {
    let app = TestApp::spawn().await;
    let member = app.seed_member("nosy@test.dev").await;
    let admin = app.seed_admin("ops@test.dev").await;

    app.state
        .users
        .base
        .update_by_id(member.id, doc! { "$set": { "monthly_quota": 1, "monthly_usage": 1 } })
        .await
        .unwrap();
    monitor(&app).run_checks().await.unwrap();

    let resp = app
        .auth_get("/api/alerts", &member.access_token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 403);

    let resp = app
        .auth_get("/api/alerts", &admin.access_token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);
    let json: Value = resp.json().await.unwrap();
    let alerts = json.as_array().unwrap();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0]["kind"].as_str(), Some("quota_exceeded"));
}
