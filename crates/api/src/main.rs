use std::sync::Arc;

use mediascribe_api::{build_router, state::AppState};
use mediascribe_config::Settings;
use mediascribe_db::{connect, indexes::ensure_indexes};
use mediascribe_services::{AlertMonitor, RetentionSweeper};
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file (silently ignore if missing)
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            "mediascribe_api=debug,mediascribe_services=debug,mediascribe_db=debug,tower_http=debug"
                .into()
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let settings = Settings::load()?;
    info!(
        "Starting MediaScribe API on {}:{}",
        settings.app.host, settings.app.port
    );

    let db = connect(&settings).await?;
    ensure_indexes(&db).await?;

    let app_state = AppState::new(db, settings.clone());

    start_scheduled_jobs(&app_state).await?;

    let app = build_router(app_state);

    let addr = format!("{}:{}", settings.app.host, settings.app.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}

/// Retention sweep, alert checks and rollup reconciliation run on cron
/// schedules from config.
async fn start_scheduled_jobs(state: &AppState) -> anyhow::Result<()> {
    let scheduler = JobScheduler::new().await?;

    let sweeper = Arc::new(RetentionSweeper::new(
        Arc::clone(&state.jobs),
        Arc::clone(&state.store),
    ));
    let retention_days = state.settings.retention.retention_days;
    scheduler
        .add(Job::new_async(
            state.settings.retention.sweep_cron.as_str(),
            move |_id, _sched| {
                let sweeper = Arc::clone(&sweeper);
                Box::pin(async move {
                    if let Err(e) = sweeper.sweep(retention_days).await {
                        error!(%e, "Retention sweep failed");
                    }
                })
            },
        )?)
        .await?;

    let monitor = Arc::new(AlertMonitor::new(
        Arc::clone(&state.users),
        Arc::clone(&state.ledger),
        Arc::clone(&state.alerts),
        state.settings.alerts.clone(),
    ));

    let checks = Arc::clone(&monitor);
    scheduler
        .add(Job::new_async(
            state.settings.alerts.monitor_cron.as_str(),
            move |_id, _sched| {
                let monitor = Arc::clone(&checks);
                Box::pin(async move {
                    if let Err(e) = monitor.run_checks().await {
                        error!(%e, "Alert checks failed");
                    }
                })
            },
        )?)
        .await?;

    scheduler
        .add(Job::new_async(
            state.settings.alerts.reconcile_cron.as_str(),
            move |_id, _sched| {
                let monitor = Arc::clone(&monitor);
                Box::pin(async move {
                    if let Err(e) = monitor.reconcile_cost_rollups().await {
                        error!(%e, "Cost rollup reconciliation failed");
                    }
                })
            },
        )?)
        .await?;

    scheduler.start().await?;
    info!("Scheduled jobs started");
    Ok(())
}
