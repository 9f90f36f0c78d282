pub mod error;
pub mod extractors;
pub mod routes;
pub mod state;

use axum::{
    Router,
    routing::{get, post},
};
use state::AppState;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let job_routes = Router::new()
        .route("/", post(routes::job::create))
        .route("/", get(routes::job::list))
        .route("/{job_id}", get(routes::job::get));

    let usage_routes = Router::new()
        .route("/me", get(routes::usage::me))
        .route("/users", get(routes::usage::users))
        .route("/platform", get(routes::usage::platform));

    let alert_routes = Router::new().route("/", get(routes::alert::list));

    let api = Router::new()
        .nest("/job", job_routes)
        .nest("/usage", usage_routes)
        .nest("/alerts", alert_routes);

    // Webhooks sit outside /api; they authenticate by signature, not token.
    let webhooks = Router::new().route("/engine", post(routes::webhook::engine_callback));

    let health = Router::new().route("/health", get(health_check));

    Router::new()
        .nest("/api", api)
        .nest("/webhooks", webhooks)
        .merge(health)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

async fn health_check() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
