use axum::{
    Json,
    extract::{Query, State},
};
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;

use crate::{error::ApiError, extractors::auth::AuthUser, state::AppState};

#[derive(Debug, Deserialize)]
pub struct WindowParams {
    /// RFC 3339; defaults to 30 days ago.
    pub from: Option<String>,
    /// RFC 3339; defaults to now.
    pub to: Option<String>,
}

fn parse_window(params: &WindowParams) -> Result<(bson::DateTime, bson::DateTime), ApiError> {
    let to = match &params.to {
        Some(raw) => parse_rfc3339(raw)?,
        None => Utc::now(),
    };
    let from = match &params.from {
        Some(raw) => parse_rfc3339(raw)?,
        None => to - Duration::days(30),
    };
    if from > to {
        return Err(ApiError::BadRequest("'from' is after 'to'".to_string()));
    }
    Ok((bson::DateTime::from_chrono(from), bson::DateTime::from_chrono(to)))
}

fn parse_rfc3339(raw: &str) -> Result<DateTime<Utc>, ApiError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|d| d.with_timezone(&Utc))
        .map_err(|_| ApiError::BadRequest(format!("Invalid timestamp: {raw}")))
}

/// The caller's own usage: ledger totals over the window plus the live
/// quota counters.
pub async fn me(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(params): Query<WindowParams>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let (from, to) = parse_window(&params)?;

    let summary = state.ledger.user_summary(auth.user_id, from, to).await?;
    let user = state.users.find_by_id(auth.user_id).await?;

    Ok(Json(serde_json::json!({
        "summary": summary,
        "monthly_usage": user.monthly_usage,
        "monthly_quota": user.monthly_quota,
        "quota_reset_date": user.quota_reset_date.try_to_rfc3339_string().unwrap_or_default(),
        "total_cost_usd": user.total_cost_usd,
    })))
}

/// Per-user spend over the window, highest first. Admin only.
pub async fn users(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(params): Query<WindowParams>,
) -> Result<Json<serde_json::Value>, ApiError> {
    if !auth.is_admin() {
        return Err(ApiError::Forbidden("Admin only".to_string()));
    }
    let (from, to) = parse_window(&params)?;

    let totals = state.ledger.user_totals(from, to).await?;
    Ok(Json(serde_json::json!({ "users": totals })))
}

/// Platform-wide rollup over the window. Admin only.
pub async fn platform(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(params): Query<WindowParams>,
) -> Result<Json<serde_json::Value>, ApiError> {
    if !auth.is_admin() {
        return Err(ApiError::Forbidden("Admin only".to_string()));
    }
    let (from, to) = parse_window(&params)?;

    let summary = state.ledger.platform_summary(from, to).await?;
    Ok(Json(serde_json::json!(summary)))
}
