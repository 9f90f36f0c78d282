use axum::{
    Json,
    extract::{Query, State},
};
use serde::{Deserialize, Serialize};

use crate::{error::ApiError, extractors::auth::AuthUser, state::AppState};
use mediascribe_db::models::Alert;

#[derive(Debug, Deserialize)]
pub struct ListParams {
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct AlertResponse {
    pub id: String,
    pub user_id: Option<String>,
    pub kind: String,
    pub message: String,
    pub amount_usd: Option<f64>,
    pub created_at: String,
}

fn to_response(alert: Alert) -> AlertResponse {
    AlertResponse {
        id: alert.id.map(|id| id.to_hex()).unwrap_or_default(),
        user_id: alert.user_id.map(|id| id.to_hex()),
        kind: alert.kind.as_str().to_string(),
        message: alert.message,
        amount_usd: alert.amount_usd,
        created_at: alert.created_at.try_to_rfc3339_string().unwrap_or_default(),
    }
}

/// Recent alerts, newest first. Admin only.
pub async fn list(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(params): Query<ListParams>,
) -> Result<Json<Vec<AlertResponse>>, ApiError> {
    if !auth.is_admin() {
        return Err(ApiError::Forbidden("Admin only".to_string()));
    }

    let limit = params.limit.unwrap_or(50).clamp(1, 500);
    let alerts = state.alerts.find_recent(limit).await?;
    Ok(Json(alerts.into_iter().map(to_response).collect()))
}
