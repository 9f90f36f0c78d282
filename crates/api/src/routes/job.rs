use axum::{
    Json,
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
};
use bson::oid::ObjectId;
use serde::{Deserialize, Serialize};

use crate::{error::ApiError, extractors::auth::AuthUser, state::AppState};
use mediascribe_db::models::{Job, JobArtifacts, JobMetadata};
use mediascribe_services::dao::base::PaginationParams;
use mediascribe_services::orchestrator::JobEvent;
use mediascribe_services::quota::Admission;

#[derive(Debug, Serialize)]
pub struct JobResponse {
    pub id: String,
    pub filename: String,
    pub language: String,
    pub status: String,
    pub audio_size_bytes: u64,
    pub audio_duration_seconds: Option<f64>,
    pub artifacts: JobArtifacts,
    pub metadata: JobMetadata,
    pub error_message: Option<String>,
    pub retry_count: u32,
    pub created_at: String,
    pub updated_at: String,
    pub completed_at: Option<String>,
}

fn to_response(job: Job) -> JobResponse {
    JobResponse {
        id: job.id.map(|id| id.to_hex()).unwrap_or_default(),
        filename: job.filename,
        language: job.language,
        status: job.status.as_str().to_string(),
        audio_size_bytes: job.audio_size_bytes,
        audio_duration_seconds: job.audio_duration_seconds,
        artifacts: job.artifacts,
        metadata: job.metadata,
        error_message: job.error_message,
        retry_count: job.retry_count,
        created_at: job.created_at.try_to_rfc3339_string().unwrap_or_default(),
        updated_at: job.updated_at.try_to_rfc3339_string().unwrap_or_default(),
        completed_at: job
            .completed_at
            .and_then(|d| d.try_to_rfc3339_string().ok()),
    }
}

/// Submit an audio file for transcription via multipart form data.
/// Fields: `file` (binary), `language` (text, optional, defaults to "auto")
pub async fn create(
    State(state): State<AppState>,
    auth: AuthUser,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<JobResponse>), ApiError> {
    // Quota gate comes before the upload is persisted anywhere.
    match state.quota.admit(auth.user_id).await? {
        Admission::Allowed { .. } => {}
        Admission::Denied { reason } => {
            return Err(ApiError::QuotaExceeded(format!(
                "Monthly job quota reached ({})",
                reason.as_str()
            )));
        }
    }

    let mut file_data: Option<(String, String, Vec<u8>)> = None; // (filename, content_type, bytes)
    let mut language = "auto".to_string();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Multipart error: {}", e)))?
    {
        let name = field.name().unwrap_or("").to_string();

        match name.as_str() {
            "file" => {
                let filename = field.file_name().unwrap_or("unnamed").to_string();
                let content_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::BadRequest(format!("Failed to read file: {}", e)))?;
                file_data = Some((filename, content_type, bytes.to_vec()));
            }
            "language" => {
                language = field
                    .text()
                    .await
                    .map_err(|e| ApiError::BadRequest(format!("Failed to read field: {}", e)))?;
            }
            _ => {}
        }
    }

    let (filename, content_type, bytes) =
        file_data.ok_or_else(|| ApiError::BadRequest("Missing 'file' field".to_string()))?;
    if bytes.is_empty() {
        return Err(ApiError::BadRequest("Uploaded file is empty".to_string()));
    }
    let size = bytes.len() as u64;

    let storage_key = format!("{}/{}/{}", auth.user_id.to_hex(), uuid::Uuid::new_v4(), filename);
    let audio_url = state
        .store
        .put(&storage_key, bytes, &content_type)
        .await
        .map_err(|e| ApiError::Internal(format!("Failed to store audio: {}", e)))?;

    let job = state
        .jobs
        .create(auth.user_id, filename, audio_url, language, size)
        .await?;

    if let Some(job_id) = job.id {
        state
            .orchestrator
            .dispatch(JobEvent::TranscribeRequested { job_id });
    }

    Ok((StatusCode::ACCEPTED, Json(to_response(job))))
}

pub async fn get(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(job_id): Path<String>,
) -> Result<Json<JobResponse>, ApiError> {
    let id = ObjectId::parse_str(&job_id)
        .map_err(|_| ApiError::BadRequest("Invalid job_id".to_string()))?;

    let job = state.jobs.find_by_id(id).await?;
    if job.user_id != auth.user_id && !auth.is_admin() {
        return Err(ApiError::Forbidden("Not your job".to_string()));
    }

    Ok(Json(to_response(job)))
}

#[derive(Debug, Deserialize)]
pub struct ListParams {
    pub page: Option<u64>,
    pub per_page: Option<u64>,
    /// Admin-only filter; regular users always see their own jobs.
    pub user_id: Option<String>,
}

pub async fn list(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(params): Query<ListParams>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let user_id = match &params.user_id {
        Some(raw) if auth.is_admin() => ObjectId::parse_str(raw)
            .map_err(|_| ApiError::BadRequest("Invalid user_id".to_string()))?,
        Some(_) => return Err(ApiError::Forbidden("Admin only".to_string())),
        None => auth.user_id,
    };

    let defaults = PaginationParams::default();
    let pagination = PaginationParams {
        page: params.page.unwrap_or(defaults.page).max(1),
        per_page: params.per_page.unwrap_or(defaults.per_page).clamp(1, 100),
    };

    let result = state.jobs.find_by_user(user_id, &pagination).await?;
    let items: Vec<JobResponse> = result.items.into_iter().map(to_response).collect();

    Ok(Json(serde_json::json!({
        "items": items,
        "total": result.total,
        "page": result.page,
        "per_page": result.per_page,
        "total_pages": result.total_pages,
    })))
}
