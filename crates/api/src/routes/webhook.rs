use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
};
use bson::oid::ObjectId;
use tracing::info;

use crate::{error::ApiError, state::AppState};
use mediascribe_services::engine::{
    CallbackOperation, CallbackStatus, EngineCallback, verify_signature,
};
use mediascribe_services::orchestrator::{
    JobEvent, SummarizationOutcome, TranscriptionArtifacts, TranscriptionOutcome,
};

pub const SIGNATURE_HEADER: &str = "x-engine-signature";

/// Engine result callback. Signature-authenticated, no user auth; the raw
/// body is what was signed, so parsing happens after verification.
pub async fn engine_callback(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<StatusCode, ApiError> {
    let sig_header = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::BadRequest("Missing signature header".to_string()))?;

    verify_signature(&state.settings.engine.webhook_secret, &body, sig_header)
        .map_err(|_| ApiError::Unauthorized("Invalid webhook signature".to_string()))?;

    let callback: EngineCallback = serde_json::from_slice(&body)
        .map_err(|e| ApiError::BadRequest(format!("Invalid callback payload: {e}")))?;

    // The callback is applied before the ack. A store error surfaces as a
    // 5xx so the engine re-posts; a 200 means the result landed.
    let event = to_event(&callback)?;
    state.orchestrator.handle_event(event).await?;

    info!(
        job_id = %callback.job_id,
        operation = ?callback.operation,
        status = ?callback.status,
        "Engine callback applied"
    );
    Ok(StatusCode::OK)
}

fn to_event(callback: &EngineCallback) -> Result<JobEvent, ApiError> {
    let job_id = ObjectId::parse_str(&callback.job_id)
        .map_err(|_| ApiError::BadRequest("Invalid job_id in callback".to_string()))?;

    let event = match (callback.operation, callback.status) {
        (CallbackOperation::Transcription, CallbackStatus::Succeeded) => {
            let result = callback.transcription.as_ref().ok_or_else(|| {
                ApiError::BadRequest("Succeeded transcription callback without result".to_string())
            })?;
            JobEvent::TranscriptionCompleted {
                job_id,
                outcome: TranscriptionOutcome::Succeeded(TranscriptionArtifacts {
                    txt_url: result.txt_url.clone(),
                    srt_url: result.srt_url.clone(),
                    vtt_url: result.vtt_url.clone(),
                    speakers_url: result.speakers_url.clone(),
                    duration_seconds: result.duration_seconds,
                    detected_language: result.detected_language.clone(),
                    speakers: result.speakers.clone(),
                }),
            }
        }
        (CallbackOperation::Transcription, CallbackStatus::Failed) => {
            let (message, transient) = match &callback.error {
                Some(err) => (err.message.clone(), err.transient),
                None => ("engine reported failure without detail".to_string(), false),
            };
            JobEvent::TranscriptionCompleted {
                job_id,
                outcome: TranscriptionOutcome::Failed { message, transient },
            }
        }
        (CallbackOperation::Summarization, CallbackStatus::Succeeded) => {
            let result = callback.summary.as_ref().ok_or_else(|| {
                ApiError::BadRequest("Succeeded summary callback without result".to_string())
            })?;
            JobEvent::SummarizationCompleted {
                job_id,
                outcome: SummarizationOutcome::Succeeded {
                    summary_url: result.summary_url.clone(),
                },
            }
        }
        (CallbackOperation::Summarization, CallbackStatus::Failed) => {
            let message = callback
                .error
                .as_ref()
                .map(|e| e.message.clone())
                .unwrap_or_else(|| "engine reported failure without detail".to_string());
            JobEvent::SummarizationCompleted {
                job_id,
                outcome: SummarizationOutcome::Failed { message },
            }
        }
    };

    Ok(event)
}
