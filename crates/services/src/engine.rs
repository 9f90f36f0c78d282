use async_trait::async_trait;
use bson::oid::ObjectId;
use mediascribe_config::EngineSettings;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Failure talking to the external engine. Transient failures are retried
/// against the job's retry budget; permanent ones fail the step outright.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("transient engine failure: {0}")]
    Transient(String),
    #[error("permanent engine failure: {0}")]
    Permanent(String),
}

/// The external transcription/summarization service. Both calls only start
/// work; results arrive later as webhook callbacks carrying the job id.
#[async_trait]
pub trait SpeechEngine: Send + Sync {
    async fn start_transcription(
        &self,
        job_id: ObjectId,
        audio_url: &str,
        language: &str,
    ) -> Result<(), EngineError>;

    async fn start_summarization(
        &self,
        job_id: ObjectId,
        transcript_url: &str,
    ) -> Result<(), EngineError>;
}

pub struct HttpSpeechEngine {
    settings: EngineSettings,
    client: reqwest::Client,
}

impl HttpSpeechEngine {
    pub fn new(settings: &EngineSettings) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.request_timeout_secs))
            .build()
            .unwrap_or_default();
        Self {
            settings: settings.clone(),
            client,
        }
    }

    async fn post(&self, path: &str, body: serde_json::Value) -> Result<(), EngineError> {
        let url = format!("{}{}", self.settings.base_url, path);
        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.settings.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                // Timeouts and connection errors may succeed on retry;
                // everything else at this layer is a protocol problem.
                if e.is_timeout() || e.is_connect() {
                    EngineError::Transient(e.to_string())
                } else {
                    EngineError::Permanent(e.to_string())
                }
            })?;

        let status = resp.status();
        if status.is_success() {
            debug!(%url, "Engine accepted request");
            return Ok(());
        }

        let body = resp.text().await.unwrap_or_default();
        if status.is_client_error() {
            // The engine rejected the input itself (bad audio, unsupported
            // language). Retrying the same input cannot help.
            Err(EngineError::Permanent(format!("engine returned {status}: {body}")))
        } else {
            Err(EngineError::Transient(format!("engine returned {status}: {body}")))
        }
    }
}

#[async_trait]
impl SpeechEngine for HttpSpeechEngine {
    async fn start_transcription(
        &self,
        job_id: ObjectId,
        audio_url: &str,
        language: &str,
    ) -> Result<(), EngineError> {
        self.post(
            "/v1/transcriptions",
            serde_json::json!({
                "job_id": job_id.to_hex(),
                "audio_url": audio_url,
                "language": language,
            }),
        )
        .await
    }

    async fn start_summarization(
        &self,
        job_id: ObjectId,
        transcript_url: &str,
    ) -> Result<(), EngineError> {
        self.post(
            "/v1/summaries",
            serde_json::json!({
                "job_id": job_id.to_hex(),
                "transcript_url": transcript_url,
            }),
        )
        .await
    }
}

// ---- Webhook callback payloads -------------------------------------------

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EngineCallback {
    pub job_id: String,
    pub operation: CallbackOperation,
    pub status: CallbackStatus,
    pub error: Option<CallbackError>,
    pub transcription: Option<TranscriptionResult>,
    pub summary: Option<SummaryResult>,
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CallbackOperation {
    Transcription,
    Summarization,
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CallbackStatus {
    Succeeded,
    Failed,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CallbackError {
    pub message: String,
    #[serde(default)]
    pub transient: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TranscriptionResult {
    pub txt_url: String,
    pub srt_url: String,
    pub vtt_url: String,
    pub speakers_url: String,
    pub duration_seconds: f64,
    pub detected_language: Option<String>,
    #[serde(default)]
    pub speakers: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SummaryResult {
    pub summary_url: String,
}

#[derive(Debug, Error)]
#[error("invalid webhook signature")]
pub struct InvalidSignature;

/// Verifies the `t=...,v1=...` signature header on an engine callback.
pub fn verify_signature(
    webhook_secret: &str,
    payload: &[u8],
    sig_header: &str,
) -> Result<(), InvalidSignature> {
    let mut timestamp = None;
    let mut signatures: Vec<String> = Vec::new();

    for part in sig_header.split(',') {
        let part = part.trim();
        if let Some(t) = part.strip_prefix("t=") {
            timestamp = Some(t.to_string());
        } else if let Some(v1) = part.strip_prefix("v1=") {
            signatures.push(v1.to_string());
        }
    }

    let timestamp = timestamp.ok_or(InvalidSignature)?;
    if signatures.is_empty() {
        return Err(InvalidSignature);
    }

    let expected = compute_signature(webhook_secret, payload, &timestamp)?;

    if signatures.iter().any(|s| s == &expected) {
        Ok(())
    } else {
        Err(InvalidSignature)
    }
}

/// Produces the signature an engine would attach; used for outgoing test
/// payloads and documented for engine integrators.
pub fn sign_payload(
    webhook_secret: &str,
    payload: &[u8],
    timestamp: &str,
) -> Result<String, InvalidSignature> {
    let sig = compute_signature(webhook_secret, payload, timestamp)?;
    Ok(format!("t={timestamp},v1={sig}"))
}

fn compute_signature(
    webhook_secret: &str,
    payload: &[u8],
    timestamp: &str,
) -> Result<String, InvalidSignature> {
    use hmac::{Hmac, Mac};
    use sha2::Sha256;

    let signed_payload = format!("{timestamp}.{}", String::from_utf8_lossy(payload));

    let mut mac =
        Hmac::<Sha256>::new_from_slice(webhook_secret.as_bytes()).map_err(|_| InvalidSignature)?;
    mac.update(signed_payload.as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}
