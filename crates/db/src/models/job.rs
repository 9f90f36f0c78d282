use bson::{DateTime, oid::ObjectId};
use serde::{Deserialize, Serialize};

/// One user-submitted media file and its lifecycle state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub user_id: ObjectId,
    pub filename: String,
    pub audio_url: String,
    pub audio_size_bytes: u64,
    pub language: String,
    pub audio_duration_seconds: Option<f64>,
    #[serde(default)]
    pub status: JobStatus,
    #[serde(default)]
    pub artifacts: JobArtifacts,
    #[serde(default)]
    pub metadata: JobMetadata,
    pub error_message: Option<String>,
    #[serde(default)]
    pub retry_count: u32,
    pub created_at: DateTime,
    pub updated_at: DateTime,
    /// Set exactly when the job enters a terminal status.
    pub completed_at: Option<DateTime>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    #[default]
    Pending,
    Processing,
    Transcribed,
    /// Transcript available, summary permanently unavailable. A partial
    /// success, not a failure.
    Summarized,
    Completed,
    Failed,
    Error,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed | JobStatus::Error)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Processing => "processing",
            JobStatus::Transcribed => "transcribed",
            JobStatus::Summarized => "summarized",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::Error => "error",
        }
    }
}

/// Artifact URLs, each write-once as its producing step succeeds.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct JobArtifacts {
    pub txt_url: Option<String>,
    pub srt_url: Option<String>,
    pub vtt_url: Option<String>,
    pub speakers_url: Option<String>,
    pub summary_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct JobMetadata {
    #[serde(default)]
    pub speakers: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub detected_language: Option<String>,
}

impl Job {
    pub const COLLECTION: &'static str = "jobs";
}
