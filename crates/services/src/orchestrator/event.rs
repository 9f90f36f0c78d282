use bson::oid::ObjectId;

/// Events driving a job through its lifecycle. Delivery is at-least-once
/// and `job_id` is the only correlation key, so every handler must
/// tolerate duplicates.
#[derive(Debug, Clone)]
pub enum JobEvent {
    TranscribeRequested {
        job_id: ObjectId,
    },
    TranscriptionCompleted {
        job_id: ObjectId,
        outcome: TranscriptionOutcome,
    },
    SummarizeRequested {
        job_id: ObjectId,
    },
    SummarizationCompleted {
        job_id: ObjectId,
        outcome: SummarizationOutcome,
    },
}

impl JobEvent {
    pub fn job_id(&self) -> ObjectId {
        match self {
            JobEvent::TranscribeRequested { job_id }
            | JobEvent::TranscriptionCompleted { job_id, .. }
            | JobEvent::SummarizeRequested { job_id }
            | JobEvent::SummarizationCompleted { job_id, .. } => *job_id,
        }
    }
}

#[derive(Debug, Clone)]
pub enum TranscriptionOutcome {
    Succeeded(TranscriptionArtifacts),
    Failed { message: String, transient: bool },
}

#[derive(Debug, Clone)]
pub struct TranscriptionArtifacts {
    pub txt_url: String,
    pub srt_url: String,
    pub vtt_url: String,
    pub speakers_url: String,
    pub duration_seconds: f64,
    pub detected_language: Option<String>,
    pub speakers: Vec<String>,
}

#[derive(Debug, Clone)]
pub enum SummarizationOutcome {
    Succeeded { summary_url: String },
    Failed { message: String },
}
