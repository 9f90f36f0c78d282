//! Pure planning half of the state machine: (status, event) decides the
//! action, the orchestrator performs the I/O. Keeping this side-effect
//! free makes the transition table directly testable.

use mediascribe_db::models::JobStatus;

use super::event::{JobEvent, SummarizationOutcome, TranscriptionOutcome};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// pending/processing: mark processing and invoke the engine.
    StartTranscription,
    /// processing: write artifacts, bill, emit summarize.
    ApplyTranscriptionSuccess,
    /// processing, transient failure with budget left: bump retry_count
    /// and re-dispatch.
    RetryTranscription,
    /// Transcription is unrecoverable; without a transcript nothing
    /// downstream is usable, so the job fails.
    FailJob,
    /// transcribed: invoke the summarization engine.
    StartSummarization,
    /// transcribed: write summary url, bill, complete.
    ApplySummarizationSuccess,
    /// transcribed, summarization failed: the transcript alone is still
    /// deliverable, so the job parks at `summarized` instead of failing.
    AcceptPartialSummary,
    /// Stale or duplicate delivery; nothing to do.
    Ignore(&'static str),
}

pub fn plan(status: JobStatus, retry_count: u32, max_retries: u32, event: &JobEvent) -> Action {
    match event {
        JobEvent::TranscribeRequested { .. } => match status {
            // Processing is allowed so that retry re-dispatches and
            // duplicate deliveries of the initial event converge.
            JobStatus::Pending | JobStatus::Processing => Action::StartTranscription,
            _ => Action::Ignore("job already past transcription dispatch"),
        },
        JobEvent::TranscriptionCompleted { outcome, .. } => match outcome {
            TranscriptionOutcome::Succeeded(_) => match status {
                JobStatus::Processing => Action::ApplyTranscriptionSuccess,
                _ => Action::Ignore("transcription result already applied"),
            },
            TranscriptionOutcome::Failed { transient, .. } => {
                transcription_failure(status, retry_count, max_retries, *transient)
            }
        },
        JobEvent::SummarizeRequested { .. } => match status {
            JobStatus::Transcribed => Action::StartSummarization,
            _ => Action::Ignore("job not awaiting summarization"),
        },
        JobEvent::SummarizationCompleted { outcome, .. } => match status {
            JobStatus::Transcribed => match outcome {
                SummarizationOutcome::Succeeded { .. } => Action::ApplySummarizationSuccess,
                SummarizationOutcome::Failed { .. } => Action::AcceptPartialSummary,
            },
            _ => Action::Ignore("summarization result already applied"),
        },
    }
}

/// Shared by failed callbacks and engine invocation errors. Only transient
/// failures consume the retry budget; permanent ones fail immediately.
pub fn transcription_failure(
    status: JobStatus,
    retry_count: u32,
    max_retries: u32,
    transient: bool,
) -> Action {
    if status != JobStatus::Processing {
        return Action::Ignore("job no longer processing");
    }
    if transient && retry_count < max_retries {
        Action::RetryTranscription
    } else {
        Action::FailJob
    }
}
