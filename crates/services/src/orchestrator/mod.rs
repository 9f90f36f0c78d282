pub mod event;
pub mod transition;

use std::sync::Arc;

use bson::{doc, oid::ObjectId};
use mediascribe_config::{EngineSettings, PricingSettings};
use mediascribe_db::models::{JobStatus, OperationType};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::dao::base::{DaoError, DaoResult};
use crate::dao::{JobDao, UsageLedger, UserDao};
use crate::engine::{EngineError, SpeechEngine};

pub use event::{JobEvent, SummarizationOutcome, TranscriptionArtifacts, TranscriptionOutcome};
use transition::{Action, plan, transcription_failure};

const NON_TERMINAL: &[JobStatus] = &[
    JobStatus::Pending,
    JobStatus::Processing,
    JobStatus::Transcribed,
    JobStatus::Summarized,
];

/// Event-driven sequencer for the transcribe → summarize pipeline. All
/// cross-step state lives in the job store and the usage ledger; handlers
/// are idempotent under duplicate delivery and never bring the consumer
/// down.
pub struct Orchestrator {
    jobs: Arc<JobDao>,
    ledger: Arc<UsageLedger>,
    users: Arc<UserDao>,
    engine: Arc<dyn SpeechEngine>,
    pricing: PricingSettings,
    max_retries: u32,
    tx: mpsc::UnboundedSender<JobEvent>,
}

impl Orchestrator {
    /// Builds the orchestrator and spawns its consumer loop.
    pub fn start(
        jobs: Arc<JobDao>,
        ledger: Arc<UsageLedger>,
        users: Arc<UserDao>,
        engine: Arc<dyn SpeechEngine>,
        engine_settings: &EngineSettings,
        pricing: PricingSettings,
    ) -> Arc<Self> {
        let (tx, rx) = mpsc::unbounded_channel();
        let orchestrator = Arc::new(Self {
            jobs,
            ledger,
            users,
            engine,
            pricing,
            max_retries: engine_settings.max_retries,
            tx,
        });

        let consumer = Arc::clone(&orchestrator);
        tokio::spawn(async move { consumer.run(rx).await });

        orchestrator
    }

    /// Queues an internally generated hop (`TranscribeRequested`,
    /// `SummarizeRequested`) for the consumer loop. Engine callbacks skip
    /// the queue: the webhook handler calls [`Self::handle_event`] directly
    /// and only acks once the result is stored.
    pub fn dispatch(&self, event: JobEvent) {
        if self.tx.send(event).is_err() {
            error!("Event consumer is gone; dropping event");
        }
    }

    async fn run(self: Arc<Self>, mut rx: mpsc::UnboundedReceiver<JobEvent>) {
        info!("Orchestrator consumer started");
        while let Some(event) = rx.recv().await {
            let job_id = event.job_id();
            if let Err(e) = self.handle_event(event).await {
                // A failed dispatch hop is logged, never fatal to the
                // consumer. The next engine callback for the job re-drives
                // it through the planner.
                error!(%job_id, %e, "Orchestration step failed");
            }
        }
    }

    /// Plans and executes one event against fresh job state. Called by the
    /// consumer loop for queued hops and directly by the webhook handler,
    /// which turns an `Err` into a 5xx so the engine re-posts.
    pub async fn handle_event(&self, event: JobEvent) -> DaoResult<()> {
        let job_id = event.job_id();
        let job = match self.jobs.find_by_id(job_id).await {
            Ok(job) => job,
            Err(DaoError::NotFound) => {
                warn!(%job_id, "Event for unknown job; dropping");
                return Ok(());
            }
            Err(e) => return Err(e),
        };

        let action = plan(job.status, job.retry_count, self.max_retries, &event);
        debug!(%job_id, status = job.status.as_str(), ?action, "Planned");

        match (action, event) {
            (Action::StartTranscription, JobEvent::TranscribeRequested { .. }) => {
                self.start_transcription(job_id).await
            }
            (
                Action::ApplyTranscriptionSuccess,
                JobEvent::TranscriptionCompleted {
                    outcome: TranscriptionOutcome::Succeeded(artifacts),
                    ..
                },
            ) => self.apply_transcription_success(job_id, artifacts).await,
            (
                Action::RetryTranscription | Action::FailJob,
                JobEvent::TranscriptionCompleted {
                    outcome: TranscriptionOutcome::Failed { message, transient },
                    ..
                },
            ) => {
                self.handle_transcription_failure(job_id, message, transient)
                    .await
            }
            (Action::StartSummarization, JobEvent::SummarizeRequested { .. }) => {
                self.start_summarization(job_id).await
            }
            (
                Action::ApplySummarizationSuccess,
                JobEvent::SummarizationCompleted {
                    outcome: SummarizationOutcome::Succeeded { summary_url },
                    ..
                },
            ) => self.apply_summarization_success(job_id, summary_url).await,
            (
                Action::AcceptPartialSummary,
                JobEvent::SummarizationCompleted {
                    outcome: SummarizationOutcome::Failed { message },
                    ..
                },
            ) => self.accept_partial_summary(job_id, &message).await,
            (Action::Ignore(reason), _) => {
                debug!(%job_id, reason, "Duplicate or stale event; no-op");
                Ok(())
            }
            // plan() only yields actions matching the event that produced
            // them; any other pairing is unreachable.
            _ => Ok(()),
        }
    }

    async fn start_transcription(&self, job_id: ObjectId) -> DaoResult<()> {
        let job = match self
            .jobs
            .transition(
                job_id,
                &[JobStatus::Pending, JobStatus::Processing],
                JobStatus::Processing,
                doc! {},
            )
            .await
        {
            Ok(job) => job,
            Err(DaoError::InvalidTransition(msg)) => {
                debug!(%job_id, %msg, "Transcribe dispatch lost the race; no-op");
                return Ok(());
            }
            Err(e) => return Err(e),
        };

        info!(%job_id, attempt = job.retry_count + 1, "Invoking transcription engine");
        if let Err(err) = self
            .engine
            .start_transcription(job_id, &job.audio_url, &job.language)
            .await
        {
            let transient = matches!(err, EngineError::Transient(_));
            self.handle_transcription_failure(job_id, err.to_string(), transient)
                .await?;
        }
        Ok(())
    }

    async fn apply_transcription_success(
        &self,
        job_id: ObjectId,
        artifacts: TranscriptionArtifacts,
    ) -> DaoResult<()> {
        let minutes = artifacts.duration_seconds / 60.0;
        let cost_usd = minutes * self.pricing.transcription_per_minute_usd;

        let mut set = doc! {
            "artifacts.txt_url": &artifacts.txt_url,
            "artifacts.srt_url": &artifacts.srt_url,
            "artifacts.vtt_url": &artifacts.vtt_url,
            "artifacts.speakers_url": &artifacts.speakers_url,
            "audio_duration_seconds": artifacts.duration_seconds,
            "metadata.speakers": &artifacts.speakers,
        };
        if let Some(lang) = &artifacts.detected_language {
            set.insert("metadata.detected_language", lang);
        }

        // Artifact writes and the status change are one atomic update, so a
        // crash can never leave artifacts without the matching status.
        let job = match self
            .jobs
            .transition(job_id, &[JobStatus::Processing], JobStatus::Transcribed, set)
            .await
        {
            Ok(job) => job,
            Err(DaoError::InvalidTransition(msg)) => {
                debug!(%job_id, %msg, "Transcription result already applied; no-op");
                return Ok(());
            }
            Err(e) => return Err(e),
        };

        let outcome = self
            .ledger
            .record(job.user_id, job_id, OperationType::Transcription, cost_usd)
            .await?;
        if outcome.newly_recorded {
            // One job = one unit of monthly quota, counted here and only
            // here. The cost rollup rides along.
            self.users.increment_monthly_usage(job.user_id).await?;
            self.users.add_cost(job.user_id, cost_usd).await?;
        }

        info!(%job_id, cost_usd, "Transcription complete");
        self.dispatch(JobEvent::SummarizeRequested { job_id });
        Ok(())
    }

    async fn handle_transcription_failure(
        &self,
        job_id: ObjectId,
        message: String,
        transient: bool,
    ) -> DaoResult<()> {
        // Re-plan against fresh state: the budget may have been consumed by
        // a concurrent delivery.
        let job = self.jobs.find_by_id(job_id).await?;
        match transcription_failure(job.status, job.retry_count, self.max_retries, transient) {
            Action::RetryTranscription => {
                match self.jobs.increment_retry(job_id).await? {
                    Some(job) => {
                        warn!(
                            %job_id,
                            retry_count = job.retry_count,
                            %message,
                            "Transient transcription failure; retrying"
                        );
                        self.dispatch(JobEvent::TranscribeRequested { job_id });
                    }
                    None => debug!(%job_id, "Job advanced before retry; no-op"),
                }
                Ok(())
            }
            Action::FailJob => self.fail_job(job_id, &message).await,
            Action::Ignore(reason) => {
                debug!(%job_id, reason, "Stale failure event; no-op");
                Ok(())
            }
            _ => Ok(()),
        }
    }

    async fn start_summarization(&self, job_id: ObjectId) -> DaoResult<()> {
        let job = self.jobs.find_by_id(job_id).await?;
        let Some(transcript_url) = job.artifacts.txt_url.clone() else {
            // transcribed without a transcript artifact breaks the model's
            // invariants; nothing sane can follow.
            return self
                .mark_unrecoverable(job_id, "transcribed job has no transcript artifact")
                .await;
        };

        info!(%job_id, "Invoking summarization engine");
        if let Err(err) = self.engine.start_summarization(job_id, &transcript_url).await {
            // Summarization failures are never fatal: the transcript is
            // already deliverable on its own.
            self.accept_partial_summary(job_id, &err.to_string()).await?;
        }
        Ok(())
    }

    async fn apply_summarization_success(
        &self,
        job_id: ObjectId,
        summary_url: String,
    ) -> DaoResult<()> {
        let cost_usd = self.pricing.summarization_usd;

        let job = match self
            .jobs
            .transition(
                job_id,
                &[JobStatus::Transcribed],
                JobStatus::Completed,
                doc! { "artifacts.summary_url": &summary_url },
            )
            .await
        {
            Ok(job) => job,
            Err(DaoError::InvalidTransition(msg)) => {
                debug!(%job_id, %msg, "Summarization result already applied; no-op");
                return Ok(());
            }
            Err(e) => return Err(e),
        };

        let outcome = self
            .ledger
            .record(job.user_id, job_id, OperationType::Summarization, cost_usd)
            .await?;
        if outcome.newly_recorded {
            // Summaries bill dollars but never consume monthly quota.
            self.users.add_cost(job.user_id, cost_usd).await?;
        }

        info!(%job_id, "Job completed");
        Ok(())
    }

    async fn accept_partial_summary(&self, job_id: ObjectId, message: &str) -> DaoResult<()> {
        match self
            .jobs
            .transition(job_id, &[JobStatus::Transcribed], JobStatus::Summarized, doc! {})
            .await
        {
            Ok(_) => {
                warn!(%job_id, %message, "Summarization failed; transcript remains available");
                Ok(())
            }
            Err(DaoError::InvalidTransition(msg)) => {
                debug!(%job_id, %msg, "Partial-summary event redelivered; no-op");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    async fn fail_job(&self, job_id: ObjectId, message: &str) -> DaoResult<()> {
        match self
            .jobs
            .transition(
                job_id,
                &[JobStatus::Pending, JobStatus::Processing],
                JobStatus::Failed,
                doc! { "error_message": message },
            )
            .await
        {
            Ok(job) => {
                warn!(%job_id, retry_count = job.retry_count, %message, "Job failed");
                Ok(())
            }
            Err(DaoError::InvalidTransition(msg)) => {
                debug!(%job_id, %msg, "Failure event redelivered; no-op");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Moves a job to the `error` terminal state from any non-terminal
    /// status. No retries follow.
    pub async fn mark_unrecoverable(&self, job_id: ObjectId, message: &str) -> DaoResult<()> {
        match self
            .jobs
            .transition(
                job_id,
                NON_TERMINAL,
                JobStatus::Error,
                doc! { "error_message": message },
            )
            .await
        {
            Ok(_) => {
                error!(%job_id, %message, "Job hit an unrecoverable error");
                Ok(())
            }
            Err(DaoError::InvalidTransition(msg)) => {
                debug!(%job_id, %msg, "Job already terminal; no-op");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }
}
