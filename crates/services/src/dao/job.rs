use bson::{DateTime, doc, oid::ObjectId};
use mongodb::Database;
use mediascribe_db::models::{Job, JobStatus};

use super::base::{BaseDao, DaoError, DaoResult, PaginatedResult, PaginationParams};

/// Durable record of every transcription job. Status changes go through
/// `transition`, a single conditional write, so two concurrently delivered
/// events can never both advance the same job.
pub struct JobDao {
    pub base: BaseDao<Job>,
}

impl JobDao {
    pub fn new(db: &Database) -> Self {
        Self {
            base: BaseDao::new(db, Job::COLLECTION),
        }
    }

    pub async fn create(
        &self,
        user_id: ObjectId,
        filename: String,
        audio_url: String,
        language: String,
        audio_size_bytes: u64,
    ) -> DaoResult<Job> {
        let now = DateTime::now();
        let job = Job {
            id: None,
            user_id,
            filename,
            audio_url,
            audio_size_bytes,
            language,
            audio_duration_seconds: None,
            status: JobStatus::Pending,
            artifacts: Default::default(),
            metadata: Default::default(),
            error_message: None,
            retry_count: 0,
            created_at: now,
            updated_at: now,
            completed_at: None,
        };

        let id = self.base.insert_one(&job).await?;
        self.base.find_by_id(id).await
    }

    pub async fn find_by_id(&self, id: ObjectId) -> DaoResult<Job> {
        self.base.find_by_id(id).await
    }

    pub async fn find_by_user(
        &self,
        user_id: ObjectId,
        params: &PaginationParams,
    ) -> DaoResult<PaginatedResult<Job>> {
        self.base
            .find_paginated(
                doc! { "user_id": user_id },
                Some(doc! { "created_at": -1 }),
                params,
            )
            .await
    }

    /// Moves a job to `to`, but only if its current status is in
    /// `allowed_from`. Field writes in `extra_set` ride the same update as
    /// the status write. Fails with `InvalidTransition` when the job exists
    /// but has already moved on (duplicate event delivery), which callers
    /// treat as a no-op.
    pub async fn transition(
        &self,
        id: ObjectId,
        allowed_from: &[JobStatus],
        to: JobStatus,
        extra_set: bson::Document,
    ) -> DaoResult<Job> {
        let from: Vec<&str> = allowed_from.iter().map(|s| s.as_str()).collect();

        let mut set = extra_set;
        set.insert("status", to.as_str());
        if to.is_terminal() {
            set.insert("completed_at", DateTime::now());
        }

        let updated = self
            .base
            .find_one_and_update(
                doc! { "_id": id, "status": { "$in": from } },
                doc! { "$set": set },
            )
            .await?;

        match updated {
            Some(job) => Ok(job),
            None => {
                // Distinguish a missing job from a lost race.
                let current = self.base.find_by_id(id).await?;
                Err(DaoError::InvalidTransition(format!(
                    "job {} is {}, cannot move to {}",
                    id,
                    current.status.as_str(),
                    to.as_str()
                )))
            }
        }
    }

    /// Bumps `retry_count` while the job is still processing. Returns the
    /// updated job, or None if the job advanced concurrently.
    pub async fn increment_retry(&self, id: ObjectId) -> DaoResult<Option<Job>> {
        self.base
            .find_one_and_update(
                doc! { "_id": id, "status": JobStatus::Processing.as_str() },
                doc! { "$inc": { "retry_count": 1 } },
            )
            .await
    }

    /// Terminal jobs whose `completed_at` lies before `cutoff`. Non-terminal
    /// jobs are never returned regardless of age.
    pub async fn find_terminal_older_than(&self, cutoff: DateTime) -> DaoResult<Vec<Job>> {
        let terminal = [
            JobStatus::Completed.as_str(),
            JobStatus::Failed.as_str(),
            JobStatus::Error.as_str(),
        ];
        self.base
            .find_many(
                doc! {
                    "status": { "$in": terminal.to_vec() },
                    "completed_at": { "$lt": cutoff },
                },
                Some(doc! { "completed_at": 1 }),
            )
            .await
    }

    pub async fn delete(&self, id: ObjectId) -> DaoResult<bool> {
        self.base.delete_by_id(id).await
    }
}
