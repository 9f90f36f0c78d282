use std::sync::Arc;

use bson::DateTime;
use chrono::{Duration, Utc};
use tracing::{info, warn};

use mediascribe_db::models::Job;

use crate::dao::JobDao;
use crate::dao::base::DaoResult;
use crate::object_store::ObjectStore;

/// Deletes terminal jobs older than the retention window, together with
/// their stored audio and artifacts. Usage ledger rows are deliberately
/// left alone; billing history outlives the media.
pub struct RetentionSweeper {
    jobs: Arc<JobDao>,
    store: Arc<dyn ObjectStore>,
}

#[derive(Debug, Default)]
pub struct SweepReport {
    pub deleted_jobs: u64,
    pub deleted_objects: u64,
    pub failed_objects: u64,
}

impl RetentionSweeper {
    pub fn new(jobs: Arc<JobDao>, store: Arc<dyn ObjectStore>) -> Self {
        Self { jobs, store }
    }

    pub async fn sweep(&self, retention_days: i64) -> DaoResult<SweepReport> {
        let cutoff = Utc::now() - Duration::days(retention_days);
        let cutoff = DateTime::from_chrono(cutoff);

        let expired = self.jobs.find_terminal_older_than(cutoff).await?;
        let mut report = SweepReport::default();

        for job in expired {
            let Some(job_id) = job.id else { continue };

            // Objects go first, best effort. A job row is only removed once
            // we tried every object, so a failed delete gets retried on the
            // next sweep.
            for url in object_urls(&job) {
                match self.store.delete(&url).await {
                    Ok(()) => report.deleted_objects += 1,
                    Err(e) => {
                        warn!(%job_id, %url, %e, "Failed to delete stored object");
                        report.failed_objects += 1;
                    }
                }
            }

            if self.jobs.delete(job_id).await? {
                report.deleted_jobs += 1;
            }
        }

        info!(
            deleted_jobs = report.deleted_jobs,
            deleted_objects = report.deleted_objects,
            failed_objects = report.failed_objects,
            retention_days,
            "Retention sweep finished"
        );
        Ok(report)
    }
}

fn object_urls(job: &Job) -> Vec<String> {
    let mut urls = vec![job.audio_url.clone()];
    let a = &job.artifacts;
    for url in [
        &a.txt_url,
        &a.srt_url,
        &a.vtt_url,
        &a.speakers_url,
        &a.summary_url,
    ]
    .into_iter()
    .flatten()
    {
        urls.push(url.clone());
    }
    urls
}
