use crate::error::QueueError;
use crate::jobs::model::{Job, JobStats, JobStatus, NewJob};
use crate::jobs::repo::JobsRepo;
use crate::jobs::retry::MAX_RETRIES;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::SqlitePool;
use tracing::{debug, warn};

pub type Result<T> = std::result::Result<T, QueueError>;

/// What a `fail_job` call did to the row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailOutcome {
    /// Back to pending, eligible again at `scheduled_at`.
    Rescheduled {
        retry_count: i32,
        scheduled_at: DateTime<Utc>,
    },
    /// Terminal failure.
    Failed,
    /// The job was not processing; nothing changed.
    Ignored,
}

#[derive(Clone)]
pub struct JobQueue {
    repo: JobsRepo,
}

impl JobQueue {
    pub fn new(repo: JobsRepo) -> Self {
        Self { repo }
    }

    pub fn from_pool(pool: SqlitePool) -> Self {
        Self::new(JobsRepo::new(pool))
    }

    pub fn repo(&self) -> &JobsRepo {
        &self.repo
    }

    // ----------------------------
    // Enqueue
    // ----------------------------

    pub async fn enqueue_job<P>(&self, job_type: &str, payload: &P, priority: i32) -> Result<Job>
    where
        P: Serialize + ?Sized,
    {
        self.enqueue_job_at(job_type, payload, priority, Utc::now())
            .await
    }

    /// Enqueue a job that becomes eligible at `scheduled_at`.
    pub async fn enqueue_job_at<P>(
        &self,
        job_type: &str,
        payload: &P,
        priority: i32,
        scheduled_at: DateTime<Utc>,
    ) -> Result<Job>
    where
        P: Serialize + ?Sized,
    {
        let job_type = job_type.trim();
        if job_type.is_empty() {
            return Err(QueueError::InvalidInput("job type must not be empty".into()));
        }

        let payload = serde_json::to_string(payload)?;

        let job = self
            .repo
            .insert(NewJob {
                job_type: job_type.to_string(),
                payload,
                scheduled_at,
                priority,
                max_retries: MAX_RETRIES,
            })
            .await?;

        debug!(job_id = job.id, job_type = %job.job_type, priority, "job enqueued");
        Ok(job)
    }

    // ----------------------------
    // Worker protocol
    // ----------------------------

    /// Claim the next eligible job. The payload is left serialized.
    pub async fn claim_next_job(&self) -> Result<Option<Job>> {
        Ok(self.repo.claim_next(Utc::now()).await?)
    }

    /// Returns false when the job was not processing.
    pub async fn complete_job(&self, job_id: i64) -> Result<bool> {
        let done = self.repo.mark_completed(job_id, Utc::now()).await?;
        if !done {
            warn!(job_id, "complete ignored: job is not processing");
        }
        Ok(done)
    }

    pub async fn fail_job(&self, job_id: i64, message: &str, retry: bool) -> Result<FailOutcome> {
        let now = Utc::now();

        if retry {
            if let Some(job) = self.repo.reschedule_for_retry(job_id, now, message).await? {
                return Ok(match job.status {
                    JobStatus::Pending => FailOutcome::Rescheduled {
                        retry_count: job.retry_count,
                        scheduled_at: job.scheduled_at,
                    },
                    _ => FailOutcome::Failed,
                });
            }
        }

        // Either no retry was asked for, or the row had no retry budget left.
        if self.repo.mark_failed(job_id, now, message).await? {
            Ok(FailOutcome::Failed)
        } else {
            warn!(job_id, "fail ignored: job is not processing");
            Ok(FailOutcome::Ignored)
        }
    }

    // ----------------------------
    // Reads
    // ----------------------------

    pub async fn get_job(&self, job_id: i64) -> Result<Option<Job>> {
        Ok(self.repo.get_job(job_id).await?)
    }

    pub async fn list_jobs(&self, status: JobStatus, limit: i64) -> Result<Vec<Job>> {
        Ok(self.repo.list_jobs(status, limit).await?)
    }

    pub async fn get_stats(&self) -> Result<JobStats> {
        Ok(self.repo.stats().await?)
    }
}
