// crates/jobqueue/src/jobs/repo.rs

use crate::error::StoreError;
use crate::jobs::model::{Job, JobStats, JobStatus, NewJob};
use crate::jobs::retry;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

pub type Result<T> = std::result::Result<T, StoreError>;

// RETURNING writes must be read with `fetch_all`. A statement left un-reset
// keeps its implicit transaction open on the pooled connection.

#[derive(Clone)]
pub struct JobsRepo {
    pool: SqlitePool,
}

impl JobsRepo {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    // ----------------------------
    // Insert
    // ----------------------------

    pub async fn insert(&self, job: NewJob) -> Result<Job> {
        let rec = sqlx::query_as::<_, Job>(
            r#"
            INSERT INTO job_queue (job_type, payload, status, priority, max_retries, retry_count, scheduled_at, created_at)
            VALUES (?1, ?2, 'pending', ?3, ?4, 0, ?5, ?6)
            RETURNING *
            "#,
        )
        .bind(&job.job_type)
        .bind(&job.payload)
        .bind(job.priority)
        .bind(job.max_retries)
        .bind(job.scheduled_at)
        .bind(Utc::now())
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .next()
        .ok_or(StoreError::Database(sqlx::Error::RowNotFound))?;

        Ok(rec)
    }

    // ----------------------------
    // Reads
    // ----------------------------

    pub async fn get_job(&self, job_id: i64) -> Result<Option<Job>> {
        let job = sqlx::query_as::<_, Job>("SELECT * FROM job_queue WHERE id = ?1")
            .bind(job_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(job)
    }

    /// Most recently created jobs with the given status.
    /// `limit` is clamped to [1, 1000].
    pub async fn list_jobs(&self, status: JobStatus, limit: i64) -> Result<Vec<Job>> {
        let limit = limit.clamp(1, 1000);

        let rows = sqlx::query_as::<_, Job>(
            r#"
            SELECT *
            FROM job_queue
            WHERE status = ?1
            ORDER BY created_at DESC, id DESC
            LIMIT ?2
            "#,
        )
        .bind(status)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    pub async fn stats(&self) -> Result<JobStats> {
        let stats = sqlx::query_as::<_, JobStats>(
            r#"
            SELECT
              COALESCE(SUM(CASE WHEN status = 'pending' THEN 1 ELSE 0 END), 0) AS pending,
              COALESCE(SUM(CASE WHEN status = 'processing' THEN 1 ELSE 0 END), 0) AS processing,
              COALESCE(SUM(CASE WHEN status = 'completed' THEN 1 ELSE 0 END), 0) AS completed,
              COALESCE(SUM(CASE WHEN status = 'failed' THEN 1 ELSE 0 END), 0) AS failed
            FROM job_queue
            "#,
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(stats)
    }

    // ----------------------------
    // Claim
    // ----------------------------

    /// Claim the best-ranked eligible job and mark it processing.
    ///
    /// Selection and update run as one statement, and SQLite serializes
    /// writers, so two concurrent callers can never get the same row.
    pub async fn claim_next(&self, now: DateTime<Utc>) -> Result<Option<Job>> {
        let rows = sqlx::query_as::<_, Job>(
            r#"
            UPDATE job_queue
            SET status = 'processing',
                started_at = ?1,
                completed_at = NULL
            WHERE id = (
                SELECT id
                FROM job_queue
                WHERE status = 'pending'
                  AND scheduled_at <= ?1
                  AND retry_count < max_retries
                ORDER BY priority DESC, scheduled_at ASC, id ASC
                LIMIT 1
            )
              AND status = 'pending'
            RETURNING *
            "#,
        )
        .bind(now)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().next())
    }

    // ----------------------------
    // State transitions
    // ----------------------------

    /// Processing -> Completed | Failed. Returns false when the job was not
    /// processing, in which case nothing changed.
    pub async fn mark_terminal(
        &self,
        job_id: i64,
        status: JobStatus,
        completed_at: DateTime<Utc>,
        error_message: Option<&str>,
    ) -> Result<bool> {
        if !status.is_terminal() {
            return Err(StoreError::InvalidStatus(format!(
                "{status} is not a terminal status"
            )));
        }

        let res = sqlx::query(
            r#"
            UPDATE job_queue
            SET status = ?2,
                completed_at = ?3,
                error_message = COALESCE(?4, error_message)
            WHERE id = ?1
              AND status = 'processing'
            "#,
        )
        .bind(job_id)
        .bind(status)
        .bind(completed_at)
        .bind(error_message)
        .execute(&self.pool)
        .await?;

        Ok(res.rows_affected() > 0)
    }

    pub async fn mark_completed(&self, job_id: i64, now: DateTime<Utc>) -> Result<bool> {
        self.mark_terminal(job_id, JobStatus::Completed, now, None)
            .await
    }

    pub async fn mark_failed(
        &self,
        job_id: i64,
        now: DateTime<Utc>,
        error_message: &str,
    ) -> Result<bool> {
        self.mark_terminal(job_id, JobStatus::Failed, now, Some(error_message))
            .await
    }

    /// Processing -> Pending with `retry_count + 1` and an arithmetic backoff.
    ///
    /// When the increment reaches `max_retries` the job goes to Failed instead
    /// and keeps its last `scheduled_at`. Returns the updated row, or `None`
    /// when the job was not processing.
    pub async fn reschedule_for_retry(
        &self,
        job_id: i64,
        now: DateTime<Utc>,
        error_message: &str,
    ) -> Result<Option<Job>> {
        let current: Option<(i32, JobStatus)> =
            sqlx::query_as("SELECT retry_count, status FROM job_queue WHERE id = ?1")
                .bind(job_id)
                .fetch_optional(&self.pool)
                .await?;

        let Some((retry_count, JobStatus::Processing)) = current else {
            return Ok(None);
        };

        let next_run_at = retry::next_scheduled_at(now, retry_count);

        // The retry_count guard makes this a compare-and-set against the row we read.
        let rows = sqlx::query_as::<_, Job>(
            r#"
            UPDATE job_queue
            SET status = CASE WHEN retry_count + 1 >= max_retries THEN 'failed' ELSE 'pending' END,
                scheduled_at = CASE WHEN retry_count + 1 >= max_retries THEN scheduled_at ELSE ?3 END,
                completed_at = CASE WHEN retry_count + 1 >= max_retries THEN ?4 ELSE NULL END,
                retry_count = retry_count + 1,
                error_message = ?5
            WHERE id = ?1
              AND status = 'processing'
              AND retry_count = ?2
              AND retry_count < max_retries
            RETURNING *
            "#,
        )
        .bind(job_id)
        .bind(retry_count)
        .bind(next_run_at)
        .bind(now)
        .bind(error_message)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().next())
    }
}
