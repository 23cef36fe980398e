use chrono::{DateTime, Utc};
use jobqueue::db;
use jobqueue::jobs::{Job, JobQueue, JobStatus, JobsRepo, NewJob};
use sqlx::SqlitePool;
use std::time::Duration;
use tempfile::TempDir;

pub struct TestDb {
    pub pool: SqlitePool,
    pub url: String,
    // Dropping this deletes the database file.
    _dir: TempDir,
}

impl TestDb {
    pub fn repo(&self) -> JobsRepo {
        JobsRepo::new(self.pool.clone())
    }

    pub fn queue(&self) -> JobQueue {
        JobQueue::from_pool(self.pool.clone())
    }

    /// A separate pool on the same file, for reading what another pool wrote.
    #[allow(dead_code)]
    pub async fn other_repo(&self) -> JobsRepo {
        let pool = db::make_pool(&self.url)
            .await
            .expect("failed to open second pool");
        JobsRepo::new(pool)
    }
}

pub async fn setup_db() -> TestDb {
    let dir = tempfile::tempdir().expect("failed to create temp dir");
    let url = format!("sqlite://{}", dir.path().join("jobs.db").display());

    let pool = db::make_pool(&url).await.expect("failed to open test db");
    db::run_migrations(&pool).await.expect("migrations failed");

    TestDb {
        pool,
        url,
        _dir: dir,
    }
}

#[allow(dead_code)]
pub async fn insert_job_with(
    repo: &JobsRepo,
    job_type: &str,
    priority: i32,
    scheduled_at: DateTime<Utc>,
) -> Job {
    repo.insert(NewJob {
        job_type: job_type.to_string(),
        payload: "{}".to_string(),
        scheduled_at,
        priority,
        max_retries: 3,
    })
    .await
    .expect("failed to insert job")
}

/// Pretend the backoff already elapsed.
#[allow(dead_code)]
pub async fn make_due_now(pool: &SqlitePool, job_id: i64) {
    sqlx::query("UPDATE job_queue SET scheduled_at = ?1 WHERE id = ?2")
        .bind(Utc::now() - chrono::Duration::seconds(1))
        .bind(job_id)
        .execute(pool)
        .await
        .expect("failed to reschedule job");
}

#[allow(dead_code)]
pub async fn wait_for_status(queue: &JobQueue, job_id: i64, status: JobStatus) -> Job {
    for _ in 0..250 {
        let job = queue
            .get_job(job_id)
            .await
            .expect("get_job failed")
            .expect("job missing");
        if job.status == status {
            return job;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("job {job_id} never reached {status}");
}
