use crate::error::QueueError;
use crate::jobs::model::Job;
use crate::jobs::payload::{JobKind, JobPayload};
use crate::jobs::queue::JobQueue;
use async_trait::async_trait;
use serde_json::{Map, Value};
use tracing::{info, warn};

/// Priority given to the job queued after a user is created.
pub const USER_CREATED_PRIORITY: i32 = 1;

/// The one call the request-handling layer makes into the queue.
#[async_trait]
pub trait JobEnqueuer: Send + Sync {
    async fn enqueue(
        &self,
        job_type: &str,
        payload: &JobPayload,
        priority: i32,
    ) -> Result<Job, QueueError>;
}

#[async_trait]
impl JobEnqueuer for JobQueue {
    async fn enqueue(
        &self,
        job_type: &str,
        payload: &JobPayload,
        priority: i32,
    ) -> Result<Job, QueueError> {
        self.enqueue_job(job_type, payload, priority).await
    }
}

/// Fire-and-forget enqueue for use after a business write has committed.
/// A failure is logged and swallowed so it never undoes the caller's work.
pub async fn enqueue_or_log(
    enqueuer: &dyn JobEnqueuer,
    job_type: &str,
    payload: &JobPayload,
    priority: i32,
) -> Option<Job> {
    match enqueuer.enqueue(job_type, payload, priority).await {
        Ok(job) => {
            info!(job_id = job.id, job_type, "background job enqueued");
            Some(job)
        }
        Err(e) => {
            warn!(job_type, error = %e, "failed to enqueue background job");
            None
        }
    }
}

/// Queue the `user_created` follow-up work for a freshly stored user.
pub async fn enqueue_user_created(
    enqueuer: &dyn JobEnqueuer,
    user_id: i64,
    user_data: Map<String, Value>,
    additional_props: Map<String, Value>,
) -> Option<Job> {
    let payload = JobPayload {
        user_id: Some(user_id),
        user_data,
        additional_props,
        ..JobPayload::default()
    };

    enqueue_or_log(
        enqueuer,
        JobKind::UserCreated.as_str(),
        &payload,
        USER_CREATED_PRIORITY,
    )
    .await
}
