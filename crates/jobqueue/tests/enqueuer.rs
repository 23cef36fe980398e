// tests/enqueuer.rs
mod common;

use async_trait::async_trait;
use common::setup_db;
use jobqueue::jobs::enqueuer::USER_CREATED_PRIORITY;
use jobqueue::jobs::{
    enqueue_or_log, enqueue_user_created, Job, JobEnqueuer, JobPayload, JobStatus,
};
use jobqueue::QueueError;
use serde_json::{json, Map, Value};
use std::sync::atomic::{AtomicUsize, Ordering};

struct BrokenQueue {
    calls: AtomicUsize,
}

#[async_trait]
impl JobEnqueuer for BrokenQueue {
    async fn enqueue(
        &self,
        _job_type: &str,
        _payload: &JobPayload,
        _priority: i32,
    ) -> Result<Job, QueueError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(QueueError::InvalidInput("queue is down".into()))
    }
}

fn object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        other => panic!("expected an object, got {other}"),
    }
}

#[tokio::test]
async fn enqueue_failure_is_swallowed() {
    let broken = BrokenQueue {
        calls: AtomicUsize::new(0),
    };

    let job = enqueue_user_created(&broken, 7, Map::new(), Map::new()).await;
    assert!(job.is_none());

    let job = enqueue_or_log(&broken, "data_analysis", &JobPayload::default(), 0).await;
    assert!(job.is_none());
    assert_eq!(broken.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn user_created_job_carries_the_user() {
    let db = setup_db().await;
    let queue = db.queue();

    let user_data = object(json!({ "name": "Ada", "email": "ada@example.com" }));
    let props = object(json!({ "source": "signup", "plan": "free" }));

    let job = enqueue_user_created(&queue, 42, user_data.clone(), props.clone())
        .await
        .expect("enqueue should succeed");

    assert_eq!(job.job_type, "user_created");
    assert_eq!(job.priority, USER_CREATED_PRIORITY);
    assert_eq!(job.status, JobStatus::Pending);

    let payload = JobPayload::parse(&job.payload).unwrap();
    assert_eq!(payload.user_id, Some(42));
    assert_eq!(payload.user_data, user_data);
    assert_eq!(payload.additional_props, props);
}

#[tokio::test]
async fn blank_job_type_is_logged_not_raised() {
    let db = setup_db().await;
    let queue = db.queue();

    assert!(enqueue_or_log(&queue, "  ", &JobPayload::default(), 0)
        .await
        .is_none());
    assert_eq!(queue.get_stats().await.unwrap().total(), 0);
}
