use crate::error::QueueError;
use crate::jobs::model::Job;
use crate::jobs::payload::{JobPayload, TypedPayload};
use crate::jobs::queue::{FailOutcome, JobQueue};
use crate::jobs::registry::HandlerRegistry;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{error, info, warn};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Running,
    /// No more polls; waiting for in-flight jobs to settle.
    Stopping,
    Stopped,
}

/// Result of running one claimed job through its handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    Completed,
    Failed { message: String, retry: bool },
}

/// Polls the queue on a fixed interval and runs each claimed job on its own
/// task, so a slow handler never delays the next poll.
pub struct Worker {
    id: usize,
    queue: JobQueue,
    registry: Arc<HandlerRegistry>,
    poll_interval: Duration,
    in_flight: TaskTracker,
    state: watch::Sender<WorkerState>,
    store_lost: Arc<StoreLost>,
}

/// Set by a job task whose outcome could not be written because the store
/// is gone. The poll loop watches it so it does not wait for the next tick.
#[derive(Default)]
struct StoreLost {
    signal: CancellationToken,
    error: Mutex<Option<QueueError>>,
}

impl StoreLost {
    fn record(&self, e: QueueError) {
        if let Ok(mut slot) = self.error.lock() {
            slot.get_or_insert(e);
        }
        self.signal.cancel();
    }

    fn take(&self) -> Option<QueueError> {
        self.error.lock().ok().and_then(|mut slot| slot.take())
    }
}

impl Worker {
    pub fn new(id: usize, queue: JobQueue, registry: Arc<HandlerRegistry>) -> Self {
        let (state, _) = watch::channel(WorkerState::Running);
        Self {
            id,
            queue,
            registry,
            poll_interval: DEFAULT_POLL_INTERVAL,
            in_flight: TaskTracker::new(),
            state,
            store_lost: Arc::new(StoreLost::default()),
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval.max(Duration::from_millis(1));
        self
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn subscribe(&self) -> watch::Receiver<WorkerState> {
        self.state.subscribe()
    }

    /// Jobs dispatched by this worker that have not reported an outcome yet.
    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    /// Run until `shutdown` fires, then wait for every in-flight job.
    ///
    /// Store errors abandon the current tick. Only connectivity loss ends the
    /// loop early, whether seen by a poll or while reporting an outcome, and
    /// it is returned to the caller after the drain.
    pub async fn run(self, shutdown: CancellationToken) -> Result<(), QueueError> {
        info!(worker_id = self.id, "worker started");

        let mut ticker = interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let result = loop {
            tokio::select! {
                biased;

                _ = shutdown.cancelled() => {
                    info!(worker_id = self.id, "worker received stop signal");
                    break Ok(());
                }
                _ = self.store_lost.signal.cancelled() => {
                    error!(worker_id = self.id, "store unreachable while reporting, stopping worker");
                    break self.store_lost.take().map_or(Ok(()), Err);
                }
                _ = ticker.tick() => {
                    if let Err(e) = self.poll_once().await {
                        if e.is_fatal() {
                            error!(worker_id = self.id, error = %e, "store unreachable, stopping worker");
                            break Err(e);
                        }
                        warn!(worker_id = self.id, error = %e, "error getting next job");
                    }
                }
            }
        };

        self.state.send_replace(WorkerState::Stopping);
        self.in_flight.close();
        self.in_flight.wait().await;
        self.state.send_replace(WorkerState::Stopped);
        info!(worker_id = self.id, "worker stopped");

        result
    }

    /// One poll tick: claim at most one job and dispatch it.
    /// Returns the id of the dispatched job.
    pub async fn poll_once(&self) -> Result<Option<i64>, QueueError> {
        let Some(job) = self.queue.claim_next_job().await? else {
            return Ok(None);
        };

        let job_id = job.id;
        let worker_id = self.id;
        let queue = self.queue.clone();
        let registry = self.registry.clone();
        let store_lost = self.store_lost.clone();

        self.in_flight.spawn(async move {
            let outcome = execute(worker_id, &registry, job).await;
            if let Err(e) = report(worker_id, &queue, job_id, outcome).await {
                if e.is_fatal() {
                    store_lost.record(e);
                }
            }
        });

        Ok(Some(job_id))
    }
}

/// Decode, narrow, resolve and run a claimed job. Never touches the store.
pub async fn execute(worker_id: usize, registry: &HandlerRegistry, job: Job) -> JobOutcome {
    info!(worker_id, job_id = job.id, job_type = %job.job_type, "processing job");

    let payload = match JobPayload::parse(&job.payload) {
        Ok(payload) => payload,
        Err(e) => {
            return JobOutcome::Failed {
                message: format!("failed to parse payload: {e}"),
                retry: false,
            };
        }
    };

    // A payload that does not fit its type is as poisoned as one that does not parse.
    let payload = match TypedPayload::from_payload(&job.job_type, &payload) {
        Ok(typed) => typed,
        Err(e) => {
            return JobOutcome::Failed {
                message: format!("invalid payload: {e}"),
                retry: false,
            };
        }
    };

    let Some(handler) = registry.handler_for(&job.job_type) else {
        return JobOutcome::Failed {
            message: format!("no processor for job type: {}", job.job_type),
            retry: false,
        };
    };

    let retry = job.can_retry();

    // Separate task so a panicking handler still produces an outcome.
    let joined = tokio::spawn(async move { (handler)(&job, &payload).await }).await;

    match joined {
        Ok(Ok(())) => JobOutcome::Completed,
        Ok(Err(e)) => JobOutcome::Failed {
            message: e.message,
            retry,
        },
        Err(e) if e.is_panic() => JobOutcome::Failed {
            message: "handler panicked".to_string(),
            retry,
        },
        Err(_) => JobOutcome::Failed {
            message: "handler task was cancelled".to_string(),
            retry,
        },
    }
}

/// Write the outcome back. Store errors are logged here and handed back so
/// the caller can react to a lost connection.
async fn report(
    worker_id: usize,
    queue: &JobQueue,
    job_id: i64,
    outcome: JobOutcome,
) -> Result<(), QueueError> {
    match outcome {
        JobOutcome::Completed => match queue.complete_job(job_id).await {
            Ok(_) => info!(worker_id, job_id, "job completed successfully"),
            Err(e) => {
                error!(worker_id, job_id, error = %e, "failed to mark job completed");
                return Err(e);
            }
        },
        JobOutcome::Failed { message, retry } => {
            warn!(worker_id, job_id, retry, error = %message, "job failed");

            match queue.fail_job(job_id, &message, retry).await {
                Ok(FailOutcome::Rescheduled {
                    retry_count,
                    scheduled_at,
                }) => info!(worker_id, job_id, retry_count, %scheduled_at, "job rescheduled"),
                Ok(FailOutcome::Failed) => warn!(worker_id, job_id, "job failed permanently"),
                Ok(FailOutcome::Ignored) => {}
                Err(e) => {
                    error!(worker_id, job_id, error = %e, "failed to record job failure");
                    return Err(e);
                }
            }
        }
    }
    Ok(())
}
