use crate::config::Config;
use crate::error::QueueError;
use crate::jobs::model::JobStats;
use crate::jobs::queue::JobQueue;
use crate::jobs::registry::HandlerRegistry;
use crate::jobs::worker::{Worker, WorkerState, DEFAULT_POLL_INTERVAL};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

#[derive(Debug, Clone)]
pub struct PoolConfig {
    pub worker_count: usize,
    pub poll_interval: Duration,
    pub stats_interval: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            worker_count: 3,
            poll_interval: DEFAULT_POLL_INTERVAL,
            stats_interval: Duration::from_secs(30),
        }
    }
}

impl From<&Config> for PoolConfig {
    fn from(cfg: &Config) -> Self {
        Self {
            worker_count: cfg.worker_count,
            poll_interval: Duration::from_millis(cfg.poll_interval_ms),
            stats_interval: Duration::from_secs(cfg.stats_interval_secs),
        }
    }
}

/// Runs `worker_count` workers against one queue and stops them together.
pub struct WorkerPool {
    queue: JobQueue,
    registry: Arc<HandlerRegistry>,
    cfg: PoolConfig,
}

impl WorkerPool {
    pub fn new(queue: JobQueue, registry: Arc<HandlerRegistry>, cfg: PoolConfig) -> Self {
        Self {
            queue,
            registry,
            cfg,
        }
    }

    pub async fn get_stats(&self) -> Result<JobStats, QueueError> {
        self.queue.get_stats().await
    }

    /// Start every worker and block until all of them reached `Stopped`.
    ///
    /// Cancelling `shutdown` stops the pool. A fatal store error in any worker
    /// stops the others too and is returned once they have drained.
    pub async fn run(self, shutdown: CancellationToken) -> Result<(), QueueError> {
        let stop = shutdown.child_token();
        let worker_count = self.cfg.worker_count.max(1);

        let mut states: Vec<watch::Receiver<WorkerState>> = Vec::with_capacity(worker_count);
        let mut workers = JoinSet::new();
        for id in 1..=worker_count {
            let worker = Worker::new(id, self.queue.clone(), self.registry.clone())
                .with_poll_interval(self.cfg.poll_interval);
            states.push(worker.subscribe());
            workers.spawn(worker.run(stop.clone()));
        }

        let reporter = tokio::spawn(report_stats(
            self.queue.clone(),
            self.cfg.stats_interval,
            stop.clone(),
        ));

        info!(worker_count, "worker pool started");

        let mut fatal: Option<QueueError> = None;
        while let Some(joined) = workers.join_next().await {
            match joined {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    error!(error = %e, "worker hit a fatal store error, stopping pool");
                    stop.cancel();
                    fatal.get_or_insert(e);
                }
                Err(e) => {
                    error!(error = %e, "worker task aborted, stopping pool");
                    stop.cancel();
                }
            }
        }

        stop.cancel();
        if let Err(e) = reporter.await {
            warn!(error = %e, "stats reporter task aborted");
        }

        let stopped = states
            .iter()
            .filter(|s| *s.borrow() == WorkerState::Stopped)
            .count();
        info!(stopped, worker_count, "all workers stopped");

        match fatal {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

async fn report_stats(queue: JobQueue, every: Duration, stop: CancellationToken) {
    let every = every.max(Duration::from_millis(1));
    let mut ticker = interval_at(Instant::now() + every, every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = stop.cancelled() => return,
            _ = ticker.tick() => match queue.get_stats().await {
                Ok(stats) => info!(
                    pending = stats.pending,
                    processing = stats.processing,
                    completed = stats.completed,
                    failed = stats.failed,
                    total = stats.total(),
                    "job stats"
                ),
                Err(e) => warn!(error = %e, "failed to read job stats"),
            },
        }
    }
}
