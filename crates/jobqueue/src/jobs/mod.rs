pub mod enqueuer;
pub mod model;
pub mod payload;
pub mod pool;
pub mod queue;
pub mod registry;
pub mod repo;
pub mod retry;
pub mod worker;

pub use enqueuer::{enqueue_or_log, enqueue_user_created, JobEnqueuer};
pub use model::{Job, JobStats, JobStatus, NewJob};
pub use payload::{JobKind, JobPayload, TypedPayload};
pub use pool::{PoolConfig, WorkerPool};
pub use queue::{FailOutcome, JobQueue};
pub use registry::{boxed, BoxFuture, HandlerRegistry};
pub use repo::JobsRepo;
pub use worker::{JobOutcome, Worker, WorkerState};
