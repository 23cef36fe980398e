//! SQLite-backed job queue with a polling worker pool.
//!
//! Jobs are enqueued through [`jobs::JobQueue`], claimed atomically by
//! [`jobs::Worker`]s, dispatched through a [`jobs::HandlerRegistry`] and
//! retried with an arithmetic backoff until they complete or fail for good.

pub mod config;
pub mod db;
pub mod error;
pub mod jobs;
pub mod telemetry;

pub use error::{ProcessError, QueueError, StoreError};
