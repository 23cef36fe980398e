use crate::error::ProcessError;
use crate::jobs::model::Job;
use crate::jobs::payload::TypedPayload;
use std::{collections::HashMap, future::Future, pin::Pin, sync::Arc};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;
pub type HandlerFn = dyn for<'a> Fn(&'a Job, &'a TypedPayload) -> BoxFuture<'a, Result<(), ProcessError>>
    + Send
    + Sync;

/// Job type -> handler table. Built once at startup, then shared read-only
/// between workers behind an `Arc`.
#[derive(Clone, Default)]
pub struct HandlerRegistry {
    handlers: HashMap<String, Arc<HandlerFn>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registering the same job type twice replaces the earlier handler.
    pub fn register<F>(&mut self, job_type: &str, handler: F) -> &mut Self
    where
        F: for<'a> Fn(&'a Job, &'a TypedPayload) -> BoxFuture<'a, Result<(), ProcessError>>
            + Send
            + Sync
            + 'static,
    {
        self.handlers
            .insert(job_type.to_string(), Arc::new(handler));
        self
    }

    /// Exact, case-sensitive match on the job type tag.
    pub fn handler_for(&self, job_type: &str) -> Option<Arc<HandlerFn>> {
        self.handlers.get(job_type).cloned()
    }

    pub fn contains(&self, job_type: &str) -> bool {
        self.handlers.contains_key(job_type)
    }

    pub fn job_types(&self) -> Vec<&str> {
        let mut types: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        types.sort_unstable();
        types
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

pub fn boxed<'a, T>(fut: impl Future<Output = T> + Send + 'a) -> BoxFuture<'a, T> {
    Box::pin(fut)
}
