use chrono::{DateTime, Duration, Utc};

/// Every job gets this many retries; callers cannot override it.
pub const MAX_RETRIES: i32 = 3;

/// Backoff grows by this step per failure: 5, 10, 15 minutes.
pub const BACKOFF_STEP_MINUTES: i64 = 5;

/// Delay before the next attempt, given the retry count *before* this failure.
pub fn backoff_delay(retry_count: i32) -> Duration {
    let step = i64::from(retry_count.max(0)) + 1;
    Duration::minutes(BACKOFF_STEP_MINUTES * step)
}

pub fn next_scheduled_at(now: DateTime<Utc>, retry_count: i32) -> DateTime<Utc> {
    now + backoff_delay(retry_count)
}

/// Whether a failure at `retry_count` uses up the last retry.
pub fn exhausts_retries(retry_count: i32, max_retries: i32) -> bool {
    retry_count + 1 >= max_retries
}
