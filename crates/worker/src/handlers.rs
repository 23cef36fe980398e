use jobqueue::jobs::{boxed, HandlerRegistry, Job, JobKind, TypedPayload};
use jobqueue::ProcessError;
use serde_json::Value;
use std::{sync::Arc, time::Duration};
use tracing::info;

/// Built-in processors. `data_export` is deliberately absent: jobs of that
/// type fail permanently as an unknown type.
pub fn build_registry() -> Arc<HandlerRegistry> {
    let mut registry = HandlerRegistry::new();

    registry
        .register(JobKind::UserCreated.as_str(), |job, payload| {
            boxed(process_user_created(job, payload))
        })
        .register(JobKind::DataAnalysis.as_str(), |job, payload| {
            boxed(process_data_analysis(job, payload))
        })
        .register(JobKind::EmailNotification.as_str(), |job, payload| {
            boxed(process_email_notification(job, payload))
        });

    Arc::new(registry)
}

fn unexpected(job: &Job) -> ProcessError {
    ProcessError::new(format!("unexpected payload shape for {}", job.job_type))
}

async fn process_user_created(job: &Job, payload: &TypedPayload) -> Result<(), ProcessError> {
    let TypedPayload::UserCreated(user) = payload else {
        return Err(unexpected(job));
    };
    info!(job_id = job.id, user_id = user.user_id, "processing user created job");

    tokio::time::sleep(Duration::from_millis(500)).await;

    let email = user
        .user_data
        .get("email")
        .and_then(Value::as_str)
        .unwrap_or("<unknown>");
    info!(user_id = user.user_id, email, "sending welcome email");

    for (key, value) in &user.additional_props {
        let label = match key.as_str() {
            "hobby" => "hobby",
            "location" => "location",
            "score" => "score",
            _ => "custom field",
        };
        info!(user_id = user.user_id, field = %key, %value, "{label}");
    }

    info!(user_id = user.user_id, "recording user signup metrics");
    info!(user_id = user.user_id, "setting up user profile");
    Ok(())
}

async fn process_data_analysis(job: &Job, payload: &TypedPayload) -> Result<(), ProcessError> {
    let TypedPayload::DataAnalysis(analysis) = payload else {
        return Err(unexpected(job));
    };
    info!(job_id = job.id, "processing data analysis job");

    tokio::time::sleep(Duration::from_secs(2)).await;

    info!(job_id = job.id, message = %analysis.message, "analysis completed");
    Ok(())
}

async fn process_email_notification(
    job: &Job,
    payload: &TypedPayload,
) -> Result<(), ProcessError> {
    let TypedPayload::EmailNotification(email) = payload else {
        return Err(unexpected(job));
    };
    info!(job_id = job.id, recipients = email.recipients.len(), "processing email notification job");

    tokio::time::sleep(Duration::from_millis(300)).await;

    for recipient in &email.recipients {
        info!(job_id = job.id, %recipient, message = %email.message, "sending email");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use jobqueue::jobs::payload::{EmailNotification, UserCreated};
    use jobqueue::jobs::{JobPayload, JobStatus};
    use serde_json::Map;

    fn job(job_type: &str) -> Job {
        let now = chrono::Utc::now();
        Job {
            id: 42,
            job_type: job_type.to_string(),
            payload: "{}".to_string(),
            status: JobStatus::Processing,
            priority: 0,
            max_retries: 3,
            retry_count: 0,
            error_message: None,
            scheduled_at: now,
            started_at: Some(now),
            completed_at: None,
            created_at: now,
        }
    }

    #[test]
    fn registers_every_built_in_processor_except_data_export() {
        let registry = build_registry();
        assert_eq!(
            registry.job_types(),
            vec!["data_analysis", "email_notification", "user_created"]
        );
        assert!(!registry.contains(JobKind::DataExport.as_str()));
    }

    #[tokio::test(start_paused = true)]
    async fn user_created_runs_on_its_typed_payload() {
        let registry = build_registry();
        let handler = registry.handler_for("user_created").unwrap();

        let payload = TypedPayload::UserCreated(UserCreated {
            user_id: 7,
            user_data: Map::new(),
            additional_props: Map::new(),
        });
        assert!((handler)(&job("user_created"), &payload).await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn mismatched_payload_shape_is_an_error() {
        let registry = build_registry();
        let handler = registry.handler_for("user_created").unwrap();

        let err = (handler)(
            &job("user_created"),
            &TypedPayload::Other(JobPayload::default()),
        )
        .await
        .unwrap_err();
        assert!(err.message.contains("user_created"));
    }

    #[tokio::test(start_paused = true)]
    async fn email_notification_succeeds_without_recipients() {
        let registry = build_registry();
        let handler = registry.handler_for("email_notification").unwrap();
        let payload = TypedPayload::EmailNotification(EmailNotification {
            message: "hi".into(),
            recipients: Vec::new(),
        });
        assert!((handler)(&job("email_notification"), &payload)
            .await
            .is_ok());
    }
}
