use clap::{Parser, Subcommand};
use jobqueue::config::Config;
use jobqueue::db;
use jobqueue::jobs::{Job, JobKind, JobPayload, JobQueue, JobStatus, TypedPayload};
use serde_json::{json, Map, Value};

#[derive(Parser)]
#[command(name = "jobctl")]
#[command(about = "Inspect and feed the job queue.")]
struct Cli {
    /// Database file or sqlite: URL (defaults to JOBQUEUE_DATABASE_URL / DATABASE_URL)
    #[arg(long, global = true)]
    db: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Show job counts per status.
    Stats,
    /// List the most recently created jobs with a status.
    List {
        /// pending, processing, completed or failed
        #[arg(long, default_value = "pending")]
        status: JobStatus,

        #[arg(long, default_value_t = 20)]
        limit: i64,
    },
    /// Enqueue a synthetic job.
    Enqueue {
        /// user_created, data_analysis, email_notification or data_export
        job_type: JobKind,

        message: String,

        #[arg(long, default_value_t = 0)]
        priority: i32,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut cfg = Config::from_env()?;
    if let Some(db) = cli.db.as_deref() {
        cfg = cfg.with_database(db);
    }

    let pool = db::make_pool(&cfg.database_url).await?;
    db::run_migrations(&pool).await?;
    let queue = JobQueue::from_pool(pool);

    match cli.command {
        Command::Stats => show_stats(&queue).await?,
        Command::List { status, limit } => list_jobs(&queue, status, limit).await?,
        Command::Enqueue {
            job_type,
            message,
            priority,
        } => enqueue_test_job(&queue, job_type, message, priority).await?,
    }

    Ok(())
}

async fn show_stats(queue: &JobQueue) -> anyhow::Result<()> {
    let stats = queue.get_stats().await?;

    println!("Job queue statistics");
    println!("{}", "=".repeat(40));
    println!("Pending:    {} jobs", stats.pending);
    println!("Processing: {} jobs", stats.processing);
    println!("Completed:  {} jobs", stats.completed);
    println!("Failed:     {} jobs", stats.failed);
    println!("Total:      {} jobs", stats.total());
    Ok(())
}

async fn list_jobs(queue: &JobQueue, status: JobStatus, limit: i64) -> anyhow::Result<()> {
    let jobs = queue.list_jobs(status, limit).await?;

    println!("Jobs with status '{status}' (last {limit})");
    println!("{}", "=".repeat(60));

    if jobs.is_empty() {
        println!("No jobs found with status '{status}'");
        return Ok(());
    }

    for job in &jobs {
        print_job(job);
    }
    Ok(())
}

fn print_job(job: &Job) {
    println!(
        "ID: {} | Type: {} | Priority: {} | Retries: {}/{}",
        job.id, job.job_type, job.priority, job.retry_count, job.max_retries
    );

    if let Some(err) = job.error_message.as_deref().filter(|e| !e.is_empty()) {
        println!("  Error: {err}");
    }

    // Preview only; a payload that does not parse is simply not shown.
    if let Ok(payload) = JobPayload::parse(&job.payload) {
        match TypedPayload::from_payload(&job.job_type, &payload) {
            Ok(TypedPayload::UserCreated(u)) => println!("  User ID: {}", u.user_id),
            _ if !payload.message.is_empty() => println!("  Message: {}", payload.message),
            _ => {}
        }
    }

    println!("  Created: {}", job.created_at.format("%Y-%m-%d %H:%M:%S"));
    println!();
}

async fn enqueue_test_job(
    queue: &JobQueue,
    kind: JobKind,
    message: String,
    priority: i32,
) -> anyhow::Result<()> {
    let payload = sample_payload(kind, message);
    let job = queue.enqueue_job(kind.as_str(), &payload, priority).await?;

    println!("Job enqueued successfully!");
    println!(
        "ID: {} | Type: {} | Priority: {}",
        job.id, job.job_type, job.priority
    );
    println!("Scheduled: {}", job.scheduled_at.format("%Y-%m-%d %H:%M:%S"));
    Ok(())
}

fn sample_payload(kind: JobKind, message: String) -> JobPayload {
    let mut payload = JobPayload::with_message(message);

    match kind {
        JobKind::UserCreated => {
            payload.user_id = Some(999);
            payload.user_data = object(json!({
                "id": 999,
                "email": "test@example.com",
                "age": 25,
            }));
            payload.additional_props = object(json!({
                "test_data": true,
                "source": "jobctl",
            }));
        }
        JobKind::EmailNotification => {
            payload.recipients = vec![
                "admin@example.com".to_string(),
                "user@example.com".to_string(),
            ];
        }
        JobKind::DataAnalysis | JobKind::DataExport => {}
    }

    payload
}

fn object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}
