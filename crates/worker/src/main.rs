use jobqueue::config::Config;
use jobqueue::db;
use jobqueue::jobs::{JobQueue, PoolConfig, WorkerPool};
use jobqueue::telemetry;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

mod handlers;
use handlers::build_registry;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let mut cfg = Config::from_env()?;
    // `worker [db_path]`
    if let Some(path) = std::env::args().nth(1).filter(|s| !s.trim().is_empty()) {
        cfg = cfg.with_database(&path);
    }

    telemetry::init(cfg.log_format);

    info!(
        database_url = %cfg.database_url,
        worker_count = cfg.worker_count,
        poll_interval_ms = cfg.poll_interval_ms,
        stats_interval_secs = cfg.stats_interval_secs,
        migrate_on_startup = cfg.migrate_on_startup,
        "starting worker manager"
    );

    let pool = db::make_pool(&cfg.database_url).await?;
    if cfg.migrate_on_startup {
        db::run_migrations(&pool).await?;
    }

    let registry = build_registry();
    let queue = JobQueue::from_pool(pool.clone());
    let workers = WorkerPool::new(queue, registry, PoolConfig::from(&cfg));

    let shutdown = CancellationToken::new();
    tokio::spawn(watch_signals(shutdown.clone()));

    info!("worker manager started, press Ctrl+C to stop");
    let result = workers.run(shutdown).await;

    pool.close().await;
    match result {
        Ok(()) => {
            info!("all workers stopped, goodbye");
            Ok(())
        }
        Err(e) => {
            error!(error = %e, "worker pool stopped on a fatal error");
            Err(e.into())
        }
    }
}

async fn watch_signals(shutdown: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("received shutdown signal, stopping workers");
    shutdown.cancel();
}
