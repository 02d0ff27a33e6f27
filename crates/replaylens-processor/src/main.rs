//! Replay processor binary for replaylens.
//!
//! Walks the replay roots, ingests each game with a bounded worker pool,
//! and bulk-loads the derived ledgers into `PostgreSQL`.
//!
//! # Startup Sequence
//!
//! 1. Initialize structured logging (tracing)
//! 2. Load configuration from the environment
//! 3. Connect to `PostgreSQL` (retrying until reachable) and run migrations
//! 4. Trap SIGINT/SIGTERM into a shutdown token
//! 5. Run the worker pool over the replay roots
//! 6. Run the post-process statement if the run was complete

mod config;
mod error;
mod event;
mod ingest;
mod pool;
mod source;
mod tracker;
mod walk;

use std::sync::Arc;
use std::time::Instant;

use replaylens_db::{PostgresConfig, PostgresPool};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::ProcessorConfig;
use crate::error::ProcessorError;
use crate::ingest::Ingestor;
use crate::pool::WorkerPool;
use crate::source::JsonEventSource;
use crate::walk::ReplayWalker;

/// Application entry point for the replay processor.
///
/// # Errors
///
/// Returns an error if configuration is invalid, the store cannot be
/// prepared, or any file fails to ingest.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    info!("replaylens-processor starting");

    if let Err(e) = run().await {
        error!(error = %e, "replaylens-processor failed");
        return Err(e.into());
    }
    Ok(())
}

async fn run() -> Result<(), ProcessorError> {
    let config = ProcessorConfig::from_env()?;
    info!(
        replay_dir = %config.replay_dir.display(),
        roots = config.roots.len(),
        workers = config.workers,
        extension = %config.extension,
        "Configuration loaded"
    );

    let db_config = PostgresConfig::new(&config.database_url)
        .with_max_connections(config.max_connections)
        .with_connect_timeout(config.connect_timeout)
        .with_idle_timeout(config.idle_timeout);
    let db = PostgresPool::connect_with_retry(&db_config, config.connect_retry).await?;
    db.run_migrations().await?;

    let shutdown = CancellationToken::new();
    let signals = tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            let signal = wait_for_signal().await;
            info!(signal, "received shutdown signal; finishing in-flight files");
            shutdown.cancel();
        }
    });

    let ingestor = Ingestor::new(JsonEventSource, db.clone(), config.replay_dir.clone());
    let pool = WorkerPool::new(Arc::new(ingestor), config.workers);
    info!(workers = pool.workers(), "starting processor");

    let walker = ReplayWalker::new(config.roots.clone(), config.extension.clone());
    let outcome = pool.run(walker, &shutdown).await;
    signals.abort();

    let report = match outcome {
        Ok(report) => report,
        Err(e) => {
            db.close().await;
            return Err(e.into());
        }
    };

    if report.interrupted {
        info!("run interrupted; skipping post-process");
    } else if let Some(sql) = &config.postprocess_sql {
        let started = Instant::now();
        info!("starting post-process");
        if let Err(e) = db.run_statement(sql).await {
            db.close().await;
            return Err(e.into());
        }
        info!(elapsed = ?started.elapsed(), "post-process finished");
    }

    db.close().await;
    Ok(())
}

/// Resolve once SIGINT or SIGTERM arrives, naming the signal.
async fn wait_for_signal() -> &'static str {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut terminate) => {
                tokio::select! {
                    () = interrupt() => "SIGINT",
                    _ = terminate.recv() => "SIGTERM",
                }
            }
            Err(e) => {
                warn!(error = %e, "unable to trap SIGTERM");
                interrupt().await;
                "SIGINT"
            }
        }
    }
    #[cfg(not(unix))]
    {
        interrupt().await;
        "SIGINT"
    }
}

async fn interrupt() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "unable to trap SIGINT");
        std::future::pending::<()>().await;
    }
}
