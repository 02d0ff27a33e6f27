//! Configuration for the replay processor.
//!
//! All configuration is loaded from environment variables. Positional
//! command-line arguments, when given, replace `REPLAY_DIR` as the set of
//! roots to walk; game ids are still computed relative to `REPLAY_DIR`.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::error::ProcessorError;

/// Default suffix of decoder dumps.
const DEFAULT_EXTENSION: &str = ".SC2Replay.json";

/// Default connection pool size.
const DEFAULT_MAX_CONNECTIONS: u32 = 10;

/// Default delay between initial connection attempts.
const DEFAULT_CONNECT_RETRY_MS: u64 = 1_000;

/// Default wait for a pooled connection.
const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 5_000;

/// Default lifetime of an idle pooled connection.
const DEFAULT_IDLE_TIMEOUT_MS: u64 = 300_000;

/// Complete processor configuration.
#[derive(Debug, Clone)]
pub struct ProcessorConfig {
    /// `PostgreSQL` connection URL.
    pub database_url: String,
    /// Root that relative paths (and therefore game ids) are computed from.
    pub replay_dir: PathBuf,
    /// Files or directories to walk.
    pub roots: Vec<PathBuf>,
    /// Worker pool size.
    pub workers: usize,
    /// File-name suffix selecting inputs.
    pub extension: String,
    /// Connection pool size.
    pub max_connections: u32,
    /// Delay between initial connection attempts.
    pub connect_retry: Duration,
    /// Wait for a pooled connection before an attempt fails.
    pub connect_timeout: Duration,
    /// Idle time after which a pooled connection is closed.
    pub idle_timeout: Duration,
    /// SQL run once after a complete, uninterrupted ingestion.
    pub postprocess_sql: Option<String>,
}

impl ProcessorConfig {
    /// Load configuration from the process environment and arguments.
    ///
    /// Required variables:
    /// - `DATABASE_URL` -- `PostgreSQL` connection string
    /// - `REPLAY_DIR` -- replay root directory
    ///
    /// Optional variables:
    /// - `NUM_WORKERS` -- worker count; `0` or unset uses the available parallelism
    /// - `REPLAY_EXTENSION` -- input suffix (default `.SC2Replay.json`)
    /// - `DB_MAX_CONNECTIONS` -- pool size (default 10)
    /// - `DB_CONNECT_RETRY_MS` -- connection retry delay (default 1000)
    /// - `DB_CONNECT_TIMEOUT_MS` -- connection acquire timeout (default 5000)
    /// - `DB_IDLE_TIMEOUT_MS` -- idle connection timeout (default 300000)
    /// - `POSTPROCESS_SQL` -- post-ingest statement (default none)
    pub fn from_env() -> Result<Self, ProcessorError> {
        Self::from_lookup(|name| std::env::var(name).ok(), std::env::args().skip(1))
    }

    /// Build the configuration from a variable `lookup` and positional `args`.
    pub fn from_lookup<F, I>(lookup: F, args: I) -> Result<Self, ProcessorError>
    where
        F: Fn(&str) -> Option<String>,
        I: IntoIterator<Item = String>,
    {
        let required = |name: &str| {
            lookup(name)
                .filter(|value| !value.is_empty())
                .ok_or_else(|| ProcessorError::Config(format!("missing required env var {name}")))
        };

        let database_url = required("DATABASE_URL")?;
        let replay_dir = PathBuf::from(required("REPLAY_DIR")?);

        let mut roots: Vec<PathBuf> = args.into_iter().map(PathBuf::from).collect();
        if roots.is_empty() {
            roots.push(replay_dir.clone());
        }

        let workers = match parse_or(&lookup, "NUM_WORKERS", 0_usize)? {
            0 => default_workers(),
            n => n,
        };
        let extension = lookup("REPLAY_EXTENSION").unwrap_or_else(|| DEFAULT_EXTENSION.to_owned());
        let max_connections = parse_or(&lookup, "DB_MAX_CONNECTIONS", DEFAULT_MAX_CONNECTIONS)?;
        let connect_retry_ms = parse_or(&lookup, "DB_CONNECT_RETRY_MS", DEFAULT_CONNECT_RETRY_MS)?;
        let connect_timeout_ms =
            parse_or(&lookup, "DB_CONNECT_TIMEOUT_MS", DEFAULT_CONNECT_TIMEOUT_MS)?;
        let idle_timeout_ms = parse_or(&lookup, "DB_IDLE_TIMEOUT_MS", DEFAULT_IDLE_TIMEOUT_MS)?;
        let postprocess_sql = lookup("POSTPROCESS_SQL").filter(|sql| !sql.trim().is_empty());

        Ok(Self {
            database_url,
            replay_dir,
            roots,
            workers,
            extension,
            max_connections,
            connect_retry: Duration::from_millis(connect_retry_ms),
            connect_timeout: Duration::from_millis(connect_timeout_ms),
            idle_timeout: Duration::from_millis(idle_timeout_ms),
            postprocess_sql,
        })
    }
}

fn parse_or<F, T>(lookup: &F, name: &str, default: T) -> Result<T, ProcessorError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    lookup(name).map_or(Ok(default), |raw| {
        raw.trim()
            .parse()
            .map_err(|e| ProcessorError::Config(format!("invalid {name}: {e}")))
    })
}

fn default_workers() -> usize {
    std::thread::available_parallelism().map_or(1, std::num::NonZeroUsize::get)
}
