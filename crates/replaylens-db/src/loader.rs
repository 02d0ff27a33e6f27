//! Streaming bulk loader.
//!
//! A [`StreamingLoader`] owns the write end of an in-process byte pipe.
//! Records are encoded into a binary `COPY` stream on that end while a
//! loader task feeds the read end into the store. Nothing is materialized
//! on disk and at most [`PIPE_CAPACITY`] bytes are in flight, so `encode`
//! waits whenever the store falls behind.
//!
//! The loader task is the only party that learns about store failures.
//! When it fails it drops the read end, the next write fails, and the
//! writer joins the task to turn the broken pipe into the task's real
//! error. From then on every call returns that same error.
//!
//! [`StreamingLoader::open`] replaces a game's rows in one table: the
//! delete and the `COPY` share a transaction that commits only after the
//! trailer has been written and [`close`](StreamingLoader::close) has
//! been called. A loader dropped without `close` rolls its load back.

use std::marker::PhantomData;
use std::sync::Arc;

use replaylens_types::GameId;
use sqlx::PgPool;
use tokio::io::{AsyncWriteExt, DuplexStream};
use tokio::task::JoinHandle;
use tokio_util::sync::{CancellationToken, DropGuard};

use crate::codec::CopyEncoder;
use crate::error::{DbError, LoaderError};
use crate::postgres::PostgresPool;
use crate::schema::Record;

/// Bytes the pipe buffers between the encoder and the loader task.
pub const PIPE_CAPACITY: usize = 64 * 1024;

/// Encoded bytes accumulated before they are written into the pipe.
const FLUSH_THRESHOLD: usize = 8 * 1024;

/// Result of a committed load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadSummary {
    /// Target table.
    pub table: &'static str,
    /// Records streamed.
    pub rows: u64,
}

/// Handle to one in-flight bulk load of records of type `R`.
#[derive(Debug)]
pub struct StreamingLoader<R: Record> {
    table: &'static str,
    encoder: CopyEncoder,
    // Dropped before `writer` so the loader task sees the abandon signal
    // no later than end-of-stream.
    abandon: Option<DropGuard>,
    writer: Option<DuplexStream>,
    task: Option<JoinHandle<Result<(), DbError>>>,
    failed: Option<LoaderError>,
    _record: PhantomData<fn(&R)>,
}

impl<R: Record> StreamingLoader<R> {
    /// Start replacing `game_id`'s rows in `table`.
    pub fn open(
        pool: &PostgresPool,
        table: &'static str,
        game_id: GameId,
    ) -> Result<Self, LoaderError> {
        let pool = pool.pool().clone();
        let statement = R::schema().copy_statement(table);
        Self::spawn(table, move |reader, abandoned| {
            replace_from_stream(pool, table, game_id, statement, reader, abandoned)
        })
    }

    /// Start a load whose read side is driven by `consumer`.
    ///
    /// The consumer receives the read end of the pipe and a token that is
    /// cancelled when the loader is dropped without being closed. It must
    /// check the token after reaching end-of-stream and refuse to commit
    /// if it is set.
    pub fn spawn<F, Fut>(table: &'static str, consumer: F) -> Result<Self, LoaderError>
    where
        F: FnOnce(DuplexStream, CancellationToken) -> Fut,
        Fut: Future<Output = Result<(), DbError>> + Send + 'static,
    {
        let encoder = CopyEncoder::new(R::schema())?;
        let (writer, reader) = tokio::io::duplex(PIPE_CAPACITY);
        let abandoned = CancellationToken::new();
        let task = tokio::spawn(consumer(reader, abandoned.clone()));

        Ok(Self {
            table,
            encoder,
            abandon: Some(abandoned.drop_guard()),
            writer: Some(writer),
            task: Some(task),
            failed: None,
            _record: PhantomData,
        })
    }

    /// Number of records encoded so far.
    pub const fn rows(&self) -> u64 {
        self.encoder.rows()
    }

    /// Encode one record into the load.
    ///
    /// Waits while the pipe is full. The first error is terminal.
    pub async fn encode(&mut self, record: &R) -> Result<(), LoaderError> {
        if let Some(err) = &self.failed {
            return Err(err.clone());
        }
        if let Err(e) = self.encoder.encode(record) {
            return Err(self.fail(e.into()));
        }
        if self.encoder.buffered() >= FLUSH_THRESHOLD {
            self.flush().await?;
        }
        Ok(())
    }

    /// Finish the stream and wait for the loader task to commit.
    pub async fn close(mut self) -> Result<LoadSummary, LoaderError> {
        if let Some(err) = self.failed.take() {
            return Err(err);
        }

        self.encoder.finish();
        self.flush().await?;

        if let Some(guard) = self.abandon.take() {
            let _ = guard.disarm();
        }
        if let Some(mut writer) = self.writer.take() {
            writer
                .shutdown()
                .await
                .map_err(|e| LoaderError::Pipe(e.to_string()))?;
        }

        let Some(task) = self.task.take() else {
            return Err(LoaderError::Pipe("loader task already joined".to_owned()));
        };
        match task.await {
            Ok(Ok(())) => Ok(LoadSummary {
                table: self.table,
                rows: self.encoder.rows(),
            }),
            Ok(Err(e)) => Err(LoaderError::Load(Arc::new(e))),
            Err(e) => Err(LoaderError::TaskFailed(e.to_string())),
        }
    }

    async fn flush(&mut self) -> Result<(), LoaderError> {
        let chunk = self.encoder.take();
        let Some(writer) = self.writer.as_mut() else {
            return Err(self.fail(LoaderError::Pipe("pipe already closed".to_owned())));
        };
        if let Err(io_err) = writer.write_all(&chunk).await {
            let err = self.join_failed_task(io_err).await;
            return Err(self.fail(err));
        }
        Ok(())
    }

    /// Recover the loader task's error after a write to the pipe failed.
    async fn join_failed_task(&mut self, io_err: std::io::Error) -> LoaderError {
        self.writer = None;
        let Some(task) = self.task.take() else {
            return LoaderError::Pipe(io_err.to_string());
        };
        match task.await {
            Ok(Err(e)) => LoaderError::Load(Arc::new(e)),
            Ok(Ok(())) => LoaderError::Pipe(io_err.to_string()),
            Err(e) => LoaderError::TaskFailed(e.to_string()),
        }
    }

    fn fail(&mut self, err: LoaderError) -> LoaderError {
        tracing::debug!(table = self.table, error = %err, "bulk load failed");
        self.failed = Some(err.clone());
        err
    }
}

/// Delete `game_id`'s rows from `table` and `COPY` the stream in, as one
/// transaction.
async fn replace_from_stream(
    pool: PgPool,
    table: &'static str,
    game_id: GameId,
    statement: String,
    reader: DuplexStream,
    abandoned: CancellationToken,
) -> Result<(), DbError> {
    let mut tx = pool.begin().await?;

    sqlx::query(&format!("DELETE FROM {table} WHERE game_id = $1"))
        .bind(game_id.as_i64())
        .execute(&mut *tx)
        .await?;

    let mut copy = tx.copy_in_raw(&statement).await?;
    let read = copy.read_from(reader).await.map(|_| ());

    if let Err(e) = read {
        if let Err(abort_err) = copy.abort("input stream failed").await {
            tracing::debug!(table, error = %abort_err, "COPY abort failed");
        }
        return Err(e.into());
    }
    if abandoned.is_cancelled() {
        if let Err(abort_err) = copy.abort("load abandoned by writer").await {
            tracing::debug!(table, error = %abort_err, "COPY abort failed");
        }
        return Err(DbError::LoadAbandoned { table });
    }

    let rows = copy.finish().await?;
    tx.commit().await?;

    tracing::debug!(table, %game_id, rows, "bulk load committed");
    Ok(())
}
