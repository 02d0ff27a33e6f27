//! The live view written by replay simulations.
//!
//! [`LiveView`] is the seam between a simulation and its destination; the
//! store-backed implementation is [`PgLiveView`] over `livebuildcomp`.

use replaylens_types::{CompositionDelta, GameId};
use sqlx::PgPool;

use crate::error::DbError;
use crate::postgres::PostgresPool;
use crate::records::LIVE_BUILDCOMP_TABLE;

/// Destination of a simulation's emitted deltas.
pub trait LiveView: Send + Sync + 'static {
    /// Remove every row previously written for `game_id`.
    fn clear(&self, game_id: GameId) -> impl Future<Output = Result<(), DbError>> + Send;

    /// Append a batch of deltas, atomically.
    fn insert_batch(
        &self,
        deltas: &[CompositionDelta],
    ) -> impl Future<Output = Result<(), DbError>> + Send;
}

/// [`LiveView`] backed by the `livebuildcomp` table.
#[derive(Clone)]
pub struct PgLiveView {
    pool: PgPool,
}

impl PgLiveView {
    /// Create a live view sharing `pool`.
    pub fn new(pool: &PostgresPool) -> Self {
        Self {
            pool: pool.pool().clone(),
        }
    }
}

impl LiveView for PgLiveView {
    async fn clear(&self, game_id: GameId) -> Result<(), DbError> {
        let result = sqlx::query(&format!(
            "DELETE FROM {LIVE_BUILDCOMP_TABLE} WHERE game_id = $1"
        ))
        .bind(game_id.as_i64())
        .execute(&self.pool)
        .await?;

        tracing::debug!(%game_id, removed = result.rows_affected(), "Cleared live view");
        Ok(())
    }

    async fn insert_batch(&self, deltas: &[CompositionDelta]) -> Result<(), DbError> {
        if deltas.is_empty() {
            return Ok(());
        }

        let len = deltas.len();
        let mut game_ids = Vec::with_capacity(len);
        let mut player_ids = Vec::with_capacity(len);
        let mut loop_ids = Vec::with_capacity(len);
        let mut kinds = Vec::with_capacity(len);
        let mut nums = Vec::with_capacity(len);

        for d in deltas {
            game_ids.push(d.game_id.as_i64());
            player_ids.push(d.player_id);
            loop_ids.push(d.loop_id);
            kinds.push(d.kind.as_str());
            nums.push(d.num);
        }

        sqlx::query(&format!(
            r"INSERT INTO {LIVE_BUILDCOMP_TABLE} (game_id, player_id, loop_id, kind, num)
              SELECT * FROM UNNEST($1::BIGINT[], $2::INTEGER[], $3::BIGINT[], $4::TEXT[], $5::INTEGER[])"
        ))
        .bind(&game_ids)
        .bind(&player_ids)
        .bind(&loop_ids)
        .bind(&kinds)
        .bind(&nums)
        .execute(&self.pool)
        .await?;

        tracing::trace!(count = len, "Inserted live deltas (batch UNNEST)");
        Ok(())
    }
}
