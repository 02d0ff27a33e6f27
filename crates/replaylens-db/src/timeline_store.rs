//! Timeline reads over the bulk-loaded ledgers.

use futures::stream::BoxStream;
use futures::{StreamExt, TryStreamExt};
use replaylens_types::{CompositionDelta, GameId, PlayerStatsSample, StatsCounters, Timeline};
use sqlx::PgPool;

use crate::error::DbError;

const DELTAS_SQL: &str = r"SELECT game_id, player_id, loop_id, kind, num
  FROM buildcomp
  WHERE game_id = $1
  ORDER BY loop_id, kind";

const STATS_SQL: &str = r"SELECT game_id, player_id, loop_id,
         minerals_current, vespene_current, minerals_collection_rate, vespene_collection_rate,
         workers_active, food_used, food_made,
         minerals_used_army, vespene_used_army, minerals_lost_army, vespene_lost_army,
         minerals_killed_army, vespene_killed_army, raw_stats
  FROM playerstats
  WHERE game_id = $1
  ORDER BY loop_id, player_id";

/// Read access to `buildcomp` and `playerstats`.
pub struct TimelineStore<'a> {
    pool: &'a PgPool,
}

impl<'a> TimelineStore<'a> {
    /// Create a new timeline store bound to a connection pool.
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Load a game's full timeline.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::NotFound`] if the game has no composition deltas.
    /// Returns [`DbError::Postgres`] if a query fails.
    pub async fn load(&self, game_id: GameId) -> Result<Timeline, DbError> {
        let deltas = sqlx::query_as::<_, DeltaRow>(DELTAS_SQL)
            .bind(game_id.as_i64())
            .fetch_all(self.pool)
            .await?;
        let stats = sqlx::query_as::<_, StatsRow>(STATS_SQL)
            .bind(game_id.as_i64())
            .fetch_all(self.pool)
            .await?;

        tracing::debug!(
            %game_id,
            deltas = deltas.len(),
            samples = stats.len(),
            "Loaded timeline"
        );

        Timeline::new(
            game_id,
            deltas.into_iter().map(CompositionDelta::from).collect(),
            stats.into_iter().map(PlayerStatsSample::from).collect(),
        )
        .map_err(|e| DbError::NotFound(e.to_string()))
    }

    /// Stream a game's composition deltas in timeline order without
    /// collecting them.
    pub fn stream_deltas(
        &self,
        game_id: GameId,
    ) -> BoxStream<'a, Result<CompositionDelta, DbError>> {
        sqlx::query_as::<_, DeltaRow>(DELTAS_SQL)
            .bind(game_id.as_i64())
            .fetch(self.pool)
            .map_ok(CompositionDelta::from)
            .map_err(DbError::from)
            .boxed()
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
struct DeltaRow {
    game_id: i64,
    player_id: i32,
    loop_id: i64,
    kind: String,
    num: i32,
}

impl From<DeltaRow> for CompositionDelta {
    fn from(row: DeltaRow) -> Self {
        Self {
            game_id: GameId::from_raw(row.game_id),
            player_id: row.player_id,
            loop_id: row.loop_id,
            kind: row.kind,
            num: row.num,
        }
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
struct StatsRow {
    game_id: i64,
    player_id: i32,
    loop_id: i64,
    minerals_current: i32,
    vespene_current: i32,
    minerals_collection_rate: i32,
    vespene_collection_rate: i32,
    workers_active: i32,
    food_used: i32,
    food_made: i32,
    minerals_used_army: i32,
    vespene_used_army: i32,
    minerals_lost_army: i32,
    vespene_lost_army: i32,
    minerals_killed_army: i32,
    vespene_killed_army: i32,
    raw_stats: Option<String>,
}

impl From<StatsRow> for PlayerStatsSample {
    fn from(row: StatsRow) -> Self {
        Self {
            game_id: GameId::from_raw(row.game_id),
            player_id: row.player_id,
            loop_id: row.loop_id,
            counters: StatsCounters {
                minerals_current: row.minerals_current,
                vespene_current: row.vespene_current,
                minerals_collection_rate: row.minerals_collection_rate,
                vespene_collection_rate: row.vespene_collection_rate,
                workers_active: row.workers_active,
                food_used: row.food_used,
                food_made: row.food_made,
                minerals_used_army: row.minerals_used_army,
                vespene_used_army: row.vespene_used_army,
                minerals_lost_army: row.minerals_lost_army,
                vespene_lost_army: row.vespene_lost_army,
                minerals_killed_army: row.minerals_killed_army,
                vespene_killed_army: row.vespene_killed_army,
            },
            raw_stats: row.raw_stats,
        }
    }
}
