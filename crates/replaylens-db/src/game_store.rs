//! Game and player metadata.
//!
//! Both tables are keyed by [`GameId`], so writing the same replay twice
//! replaces its rows rather than duplicating them.

use replaylens_types::{GameId, GameRecord, GameSummary, PlayerRecord};
use sqlx::PgPool;

use crate::error::DbError;

/// Default number of games returned by a listing.
pub const DEFAULT_LIST_LIMIT: i64 = 100;

/// Selection criteria for [`GameStore::list_games`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameFilter {
    /// Only games with this matchup (e.g. `PvT`).
    pub matchup: Option<String>,
    /// Only games where either player's name contains this text,
    /// compared case-insensitively.
    pub player: Option<String>,
    /// Maximum number of games returned.
    pub limit: i64,
}

impl Default for GameFilter {
    fn default() -> Self {
        Self {
            matchup: None,
            player: None,
            limit: DEFAULT_LIST_LIMIT,
        }
    }
}

impl GameFilter {
    /// Restrict to one matchup.
    #[must_use]
    pub fn with_matchup(mut self, matchup: impl Into<String>) -> Self {
        self.matchup = Some(matchup.into());
        self
    }

    /// Restrict to games involving a player name.
    #[must_use]
    pub fn with_player(mut self, player: impl Into<String>) -> Self {
        self.player = Some(player.into());
        self
    }

    /// Set the maximum number of games returned.
    #[must_use]
    pub const fn with_limit(mut self, limit: i64) -> Self {
        self.limit = limit;
        self
    }
}

/// Operations on the `games` and `players` tables.
pub struct GameStore<'a> {
    pool: &'a PgPool,
}

impl<'a> GameStore<'a> {
    /// Create a new game store bound to a connection pool.
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Insert or replace a game's metadata row.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the upsert fails.
    pub async fn upsert_game(&self, game: &GameRecord) -> Result<(), DbError> {
        sqlx::query(
            r"INSERT INTO games (game_id, filename, played_at, loops, duration_sec, map_name, game_version, matchup)
              VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
              ON CONFLICT (game_id) DO UPDATE SET
                filename = EXCLUDED.filename,
                played_at = EXCLUDED.played_at,
                loops = EXCLUDED.loops,
                duration_sec = EXCLUDED.duration_sec,
                map_name = EXCLUDED.map_name,
                game_version = EXCLUDED.game_version,
                matchup = EXCLUDED.matchup",
        )
        .bind(game.game_id.as_i64())
        .bind(&game.filename)
        .bind(game.played_at)
        .bind(game.loops)
        .bind(game.duration_sec)
        .bind(&game.map_name)
        .bind(&game.game_version)
        .bind(&game.matchup)
        .execute(self.pool)
        .await?;

        tracing::debug!(game_id = %game.game_id, filename = %game.filename, "Upserted game");
        Ok(())
    }

    /// Insert or replace player rows in one statement.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the upsert fails.
    pub async fn upsert_players(&self, players: &[PlayerRecord]) -> Result<(), DbError> {
        if players.is_empty() {
            return Ok(());
        }

        let len = players.len();
        let mut game_ids = Vec::with_capacity(len);
        let mut player_ids = Vec::with_capacity(len);
        let mut region_ids = Vec::with_capacity(len);
        let mut realm_ids = Vec::with_capacity(len);
        let mut toon_ids = Vec::with_capacity(len);
        let mut names = Vec::with_capacity(len);
        let mut races = Vec::with_capacity(len);
        let mut opponent_races = Vec::with_capacity(len);
        let mut mmrs: Vec<Option<i32>> = Vec::with_capacity(len);
        let mut apms: Vec<Option<f64>> = Vec::with_capacity(len);
        let mut results = Vec::with_capacity(len);

        for p in players {
            game_ids.push(p.game_id.as_i64());
            player_ids.push(p.player_id);
            region_ids.push(p.region_id);
            realm_ids.push(p.realm_id);
            toon_ids.push(p.toon_id);
            names.push(p.name.as_str());
            races.push(p.race.as_str());
            opponent_races.push(p.opponent_race.as_str());
            mmrs.push(p.mmr);
            apms.push(p.apm);
            results.push(p.result.as_str());
        }

        sqlx::query(
            r"INSERT INTO players (game_id, player_id, region_id, realm_id, toon_id, name, race, opponent_race, mmr, apm, result)
              SELECT * FROM UNNEST($1::BIGINT[], $2::INTEGER[], $3::BIGINT[], $4::BIGINT[], $5::BIGINT[], $6::TEXT[], $7::TEXT[], $8::TEXT[], $9::INTEGER[], $10::DOUBLE PRECISION[], $11::TEXT[])
              ON CONFLICT (game_id, player_id) DO UPDATE SET
                region_id = EXCLUDED.region_id,
                realm_id = EXCLUDED.realm_id,
                toon_id = EXCLUDED.toon_id,
                name = EXCLUDED.name,
                race = EXCLUDED.race,
                opponent_race = EXCLUDED.opponent_race,
                mmr = EXCLUDED.mmr,
                apm = EXCLUDED.apm,
                result = EXCLUDED.result",
        )
        .bind(&game_ids)
        .bind(&player_ids)
        .bind(&region_ids)
        .bind(&realm_ids)
        .bind(&toon_ids)
        .bind(&names)
        .bind(&races)
        .bind(&opponent_races)
        .bind(&mmrs)
        .bind(&apms)
        .bind(&results)
        .execute(self.pool)
        .await?;

        tracing::debug!(count = len, "Upserted players (batch UNNEST)");
        Ok(())
    }

    /// List games with both players, most recently played first.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the query fails.
    pub async fn list_games(&self, filter: &GameFilter) -> Result<Vec<GameSummary>, DbError> {
        let name_pattern = filter.player.as_deref().map(like_pattern);

        let rows = sqlx::query_as::<_, GameSummaryRow>(
            r"SELECT g.game_id, g.filename, g.map_name, g.loops,
                     p1.name AS p1_name, p1.race AS p1_race, p1.result AS p1_result,
                     p2.name AS p2_name, p2.race AS p2_race, p2.result AS p2_result
              FROM games g
              JOIN players p1 ON p1.game_id = g.game_id AND p1.player_id = 1
              JOIN players p2 ON p2.game_id = g.game_id AND p2.player_id = 2
              WHERE ($1::TEXT IS NULL OR g.matchup = $1)
                AND ($2::TEXT IS NULL OR p1.name ILIKE $2 OR p2.name ILIKE $2)
              ORDER BY g.played_at DESC, g.game_id
              LIMIT $3",
        )
        .bind(filter.matchup.as_deref())
        .bind(name_pattern.as_deref())
        .bind(filter.limit)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(GameSummary::from).collect())
    }

    /// Fetch one game with both players.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::NotFound`] if no such game was ingested.
    /// Returns [`DbError::Postgres`] if the query fails.
    pub async fn get_game(&self, game_id: GameId) -> Result<GameSummary, DbError> {
        let row = sqlx::query_as::<_, GameSummaryRow>(
            r"SELECT g.game_id, g.filename, g.map_name, g.loops,
                     p1.name AS p1_name, p1.race AS p1_race, p1.result AS p1_result,
                     p2.name AS p2_name, p2.race AS p2_race, p2.result AS p2_result
              FROM games g
              JOIN players p1 ON p1.game_id = g.game_id AND p1.player_id = 1
              JOIN players p2 ON p2.game_id = g.game_id AND p2.player_id = 2
              WHERE g.game_id = $1",
        )
        .bind(game_id.as_i64())
        .fetch_optional(self.pool)
        .await?;

        row.map(GameSummary::from)
            .ok_or_else(|| DbError::NotFound(format!("game {game_id}")))
    }
}

/// Row shape of the games/players join.
#[derive(Debug, Clone, sqlx::FromRow)]
struct GameSummaryRow {
    game_id: i64,
    filename: String,
    map_name: String,
    loops: i64,
    p1_name: String,
    p1_race: String,
    p1_result: String,
    p2_name: String,
    p2_race: String,
    p2_result: String,
}

impl From<GameSummaryRow> for GameSummary {
    fn from(row: GameSummaryRow) -> Self {
        Self {
            game_id: GameId::from_raw(row.game_id),
            filename: row.filename,
            map_name: row.map_name,
            loops: row.loops,
            p1_name: row.p1_name,
            p1_race: row.p1_race,
            p1_result: row.p1_result,
            p2_name: row.p2_name,
            p2_race: row.p2_race,
            p2_result: row.p2_result,
        }
    }
}

/// `ILIKE` pattern matching `needle` anywhere, with wildcards escaped.
fn like_pattern(needle: &str) -> String {
    let mut pattern = String::with_capacity(needle.len().saturating_add(2));
    pattern.push('%');
    for c in needle.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("Serral"), "%Serral%");
        assert_eq!(like_pattern("a_b%c"), r"%a\_b\%c%");
        assert_eq!(like_pattern(r"x\y"), r"%x\\y%");
    }

    #[test]
    fn default_filter_is_unrestricted() {
        let filter = GameFilter::default();
        assert_eq!(filter.limit, DEFAULT_LIST_LIMIT);
        assert!(filter.matchup.is_none());
        assert!(filter.player.is_none());

        let filter = GameFilter::default().with_matchup("PvZ").with_limit(5);
        assert_eq!(filter.matchup.as_deref(), Some("PvZ"));
        assert_eq!(filter.limit, 5);
    }
}
