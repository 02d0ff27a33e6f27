//! Records produced by ingestion and served by the read side.
//!
//! [`CompositionDelta`] is the append-only build-order ledger;
//! [`PlayerStatsSample`] is the periodic economy snapshot. Both are
//! bulk-loaded per game. [`GameRecord`] and [`PlayerRecord`] are the
//! per-game metadata rows, upserted before the ledgers are loaded.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::GameId;

/// Signed change in one player's count of one unit or upgrade kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompositionDelta {
    /// Game the delta belongs to.
    pub game_id: GameId,
    /// Owning player (1 or 2).
    pub player_id: i32,
    /// Loop at which the change happened.
    pub loop_id: i64,
    /// Unit type or upgrade name.
    pub kind: String,
    /// `+1` for a gain, `-1` for a loss.
    pub num: i32,
}

/// Fixed economy and army counters reported by a stats event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsCounters {
    /// Unspent minerals.
    pub minerals_current: i32,
    /// Unspent vespene.
    pub vespene_current: i32,
    /// Minerals collected per minute.
    pub minerals_collection_rate: i32,
    /// Vespene collected per minute.
    pub vespene_collection_rate: i32,
    /// Workers currently harvesting.
    pub workers_active: i32,
    /// Supply in use.
    pub food_used: i32,
    /// Supply available.
    pub food_made: i32,
    /// Minerals invested in the living army.
    pub minerals_used_army: i32,
    /// Vespene invested in the living army.
    pub vespene_used_army: i32,
    /// Mineral value of army units lost.
    pub minerals_lost_army: i32,
    /// Vespene value of army units lost.
    pub vespene_lost_army: i32,
    /// Mineral value of enemy army units killed.
    pub minerals_killed_army: i32,
    /// Vespene value of enemy army units killed.
    pub vespene_killed_army: i32,
}

/// One stats event for one player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerStatsSample {
    /// Game the sample belongs to.
    pub game_id: GameId,
    /// Reporting player.
    pub player_id: i32,
    /// Loop at which the sample was taken.
    pub loop_id: i64,
    /// The fixed counter set.
    pub counters: StatsCounters,
    /// The complete stats payload as JSON text, when the source provided one.
    pub raw_stats: Option<String>,
}

/// Row of the `games` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameRecord {
    /// Identifier derived from `filename`.
    pub game_id: GameId,
    /// Path relative to the replay root.
    pub filename: String,
    /// When the game was played.
    pub played_at: DateTime<Utc>,
    /// Game length in loops.
    pub loops: i64,
    /// Game length in seconds.
    pub duration_sec: f64,
    /// Map title.
    pub map_name: String,
    /// Client version string.
    pub game_version: String,
    /// Race initials, sorted, joined with `v` (e.g. `PvT`).
    pub matchup: String,
}

/// Row of the `players` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerRecord {
    /// Game the player took part in.
    pub game_id: GameId,
    /// Player slot (1 or 2).
    pub player_id: i32,
    /// Battle.net region.
    pub region_id: i64,
    /// Battle.net realm.
    pub realm_id: i64,
    /// Battle.net profile id.
    pub toon_id: i64,
    /// Display name.
    pub name: String,
    /// Race played.
    pub race: String,
    /// Race played by the opponent.
    pub opponent_race: String,
    /// Matchmaking rating, when recorded.
    pub mmr: Option<i32>,
    /// Actions per minute, when recorded.
    pub apm: Option<f64>,
    /// Game result (`Win`, `Loss`, ...).
    pub result: String,
}

/// Listing view of a game joined with both of its players.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameSummary {
    /// Game identifier.
    #[serde(rename = "gameid")]
    pub game_id: GameId,
    /// Path relative to the replay root.
    pub filename: String,
    /// Map title.
    #[serde(rename = "mapname")]
    pub map_name: String,
    /// Game length in loops.
    pub loops: i64,
    /// Player 1 name.
    #[serde(rename = "p1Name")]
    pub p1_name: String,
    /// Player 1 race.
    #[serde(rename = "p1Race")]
    pub p1_race: String,
    /// Player 1 result.
    #[serde(rename = "p1Result")]
    pub p1_result: String,
    /// Player 2 name.
    #[serde(rename = "p2Name")]
    pub p2_name: String,
    /// Player 2 race.
    #[serde(rename = "p2Race")]
    pub p2_race: String,
    /// Player 2 result.
    #[serde(rename = "p2Result")]
    pub p2_result: String,
}
