//! Replay decoding seam.
//!
//! The processor does not parse the binary replay format itself. An
//! [`EventSource`] turns one input file into a [`DecodedReplay`]: the
//! game's metadata plus its tracker events as named-attribute maps, in the
//! decoder's (loop-monotonic) delivery order.
//!
//! [`JsonEventSource`] reads the decoder's JSON dump of that structure.
//!
//! [`ReplayInfo::matchup`] is order-independent: race initials are sorted,
//! so a Terran player in slot 1 against a Protoss player yields `PvT`, never
//! `TvP`. Queries filtering `games.matchup` must use the sorted form.

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::SourceError;

/// Decodes one replay file.
pub trait EventSource: Send + Sync + 'static {
    /// Decode the file at `path`.
    ///
    /// Blocking; callers run it off the async executor.
    fn decode(&self, path: &Path) -> Result<DecodedReplay, SourceError>;
}

/// One decoded replay.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecodedReplay {
    /// Game metadata.
    pub info: ReplayInfo,
    /// Tracker events in delivery order.
    pub events: Vec<RawEvent>,
}

/// Game metadata reported by the decoder.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplayInfo {
    /// Game length in loops.
    pub loops: i64,
    /// Game length in seconds.
    pub duration_sec: f64,
    /// Map title.
    pub map_name: String,
    /// Client version string.
    pub game_version: String,
    /// When the game was played.
    pub played_at: DateTime<Utc>,
    /// Players in slot order.
    pub players: Vec<PlayerInfo>,
}

/// One player's details.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerInfo {
    /// Battle.net region.
    pub region_id: i64,
    /// Battle.net realm.
    pub realm_id: i64,
    /// Battle.net profile id.
    pub toon_id: i64,
    /// Display name, possibly HTML-escaped.
    pub name: String,
    /// Race played (`Protoss`, `Terran`, `Zerg`).
    pub race: String,
    /// Game result.
    pub result: String,
    /// Matchmaking rating.
    #[serde(default)]
    pub mmr: Option<i32>,
    /// Actions per minute.
    #[serde(default)]
    pub apm: Option<f64>,
}

impl ReplayInfo {
    /// Race initials, sorted and joined with `v` (e.g. `PvT`).
    ///
    /// Slot order is discarded, so both seatings of one pairing share a key.
    pub fn matchup(&self) -> String {
        let mut initials: Vec<char> = self
            .players
            .iter()
            .filter_map(|p| p.race.chars().next())
            .map(|c| c.to_ascii_uppercase())
            .collect();
        initials.sort_unstable();
        initials
            .iter()
            .map(char::to_string)
            .collect::<Vec<_>>()
            .join("v")
    }
}

/// A tracker event as the decoder emits it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawEvent {
    /// Integer event kind.
    pub id: i64,
    /// Loop at which the event happened.
    #[serde(rename = "loop")]
    pub loop_id: i64,
    /// Named attributes.
    #[serde(default)]
    pub attrs: serde_json::Map<String, serde_json::Value>,
}

/// [`EventSource`] over decoder JSON dumps.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonEventSource;

impl EventSource for JsonEventSource {
    fn decode(&self, path: &Path) -> Result<DecodedReplay, SourceError> {
        let bytes = std::fs::read(path).map_err(|source| SourceError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_slice(&bytes).map_err(|source| SourceError::Json {
            path: path.to_path_buf(),
            source,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    fn info(races: &[&str]) -> ReplayInfo {
        ReplayInfo {
            loops: 100,
            duration_sec: 6.25,
            map_name: "Map".to_owned(),
            game_version: "5.0".to_owned(),
            played_at: Utc::now(),
            players: races
                .iter()
                .map(|race| PlayerInfo {
                    region_id: 1,
                    realm_id: 1,
                    toon_id: 1,
                    name: "p".to_owned(),
                    race: (*race).to_owned(),
                    result: "Win".to_owned(),
                    mmr: None,
                    apm: None,
                })
                .collect(),
        }
    }

    #[test]
    fn matchup_sorts_race_initials() {
        assert_eq!(info(&["Terran", "Protoss"]).matchup(), "PvT");
        assert_eq!(info(&["Protoss", "Terran"]).matchup(), "PvT");
        assert_eq!(info(&["Zerg", "Zerg"]).matchup(), "ZvZ");
    }

    #[test]
    fn decodes_a_dump() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("game.SC2Replay.json");
        std::fs::write(
            &path,
            r#"{
                "info": {
                    "loops": 3200,
                    "durationSec": 200.0,
                    "mapName": "Equilibrium LE",
                    "gameVersion": "5.0.11.88500",
                    "playedAt": "2021-03-01T12:00:00Z",
                    "players": [
                        {"regionId": 2, "realmId": 1, "toonId": 42, "name": "a", "race": "Zerg", "result": "Win", "mmr": 6100},
                        {"regionId": 2, "realmId": 1, "toonId": 43, "name": "b", "race": "Protoss", "result": "Loss"}
                    ]
                },
                "events": [
                    {"id": 1, "loop": 0, "attrs": {"unitTagIndex": 1, "unitTagRecycle": 1, "unitTypeName": "Probe", "controlPlayerId": 2}}
                ]
            }"#,
        )
        .unwrap();

        let replay = JsonEventSource.decode(&path).unwrap();
        assert_eq!(replay.info.loops, 3200);
        assert_eq!(replay.info.players.len(), 2);
        assert_eq!(replay.info.players[0].mmr, Some(6100));
        assert!(replay.info.players[1].apm.is_none());
        assert_eq!(replay.events.len(), 1);
        assert_eq!(replay.events[0].loop_id, 0);
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = JsonEventSource
            .decode(Path::new("/nonexistent/replay.json"))
            .unwrap_err();
        assert!(matches!(err, SourceError::Io { .. }));
    }
}
