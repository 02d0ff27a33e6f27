//! Unit lifecycle state machine.
//!
//! The tracker turns a replay's tracker events into composition deltas:
//! signed per-player changes in the count of each unit type or upgrade.
//! It keeps one record per live [`UnitTag`] for the duration of a single
//! replay. Stats events bypass the state machine and become one
//! [`PlayerStatsSample`] each.
//!
//! Deltas are never emitted for player 0 (map objects) or for cosmetic
//! unit types (see [`is_ignored_type`]).

use std::collections::HashMap;
use std::fmt;

use replaylens_types::{CompositionDelta, GameId, MAX_GAME_LOOPS, PlayerStatsSample, UnitTag};

use crate::error::TrackerError;
use crate::event::{EventBody, EventKind, TrackerEvent};
use crate::source::ReplayInfo;

/// Unit type name prefixes that never produce deltas.
const IGNORED_TYPE_PREFIXES: [&str; 5] = [
    "Beacon",
    "RewardDance",
    "Spray",
    "LoadOutSpray",
    "GameHeartActive",
];

/// Player id the decoder uses for neutral map objects.
const NEUTRAL_PLAYER: i32 = 0;

/// Players a game must have to be ingested.
const REQUIRED_PLAYERS: usize = 2;

/// Whether a unit type is decorative and excluded from the ledger.
pub fn is_ignored_type(unit_type: &str) -> bool {
    IGNORED_TYPE_PREFIXES
        .iter()
        .any(|prefix| unit_type.starts_with(prefix))
}

/// Why a replay is not ingested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The game does not have exactly two players.
    PlayerCount(usize),
    /// The game is at least an hour of game time long.
    TooLong(i64),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PlayerCount(n) => write!(f, "expected {REQUIRED_PLAYERS} players, found {n}"),
            Self::TooLong(loops) => {
                write!(f, "{loops} loops is not below the {MAX_GAME_LOOPS} loop ceiling")
            }
        }
    }
}

/// Validity gate applied before any side effect.
pub fn check_game(info: &ReplayInfo) -> Result<(), SkipReason> {
    if info.players.len() != REQUIRED_PLAYERS {
        return Err(SkipReason::PlayerCount(info.players.len()));
    }
    if info.loops >= MAX_GAME_LOOPS {
        return Err(SkipReason::TooLong(info.loops));
    }
    Ok(())
}

/// A record produced by the tracker, in emission order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrackerOutput {
    /// A composition change.
    Delta(CompositionDelta),
    /// An economy snapshot.
    Stats(PlayerStatsSample),
}

#[derive(Debug, Clone)]
struct UnitRecord {
    player_id: i32,
    unit_type: String,
    alive: bool,
}

/// Per-replay unit state.
#[derive(Debug)]
pub struct UnitLifecycleTracker {
    game_id: GameId,
    units: HashMap<UnitTag, UnitRecord>,
}

impl UnitLifecycleTracker {
    /// Start tracking a replay.
    pub fn new(game_id: GameId) -> Self {
        Self {
            game_id,
            units: HashMap::new(),
        }
    }

    /// Number of units currently marked alive.
    pub fn alive_units(&self) -> usize {
        self.units.values().filter(|u| u.alive).count()
    }

    /// Apply one event, appending whatever it produces to `out`.
    ///
    /// Events must be applied in delivery order. On error nothing is
    /// appended and the state is unchanged.
    pub fn apply(
        &mut self,
        event: TrackerEvent,
        out: &mut Vec<TrackerOutput>,
    ) -> Result<(), TrackerError> {
        let game_id = self.game_id;
        let loop_id = event.loop_id;
        let kind = event.body.kind();
        let emit = |out: &mut Vec<TrackerOutput>, player_id: i32, unit_type: &str, num: i32| {
            if player_id == NEUTRAL_PLAYER || is_ignored_type(unit_type) {
                return;
            }
            out.push(TrackerOutput::Delta(CompositionDelta {
                game_id,
                player_id,
                loop_id,
                kind: unit_type.to_owned(),
                num,
            }));
        };

        match event.body {
            EventBody::PlayerStats {
                player_id,
                counters,
                raw,
            } => {
                out.push(TrackerOutput::Stats(PlayerStatsSample {
                    game_id,
                    player_id,
                    loop_id,
                    counters,
                    raw_stats: Some(raw),
                }));
            }
            EventBody::UnitBorn {
                tag,
                player_id,
                unit_type,
            } => {
                self.ensure_vacant(kind, tag, loop_id)?;
                tracing::trace!(player_id, unit_type = %unit_type, %tag, "unit born");
                emit(out, player_id, &unit_type, 1);
                self.units.insert(
                    tag,
                    UnitRecord {
                        player_id,
                        unit_type,
                        alive: true,
                    },
                );
            }
            EventBody::UnitInit {
                tag,
                player_id,
                unit_type,
            } => {
                self.ensure_vacant(kind, tag, loop_id)?;
                tracing::trace!(player_id, unit_type = %unit_type, %tag, "construction started");
                self.units.insert(
                    tag,
                    UnitRecord {
                        player_id,
                        unit_type,
                        alive: false,
                    },
                );
            }
            EventBody::UnitDone { tag } => {
                let unit = self.unit_mut(kind, tag, loop_id)?;
                if !unit.alive {
                    unit.alive = true;
                    tracing::trace!(
                        player_id = unit.player_id,
                        unit_type = %unit.unit_type,
                        %tag,
                        "construction finished"
                    );
                    emit(out, unit.player_id, &unit.unit_type, 1);
                }
            }
            EventBody::UnitDied { tag } => {
                let unit = self.unit_mut(kind, tag, loop_id)?;
                if unit.alive {
                    unit.alive = false;
                    tracing::trace!(
                        player_id = unit.player_id,
                        unit_type = %unit.unit_type,
                        %tag,
                        "unit died"
                    );
                    emit(out, unit.player_id, &unit.unit_type, -1);
                }
            }
            EventBody::UnitOwnerChange { tag, player_id } => {
                let unit = self.unit_mut(kind, tag, loop_id)?;
                // Ownership can change in the same instant the unit dies.
                if unit.alive {
                    tracing::trace!(from = unit.player_id, to = player_id, %tag, "owner changed");
                    emit(out, unit.player_id, &unit.unit_type, -1);
                    unit.player_id = player_id;
                    emit(out, unit.player_id, &unit.unit_type, 1);
                }
            }
            EventBody::UnitTypeChange { tag, unit_type } => {
                let unit = self.unit_mut(kind, tag, loop_id)?;
                if unit.alive {
                    tracing::trace!(from = %unit.unit_type, to = %unit_type, %tag, "type changed");
                    emit(out, unit.player_id, &unit.unit_type, -1);
                    unit.unit_type = unit_type;
                    emit(out, unit.player_id, &unit.unit_type, 1);
                }
            }
            EventBody::Upgrade { player_id, upgrade } => {
                tracing::trace!(player_id, upgrade = %upgrade, "upgrade researched");
                emit(out, player_id, &upgrade, 1);
            }
        }
        Ok(())
    }

    fn unit_mut(
        &mut self,
        kind: EventKind,
        tag: UnitTag,
        loop_id: i64,
    ) -> Result<&mut UnitRecord, TrackerError> {
        self.units
            .get_mut(&tag)
            .ok_or(TrackerError::UnknownUnit { kind, tag, loop_id })
    }

    fn ensure_vacant(
        &self,
        kind: EventKind,
        tag: UnitTag,
        loop_id: i64,
    ) -> Result<(), TrackerError> {
        match self.units.get(&tag) {
            Some(unit) if unit.alive => Err(TrackerError::DuplicateUnit { kind, tag, loop_id }),
            _ => Ok(()),
        }
    }
}
