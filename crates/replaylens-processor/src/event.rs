//! Typed tracker events.
//!
//! The decoder's event kinds are a fixed external contract:
//!
//! | id | kind | attributes |
//! |----|------|------------|
//! | 0 | `PlayerStats` | `playerId`, `stats` |
//! | 1 | `UnitBorn` | `unitTagIndex`, `unitTagRecycle`, `unitTypeName`, `controlPlayerId` |
//! | 2 | `UnitDied` | `unitTagIndex`, `unitTagRecycle` |
//! | 3 | `UnitOwnerChange` | `unitTagIndex`, `unitTagRecycle`, `controlPlayerId` |
//! | 4 | `UnitTypeChange` | `unitTagIndex`, `unitTagRecycle`, `unitTypeName` |
//! | 5 | `Upgrade` | `playerId`, `upgradeTypeName` |
//! | 6 | `UnitInit` | `unitTagIndex`, `unitTagRecycle`, `unitTypeName`, `controlPlayerId` |
//! | 7 | `UnitDone` | `unitTagIndex`, `unitTagRecycle` |
//!
//! Other ids (positional events and the like) carry nothing the tracker
//! uses and decode to `None`.

use replaylens_types::{StatsCounters, UnitTag};
use serde_json::{Map, Value};

use crate::error::SourceError;
use crate::source::RawEvent;

/// Tracker event kinds consumed by the processor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// Periodic economy snapshot for one player.
    PlayerStats,
    /// A unit appeared fully formed.
    UnitBorn,
    /// A unit died.
    UnitDied,
    /// A unit changed owner.
    UnitOwnerChange,
    /// A unit morphed into another type.
    UnitTypeChange,
    /// A player completed an upgrade.
    Upgrade,
    /// Construction of a unit started.
    UnitInit,
    /// Construction of a unit finished.
    UnitDone,
}

impl TryFrom<i64> for EventKind {
    type Error = i64;

    fn try_from(id: i64) -> Result<Self, Self::Error> {
        match id {
            0 => Ok(Self::PlayerStats),
            1 => Ok(Self::UnitBorn),
            2 => Ok(Self::UnitDied),
            3 => Ok(Self::UnitOwnerChange),
            4 => Ok(Self::UnitTypeChange),
            5 => Ok(Self::Upgrade),
            6 => Ok(Self::UnitInit),
            7 => Ok(Self::UnitDone),
            other => Err(other),
        }
    }
}

/// A decoded tracker event.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackerEvent {
    /// Loop at which the event happened.
    pub loop_id: i64,
    /// Kind-specific payload.
    pub body: EventBody,
}

/// Kind-specific payload of a [`TrackerEvent`].
#[derive(Debug, Clone, PartialEq)]
pub enum EventBody {
    /// See [`EventKind::PlayerStats`].
    PlayerStats {
        /// Reporting player.
        player_id: i32,
        /// Fixed counter set.
        counters: StatsCounters,
        /// The whole `stats` object as JSON text.
        raw: String,
    },
    /// See [`EventKind::UnitBorn`].
    UnitBorn {
        /// Unit tag.
        tag: UnitTag,
        /// Controlling player.
        player_id: i32,
        /// Unit type name.
        unit_type: String,
    },
    /// See [`EventKind::UnitDied`].
    UnitDied {
        /// Unit tag.
        tag: UnitTag,
    },
    /// See [`EventKind::UnitOwnerChange`].
    UnitOwnerChange {
        /// Unit tag.
        tag: UnitTag,
        /// New controlling player.
        player_id: i32,
    },
    /// See [`EventKind::UnitTypeChange`].
    UnitTypeChange {
        /// Unit tag.
        tag: UnitTag,
        /// New type name.
        unit_type: String,
    },
    /// See [`EventKind::Upgrade`].
    Upgrade {
        /// Upgrading player.
        player_id: i32,
        /// Upgrade name.
        upgrade: String,
    },
    /// See [`EventKind::UnitInit`].
    UnitInit {
        /// Unit tag.
        tag: UnitTag,
        /// Controlling player.
        player_id: i32,
        /// Unit type name.
        unit_type: String,
    },
    /// See [`EventKind::UnitDone`].
    UnitDone {
        /// Unit tag.
        tag: UnitTag,
    },
}

impl EventBody {
    /// Kind of this payload.
    pub const fn kind(&self) -> EventKind {
        match self {
            Self::PlayerStats { .. } => EventKind::PlayerStats,
            Self::UnitBorn { .. } => EventKind::UnitBorn,
            Self::UnitDied { .. } => EventKind::UnitDied,
            Self::UnitOwnerChange { .. } => EventKind::UnitOwnerChange,
            Self::UnitTypeChange { .. } => EventKind::UnitTypeChange,
            Self::Upgrade { .. } => EventKind::Upgrade,
            Self::UnitInit { .. } => EventKind::UnitInit,
            Self::UnitDone { .. } => EventKind::UnitDone,
        }
    }
}

impl TrackerEvent {
    /// Decode a raw event. Unknown kinds yield `None`.
    pub fn decode(raw: &RawEvent) -> Result<Option<Self>, SourceError> {
        let Ok(kind) = EventKind::try_from(raw.id) else {
            return Ok(None);
        };
        let attrs = Attrs {
            kind,
            loop_id: raw.loop_id,
            map: &raw.attrs,
        };

        let body = match kind {
            EventKind::PlayerStats => {
                let stats = attrs.object("stats")?;
                EventBody::PlayerStats {
                    player_id: attrs.int32("playerId")?,
                    counters: attrs.counters(stats)?,
                    raw: Value::Object(stats.clone()).to_string(),
                }
            }
            EventKind::UnitBorn => EventBody::UnitBorn {
                tag: attrs.tag()?,
                player_id: attrs.int32("controlPlayerId")?,
                unit_type: attrs.string("unitTypeName")?,
            },
            EventKind::UnitDied => EventBody::UnitDied { tag: attrs.tag()? },
            EventKind::UnitOwnerChange => EventBody::UnitOwnerChange {
                tag: attrs.tag()?,
                player_id: attrs.int32("controlPlayerId")?,
            },
            EventKind::UnitTypeChange => EventBody::UnitTypeChange {
                tag: attrs.tag()?,
                unit_type: attrs.string("unitTypeName")?,
            },
            EventKind::Upgrade => EventBody::Upgrade {
                player_id: attrs.int32("playerId")?,
                upgrade: attrs.string("upgradeTypeName")?,
            },
            EventKind::UnitInit => EventBody::UnitInit {
                tag: attrs.tag()?,
                player_id: attrs.int32("controlPlayerId")?,
                unit_type: attrs.string("unitTypeName")?,
            },
            EventKind::UnitDone => EventBody::UnitDone { tag: attrs.tag()? },
        };

        Ok(Some(Self {
            loop_id: raw.loop_id,
            body,
        }))
    }
}

/// Typed attribute access for one event.
struct Attrs<'a> {
    kind: EventKind,
    loop_id: i64,
    map: &'a Map<String, Value>,
}

impl<'a> Attrs<'a> {
    const fn error(&self, name: &'static str, problem: &'static str) -> SourceError {
        SourceError::Attribute {
            kind: self.kind,
            loop_id: self.loop_id,
            name,
            problem,
        }
    }

    fn get(&self, name: &'static str) -> Result<&'a Value, SourceError> {
        self.map.get(name).ok_or_else(|| self.error(name, "is missing"))
    }

    fn int(&self, name: &'static str) -> Result<i64, SourceError> {
        self.get(name)?
            .as_i64()
            .ok_or_else(|| self.error(name, "is not an integer"))
    }

    fn int32(&self, name: &'static str) -> Result<i32, SourceError> {
        i32::try_from(self.int(name)?).map_err(|_overflow| self.error(name, "is out of range"))
    }

    fn string(&self, name: &'static str) -> Result<String, SourceError> {
        self.get(name)?
            .as_str()
            .map(str::to_owned)
            .ok_or_else(|| self.error(name, "is not a string"))
    }

    fn object(&self, name: &'static str) -> Result<&'a Map<String, Value>, SourceError> {
        self.get(name)?
            .as_object()
            .ok_or_else(|| self.error(name, "is not an object"))
    }

    fn tag(&self) -> Result<UnitTag, SourceError> {
        Ok(UnitTag::new(
            self.int("unitTagIndex")?,
            self.int("unitTagRecycle")?,
        ))
    }

    fn counters(&self, stats: &'a Map<String, Value>) -> Result<StatsCounters, SourceError> {
        let nested = Attrs {
            kind: self.kind,
            loop_id: self.loop_id,
            map: stats,
        };
        Ok(StatsCounters {
            minerals_current: nested.int32("scoreValueMineralsCurrent")?,
            vespene_current: nested.int32("scoreValueVespeneCurrent")?,
            minerals_collection_rate: nested.int32("scoreValueMineralsCollectionRate")?,
            vespene_collection_rate: nested.int32("scoreValueVespeneCollectionRate")?,
            workers_active: nested.int32("scoreValueWorkersActiveCount")?,
            food_used: nested.int32("scoreValueFoodUsed")?,
            food_made: nested.int32("scoreValueFoodMade")?,
            minerals_used_army: nested.int32("scoreValueMineralsUsedCurrentArmy")?,
            vespene_used_army: nested.int32("scoreValueVespeneUsedCurrentArmy")?,
            minerals_lost_army: nested.int32("scoreValueMineralsLostArmy")?,
            vespene_lost_army: nested.int32("scoreValueVespeneLostArmy")?,
            minerals_killed_army: nested.int32("scoreValueMineralsKilledArmy")?,
            vespene_killed_army: nested.int32("scoreValueVespeneKilledArmy")?,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic, clippy::indexing_slicing)]
mod tests {
    use serde_json::json;

    use super::*;

    fn raw(id: i64, loop_id: i64, attrs: Value) -> RawEvent {
        RawEvent {
            id,
            loop_id,
            attrs: attrs.as_object().cloned().unwrap_or_default(),
        }
    }

    #[test]
    fn kind_ids_follow_decoder_contract() {
        assert_eq!(EventKind::try_from(0), Ok(EventKind::PlayerStats));
        assert_eq!(EventKind::try_from(5), Ok(EventKind::Upgrade));
        assert_eq!(EventKind::try_from(7), Ok(EventKind::UnitDone));
        assert_eq!(EventKind::try_from(8), Err(8));
    }

    #[test]
    fn decodes_unit_born_with_combined_tag() {
        let event = TrackerEvent::decode(&raw(
            1,
            320,
            json!({"unitTagIndex": 3, "unitTagRecycle": 2, "unitTypeName": "Zergling", "controlPlayerId": 1}),
        ))
        .unwrap()
        .unwrap();

        assert_eq!(event.loop_id, 320);
        assert_eq!(
            event.body,
            EventBody::UnitBorn {
                tag: UnitTag::new(3, 2),
                player_id: 1,
                unit_type: "Zergling".to_owned(),
            }
        );
    }

    #[test]
    fn decodes_player_stats_and_keeps_raw_payload() {
        let stats = json!({
            "scoreValueMineralsCurrent": 50,
            "scoreValueVespeneCurrent": 0,
            "scoreValueMineralsCollectionRate": 700,
            "scoreValueVespeneCollectionRate": 0,
            "scoreValueWorkersActiveCount": 14,
            "scoreValueFoodUsed": 15,
            "scoreValueFoodMade": 23,
            "scoreValueMineralsUsedCurrentArmy": 0,
            "scoreValueVespeneUsedCurrentArmy": 0,
            "scoreValueMineralsLostArmy": 0,
            "scoreValueVespeneLostArmy": 0,
            "scoreValueMineralsKilledArmy": 0,
            "scoreValueVespeneKilledArmy": 0,
            "scoreValueMineralsUsedInProgressArmy": 100
        });
        let event = TrackerEvent::decode(&raw(0, 160, json!({"playerId": 2, "stats": stats})))
            .unwrap()
            .unwrap();

        let EventBody::PlayerStats {
            player_id,
            counters,
            raw,
        } = event.body
        else {
            panic!("expected a stats event");
        };
        assert_eq!(player_id, 2);
        assert_eq!(counters.workers_active, 14);
        assert_eq!(counters.food_made, 23);
        let reparsed: Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(reparsed["scoreValueMineralsUsedInProgressArmy"], 100);
    }

    #[test]
    fn unknown_kind_is_skipped() {
        assert!(TrackerEvent::decode(&raw(9, 0, json!({}))).unwrap().is_none());
    }

    #[test]
    fn missing_attribute_is_an_error() {
        let err = TrackerEvent::decode(&raw(2, 10, json!({"unitTagIndex": 1}))).unwrap_err();
        assert!(matches!(
            err,
            SourceError::Attribute {
                kind: EventKind::UnitDied,
                name: "unitTagRecycle",
                ..
            }
        ));
    }

    #[test]
    fn mistyped_attribute_is_an_error() {
        let err = TrackerEvent::decode(&raw(
            5,
            10,
            json!({"playerId": "one", "upgradeTypeName": "Stimpack"}),
        ))
        .unwrap_err();
        assert!(matches!(
            err,
            SourceError::Attribute {
                name: "playerId",
                problem: "is not an integer",
                ..
            }
        ));
    }
}
