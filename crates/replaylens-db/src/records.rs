//! Schemas of the bulk-loaded ledgers.
//!
//! Column order here is wire order and must match the `COPY` column list,
//! which is generated from the same schema.

use replaylens_types::{CompositionDelta, PlayerStatsSample};

use crate::codec::RowEncoder;
use crate::error::EncodeError;
use crate::schema::{Field, FieldKind, Record, RecordSchema};

/// Table holding the ingested build-order ledger.
pub const BUILDCOMP_TABLE: &str = "buildcomp";

/// Table holding the ingested stats samples.
pub const PLAYERSTATS_TABLE: &str = "playerstats";

/// Table the replay simulator writes into.
pub const LIVE_BUILDCOMP_TABLE: &str = "livebuildcomp";

const COMPOSITION_DELTA_FIELDS: &[Field] = &[
    Field::required("game_id", FieldKind::Long),
    Field::required("player_id", FieldKind::Int),
    Field::required("loop_id", FieldKind::Long),
    Field::required("kind", FieldKind::String),
    Field::required("num", FieldKind::Int),
];

/// Wire schema of a [`CompositionDelta`].
pub static COMPOSITION_DELTA_SCHEMA: RecordSchema = RecordSchema {
    name: "buildcomp_change",
    fields: COMPOSITION_DELTA_FIELDS,
};

const PLAYER_STATS_FIELDS: &[Field] = &[
    Field::required("game_id", FieldKind::Long),
    Field::required("player_id", FieldKind::Int),
    Field::required("loop_id", FieldKind::Long),
    Field::required("minerals_current", FieldKind::Int),
    Field::required("vespene_current", FieldKind::Int),
    Field::required("minerals_collection_rate", FieldKind::Int),
    Field::required("vespene_collection_rate", FieldKind::Int),
    Field::required("workers_active", FieldKind::Int),
    Field::required("food_used", FieldKind::Int),
    Field::required("food_made", FieldKind::Int),
    Field::required("minerals_used_army", FieldKind::Int),
    Field::required("vespene_used_army", FieldKind::Int),
    Field::required("minerals_lost_army", FieldKind::Int),
    Field::required("vespene_lost_army", FieldKind::Int),
    Field::required("minerals_killed_army", FieldKind::Int),
    Field::required("vespene_killed_army", FieldKind::Int),
    Field::nullable("raw_stats", FieldKind::String),
];

/// Wire schema of a [`PlayerStatsSample`].
pub static PLAYER_STATS_SCHEMA: RecordSchema = RecordSchema {
    name: "player_stats",
    fields: PLAYER_STATS_FIELDS,
};

impl Record for CompositionDelta {
    fn schema() -> &'static RecordSchema {
        &COMPOSITION_DELTA_SCHEMA
    }

    fn encode_fields(&self, row: &mut RowEncoder<'_>) -> Result<(), EncodeError> {
        row.push(self.game_id.as_i64())?;
        row.push(self.player_id)?;
        row.push(self.loop_id)?;
        row.push(self.kind.as_str())?;
        row.push(self.num)
    }
}

impl Record for PlayerStatsSample {
    fn schema() -> &'static RecordSchema {
        &PLAYER_STATS_SCHEMA
    }

    fn encode_fields(&self, row: &mut RowEncoder<'_>) -> Result<(), EncodeError> {
        let c = &self.counters;
        row.push(self.game_id.as_i64())?;
        row.push(self.player_id)?;
        row.push(self.loop_id)?;
        row.push(c.minerals_current)?;
        row.push(c.vespene_current)?;
        row.push(c.minerals_collection_rate)?;
        row.push(c.vespene_collection_rate)?;
        row.push(c.workers_active)?;
        row.push(c.food_used)?;
        row.push(c.food_made)?;
        row.push(c.minerals_used_army)?;
        row.push(c.vespene_used_army)?;
        row.push(c.minerals_lost_army)?;
        row.push(c.vespene_lost_army)?;
        row.push(c.minerals_killed_army)?;
        row.push(c.vespene_killed_army)?;
        row.push(self.raw_stats.as_deref())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use replaylens_types::{GameId, StatsCounters};

    use super::*;
    use crate::codec::CopyEncoder;

    #[test]
    fn composition_delta_encodes_against_its_schema() {
        let mut enc = CopyEncoder::new(CompositionDelta::schema()).unwrap();
        enc.encode(&CompositionDelta {
            game_id: GameId::from_raw(-5),
            player_id: 2,
            loop_id: 1200,
            kind: "Marine".to_owned(),
            num: -1,
        })
        .unwrap();
        assert_eq!(enc.rows(), 1);
    }

    #[test]
    fn stats_sample_encodes_with_and_without_raw_payload() {
        let mut enc = CopyEncoder::new(PlayerStatsSample::schema()).unwrap();
        let mut sample = PlayerStatsSample {
            game_id: GameId::from_raw(1),
            player_id: 1,
            loop_id: 160,
            counters: StatsCounters {
                minerals_current: 50,
                workers_active: 12,
                ..StatsCounters::default()
            },
            raw_stats: None,
        };
        enc.encode(&sample).unwrap();
        sample.raw_stats = Some(r#"{"scoreValueMineralsCurrent":50}"#.to_owned());
        enc.encode(&sample).unwrap();
        assert_eq!(enc.rows(), 2);
    }

    #[test]
    fn copy_statement_targets_declared_columns() {
        assert_eq!(
            COMPOSITION_DELTA_SCHEMA.copy_statement(BUILDCOMP_TABLE),
            "COPY buildcomp (game_id, player_id, loop_id, kind, num) FROM STDIN WITH (FORMAT binary)"
        );
        assert_eq!(PLAYER_STATS_SCHEMA.fields.len(), 17);
    }
}
