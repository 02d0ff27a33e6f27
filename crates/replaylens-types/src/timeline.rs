//! Loop-ordered reconstruction of one game's ledgers.

use serde::Serialize;

use crate::ids::GameId;
use crate::records::{CompositionDelta, PlayerStatsSample};

/// Errors that can occur when assembling a [`Timeline`].
#[derive(Debug, thiserror::Error)]
pub enum TimelineError {
    /// The game has no composition deltas.
    #[error("no composition deltas found for game {0}")]
    Empty(GameId),
}

/// A game's composition deltas and stats samples in loop order.
///
/// Never empty: construction fails when there are no deltas, so
/// [`max_loop`](Self::max_loop) always refers to a real delta.
#[derive(Debug, Clone, Serialize)]
pub struct Timeline {
    game_id: GameId,
    deltas: Vec<CompositionDelta>,
    stats: Vec<PlayerStatsSample>,
}

impl Timeline {
    /// Assemble a timeline, establishing the ordering invariants.
    ///
    /// Deltas are sorted by loop, then kind; the sort is stable so the
    /// loss-then-gain pair of an ownership change keeps its order.
    /// Samples are sorted by loop, then player.
    pub fn new(
        game_id: GameId,
        mut deltas: Vec<CompositionDelta>,
        mut stats: Vec<PlayerStatsSample>,
    ) -> Result<Self, TimelineError> {
        if deltas.is_empty() {
            return Err(TimelineError::Empty(game_id));
        }
        deltas.sort_by(|a, b| a.loop_id.cmp(&b.loop_id).then_with(|| a.kind.cmp(&b.kind)));
        stats.sort_by_key(|s| (s.loop_id, s.player_id));
        Ok(Self {
            game_id,
            deltas,
            stats,
        })
    }

    /// The game this timeline belongs to.
    pub const fn game_id(&self) -> GameId {
        self.game_id
    }

    /// Composition deltas in loop order.
    pub fn deltas(&self) -> &[CompositionDelta] {
        &self.deltas
    }

    /// Stats samples in loop order.
    pub fn stats(&self) -> &[PlayerStatsSample] {
        &self.stats
    }

    /// Loop of the last delta.
    pub fn max_loop(&self) -> i64 {
        self.deltas.last().map_or(0, |d| d.loop_id)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn delta(loop_id: i64, kind: &str, num: i32) -> CompositionDelta {
        CompositionDelta {
            game_id: GameId::from_raw(7),
            player_id: 1,
            loop_id,
            kind: kind.to_owned(),
            num,
        }
    }

    #[test]
    fn empty_timeline_is_rejected() {
        let result = Timeline::new(GameId::from_raw(7), Vec::new(), Vec::new());
        assert!(matches!(result, Err(TimelineError::Empty(id)) if id.as_i64() == 7));
    }

    #[test]
    fn deltas_are_sorted_by_loop_then_kind() {
        let timeline = Timeline::new(
            GameId::from_raw(7),
            vec![
                delta(30, "Zealot", 1),
                delta(10, "Stalker", 1),
                delta(10, "Probe", 1),
            ],
            Vec::new(),
        )
        .unwrap();

        let order: Vec<(i64, &str)> = timeline
            .deltas()
            .iter()
            .map(|d| (d.loop_id, d.kind.as_str()))
            .collect();
        assert_eq!(order, vec![(10, "Probe"), (10, "Stalker"), (30, "Zealot")]);
        assert_eq!(timeline.max_loop(), 30);
    }

    #[test]
    fn equal_keys_keep_their_order() {
        let mut lost = delta(5, "Probe", -1);
        lost.player_id = 1;
        let mut gained = delta(5, "Probe", 1);
        gained.player_id = 2;

        let timeline = Timeline::new(GameId::from_raw(7), vec![lost, gained], Vec::new()).unwrap();
        let nums: Vec<i32> = timeline.deltas().iter().map(|d| d.num).collect();
        assert_eq!(nums, vec![-1, 1]);
    }
}
