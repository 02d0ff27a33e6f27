//! Shared type definitions for the replaylens workspace.
//!
//! This crate is the single source of truth for the records that flow
//! between the ingestion processor, the data layer, and the replay player.
//!
//! # Modules
//!
//! - [`ids`] -- `GameId` and `UnitTag` identifiers
//! - [`time`] -- Game-loop timing constants and conversions
//! - [`records`] -- Ledger and metadata records written to the store
//! - [`timeline`] -- The read-side, loop-ordered view of one game

pub mod ids;
pub mod records;
pub mod time;
pub mod timeline;

// Re-export all public types at crate root for convenience.
pub use ids::{GameId, UnitTag};
pub use records::{
    CompositionDelta, GameRecord, GameSummary, PlayerRecord, PlayerStatsSample, StatsCounters,
};
pub use time::{LOOPS_PER_SECOND, MAX_GAME_LOOPS, loop_duration};
pub use timeline::{Timeline, TimelineError};
