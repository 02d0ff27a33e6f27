//! Game-loop timing.
//!
//! The engine advances in discrete loops; sixteen loops make one second
//! of game time.

use std::time::Duration;

/// Simulation loops per real-time second.
pub const LOOPS_PER_SECOND: u32 = 16;

/// Games at or above this many loops (one hour) are not ingested.
pub const MAX_GAME_LOOPS: i64 = 57_600;

/// Wall-clock duration of `loops` game loops.
pub fn loop_duration(loops: u32) -> Duration {
    Duration::from_secs(u64::from(loops)) / LOOPS_PER_SECOND
}
