//! Wall-clock replay of a stored timeline.
//!
//! A simulation walks loops `0..=max_loop`. At each loop it publishes the
//! loop as the current position, then writes every not-yet-emitted delta
//! at or before that loop to the live view in one batch. Past the start
//! loop it waits one loop's wall-clock duration before advancing; up to
//! the start loop it fast-forwards.
//!
//! The current loop has a single writer (the simulation task) and any
//! number of readers, so it is a plain atomic rather than a lock.

use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

use replaylens_db::LiveView;
use replaylens_types::{GameId, Timeline, loop_duration};
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::error::SimulationError;

/// How a simulation ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimulationOutcome {
    /// Every loop was played and every delta emitted.
    Completed,
    /// The simulation was stopped early.
    Stopped {
        /// Last loop published before stopping.
        at_loop: i64,
    },
}

/// Snapshot of a simulation's progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SimulationStatus {
    /// Game being replayed.
    pub game_id: GameId,
    /// Loop most recently published.
    pub current_loop: i64,
    /// Final loop of the timeline.
    pub max_loop: i64,
    /// Loop from which playback runs at wall-clock pace.
    pub start_loop: i64,
    /// Whether the task has exited.
    pub finished: bool,
}

/// Starts simulations writing into one live view.
pub struct ReplaySimulator<V> {
    view: Arc<V>,
}

impl<V> Clone for ReplaySimulator<V> {
    fn clone(&self) -> Self {
        Self {
            view: Arc::clone(&self.view),
        }
    }
}

impl<V: LiveView> ReplaySimulator<V> {
    /// Create a simulator writing into `view`.
    pub const fn new(view: Arc<V>) -> Self {
        Self { view }
    }

    /// Clear the game's live rows and start replaying `timeline`.
    ///
    /// Loops up to and including `start_loop` are played without waiting.
    ///
    /// # Errors
    ///
    /// Returns [`SimulationError::Db`] if the live view cannot be cleared;
    /// no task is started in that case.
    pub async fn start(
        &self,
        timeline: Arc<Timeline>,
        start_loop: i64,
    ) -> Result<SimulationHandle, SimulationError> {
        let game_id = timeline.game_id();
        let max_loop = timeline.max_loop();
        self.view.clear(game_id).await?;

        let progress = Arc::new(AtomicI64::new(0));
        let stop = CancellationToken::new();
        let task = tokio::spawn(
            play(
                Arc::clone(&self.view),
                timeline,
                start_loop,
                Arc::clone(&progress),
                stop.clone(),
            )
            .instrument(tracing::info_span!("simulation", %game_id)),
        );

        tracing::info!(%game_id, start_loop, max_loop, "simulation started");
        Ok(SimulationHandle {
            game_id,
            start_loop,
            max_loop,
            progress,
            stop,
            task,
        })
    }
}

/// Handle to one running simulation.
///
/// Dropping the handle detaches the task; use [`stop`](Self::stop) to
/// end it.
#[derive(Debug)]
pub struct SimulationHandle {
    game_id: GameId,
    start_loop: i64,
    max_loop: i64,
    progress: Arc<AtomicI64>,
    stop: CancellationToken,
    task: JoinHandle<Result<SimulationOutcome, SimulationError>>,
}

impl SimulationHandle {
    /// Game being replayed.
    pub const fn game_id(&self) -> GameId {
        self.game_id
    }

    /// Loop most recently published. Never decreases.
    pub fn current_loop(&self) -> i64 {
        self.progress.load(Ordering::Acquire)
    }

    /// Whether the simulation task has exited.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Progress snapshot.
    pub fn status(&self) -> SimulationStatus {
        SimulationStatus {
            game_id: self.game_id,
            current_loop: self.current_loop(),
            max_loop: self.max_loop,
            start_loop: self.start_loop,
            finished: self.is_finished(),
        }
    }

    /// Stop the simulation and wait for its task to exit.
    ///
    /// Takes effect at the next loop boundary; a pending tick is not
    /// waited out.
    pub async fn stop(self) -> Result<SimulationOutcome, SimulationError> {
        self.stop.cancel();
        self.join().await
    }

    /// Wait for the simulation to end on its own.
    pub async fn join(self) -> Result<SimulationOutcome, SimulationError> {
        self.task
            .await
            .map_err(|e| SimulationError::TaskFailed(e.to_string()))?
    }
}

async fn play<V: LiveView>(
    view: Arc<V>,
    timeline: Arc<Timeline>,
    start_loop: i64,
    progress: Arc<AtomicI64>,
    stop: CancellationToken,
) -> Result<SimulationOutcome, SimulationError> {
    let deltas = timeline.deltas();
    let max_loop = timeline.max_loop();
    let mut emitted = 0_usize;

    let mut ticker = tokio::time::interval(loop_duration(1));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    // The first tick of a fresh interval is immediate.
    ticker.reset();

    for loop_id in 0..=max_loop {
        progress.store(loop_id, Ordering::Release);

        let pending = deltas.get(emitted..).unwrap_or_default();
        let due = pending.partition_point(|d| d.loop_id <= loop_id);
        if due > 0 {
            view.insert_batch(pending.get(..due).unwrap_or_default())
                .await?;
            emitted = emitted.saturating_add(due);
            tracing::trace!(loop_id, count = due, "emitted deltas");
        }

        if loop_id == max_loop {
            break;
        }
        if loop_id > start_loop {
            tokio::select! {
                biased;
                () = stop.cancelled() => return Ok(stopped(loop_id)),
                _ = ticker.tick() => {}
            }
        } else if stop.is_cancelled() {
            return Ok(stopped(loop_id));
        }
    }

    tracing::info!(max_loop, deltas = emitted, "simulation completed");
    Ok(SimulationOutcome::Completed)
}

fn stopped(at_loop: i64) -> SimulationOutcome {
    tracing::info!(at_loop, "simulation stopped");
    SimulationOutcome::Stopped { at_loop }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::panic,
    clippy::arithmetic_side_effects,
    clippy::indexing_slicing
)]
pub(crate) mod tests {
    use std::sync::Mutex;

    use replaylens_db::DbError;
    use replaylens_types::CompositionDelta;

    use super::*;

    pub(crate) const GAME: GameId = GameId::from_raw(11);

    /// In-memory live view.
    #[derive(Default)]
    pub(crate) struct MemoryView {
        pub(crate) rows: Mutex<Vec<CompositionDelta>>,
        pub(crate) clears: Mutex<u32>,
        pub(crate) fail_inserts: bool,
    }

    impl MemoryView {
        pub(crate) fn rows(&self) -> Vec<CompositionDelta> {
            self.rows.lock().unwrap().clone()
        }
    }

    impl LiveView for MemoryView {
        async fn clear(&self, game_id: GameId) -> Result<(), DbError> {
            self.rows.lock().unwrap().retain(|d| d.game_id != game_id);
            *self.clears.lock().unwrap() += 1;
            Ok(())
        }

        async fn insert_batch(&self, deltas: &[CompositionDelta]) -> Result<(), DbError> {
            if self.fail_inserts {
                return Err(DbError::NotFound("livebuildcomp".to_owned()));
            }
            self.rows.lock().unwrap().extend_from_slice(deltas);
            Ok(())
        }
    }

    pub(crate) fn delta(loop_id: i64, kind: &str) -> CompositionDelta {
        CompositionDelta {
            game_id: GAME,
            player_id: 1,
            loop_id,
            kind: kind.to_owned(),
            num: 1,
        }
    }

    pub(crate) fn timeline(loops: &[i64]) -> Arc<Timeline> {
        let deltas = loops.iter().map(|l| delta(*l, "Probe")).collect();
        Arc::new(Timeline::new(GAME, deltas, Vec::new()).unwrap())
    }

    #[tokio::test(start_paused = true)]
    async fn plays_every_loop_and_emits_every_delta() {
        let view = Arc::new(MemoryView::default());
        let timeline = timeline(&[0, 5, 5, 20]);
        let started = tokio::time::Instant::now();

        let handle = ReplaySimulator::new(Arc::clone(&view))
            .start(Arc::clone(&timeline), 0)
            .await
            .unwrap();
        let progress = Arc::clone(&handle.progress);
        let outcome = handle.join().await.unwrap();

        assert_eq!(outcome, SimulationOutcome::Completed);
        assert_eq!(progress.load(Ordering::Acquire), 20);
        assert_eq!(view.rows(), timeline.deltas().to_vec());

        // Loops 1 through 19 each wait one tick.
        let elapsed = started.elapsed();
        assert!(elapsed >= loop_duration(19), "elapsed {elapsed:?}");
        assert!(elapsed < loop_duration(21), "elapsed {elapsed:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn fast_forwards_up_to_the_start_loop() {
        let view = Arc::new(MemoryView::default());
        let started = tokio::time::Instant::now();

        let handle = ReplaySimulator::new(Arc::clone(&view))
            .start(timeline(&[3, 20]), 15)
            .await
            .unwrap();
        assert_eq!(handle.join().await.unwrap(), SimulationOutcome::Completed);

        // Only loops 16 through 19 wait.
        let elapsed = started.elapsed();
        assert!(elapsed >= loop_duration(4), "elapsed {elapsed:?}");
        assert!(elapsed < loop_duration(6), "elapsed {elapsed:?}");
        assert_eq!(view.rows().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_ends_playback_promptly() {
        let view = Arc::new(MemoryView::default());
        let handle = ReplaySimulator::new(Arc::clone(&view))
            .start(timeline(&[0, 2, 40, 10_000]), 0)
            .await
            .unwrap();

        tokio::time::sleep(loop_duration(10)).await;
        let SimulationOutcome::Stopped { at_loop } = handle.stop().await.unwrap() else {
            panic!("expected an early stop");
        };

        assert!((1..100).contains(&at_loop), "stopped at {at_loop}");
        let rows = view.rows();
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|d| d.loop_id <= at_loop));
    }

    #[tokio::test(start_paused = true)]
    async fn current_loop_never_decreases() {
        let view = Arc::new(MemoryView::default());
        let handle = ReplaySimulator::new(view)
            .start(timeline(&[0, 64]), 0)
            .await
            .unwrap();

        let mut seen = Vec::new();
        while !handle.is_finished() {
            seen.push(handle.current_loop());
            tokio::time::sleep(loop_duration(3)).await;
        }
        seen.push(handle.current_loop());

        assert!(seen.windows(2).all(|w| w[0] <= w[1]), "{seen:?}");
        assert_eq!(seen.last().copied(), Some(64));
        assert!(handle.status().finished);
        assert_eq!(handle.join().await.unwrap(), SimulationOutcome::Completed);
    }

    #[tokio::test(start_paused = true)]
    async fn restart_replaces_previous_rows() {
        let view = Arc::new(MemoryView::default());
        view.rows.lock().unwrap().push(delta(999, "Stale"));
        let simulator = ReplaySimulator::new(Arc::clone(&view));
        let timeline = timeline(&[1, 2, 3]);

        for _ in 0..2 {
            let handle = simulator.start(Arc::clone(&timeline), 10).await.unwrap();
            handle.join().await.unwrap();
        }

        assert_eq!(view.rows(), timeline.deltas().to_vec());
        assert_eq!(*view.clears.lock().unwrap(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn live_view_failure_ends_the_simulation() {
        let view = Arc::new(MemoryView {
            fail_inserts: true,
            ..MemoryView::default()
        });
        let handle = ReplaySimulator::new(view)
            .start(timeline(&[0, 5]), 0)
            .await
            .unwrap();

        let err = handle.join().await.unwrap_err();
        assert!(matches!(err, SimulationError::Db(DbError::NotFound(_))));
    }
}
