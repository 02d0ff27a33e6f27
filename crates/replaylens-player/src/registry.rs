//! Active simulations keyed by game.
//!
//! At most one simulation runs per game: starting a game that is already
//! playing stops the old run first. Finished runs are pruned whenever the
//! registry is queried, and how they ended is logged.

use std::collections::BTreeMap;
use std::sync::Arc;

use replaylens_db::LiveView;
use replaylens_types::{GameId, Timeline};
use tokio::sync::Mutex;

use crate::error::SimulationError;
use crate::simulator::{ReplaySimulator, SimulationHandle, SimulationOutcome, SimulationStatus};

/// Registry of running simulations sharing one live view.
pub struct SimulationRegistry<V> {
    simulator: ReplaySimulator<V>,
    running: Mutex<BTreeMap<GameId, SimulationHandle>>,
}

impl<V: LiveView> SimulationRegistry<V> {
    /// Create an empty registry writing into `view`.
    pub fn new(view: Arc<V>) -> Self {
        Self {
            simulator: ReplaySimulator::new(view),
            running: Mutex::new(BTreeMap::new()),
        }
    }

    /// Start replaying `timeline`, replacing any run of the same game.
    pub async fn start(
        &self,
        timeline: Arc<Timeline>,
        start_loop: i64,
    ) -> Result<SimulationStatus, SimulationError> {
        let game_id = timeline.game_id();
        let mut running = self.running.lock().await;

        if let Some(previous) = running.remove(&game_id) {
            log_outcome(game_id, previous.stop().await);
        }

        let handle = self.simulator.start(timeline, start_loop).await?;
        let status = handle.status();
        running.insert(game_id, handle);
        Ok(status)
    }

    /// Stop the game's simulation, if one is registered.
    pub async fn stop(
        &self,
        game_id: GameId,
    ) -> Option<Result<SimulationOutcome, SimulationError>> {
        let handle = self.running.lock().await.remove(&game_id)?;
        Some(handle.stop().await)
    }

    /// Progress of the game's simulation, if one is running.
    pub async fn status(&self, game_id: GameId) -> Option<SimulationStatus> {
        let mut running = self.running.lock().await;
        prune(&mut running).await;
        running.get(&game_id).map(SimulationHandle::status)
    }

    /// Progress of every running simulation, ordered by game.
    pub async fn list(&self) -> Vec<SimulationStatus> {
        let mut running = self.running.lock().await;
        prune(&mut running).await;
        running.values().map(SimulationHandle::status).collect()
    }

    /// Stop every simulation.
    pub async fn stop_all(&self) {
        let handles = std::mem::take(&mut *self.running.lock().await);
        for (game_id, handle) in handles {
            log_outcome(game_id, handle.stop().await);
        }
    }
}

async fn prune(running: &mut BTreeMap<GameId, SimulationHandle>) {
    let finished: Vec<GameId> = running
        .iter()
        .filter(|(_, handle)| handle.is_finished())
        .map(|(game_id, _)| *game_id)
        .collect();

    for game_id in finished {
        if let Some(handle) = running.remove(&game_id) {
            log_outcome(game_id, handle.join().await);
        }
    }
}

fn log_outcome(game_id: GameId, outcome: Result<SimulationOutcome, SimulationError>) {
    match outcome {
        Ok(SimulationOutcome::Completed) => tracing::debug!(%game_id, "simulation retired"),
        Ok(SimulationOutcome::Stopped { at_loop }) => {
            tracing::debug!(%game_id, at_loop, "simulation retired early");
        }
        Err(e) => tracing::warn!(%game_id, error = %e, "simulation failed"),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use replaylens_types::loop_duration;

    use super::*;
    use crate::simulator::tests::{GAME, MemoryView, timeline};

    #[tokio::test(start_paused = true)]
    async fn starting_a_running_game_replaces_it() {
        let view = Arc::new(MemoryView::default());
        let registry = SimulationRegistry::new(Arc::clone(&view));
        let timeline = timeline(&[0, 5_000]);

        registry.start(Arc::clone(&timeline), 0).await.unwrap();
        tokio::time::sleep(loop_duration(8)).await;
        let status = registry.start(Arc::clone(&timeline), 0).await.unwrap();

        assert_eq!(status.game_id, GAME);
        assert_eq!(registry.list().await.len(), 1);
        assert_eq!(*view.clears.lock().unwrap(), 2);
        // The replacement cleared the first run's rows before replaying.
        assert!(view.rows().len() <= 1);

        let outcome = registry.stop(GAME).await.unwrap().unwrap();
        assert!(matches!(outcome, SimulationOutcome::Stopped { .. }));
        assert!(registry.stop(GAME).await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn finished_runs_are_pruned() {
        let view = Arc::new(MemoryView::default());
        let registry = SimulationRegistry::new(view);

        registry.start(timeline(&[0, 3]), 0).await.unwrap();
        assert!(registry.status(GAME).await.is_some());

        tokio::time::sleep(loop_duration(20)).await;
        assert!(registry.status(GAME).await.is_none());
        assert!(registry.list().await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn stop_all_empties_the_registry() {
        let registry = SimulationRegistry::new(Arc::new(MemoryView::default()));
        registry.start(timeline(&[0, 1_000]), 0).await.unwrap();

        registry.stop_all().await;
        assert!(registry.list().await.is_empty());
    }
}
