//! The read API consumed by transports.
//!
//! [`ReplayService`] is independent of any protocol: an HTTP or RPC layer
//! maps its requests onto these calls one to one.

use std::sync::Arc;

use futures::stream::BoxStream;
use futures::{StreamExt, TryStreamExt};
use replaylens_db::{GameFilter, GameStore, PgLiveView, PostgresPool, TimelineStore};
use replaylens_types::{CompositionDelta, GameId, GameSummary, Timeline};

use crate::error::ServiceError;
use crate::registry::SimulationRegistry;
use crate::simulator::{SimulationOutcome, SimulationStatus};

/// Games, timelines, and simulations over one store.
pub struct ReplayService {
    db: PostgresPool,
    simulations: SimulationRegistry<PgLiveView>,
}

impl ReplayService {
    /// Create a service over `db`; simulations write to its live view.
    pub fn new(db: PostgresPool) -> Self {
        let view = Arc::new(PgLiveView::new(&db));
        Self {
            db,
            simulations: SimulationRegistry::new(view),
        }
    }

    /// Games matching `filter`, newest first.
    pub async fn list_games(&self, filter: &GameFilter) -> Result<Vec<GameSummary>, ServiceError> {
        Ok(GameStore::new(self.db.pool()).list_games(filter).await?)
    }

    /// One game's metadata.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::Db`] wrapping `NotFound` for an unknown game.
    pub async fn get_game(&self, game_id: GameId) -> Result<GameSummary, ServiceError> {
        Ok(GameStore::new(self.db.pool()).get_game(game_id).await?)
    }

    /// One game's full timeline.
    pub async fn get_timeline(&self, game_id: GameId) -> Result<Timeline, ServiceError> {
        Ok(TimelineStore::new(self.db.pool()).load(game_id).await?)
    }

    /// One game's composition deltas in timeline order, without buffering.
    pub fn stream_timeline(
        &self,
        game_id: GameId,
    ) -> BoxStream<'_, Result<CompositionDelta, ServiceError>> {
        TimelineStore::new(self.db.pool())
            .stream_deltas(game_id)
            .map_err(ServiceError::from)
            .boxed()
    }

    /// Start (or restart) replaying a game into the live view.
    pub async fn start_simulation(
        &self,
        game_id: GameId,
        start_loop: i64,
    ) -> Result<SimulationStatus, ServiceError> {
        let timeline = Arc::new(self.get_timeline(game_id).await?);
        Ok(self.simulations.start(timeline, start_loop).await?)
    }

    /// Stop a game's simulation.
    pub async fn stop_simulation(&self, game_id: GameId) -> Result<SimulationOutcome, ServiceError> {
        match self.simulations.stop(game_id).await {
            Some(outcome) => Ok(outcome?),
            None => Err(ServiceError::NoSimulation(game_id)),
        }
    }

    /// Progress of a game's simulation.
    pub async fn simulation_status(&self, game_id: GameId) -> Result<SimulationStatus, ServiceError> {
        self.simulations
            .status(game_id)
            .await
            .ok_or(ServiceError::NoSimulation(game_id))
    }

    /// Progress of every running simulation.
    pub async fn list_simulations(&self) -> Vec<SimulationStatus> {
        self.simulations.list().await
    }

    /// Stop every simulation and close the store.
    pub async fn shutdown(&self) {
        self.simulations.stop_all().await;
        self.db.close().await;
    }
}
