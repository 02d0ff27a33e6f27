//! Error types for the replay player.

use replaylens_db::DbError;
use replaylens_types::GameId;

/// Errors raised by a replay simulation.
#[derive(Debug, thiserror::Error)]
pub enum SimulationError {
    /// The live view could not be cleared or written.
    #[error(transparent)]
    Db(#[from] DbError),

    /// The simulation task panicked or was aborted.
    #[error("simulation task failed: {0}")]
    TaskFailed(String),
}

/// Errors surfaced by [`ReplayService`](crate::service::ReplayService).
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    /// A store read failed, or the requested game does not exist.
    #[error(transparent)]
    Db(#[from] DbError),

    /// A simulation failed to start or ended in error.
    #[error(transparent)]
    Simulation(#[from] SimulationError),

    /// No simulation is active for the game.
    #[error("no simulation running for game {0}")]
    NoSimulation(GameId),
}
