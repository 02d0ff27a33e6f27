//! Read side of replaylens.
//!
//! Serves stored games and their timelines, and replays a timeline into
//! the live view at the game's own pace so downstream readers can follow
//! a game as if it were being played now.
//!
//! # Architecture
//!
//! ```text
//! ReplayService
//!     |
//!     +-- list_games / get_game ------------> GameStore
//!     +-- get_timeline / stream_timeline ---> TimelineStore
//!     +-- start / stop / status ------------> SimulationRegistry
//!                                                 |
//!                                                 +-- ReplaySimulator (one task per game)
//!                                                         |
//!                                                         +--> LiveView (livebuildcomp)
//! ```
//!
//! # Modules
//!
//! - [`simulator`] -- The per-game replay task and its handle
//! - [`registry`] -- Active simulations keyed by game
//! - [`service`] -- The transport-independent read API
//! - [`error`] -- Error types

pub mod error;
pub mod registry;
pub mod service;
pub mod simulator;

pub use error::{ServiceError, SimulationError};
pub use registry::SimulationRegistry;
pub use service::ReplayService;
pub use simulator::{ReplaySimulator, SimulationHandle, SimulationOutcome, SimulationStatus};
