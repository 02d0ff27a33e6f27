//! Data layer for replaylens (`PostgreSQL`).
//!
//! The processor writes each game's metadata with upserts and streams its
//! ledgers into the store with binary `COPY`, encoding rows on one side of
//! an in-process pipe while a loader task feeds the other side to the
//! database. The player reads timelines back and maintains the live view
//! that simulations write into.
//!
//! # Architecture
//!
//! ```text
//! Processor (per file)
//!     |
//!     +-- GameStore::upsert_game / upsert_players --> games, players
//!     |
//!     +-- StreamingLoader<PlayerStatsSample> -------> playerstats (COPY)
//!     +-- StreamingLoader<CompositionDelta> --------> buildcomp   (COPY)
//!
//! Player
//!     |
//!     +-- GameStore::list_games / get_game   <------ games, players
//!     +-- TimelineStore::load / stream_deltas <----- buildcomp, playerstats
//!     +-- PgLiveView::clear / insert_batch --------> livebuildcomp
//! ```
//!
//! # Modules
//!
//! - [`postgres`] -- Connection pool, configuration, and migrations
//! - [`schema`] -- Static record schemas and the [`Record`] trait
//! - [`codec`] -- Binary `COPY` encoding of records
//! - [`loader`] -- The streaming bulk loader
//! - [`records`] -- Schemas for the bulk-loaded ledgers
//! - [`game_store`] -- Game and player metadata
//! - [`timeline_store`] -- Timeline reads
//! - [`live_view`] -- The live view written by simulations
//! - [`error`] -- Shared error types

pub mod codec;
pub mod error;
pub mod game_store;
pub mod live_view;
pub mod loader;
pub mod postgres;
pub mod records;
pub mod schema;
pub mod timeline_store;

// Re-export primary types for convenience.
pub use codec::{CopyEncoder, RowEncoder};
pub use error::{DbError, EncodeError, LoaderError};
pub use game_store::{GameFilter, GameStore};
pub use live_view::{LiveView, PgLiveView};
pub use loader::{LoadSummary, StreamingLoader};
pub use postgres::{PostgresConfig, PostgresPool};
pub use schema::{Field, FieldKind, Record, RecordSchema, Value};
pub use timeline_store::TimelineStore;
