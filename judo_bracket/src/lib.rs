//! # Judo Bracket
//!
//! An IJF tournament bracket engine for judo scoreboards.
//!
//! The library seeds competitors into a single-elimination bracket under
//! International Judo Federation rules, advances winners as matches complete,
//! creates repechage and bronze-medal matches once both finalists are known,
//! and coordinates match locks between scoring stations that share one
//! document store.
//!
//! ## Architecture
//!
//! - **Planner**: bracket size, rounds and match counts for a category
//! - **Seeding**: fixed seed positions, random placement of everyone else,
//!   no pairing with two BYEs
//! - **Builder**: the match tree, with BYE pairings resolved on the spot
//! - **Progression**: `pending -> locked -> in_progress -> completed`, winner
//!   advancement and crash reconciliation
//! - **Repechage**: two repechage and two bronze matches per category
//!
//! ## Core Modules
//!
//! - [`bracket`]: the synchronous engine
//! - [`store`]: document store trait and an in-memory implementation
//! - [`service`]: the engine wired to a store
//! - [`config`]: engine configuration
//!
//! ## Example
//!
//! ```
//! use judo_bracket::TournamentStructurePlanner;
//!
//! let plan = TournamentStructurePlanner::default().plan(6).unwrap();
//! assert_eq!(plan.bracket_size, 8);
//! assert!(plan.repechage_enabled);
//! ```

/// Bracket engine: models, seeding, building, progression and repechage.
pub mod bracket;
pub use bracket::{
    Bracket, BracketError, BracketResult, Competitor, Match, MatchId, MatchStatus, MatchType,
    RepechageOutcome, Slot, SlotSide, Standings, TournamentStructure, TournamentStructurePlanner,
};

/// Engine configuration.
pub mod config;
pub use config::{ConfigError, EngineConfig};

/// Shared document store.
pub mod store;
pub use store::{DocumentStore, MemoryStore, StoreError};

/// Store-backed bracket service.
pub mod service;
pub use service::{BracketService, MatchSubscription};
