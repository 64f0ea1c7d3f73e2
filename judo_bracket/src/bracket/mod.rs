//! Single-elimination brackets with IJF seeding and repechage.
//!
//! This module provides the bracket engine:
//! - Tournament structure planning and the draw
//! - Seed placement and random placement of unseeded competitors
//! - Match tree construction with automatic BYE resolution
//! - The match state machine and winner advancement
//! - Repechage and bronze-medal matches
//!
//! Everything here is synchronous and works on an in-memory [`Bracket`].
//! Operations return the [`StoreWrite`]s they imply; persisting them is left
//! to [`crate::service::BracketService`].
//!
//! ## Example
//!
//! ```
//! use judo_bracket::bracket::{Competitor, MatchId, TournamentStructurePlanner, progression};
//!
//! let competitors: Vec<Competitor> = (1..=8)
//!     .map(|i| Competitor::new(format!("j{i}"), format!("Judoka {i}"), "Kodokan"))
//!     .collect();
//!
//! let planner = TournamentStructurePlanner::default();
//! let mut bracket = planner
//!     .draw("m-73", &competitors, &mut rand::rng())
//!     .unwrap();
//!
//! let first = MatchId::main(1, 0);
//! progression::lock(&mut bracket, &first, "mat-1").unwrap();
//! progression::start(&mut bracket, &first, "mat-1").unwrap();
//!
//! let winner = bracket.get(&first).unwrap().slot_a.entrant().unwrap().id.clone();
//! let outcome = progression::declare_winner(&mut bracket, &first, &winner, "mat-1").unwrap();
//! assert_eq!(outcome.advanced_to.unwrap().match_id, MatchId::main(2, 0));
//! ```

pub mod builder;
pub mod errors;
pub mod models;
pub mod planner;
pub mod progression;
pub mod repechage;
pub mod seeding;
pub mod standings;

pub use errors::{BracketError, BracketResult, ErrorKind};
pub use models::{
    Bracket, BracketIndex, CategoryKey, Competitor, CompetitorId, Entrant, Half, LockRecord,
    Match, MatchId, MatchStatus, MatchType, Pool, Round, RoundInfo, Slot, SlotSide,
};
pub use planner::{TournamentStructure, TournamentStructurePlanner};
pub use progression::{Advancement, Progression, Reconciliation, StoreWrite};
pub use repechage::RepechageOutcome;
pub use seeding::SeedPlacement;
pub use standings::Standings;
