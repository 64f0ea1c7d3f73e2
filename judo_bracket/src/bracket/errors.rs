//! Bracket error types.

use thiserror::Error;

use super::models::{CategoryKey, CompetitorId, MatchId, MatchStatus, SlotSide};
use crate::store::StoreError;

/// Broad class of a [`BracketError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad caller input, rejected without side effects
    Input,
    /// The bracket cannot be built or extended as requested
    Structural,
    /// Another actor got there first; the caller may retry
    Conflict,
    /// Persistence failure
    Storage,
}

/// Bracket errors
#[derive(Debug, Error)]
pub enum BracketError {
    #[error("Invalid player count {count}: must be between 1 and {max}")]
    InvalidPlayerCount { count: usize, max: usize },

    #[error("Invalid bracket size {size} for {competitors} competitors")]
    InvalidBracketSize { size: usize, competitors: usize },

    #[error("Competitor {0} appears more than once")]
    DuplicateCompetitor(CompetitorId),

    #[error("Seed rank {rank} given to both {first} and {second}")]
    DuplicateSeed {
        rank: u32,
        first: CompetitorId,
        second: CompetitorId,
    },

    #[error("Invalid seed rank {rank} for {competitor}: ranks start at 1")]
    InvalidSeedRank { rank: u32, competitor: CompetitorId },

    #[error("Seed ranks must run 1 to {count} without gaps, rank {missing} is missing")]
    NonContiguousSeeds { count: usize, missing: u32 },

    #[error("Too many seeds: {seeds} given, a bracket of {bracket_size} supports {max}")]
    TooManySeeds {
        seeds: usize,
        bracket_size: usize,
        max: usize,
    },

    #[error("Seeded competitor {0} is not in the competitor list")]
    UnknownSeed(CompetitorId),

    #[error("Match not found: {0}")]
    MatchNotFound(MatchId),

    #[error("Bracket not found for category {0}")]
    BracketNotFound(CategoryKey),

    #[error("Competitor {competitor} is not in match {match_id}")]
    WinnerNotInMatch {
        match_id: MatchId,
        competitor: CompetitorId,
    },

    #[error("Match {match_id} cannot go from {from} to {to}")]
    InvalidTransition {
        match_id: MatchId,
        from: MatchStatus,
        to: MatchStatus,
    },

    #[error("Match {0} is already completed")]
    AlreadyCompleted(MatchId),

    #[error("Match {0} is not ready: both slots need a competitor")]
    MatchNotReady(MatchId),

    #[error("Match {match_id} is held by {holder}, not {actor}")]
    NotLockHolder {
        match_id: MatchId,
        holder: String,
        actor: String,
    },

    #[error("Match {match_id} is already locked by {holder}")]
    LockConflict { match_id: MatchId, holder: String },

    #[error("Competitor {competitor} is already active in match {active_match}")]
    CompetitorBusy {
        competitor: CompetitorId,
        active_match: MatchId,
    },

    #[error("First-round pairing {pairing} still holds two BYEs after {attempts} swap attempts")]
    UnresolvedDoubleBye { pairing: usize, attempts: usize },

    #[error("First-round match {0} has no competitors")]
    EmptyPairing(MatchId),

    #[error("Expected 2 semifinals feeding {final_id}, found {found}")]
    MissingSemifinals { final_id: MatchId, found: usize },

    #[error("Expected 4 quarterfinals (2 per semifinal), found {found}")]
    MissingQuarterfinals { found: usize },

    #[error("Slot {side} of match {match_id} already holds {existing}, cannot place {incoming}")]
    SlotConflict {
        match_id: MatchId,
        side: SlotSide,
        existing: CompetitorId,
        incoming: CompetitorId,
    },

    #[error("Match {match_id} links to missing match {next}")]
    BrokenLink { match_id: MatchId, next: MatchId },

    #[error("Cannot determine which slot of {next} the winner of {match_id} fills")]
    UnroutableWinner { match_id: MatchId, next: MatchId },

    #[error("Concurrent update of {0}, retry")]
    WriteConflict(String),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl BracketError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            BracketError::InvalidPlayerCount { .. }
            | BracketError::InvalidBracketSize { .. }
            | BracketError::DuplicateCompetitor(_)
            | BracketError::DuplicateSeed { .. }
            | BracketError::InvalidSeedRank { .. }
            | BracketError::NonContiguousSeeds { .. }
            | BracketError::TooManySeeds { .. }
            | BracketError::UnknownSeed(_)
            | BracketError::MatchNotFound(_)
            | BracketError::BracketNotFound(_)
            | BracketError::WinnerNotInMatch { .. }
            | BracketError::InvalidTransition { .. }
            | BracketError::AlreadyCompleted(_)
            | BracketError::MatchNotReady(_)
            | BracketError::NotLockHolder { .. } => ErrorKind::Input,

            BracketError::UnresolvedDoubleBye { .. }
            | BracketError::EmptyPairing(_)
            | BracketError::MissingSemifinals { .. }
            | BracketError::MissingQuarterfinals { .. }
            | BracketError::SlotConflict { .. }
            | BracketError::BrokenLink { .. }
            | BracketError::UnroutableWinner { .. } => ErrorKind::Structural,

            BracketError::LockConflict { .. }
            | BracketError::CompetitorBusy { .. }
            | BracketError::WriteConflict(_) => ErrorKind::Conflict,

            BracketError::Store(_) | BracketError::Serialization(_) => ErrorKind::Storage,
        }
    }

    /// Whether retrying the same call may succeed
    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::Conflict
    }

    /// Human-readable reason suitable for display to scoreboard operators
    ///
    /// Storage errors are reduced to a generic message so store paths and
    /// serializer internals do not leak into the UI.
    pub fn client_message(&self) -> String {
        match self {
            BracketError::Store(_) => "Storage unavailable, try again".to_string(),
            BracketError::Serialization(_) => "Stored bracket data is unreadable".to_string(),
            _ => self.to_string(),
        }
    }
}

/// Result type for bracket operations
pub type BracketResult<T> = Result<T, BracketError>;
