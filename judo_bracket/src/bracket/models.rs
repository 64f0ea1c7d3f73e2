//! Bracket data models: competitors, match slots, matches and per-category brackets.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Competitor ID type
pub type CompetitorId = String;

/// Category key (one weight/gender/age division)
pub type CategoryKey = String;

/// Match identifier, unique within a category
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MatchId(String);

impl MatchId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// ID of the main-bracket match at `position` (0-indexed) in `round` (1-indexed)
    pub fn main(round: u32, position: usize) -> Self {
        Self(format!("R{round}-M{}", position + 1))
    }

    /// ID of the repechage match for a bracket half
    pub fn repechage(half: Half) -> Self {
        match half {
            Half::Upper => Self::new("REP-A"),
            Half::Lower => Self::new("REP-B"),
        }
    }

    /// ID of a bronze-medal match (1 or 2)
    pub fn bronze(number: u8) -> Self {
        Self(format!("BRONZE-{number}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for MatchId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A registered competitor. Immutable once the draw is made.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Competitor {
    pub id: CompetitorId,
    pub name: String,
    pub club: String,
    /// Seed rank, 1 is the top seed
    pub seed: Option<u32>,
    pub country: Option<String>,
}

impl Competitor {
    /// Create an unseeded competitor
    pub fn new(id: impl Into<String>, name: impl Into<String>, club: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            club: club.into(),
            seed: None,
            country: None,
        }
    }

    /// Give the competitor a seed rank
    pub fn with_seed(mut self, seed: u32) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_country(mut self, country: impl Into<String>) -> Self {
        self.country = Some(country.into());
        self
    }
}

/// Snapshot of a competitor as written into a match slot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entrant {
    pub id: CompetitorId,
    pub name: String,
    pub club: String,
    pub seed: Option<u32>,
    pub country: Option<String>,
}

impl From<&Competitor> for Entrant {
    fn from(competitor: &Competitor) -> Self {
        Self {
            id: competitor.id.clone(),
            name: competitor.name.clone(),
            club: competitor.club.clone(),
            seed: competitor.seed,
            country: competitor.country.clone(),
        }
    }
}

/// Occupant of one side of a match
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "entrant", rename_all = "snake_case")]
pub enum Slot {
    Entrant(Entrant),
    /// No opponent; the other side advances automatically
    Bye,
    /// Waiting for the feeding match to finish
    Tbd,
    Empty,
}

impl Slot {
    pub fn entrant(&self) -> Option<&Entrant> {
        match self {
            Slot::Entrant(entrant) => Some(entrant),
            _ => None,
        }
    }

    pub fn holds(&self, competitor_id: &str) -> bool {
        self.entrant().is_some_and(|e| e.id == competitor_id)
    }

    /// Whether the slot can never receive a competitor
    pub fn is_vacant(&self) -> bool {
        matches!(self, Slot::Bye | Slot::Empty)
    }
}

/// Side of a match a winner is routed into
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SlotSide {
    A,
    B,
}

impl SlotSide {
    /// Name of the match document field holding this slot
    pub fn field_name(self) -> &'static str {
        match self {
            SlotSide::A => "slot_a",
            SlotSide::B => "slot_b",
        }
    }
}

impl std::fmt::Display for SlotSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SlotSide::A => write!(f, "A"),
            SlotSide::B => write!(f, "B"),
        }
    }
}

/// Match type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchType {
    Main,
    Final,
    Repechage,
    Bronze,
    /// Placeholder with no competitors, never played
    Empty,
}

impl std::fmt::Display for MatchType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MatchType::Main => write!(f, "main"),
            MatchType::Final => write!(f, "final"),
            MatchType::Repechage => write!(f, "repechage"),
            MatchType::Bronze => write!(f, "bronze"),
            MatchType::Empty => write!(f, "empty"),
        }
    }
}

/// Match status
///
/// `Pending -> Locked -> InProgress -> Completed`, with `Skipped` reserved for
/// `Empty` placeholders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStatus {
    Pending,
    Locked,
    InProgress,
    Completed,
    Skipped,
}

impl std::fmt::Display for MatchStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MatchStatus::Pending => write!(f, "pending"),
            MatchStatus::Locked => write!(f, "locked"),
            MatchStatus::InProgress => write!(f, "in_progress"),
            MatchStatus::Completed => write!(f, "completed"),
            MatchStatus::Skipped => write!(f, "skipped"),
        }
    }
}

/// Round a match belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Round {
    /// Main bracket round, 1-indexed
    Main(u32),
    Repechage,
    Bronze,
}

impl std::fmt::Display for Round {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Round::Main(n) => write!(f, "round {n}"),
            Round::Repechage => write!(f, "repechage"),
            Round::Bronze => write!(f, "bronze"),
        }
    }
}

/// Bracket quadrant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Pool {
    A,
    B,
    C,
    D,
}

impl Pool {
    /// Quadrant containing first-round slot `slot` of a bracket of `bracket_size`
    pub fn from_slot(slot: usize, bracket_size: usize) -> Self {
        match slot * 4 / bracket_size.max(1) {
            0 => Pool::A,
            1 => Pool::B,
            2 => Pool::C,
            _ => Pool::D,
        }
    }
}

/// Bracket half. The upper half holds pools A and B and feeds slot A of the final.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Half {
    Upper,
    Lower,
}

impl Half {
    pub fn from_slot(slot: usize, bracket_size: usize) -> Self {
        if slot * 2 < bracket_size {
            Half::Upper
        } else {
            Half::Lower
        }
    }

    pub fn opposite(self) -> Self {
        match self {
            Half::Upper => Half::Lower,
            Half::Lower => Half::Upper,
        }
    }
}

/// A single match of a bracket
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Match {
    pub id: MatchId,
    pub category: CategoryKey,
    pub round: Round,
    /// Index within the round
    pub position: usize,
    pub match_type: MatchType,
    pub slot_a: Slot,
    pub slot_b: Slot,
    pub winner: Option<CompetitorId>,
    pub loser: Option<CompetitorId>,
    pub status: MatchStatus,
    /// Match the winner advances to, `None` for terminal matches
    pub next_match_id: Option<MatchId>,
    /// Slot of `next_match_id` the winner fills
    pub winner_to: Option<SlotSide>,
    pub pool: Option<Pool>,
    pub half: Option<Half>,
    pub locked_by: Option<String>,
    pub locked_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Match {
    /// Create a pending match with both slots waiting for competitors
    pub fn new(
        id: MatchId,
        category: impl Into<CategoryKey>,
        round: Round,
        position: usize,
        match_type: MatchType,
    ) -> Self {
        Self {
            id,
            category: category.into(),
            round,
            position,
            match_type,
            slot_a: Slot::Tbd,
            slot_b: Slot::Tbd,
            winner: None,
            loser: None,
            status: MatchStatus::Pending,
            next_match_id: None,
            winner_to: None,
            pool: None,
            half: None,
            locked_by: None,
            locked_at: None,
            completed_at: None,
        }
    }

    pub fn slot(&self, side: SlotSide) -> &Slot {
        match side {
            SlotSide::A => &self.slot_a,
            SlotSide::B => &self.slot_b,
        }
    }

    pub fn slot_mut(&mut self, side: SlotSide) -> &mut Slot {
        match side {
            SlotSide::A => &mut self.slot_a,
            SlotSide::B => &mut self.slot_b,
        }
    }

    /// Entrants currently in the match, slot A first
    pub fn entrants(&self) -> impl Iterator<Item = &Entrant> {
        self.slot_a.entrant().into_iter().chain(self.slot_b.entrant())
    }

    pub fn has_competitor(&self, competitor_id: &str) -> bool {
        self.slot_a.holds(competitor_id) || self.slot_b.holds(competitor_id)
    }

    /// Both slots hold a competitor
    pub fn is_playable(&self) -> bool {
        self.slot_a.entrant().is_some() && self.slot_b.entrant().is_some()
    }

    /// One competitor against a BYE or an empty slot
    pub fn is_bye(&self) -> bool {
        matches!(
            (&self.slot_a, &self.slot_b),
            (Slot::Entrant(_), Slot::Bye | Slot::Empty) | (Slot::Bye | Slot::Empty, Slot::Entrant(_))
        )
    }

    /// Locked or being played
    pub fn is_active(&self) -> bool {
        matches!(self.status, MatchStatus::Locked | MatchStatus::InProgress)
    }

    pub fn is_completed(&self) -> bool {
        self.status == MatchStatus::Completed
    }

    pub fn winner_entrant(&self) -> Option<&Entrant> {
        let winner = self.winner.as_deref()?;
        self.entrants().find(|e| e.id == winner)
    }

    pub fn loser_entrant(&self) -> Option<&Entrant> {
        let loser = self.loser.as_deref()?;
        self.entrants().find(|e| e.id == loser)
    }

    pub(crate) fn clear_lock(&mut self) {
        self.locked_by = None;
        self.locked_at = None;
    }
}

/// Round descriptor for display and planning
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundInfo {
    /// Round number (1-indexed)
    pub number: u32,
    pub name: String,
    pub match_count: usize,
}

/// All matches of one category
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bracket {
    pub category: CategoryKey,
    /// Identifies one draw; a re-draw gets a new ID
    pub draw_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub competitor_count: usize,
    pub bracket_size: usize,
    pub repechage_enabled: bool,
    pub rounds: Vec<RoundInfo>,
    /// Elimination tree including the final
    pub main: Vec<Match>,
    /// Repechage and bronze matches, empty until both semifinals are decided
    pub repechage: Vec<Match>,
}

impl Bracket {
    /// Iterate over every match, main bracket first
    pub fn matches(&self) -> impl Iterator<Item = &Match> {
        self.main.iter().chain(self.repechage.iter())
    }

    pub fn get(&self, id: &MatchId) -> Option<&Match> {
        self.matches().find(|m| &m.id == id)
    }

    pub fn get_mut(&mut self, id: &MatchId) -> Option<&mut Match> {
        self.main
            .iter_mut()
            .chain(self.repechage.iter_mut())
            .find(|m| &m.id == id)
    }

    pub fn final_match(&self) -> Option<&Match> {
        self.main.iter().find(|m| m.match_type == MatchType::Final)
    }

    /// Matches whose winner advances into `id`, in bracket order
    pub fn feeders_of(&self, id: &MatchId) -> Vec<&Match> {
        self.matches()
            .filter(|m| m.next_match_id.as_ref() == Some(id))
            .collect()
    }

    /// Main-bracket matches feeding the final
    pub fn semifinals(&self) -> Vec<&Match> {
        match self.final_match() {
            Some(final_match) => self
                .main
                .iter()
                .filter(|m| m.next_match_id.as_ref() == Some(&final_match.id))
                .collect(),
            None => Vec::new(),
        }
    }

    pub fn has_repechage(&self) -> bool {
        !self.repechage.is_empty()
    }

    /// Split into the persisted index and the individual match documents
    pub fn to_index(&self) -> BracketIndex {
        BracketIndex {
            category: self.category.clone(),
            draw_id: self.draw_id,
            created_at: self.created_at,
            competitor_count: self.competitor_count,
            bracket_size: self.bracket_size,
            repechage_enabled: self.repechage_enabled,
            rounds: self.rounds.clone(),
            main: self.main.iter().map(|m| m.id.clone()).collect(),
            repechage: self.repechage.iter().map(|m| m.id.clone()).collect(),
        }
    }

    /// Reassemble a bracket from its index and match documents
    pub fn from_parts(index: BracketIndex, main: Vec<Match>, repechage: Vec<Match>) -> Self {
        Self {
            category: index.category,
            draw_id: index.draw_id,
            created_at: index.created_at,
            competitor_count: index.competitor_count,
            bracket_size: index.bracket_size,
            repechage_enabled: index.repechage_enabled,
            rounds: index.rounds,
            main,
            repechage,
        }
    }
}

/// Persisted bracket document: metadata plus the IDs of its match documents
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BracketIndex {
    pub category: CategoryKey,
    pub draw_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub competitor_count: usize,
    pub bracket_size: usize,
    pub repechage_enabled: bool,
    pub rounds: Vec<RoundInfo>,
    pub main: Vec<MatchId>,
    pub repechage: Vec<MatchId>,
}

/// Exclusive right to run a match
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockRecord {
    pub holder: String,
    pub acquired_at: DateTime<Utc>,
}

impl LockRecord {
    pub fn new(holder: impl Into<String>) -> Self {
        Self {
            holder: holder.into(),
            acquired_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entrant(id: &str) -> Slot {
        Slot::Entrant(Entrant::from(&Competitor::new(id, id.to_uppercase(), "Club")))
    }

    #[test]
    fn test_match_ids() {
        assert_eq!(MatchId::main(1, 0).as_str(), "R1-M1");
        assert_eq!(MatchId::main(3, 1).as_str(), "R3-M2");
        assert_eq!(MatchId::repechage(Half::Lower).as_str(), "REP-B");
        assert_eq!(MatchId::bronze(2).to_string(), "BRONZE-2");
    }

    #[test]
    fn test_pool_and_half_from_slot() {
        assert_eq!(Pool::from_slot(0, 16), Pool::A);
        assert_eq!(Pool::from_slot(5, 16), Pool::B);
        assert_eq!(Pool::from_slot(8, 16), Pool::C);
        assert_eq!(Pool::from_slot(15, 16), Pool::D);
        assert_eq!(Half::from_slot(3, 8), Half::Upper);
        assert_eq!(Half::from_slot(4, 8), Half::Lower);
        assert_eq!(Half::Upper.opposite(), Half::Lower);
    }

    #[test]
    fn test_match_slot_helpers() {
        let mut m = Match::new(MatchId::main(1, 0), "m-66", Round::Main(1), 0, MatchType::Main);
        assert!(!m.is_playable());

        m.slot_a = entrant("a");
        m.slot_b = Slot::Bye;
        assert!(m.is_bye());
        assert!(!m.is_playable());

        m.slot_b = entrant("b");
        assert!(m.is_playable());
        assert!(m.has_competitor("b"));
        assert!(!m.has_competitor("c"));
        assert_eq!(m.entrants().count(), 2);

        m.winner = Some("b".to_string());
        m.loser = Some("a".to_string());
        assert_eq!(m.winner_entrant().map(|e| e.name.as_str()), Some("B"));
        assert_eq!(m.loser_entrant().map(|e| e.id.as_str()), Some("a"));
    }

    #[test]
    fn test_match_serializes_snake_case() {
        let mut m = Match::new(MatchId::bronze(1), "w-52", Round::Bronze, 0, MatchType::Bronze);
        m.status = MatchStatus::InProgress;
        m.winner_to = Some(SlotSide::B);

        let json = serde_json::to_value(&m).unwrap();
        assert_eq!(json["status"], "in_progress");
        assert_eq!(json["match_type"], "bronze");
        assert_eq!(json["winner_to"], "B");
        assert_eq!(json["slot_a"]["kind"], "tbd");
        assert_eq!(json["id"], "BRONZE-1");

        let back: Match = serde_json::from_value(json).unwrap();
        assert_eq!(back, m);
    }

    #[test]
    fn test_field_names_match_serialized_slots() {
        let m = Match::new(MatchId::main(1, 0), "m-73", Round::Main(1), 0, MatchType::Main);
        let json = serde_json::to_value(&m).unwrap();
        assert!(json.get(SlotSide::A.field_name()).is_some());
        assert!(json.get(SlotSide::B.field_name()).is_some());
    }
}
