//! Repechage and bronze-medal matches.
//!
//! Quarterfinal losers get a second route to a bronze medal. Losers from the
//! upper half meet in `REP-A`, losers from the lower half in `REP-B`. Each
//! repechage winner then faces the semifinal loser from the opposite half:
//!
//! ```text
//! BRONZE-1: loser of the lower semifinal vs winner of REP-A
//! BRONZE-2: loser of the upper semifinal vs winner of REP-B
//! ```
//!
//! The set is created once, when both finalists are known, and never touches
//! the main bracket.

use super::errors::{BracketError, BracketResult};
use super::models::{Bracket, Half, Match, MatchId, MatchStatus, MatchType, Round, Slot, SlotSide};
use super::progression;

/// What happened when the repechage was requested
#[derive(Debug, Clone, PartialEq)]
pub enum RepechageOutcome {
    /// The set was built and added to the bracket
    Created(Vec<Match>),
    /// The category already has its repechage
    AlreadyExists,
    /// At least one finalist is still undecided
    NotReady,
    /// Category too small for a repechage
    Disabled,
    /// The bracket shape does not allow a repechage; nothing was added
    Aborted(String),
}

/// Put feeders in slot order (slot A feeder first)
///
/// Legacy matches without `winner_to` keep their bracket order.
fn order_by_side(feeders: &mut [&Match]) {
    if feeders.iter().all(|m| m.winner_to.is_some()) {
        feeders.sort_by_key(|m| m.winner_to);
    } else {
        log::warn!("Feeder matches without winner_to, using bracket order");
    }
}

fn loser_slot(m: &Match) -> Slot {
    m.loser_entrant()
        .cloned()
        .map_or(Slot::Bye, Slot::Entrant)
}

/// Build the two repechage and two bronze matches of `bracket`
///
/// A quarterfinal decided by a BYE has no loser, so the matching repechage
/// slot becomes a BYE. If both quarterfinals of a half were BYEs the
/// repechage match is an `empty` placeholder and the bronze match it feeds
/// gets a BYE instead.
///
/// # Errors
///
/// * `MissingSemifinals` unless exactly two matches feed the final
/// * `MissingQuarterfinals` unless each semifinal has exactly two feeders
pub fn build_repechage(bracket: &Bracket) -> BracketResult<Vec<Match>> {
    let Some(final_match) = bracket.final_match() else {
        return Err(BracketError::MissingSemifinals {
            final_id: MatchId::new("final"),
            found: 0,
        });
    };

    let mut semis = bracket.feeders_of(&final_match.id);
    if semis.len() != 2 {
        return Err(BracketError::MissingSemifinals {
            final_id: final_match.id.clone(),
            found: semis.len(),
        });
    }
    order_by_side(&mut semis);

    let mut quarters = Vec::with_capacity(2);
    for semi in &semis {
        let mut feeders = bracket.feeders_of(&semi.id);
        order_by_side(&mut feeders);
        quarters.push(feeders);
    }
    if quarters.iter().any(|q| q.len() != 2) {
        return Err(BracketError::MissingQuarterfinals {
            found: quarters.iter().map(Vec::len).sum(),
        });
    }

    let category = bracket.category.as_str();
    let halves = [Half::Upper, Half::Lower];
    let mut set = Vec::with_capacity(4);

    for (index, (half, feeders)) in halves.iter().zip(&quarters).enumerate() {
        let mut rep = Match::new(
            MatchId::repechage(*half),
            category,
            Round::Repechage,
            index,
            MatchType::Repechage,
        );
        rep.half = Some(*half);
        rep.next_match_id = Some(MatchId::bronze(index as u8 + 1));
        rep.winner_to = Some(SlotSide::B);
        rep.slot_a = loser_slot(feeders[0]);
        rep.slot_b = loser_slot(feeders[1]);

        if rep.slot_a.is_vacant() && rep.slot_b.is_vacant() {
            rep.match_type = MatchType::Empty;
            rep.status = MatchStatus::Skipped;
            rep.slot_a = Slot::Empty;
            rep.slot_b = Slot::Empty;
        }
        set.push(rep);
    }

    for (index, half) in halves.iter().enumerate() {
        // Semifinal loser from the other half
        let semi = semis[1 - index];
        let mut bronze = Match::new(
            MatchId::bronze(index as u8 + 1),
            category,
            Round::Bronze,
            index,
            MatchType::Bronze,
        );
        bronze.half = Some(*half);
        bronze.slot_a = loser_slot(semi);
        bronze.slot_b = if set[index].status == MatchStatus::Skipped {
            Slot::Bye
        } else {
            Slot::Tbd
        };
        set.push(bronze);
    }

    Ok(set)
}

/// Create the repechage of `bracket` once both finalists are known
///
/// Safe to call any number of times: only the first call after the final is
/// populated creates the set. Structural failures are logged and reported as
/// [`RepechageOutcome::Aborted`] with the bracket left unchanged.
pub fn ensure_repechage(bracket: &mut Bracket) -> RepechageOutcome {
    if !bracket.repechage_enabled {
        return RepechageOutcome::Disabled;
    }
    if bracket.has_repechage() {
        return RepechageOutcome::AlreadyExists;
    }
    match bracket.final_match() {
        Some(f) if f.is_playable() => {}
        Some(_) => return RepechageOutcome::NotReady,
        None => {
            log::warn!("Bracket {} has no final, repechage not created", bracket.category);
            return RepechageOutcome::Aborted("bracket has no final".to_string());
        }
    }

    let set = match build_repechage(bracket) {
        Ok(set) => set,
        Err(e) => {
            log::warn!("Repechage for {} not created: {}", bracket.category, e);
            return RepechageOutcome::Aborted(e.to_string());
        }
    };
    bracket.repechage = set;

    if let Err(e) = resolve_byes(bracket) {
        bracket.repechage.clear();
        log::warn!("Repechage for {} not created: {}", bracket.category, e);
        return RepechageOutcome::Aborted(e.to_string());
    }

    log::info!(
        "Created repechage for {}: {}",
        bracket.category,
        bracket
            .repechage
            .iter()
            .map(|m| m.id.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    );
    RepechageOutcome::Created(bracket.repechage.clone())
}

/// Complete repechage and bronze pairings that hold a single competitor
fn resolve_byes(bracket: &mut Bracket) -> BracketResult<()> {
    let order = [
        MatchId::repechage(Half::Upper),
        MatchId::repechage(Half::Lower),
        MatchId::bronze(1),
        MatchId::bronze(2),
    ];
    for id in &order {
        let pending_bye = bracket
            .get(id)
            .is_some_and(|m| m.status == MatchStatus::Pending && m.is_bye());
        if pending_bye {
            progression::complete_bye(bracket, id)?;
        }
    }
    Ok(())
}

/// Number of repechage-line matches reserved for a bracket of `bracket_size`
///
/// Used for planning only; the bracket itself always holds two repechage and
/// two bronze matches.
pub fn repechage_match_count(bracket_size: usize) -> usize {
    if bracket_size < 8 {
        return 0;
    }
    2 * ((bracket_size / 4) / 2 - 1) + 2
}
