//! Match state machine and winner advancement.
//!
//! Every operation here works on an in-memory [`Bracket`] and returns the
//! document writes it implies. The caller decides how to persist them; the
//! writes are ordered so that the match itself is always written before the
//! slot it feeds.

use chrono::Utc;

use super::errors::{BracketError, BracketResult};
use super::models::{Bracket, Entrant, Match, MatchId, MatchStatus, Slot, SlotSide};
use super::repechage::{self, RepechageOutcome};

/// A persistence effect of a bracket operation
#[derive(Debug, Clone, PartialEq)]
pub enum StoreWrite {
    /// Overwrite the whole match document
    ReplaceMatch(Match),
    /// Merge one slot into an existing match document
    FillSlot {
        match_id: MatchId,
        side: SlotSide,
        slot: Slot,
    },
    /// Commit the repechage and bronze matches of the category as one set
    CreateRepechage(Vec<Match>),
}

/// A winner written into the next match
#[derive(Debug, Clone, PartialEq)]
pub struct Advancement {
    pub match_id: MatchId,
    pub side: SlotSide,
    pub entrant: Entrant,
}

impl From<Advancement> for StoreWrite {
    fn from(advancement: Advancement) -> Self {
        StoreWrite::FillSlot {
            match_id: advancement.match_id,
            side: advancement.side,
            slot: Slot::Entrant(advancement.entrant),
        }
    }
}

/// Result of declaring a winner
#[derive(Debug, Clone)]
pub struct Progression {
    /// The match after completion
    pub completed: Match,
    pub advanced_to: Option<Advancement>,
    /// Set when the match was a semifinal
    pub repechage: Option<RepechageOutcome>,
    pub writes: Vec<StoreWrite>,
}

/// Result of a reconciliation pass
#[derive(Debug, Clone, Default)]
pub struct Reconciliation {
    /// Completed matches whose winner had not reached the next match
    pub repaired: Vec<MatchId>,
    /// BYE pairings that had not been completed
    pub byes_resolved: Vec<MatchId>,
    pub repechage: Option<RepechageOutcome>,
    /// Lock records left behind for matches that are no longer active
    pub released_locks: Vec<MatchId>,
    pub writes: Vec<StoreWrite>,
}

impl Reconciliation {
    /// Nothing needed repair
    pub fn is_clean(&self) -> bool {
        self.writes.is_empty() && self.released_locks.is_empty()
    }
}

fn find_mut<'a>(bracket: &'a mut Bracket, match_id: &MatchId) -> BracketResult<&'a mut Match> {
    bracket
        .get_mut(match_id)
        .ok_or_else(|| BracketError::MatchNotFound(match_id.clone()))
}

fn check_holder(m: &Match, actor: &str) -> BracketResult<()> {
    match m.locked_by.as_deref() {
        Some(holder) if holder == actor => Ok(()),
        holder => Err(BracketError::NotLockHolder {
            match_id: m.id.clone(),
            holder: holder.unwrap_or("nobody").to_string(),
            actor: actor.to_string(),
        }),
    }
}

/// Record the result and release the lock
fn finish(m: &mut Match, winner: &str) {
    let loser = m
        .entrants()
        .find(|e| e.id != winner)
        .map(|e| e.id.clone());
    m.loser = loser;
    m.winner = Some(winner.to_string());
    m.status = MatchStatus::Completed;
    m.completed_at = Some(Utc::now());
    m.clear_lock();
}

/// Claim a match for `holder`: `pending -> locked`
///
/// # Errors
///
/// * `LockConflict` if another actor holds the match
/// * `AlreadyCompleted` / `InvalidTransition` for finished or skipped matches
/// * `MatchNotReady` unless both slots hold a competitor
/// * `CompetitorBusy` if either competitor is in another active match
pub fn lock(
    bracket: &mut Bracket,
    match_id: &MatchId,
    holder: &str,
) -> BracketResult<Vec<StoreWrite>> {
    let m = bracket
        .get(match_id)
        .ok_or_else(|| BracketError::MatchNotFound(match_id.clone()))?;

    match m.status {
        MatchStatus::Pending => {}
        MatchStatus::Locked | MatchStatus::InProgress => {
            return Err(BracketError::LockConflict {
                match_id: match_id.clone(),
                holder: m.locked_by.clone().unwrap_or_default(),
            });
        }
        MatchStatus::Completed => return Err(BracketError::AlreadyCompleted(match_id.clone())),
        MatchStatus::Skipped => {
            return Err(BracketError::InvalidTransition {
                match_id: match_id.clone(),
                from: MatchStatus::Skipped,
                to: MatchStatus::Locked,
            });
        }
    }

    if !m.is_playable() {
        return Err(BracketError::MatchNotReady(match_id.clone()));
    }

    for entrant in m.entrants() {
        if let Some(active) = bracket
            .matches()
            .find(|other| other.id != m.id && other.is_active() && other.has_competitor(&entrant.id))
        {
            return Err(BracketError::CompetitorBusy {
                competitor: entrant.id.clone(),
                active_match: active.id.clone(),
            });
        }
    }

    let m = find_mut(bracket, match_id)?;
    m.status = MatchStatus::Locked;
    m.locked_by = Some(holder.to_string());
    m.locked_at = Some(Utc::now());
    log::debug!("Match {} in {} locked by {}", m.id, m.category, holder);

    Ok(vec![StoreWrite::ReplaceMatch(m.clone())])
}

/// Mark live scoring as started: `locked -> in_progress`
pub fn start(
    bracket: &mut Bracket,
    match_id: &MatchId,
    holder: &str,
) -> BracketResult<Vec<StoreWrite>> {
    let m = find_mut(bracket, match_id)?;
    if m.status != MatchStatus::Locked {
        return Err(BracketError::InvalidTransition {
            match_id: match_id.clone(),
            from: m.status,
            to: MatchStatus::InProgress,
        });
    }
    check_holder(m, holder)?;

    m.status = MatchStatus::InProgress;
    Ok(vec![StoreWrite::ReplaceMatch(m.clone())])
}

/// Abandon a match before completion: back to `pending`, holder cleared
pub fn unlock(
    bracket: &mut Bracket,
    match_id: &MatchId,
    holder: &str,
) -> BracketResult<Vec<StoreWrite>> {
    let m = find_mut(bracket, match_id)?;
    if !m.is_active() {
        return Err(BracketError::InvalidTransition {
            match_id: match_id.clone(),
            from: m.status,
            to: MatchStatus::Pending,
        });
    }
    check_holder(m, holder)?;

    m.status = MatchStatus::Pending;
    m.clear_lock();
    log::info!("Match {} in {} released by {}", m.id, m.category, holder);

    Ok(vec![StoreWrite::ReplaceMatch(m.clone())])
}

/// Declare the winner of a running match: `in_progress -> completed`
///
/// Records winner and loser, advances the winner, releases the lock and,
/// when the match was a semifinal, creates the repechage if both finalists
/// are now known. A failed repechage is reported in the outcome and never
/// fails the declaration.
///
/// # Errors
///
/// * `AlreadyCompleted` if a winner was already declared
/// * `InvalidTransition` unless the match is in progress
/// * `NotLockHolder` if `holder` does not hold the lock
/// * `WinnerNotInMatch` if `winner` is not one of the two competitors
/// * `SlotConflict` / `BrokenLink` / `UnroutableWinner` if the winner cannot
///   be placed; the match is then left in progress, untouched
pub fn declare_winner(
    bracket: &mut Bracket,
    match_id: &MatchId,
    winner: &str,
    holder: &str,
) -> BracketResult<Progression> {
    let m = find_mut(bracket, match_id)?;
    match m.status {
        MatchStatus::InProgress => {}
        MatchStatus::Completed => return Err(BracketError::AlreadyCompleted(match_id.clone())),
        from => {
            return Err(BracketError::InvalidTransition {
                match_id: match_id.clone(),
                from,
                to: MatchStatus::Completed,
            });
        }
    }
    check_holder(m, holder)?;
    if !m.has_competitor(winner) {
        return Err(BracketError::WinnerNotInMatch {
            match_id: match_id.clone(),
            competitor: winner.to_string(),
        });
    }

    let before = m.clone();
    finish(m, winner);
    let completed = m.clone();

    let advanced_to = advance_or_restore(bracket, before)?;
    log::info!(
        "Match {} in {}: {} beat {}",
        completed.id,
        completed.category,
        winner,
        completed.loser.as_deref().unwrap_or("BYE")
    );

    let mut writes = vec![StoreWrite::ReplaceMatch(completed.clone())];
    if let Some(advancement) = &advanced_to {
        writes.push(advancement.clone().into());
    }

    let feeds_final = bracket
        .final_match()
        .is_some_and(|f| completed.next_match_id.as_ref() == Some(&f.id));
    let repechage = feeds_final.then(|| {
        let outcome = repechage::ensure_repechage(bracket);
        if let RepechageOutcome::Created(set) = &outcome {
            writes.push(StoreWrite::CreateRepechage(set.clone()));
        }
        outcome
    });

    Ok(Progression {
        completed,
        advanced_to,
        repechage,
        writes,
    })
}

/// Complete a pairing of one competitor against a BYE and advance the winner
///
/// Already completed matches are left alone.
pub fn complete_bye(bracket: &mut Bracket, match_id: &MatchId) -> BracketResult<Vec<StoreWrite>> {
    let m = find_mut(bracket, match_id)?;
    if m.is_completed() {
        return Ok(Vec::new());
    }
    if !m.is_bye() {
        return Err(BracketError::InvalidTransition {
            match_id: match_id.clone(),
            from: m.status,
            to: MatchStatus::Completed,
        });
    }

    let Some(winner) = m.entrants().next().map(|e| e.id.clone()) else {
        return Err(BracketError::MatchNotReady(match_id.clone()));
    };
    let before = m.clone();
    finish(m, &winner);
    let completed = m.clone();

    let advanced_to = advance_or_restore(bracket, before)?;
    log::debug!(
        "Match {} in {}: {} advances on a BYE",
        completed.id,
        completed.category,
        winner
    );

    let mut writes = vec![StoreWrite::ReplaceMatch(completed)];
    writes.extend(advanced_to.map(StoreWrite::from));
    Ok(writes)
}

/// Advance the winner of a just-finished match, putting `before` back if the
/// winner cannot be placed
fn advance_or_restore(bracket: &mut Bracket, before: Match) -> BracketResult<Option<Advancement>> {
    match advance_winner(bracket, &before.id) {
        Ok(advanced) => Ok(advanced),
        Err(err) => {
            log::error!("Cannot advance winner of {}: {}", before.id, err);
            if let Some(m) = bracket.get_mut(&before.id) {
                *m = before;
            }
            Err(err)
        }
    }
}

/// Write the winner of `match_id` into its next match
///
/// Uses the recorded `winner_to` slot. Matches without one fall back to the
/// order in which feeders of the next match appear (first feeder slot A,
/// second slot B). Returns `None` when there is nothing to advance or the
/// winner is already in place.
pub fn advance_winner(
    bracket: &mut Bracket,
    match_id: &MatchId,
) -> BracketResult<Option<Advancement>> {
    let m = bracket
        .get(match_id)
        .ok_or_else(|| BracketError::MatchNotFound(match_id.clone()))?;
    let (Some(entrant), Some(next)) = (m.winner_entrant().cloned(), m.next_match_id.clone()) else {
        return Ok(None);
    };
    let winner_to = m.winner_to;

    let side = match winner_to {
        Some(side) => side,
        None => fallback_side(bracket, match_id, &next)?,
    };

    let target = bracket.get_mut(&next).ok_or_else(|| BracketError::BrokenLink {
        match_id: match_id.clone(),
        next: next.clone(),
    })?;

    match target.slot(side) {
        Slot::Entrant(existing) if existing.id == entrant.id => return Ok(None),
        Slot::Entrant(existing) => {
            return Err(BracketError::SlotConflict {
                match_id: next.clone(),
                side,
                existing: existing.id.clone(),
                incoming: entrant.id.clone(),
            });
        }
        _ => {}
    }

    *target.slot_mut(side) = Slot::Entrant(entrant.clone());
    log::debug!(
        "Advanced {} from {} to slot {} of {}",
        entrant.id,
        match_id,
        side,
        next
    );

    Ok(Some(Advancement {
        match_id: next,
        side,
        entrant,
    }))
}

/// Recovery routing for matches stored without `winner_to`
fn fallback_side(bracket: &Bracket, match_id: &MatchId, next: &MatchId) -> BracketResult<SlotSide> {
    let position = bracket
        .feeders_of(next)
        .iter()
        .position(|m| &m.id == match_id);

    let side = match position {
        Some(0) => SlotSide::A,
        Some(1) => SlotSide::B,
        _ => {
            return Err(BracketError::UnroutableWinner {
                match_id: match_id.clone(),
                next: next.clone(),
            });
        }
    };

    log::warn!(
        "Match {} has no winner_to, routing its winner to slot {} of {} by feeder order",
        match_id,
        side,
        next
    );
    Ok(side)
}

/// Repair a bracket left half-written by an interrupted actor
///
/// Completes pending BYE pairings, re-advances winners of completed matches
/// whose next slot is still open, and creates the repechage if both
/// finalists are known but no repechage exists yet.
pub fn reconcile(bracket: &mut Bracket) -> BracketResult<Reconciliation> {
    let mut report = Reconciliation::default();

    let byes: Vec<MatchId> = bracket
        .matches()
        .filter(|m| m.status == MatchStatus::Pending && m.is_bye())
        .map(|m| m.id.clone())
        .collect();
    for id in byes {
        report.writes.extend(complete_bye(bracket, &id)?);
        report.byes_resolved.push(id);
    }

    let completed: Vec<MatchId> = bracket
        .matches()
        .filter(|m| m.is_completed() && m.next_match_id.is_some())
        .map(|m| m.id.clone())
        .collect();
    for id in completed {
        if let Some(advancement) = advance_winner(bracket, &id)? {
            log::info!(
                "Repaired advancement of {} from {} into {}",
                advancement.entrant.id,
                id,
                advancement.match_id
            );
            report.writes.push(advancement.into());
            report.repaired.push(id);
        }
    }

    let finalists_known = bracket.final_match().is_some_and(Match::is_playable);
    if bracket.repechage_enabled && finalists_known && !bracket.has_repechage() {
        let outcome = repechage::ensure_repechage(bracket);
        if let RepechageOutcome::Created(set) = &outcome {
            report.writes.push(StoreWrite::CreateRepechage(set.clone()));
        }
        report.repechage = Some(outcome);
    }

    if !report.is_clean() {
        log::info!(
            "Reconciled {}: {} advancements repaired, {} BYEs resolved",
            bracket.category,
            report.repaired.len(),
            report.byes_resolved.len()
        );
    }

    Ok(report)
}
