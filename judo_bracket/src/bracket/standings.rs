//! Final placings of a category.

use serde::{Deserialize, Serialize};

use super::models::{Bracket, Entrant, MatchType};

/// Medal and fifth-place positions
///
/// Judo awards two bronze medals. With a repechage they go to the winners of
/// the bronze matches and the losers of those matches share fifth place.
/// Without one, both semifinal losers take bronze.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Standings {
    pub gold: Option<Entrant>,
    pub silver: Option<Entrant>,
    pub bronze: Vec<Entrant>,
    pub fifth: Vec<Entrant>,
    /// Every placing match has been decided
    pub complete: bool,
}

/// Compute the current standings of `bracket`
///
/// Placings are filled in as the deciding matches complete, so this can be
/// called at any point during the event.
pub fn standings(bracket: &Bracket) -> Standings {
    let mut result = Standings::default();

    let final_done = match bracket.final_match() {
        Some(f) if f.is_completed() => {
            result.gold = f.winner_entrant().cloned();
            result.silver = f.loser_entrant().cloned();
            true
        }
        _ => false,
    };

    if bracket.repechage_enabled {
        let bronze_matches: Vec<_> = bracket
            .repechage
            .iter()
            .filter(|m| m.match_type == MatchType::Bronze)
            .collect();

        for m in &bronze_matches {
            if m.is_completed() {
                result.bronze.extend(m.winner_entrant().cloned());
                result.fifth.extend(m.loser_entrant().cloned());
            }
        }

        result.complete = final_done
            && !bronze_matches.is_empty()
            && bronze_matches.iter().all(|m| m.is_completed());
    } else {
        let semis = bracket.semifinals();
        for m in &semis {
            if m.is_completed() {
                result.bronze.extend(m.loser_entrant().cloned());
            }
        }

        result.complete = final_done && semis.iter().all(|m| m.is_completed());
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bracket::builder;
    use crate::bracket::models::{Competitor, MatchId};
    use crate::bracket::progression::{declare_winner, lock, start};

    fn build(n: usize, repechage: bool) -> Bracket {
        let slots: Vec<Option<Competitor>> = (0..n)
            .map(|i| Some(Competitor::new(format!("c{i}"), format!("P{i}"), "Club")))
            .collect();
        builder::build(&slots, "w-63", repechage).unwrap()
    }

    fn play(bracket: &mut Bracket, id: MatchId, winner: &str) {
        lock(bracket, &id, "mat-3").unwrap();
        start(bracket, &id, "mat-3").unwrap();
        declare_winner(bracket, &id, winner, "mat-3").unwrap();
    }

    fn ids(entrants: &[Entrant]) -> Vec<&str> {
        entrants.iter().map(|e| e.id.as_str()).collect()
    }

    #[test]
    fn test_empty_before_final() {
        let b = build(4, false);
        let s = standings(&b);
        assert!(s.gold.is_none());
        assert!(s.bronze.is_empty());
        assert!(!s.complete);
    }

    #[test]
    fn test_semifinal_losers_share_bronze_without_repechage() {
        let mut b = build(4, false);
        play(&mut b, MatchId::main(1, 0), "c0");
        play(&mut b, MatchId::main(1, 1), "c3");
        play(&mut b, MatchId::main(2, 0), "c3");

        let s = standings(&b);
        assert_eq!(s.gold.as_ref().map(|e| e.id.as_str()), Some("c3"));
        assert_eq!(s.silver.as_ref().map(|e| e.id.as_str()), Some("c0"));
        assert_eq!(ids(&s.bronze), vec!["c1", "c2"]);
        assert!(s.fifth.is_empty());
        assert!(s.complete);
    }

    #[test]
    fn test_bronze_matches_decide_medals_with_repechage() {
        let mut b = build(8, true);
        for (i, winner) in ["c0", "c2", "c4", "c6"].into_iter().enumerate() {
            play(&mut b, MatchId::main(1, i), winner);
        }
        play(&mut b, MatchId::main(2, 0), "c0");
        play(&mut b, MatchId::main(2, 1), "c6");
        play(&mut b, MatchId::main(3, 0), "c0");

        let partial = standings(&b);
        assert_eq!(partial.gold.as_ref().map(|e| e.id.as_str()), Some("c0"));
        assert!(partial.bronze.is_empty());
        assert!(!partial.complete);

        play(&mut b, MatchId::new("REP-A"), "c1");
        play(&mut b, MatchId::new("REP-B"), "c7");
        play(&mut b, MatchId::bronze(1), "c1");
        play(&mut b, MatchId::bronze(2), "c2");

        let s = standings(&b);
        assert_eq!(ids(&s.bronze), vec!["c1", "c2"]);
        assert_eq!(ids(&s.fifth), vec!["c4", "c7"]);
        assert!(s.complete);
    }
}
