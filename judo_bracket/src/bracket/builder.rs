//! Expands placed slots into a single-elimination match tree.

use chrono::Utc;
use uuid::Uuid;

use super::errors::{BracketError, BracketResult};
use super::models::{
    Bracket, Competitor, Entrant, Half, Match, MatchId, MatchType, Pool, Round, RoundInfo, Slot,
    SlotSide,
};
use super::progression;

/// Display name of a round given how many competitors are still in it
///
/// Unnamed rounds are numbered from the end, the final being round 1, so a
/// 64-slot first round is "Round 6".
pub fn round_name(remaining: usize) -> String {
    match remaining {
        2 => "Final".to_string(),
        4 => "Semifinals".to_string(),
        8 => "Quarterfinals".to_string(),
        16 => "Round of 16".to_string(),
        32 => "Round of 32".to_string(),
        _ => format!("Round {}", remaining.trailing_zeros()),
    }
}

/// Round descriptors for a bracket of `bracket_size` slots
pub fn round_infos(bracket_size: usize) -> Vec<RoundInfo> {
    let mut rounds = Vec::new();
    let mut remaining = bracket_size;
    let mut number = 1;

    while remaining >= 2 {
        rounds.push(RoundInfo {
            number,
            name: round_name(remaining),
            match_count: remaining / 2,
        });
        remaining /= 2;
        number += 1;
    }

    rounds
}

fn to_slot(slot: Option<&Competitor>) -> Slot {
    match slot {
        Some(competitor) => Slot::Entrant(Entrant::from(competitor)),
        None => Slot::Bye,
    }
}

/// Build the main bracket for one category
///
/// First-round pairings are (0, 1), (2, 3), ...; match `i` of every later
/// round is fed by matches `2i` (slot A) and `2i + 1` (slot B) of the round
/// before. Pairings against a BYE are completed immediately and their winner
/// is advanced.
///
/// # Errors
///
/// * `InvalidBracketSize` if `slots` is not a power of two of at least 2
/// * `EmptyPairing` if a first-round pairing has no competitor at all
pub fn build(
    slots: &[Option<Competitor>],
    category: &str,
    repechage_enabled: bool,
) -> BracketResult<Bracket> {
    let size = slots.len();
    let competitor_count = slots.iter().flatten().count();
    if size < 2 || !size.is_power_of_two() {
        return Err(BracketError::InvalidBracketSize {
            size,
            competitors: competitor_count,
        });
    }

    let rounds = round_infos(size);
    let round_count = rounds.len() as u32;
    let mut main = Vec::with_capacity(size - 1);

    for info in &rounds {
        let r = info.number;
        let span = 1usize << r;

        for i in 0..info.match_count {
            let match_type = if r == round_count {
                MatchType::Final
            } else {
                MatchType::Main
            };
            let mut m = Match::new(MatchId::main(r, i), category, Round::Main(r), i, match_type);

            let first_slot = i * span;
            if span * 4 <= size {
                m.pool = Some(Pool::from_slot(first_slot, size));
            }
            if r < round_count {
                m.half = Some(Half::from_slot(first_slot, size));
                m.next_match_id = Some(MatchId::main(r + 1, i / 2));
                m.winner_to = Some(if i % 2 == 0 { SlotSide::A } else { SlotSide::B });
            }

            if r == 1 {
                let (a, b) = (slots[2 * i].as_ref(), slots[2 * i + 1].as_ref());
                if a.is_none() && b.is_none() {
                    return Err(BracketError::EmptyPairing(m.id));
                }
                m.slot_a = to_slot(a);
                m.slot_b = to_slot(b);
            }

            main.push(m);
        }
    }

    let mut bracket = Bracket {
        category: category.to_string(),
        draw_id: Uuid::new_v4(),
        created_at: Utc::now(),
        competitor_count,
        bracket_size: size,
        repechage_enabled,
        rounds,
        main,
        repechage: Vec::new(),
    };

    let byes: Vec<MatchId> = bracket
        .main
        .iter()
        .filter(|m| m.round == Round::Main(1) && m.is_bye())
        .map(|m| m.id.clone())
        .collect();
    for id in &byes {
        progression::complete_bye(&mut bracket, id)?;
    }

    log::debug!(
        "Built {}-slot bracket for {}: {} matches, {} resolved by BYE",
        size,
        category,
        bracket.main.len(),
        byes.len()
    );

    Ok(bracket)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bracket::models::MatchStatus;
    use std::collections::HashMap;

    fn full_slots(n: usize, size: usize) -> Vec<Option<Competitor>> {
        (0..size)
            .map(|i| (i < n).then(|| Competitor::new(format!("c{i}"), format!("P{i}"), "Club")))
            .collect()
    }

    #[test]
    fn test_round_names() {
        let names: Vec<String> = round_infos(64).into_iter().map(|r| r.name).collect();
        assert_eq!(
            names,
            vec![
                "Round 6",
                "Round of 32",
                "Round of 16",
                "Quarterfinals",
                "Semifinals",
                "Final"
            ]
        );
        assert_eq!(round_infos(2).len(), 1);
        assert_eq!(round_infos(2)[0].name, "Final");
        assert_eq!(round_name(128), "Round 7");
    }

    #[test]
    fn test_build_links_rounds() {
        let bracket = build(&full_slots(8, 8), "m-81", true).unwrap();

        assert_eq!(bracket.main.len(), 7);
        let final_match = bracket.final_match().unwrap();
        assert_eq!(final_match.id, MatchId::main(3, 0));
        assert!(final_match.next_match_id.is_none());

        let r1m2 = bracket.get(&MatchId::main(1, 1)).unwrap();
        assert_eq!(r1m2.next_match_id, Some(MatchId::main(2, 0)));
        assert_eq!(r1m2.winner_to, Some(SlotSide::B));
        assert_eq!(r1m2.pool, Some(Pool::B));
        assert_eq!(r1m2.half, Some(Half::Upper));

        let r2m2 = bracket.get(&MatchId::main(2, 1)).unwrap();
        assert_eq!(r2m2.winner_to, Some(SlotSide::B));
        assert_eq!(r2m2.half, Some(Half::Lower));
        assert_eq!(r2m2.pool, None);
        assert_eq!(bracket.semifinals().len(), 2);
    }

    #[test]
    fn test_build_forms_single_tree() {
        let bracket = build(&full_slots(32, 32), "w-57", true).unwrap();
        let mut incoming: HashMap<&MatchId, usize> = HashMap::new();

        for m in &bracket.main {
            if let Some(next) = &m.next_match_id {
                assert!(bracket.get(next).is_some());
                *incoming.entry(next).or_default() += 1;
            }
        }

        assert_eq!(bracket.main.len(), 31);
        assert_eq!(
            bracket
                .main
                .iter()
                .filter(|m| m.next_match_id.is_none())
                .count(),
            1
        );
        assert!(incoming.values().all(|&count| count == 2));
    }

    #[test]
    fn test_build_resolves_byes() {
        let mut slots = full_slots(6, 8);
        // c0 and c2 draw BYEs, the other two pairings are full
        slots.swap(1, 6);
        slots.swap(3, 7);
        let bracket = build(&slots, "m-90", true).unwrap();

        let r1m1 = bracket.get(&MatchId::main(1, 0)).unwrap();
        assert_eq!(r1m1.status, MatchStatus::Completed);
        assert_eq!(r1m1.winner.as_deref(), Some("c0"));
        assert_eq!(r1m1.loser, None);

        let r2m1 = bracket.get(&MatchId::main(2, 0)).unwrap();
        assert!(r2m1.slot_a.holds("c0"));
        assert!(r2m1.slot_b.holds("c2"));
        assert!(r2m1.is_playable());

        let r1m3 = bracket.get(&MatchId::main(1, 2)).unwrap();
        assert_eq!(r1m3.status, MatchStatus::Pending);
    }

    #[test]
    fn test_build_single_competitor_wins_final_by_bye() {
        let bracket = build(&full_slots(1, 2), "u-60", false).unwrap();
        let final_match = bracket.final_match().unwrap();
        assert_eq!(final_match.status, MatchStatus::Completed);
        assert_eq!(final_match.winner.as_deref(), Some("c0"));
    }

    #[test]
    fn test_build_rejects_empty_pairing() {
        let slots = full_slots(2, 8);
        let result = build(&slots, "m-60", false);
        assert!(matches!(result, Err(BracketError::EmptyPairing(id)) if id == MatchId::main(1, 1)));
    }

    #[test]
    fn test_build_rejects_bad_size() {
        assert!(matches!(
            build(&full_slots(3, 3), "m-60", false),
            Err(BracketError::InvalidBracketSize { size: 3, .. })
        ));
    }
}
