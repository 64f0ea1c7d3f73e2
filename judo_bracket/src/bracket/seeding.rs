//! Seed placement under IJF positional rules.
//!
//! Seeds go to fixed first-round slots that keep the top seeds apart for as
//! long as possible: seed 1 heads pool A, seed 2 pool C, seed 3 pool D and
//! seed 4 pool B. Seeds 5 to 8 head the remaining eighths, each in the
//! quarter of the seed it would meet in the quarterfinal (8 with 1, 5 with 4,
//! 7 with 2, 6 with 3). Each table doubles the one below it: the first half
//! keeps the smaller table's order on even slots, and seed `k` of a table of
//! `n` sits opposite seed `n + 1 - k`. Everyone else is drawn at random.

use rand::{Rng, seq::SliceRandom};
use std::collections::HashSet;

use super::errors::{BracketError, BracketResult};
use super::models::{Competitor, CompetitorId};
use crate::config::MIN_BYE_SWAPS;

/// Slot of seed `i + 1` at index `i`, per bracket size
const SEED_POSITIONS_2: [usize; 2] = [0, 1];
const SEED_POSITIONS_4: [usize; 4] = [0, 2, 3, 1];
const SEED_POSITIONS_8: [usize; 8] = [0, 4, 6, 2, 3, 7, 5, 1];
const SEED_POSITIONS_16: [usize; 16] = [0, 8, 12, 4, 6, 14, 10, 2, 3, 11, 15, 7, 5, 13, 9, 1];
#[rustfmt::skip]
const SEED_POSITIONS_32: [usize; 32] = [
    0, 16, 24, 8, 12, 28, 20, 4, 6, 22, 30, 14, 10, 26, 18, 2,
    3, 19, 27, 11, 15, 31, 23, 7, 5, 21, 29, 13, 9, 25, 17, 1,
];
#[rustfmt::skip]
const SEED_POSITIONS_64: [usize; 64] = [
    0, 32, 48, 16, 24, 56, 40, 8, 12, 44, 60, 28, 20, 52, 36, 4,
    6, 38, 54, 22, 30, 62, 46, 14, 10, 42, 58, 26, 18, 50, 34, 2,
    3, 35, 51, 19, 27, 59, 43, 11, 15, 47, 63, 31, 23, 55, 39, 7,
    5, 37, 53, 21, 29, 61, 45, 13, 9, 41, 57, 25, 17, 49, 33, 1,
];

/// Seed positions for a bracket size
///
/// Sizes without a table of their own use the 8-slot table.
pub fn seed_positions(bracket_size: usize) -> &'static [usize] {
    match bracket_size {
        2 => &SEED_POSITIONS_2,
        4 => &SEED_POSITIONS_4,
        8 => &SEED_POSITIONS_8,
        16 => &SEED_POSITIONS_16,
        32 => &SEED_POSITIONS_32,
        64 => &SEED_POSITIONS_64,
        other => {
            log::warn!("No seed table for a bracket of {}, using the 8-slot table", other);
            &SEED_POSITIONS_8
        }
    }
}

/// Seed order derived from competitors' seed ranks, best seed first
///
/// Ranks must run from 1 without gaps; ranks 1 and 3 alone are rejected.
pub fn seed_order(competitors: &[Competitor]) -> BracketResult<Vec<CompetitorId>> {
    let mut seeded: Vec<(u32, &Competitor)> = Vec::new();

    for competitor in competitors {
        let Some(rank) = competitor.seed else {
            continue;
        };
        if rank == 0 {
            return Err(BracketError::InvalidSeedRank {
                rank,
                competitor: competitor.id.clone(),
            });
        }
        if let Some((_, other)) = seeded.iter().find(|(r, _)| *r == rank) {
            return Err(BracketError::DuplicateSeed {
                rank,
                first: other.id.clone(),
                second: competitor.id.clone(),
            });
        }
        seeded.push((rank, competitor));
    }

    seeded.sort_by_key(|(rank, _)| *rank);
    if let Some(expected) = (1u32..)
        .zip(&seeded)
        .find_map(|(expected, (rank, _))| (*rank != expected).then_some(expected))
    {
        return Err(BracketError::NonContiguousSeeds {
            count: seeded.len(),
            missing: expected,
        });
    }
    Ok(seeded.into_iter().map(|(_, c)| c.id.clone()).collect())
}

/// Places competitors into first-round slots
#[derive(Debug, Clone)]
pub struct SeedPlacement {
    max_swap_attempts: usize,
}

impl SeedPlacement {
    /// Create a placement with a bound on double-BYE repairs (at least 100)
    pub fn new(max_swap_attempts: usize) -> Self {
        Self {
            max_swap_attempts: max_swap_attempts.max(MIN_BYE_SWAPS),
        }
    }

    /// Place competitors into `bracket_size` slots
    ///
    /// # Arguments
    ///
    /// * `competitors` - Everyone in the category
    /// * `seed_order` - Seeded competitor IDs, seed 1 first
    /// * `bracket_size` - Power of two, at least the number of competitors
    /// * `rng` - Source for the unseeded draw
    ///
    /// # Returns
    ///
    /// * `BracketResult<Vec<Option<Competitor>>>` - One entry per slot, `None` for a BYE
    pub fn place<R: Rng + ?Sized>(
        &self,
        competitors: &[Competitor],
        seed_order: &[CompetitorId],
        bracket_size: usize,
        rng: &mut R,
    ) -> BracketResult<Vec<Option<Competitor>>> {
        if bracket_size < 2
            || !bracket_size.is_power_of_two()
            || competitors.len() > bracket_size
        {
            return Err(BracketError::InvalidBracketSize {
                size: bracket_size,
                competitors: competitors.len(),
            });
        }

        let positions = seed_positions(bracket_size);
        if seed_order.len() > positions.len() {
            return Err(BracketError::TooManySeeds {
                seeds: seed_order.len(),
                bracket_size,
                max: positions.len(),
            });
        }

        let mut slots: Vec<Option<Competitor>> = vec![None; bracket_size];
        let mut seeded: HashSet<&str> = HashSet::with_capacity(seed_order.len());

        for (&position, id) in positions.iter().zip(seed_order) {
            let competitor = competitors
                .iter()
                .find(|c| &c.id == id)
                .ok_or_else(|| BracketError::UnknownSeed(id.clone()))?;
            if !seeded.insert(id.as_str()) {
                return Err(BracketError::DuplicateCompetitor(id.clone()));
            }
            slots[position] = Some(competitor.clone());
        }

        let unseeded: Vec<&Competitor> = competitors
            .iter()
            .filter(|c| !seeded.contains(c.id.as_str()))
            .collect();

        // Shuffling the open slots rather than the competitors spreads the
        // BYEs across the bracket.
        let mut open: Vec<usize> = (0..bracket_size).filter(|&i| slots[i].is_none()).collect();
        open.shuffle(rng);

        for (&slot, competitor) in open.iter().zip(unseeded) {
            slots[slot] = Some(competitor.clone());
        }

        self.separate_byes(&mut slots, &seeded)?;
        Ok(slots)
    }

    /// Break up first-round pairings that drew two BYEs
    ///
    /// Each pass moves an unseeded competitor out of the lowest fully occupied
    /// pairing into the first double-BYE pairing.
    fn separate_byes(
        &self,
        slots: &mut [Option<Competitor>],
        seeded: &HashSet<&str>,
    ) -> BracketResult<()> {
        for _ in 0..self.max_swap_attempts {
            let Some(pairing) = (0..slots.len() / 2)
                .find(|&p| slots[2 * p].is_none() && slots[2 * p + 1].is_none())
            else {
                return Ok(());
            };

            let donor = (0..slots.len()).find(|&i| {
                let partner = i ^ 1;
                i / 2 != pairing
                    && slots[partner].is_some()
                    && slots[i]
                        .as_ref()
                        .is_some_and(|c| !seeded.contains(c.id.as_str()))
            });

            match donor {
                Some(index) => {
                    log::debug!(
                        "Moving slot {} into pairing {} to separate BYEs",
                        index,
                        pairing
                    );
                    slots.swap(2 * pairing, index);
                }
                None => break,
            }
        }

        match (0..slots.len() / 2).find(|&p| slots[2 * p].is_none() && slots[2 * p + 1].is_none()) {
            Some(pairing) => Err(BracketError::UnresolvedDoubleBye {
                pairing,
                attempts: self.max_swap_attempts,
            }),
            None => Ok(()),
        }
    }
}

impl Default for SeedPlacement {
    fn default() -> Self {
        Self::new(MIN_BYE_SWAPS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{SeedableRng, rngs::StdRng};

    fn competitors(n: usize) -> Vec<Competitor> {
        (0..n)
            .map(|i| Competitor::new(format!("c{i}"), format!("Player {i}"), "Dojo"))
            .collect()
    }

    fn ids(slots: &[Option<Competitor>]) -> Vec<Option<&str>> {
        slots.iter().map(|s| s.as_ref().map(|c| c.id.as_str())).collect()
    }

    #[test]
    fn test_seed_tables_separate_top_seeds() {
        for size in [4, 8, 16, 32, 64] {
            let table = seed_positions(size);
            assert_eq!(table[0], 0, "seed 1 heads pool A for size {size}");
            assert_ne!(table[0] / 2, table[1] / 2, "seeds 1 and 2 share a pairing");
            // seeds 1 and 2 in different halves
            assert_ne!(table[0] * 2 / size, table[1] * 2 / size);
            // seeds 1-4 in different quarters
            let quarters: HashSet<usize> = table[..4].iter().map(|p| p * 4 / size).collect();
            assert_eq!(quarters.len(), 4);
            assert!(table.iter().all(|&p| p < size));
        }
    }

    #[test]
    fn test_seed_tables_are_full_and_nested() {
        for size in [2, 4, 8, 16, 32, 64] {
            let table = seed_positions(size);
            assert_eq!(table.len(), size);
            let distinct: HashSet<usize> = table.iter().copied().collect();
            assert_eq!(distinct.len(), size);

            for (k, &position) in table.iter().enumerate() {
                // seed k + 1 is paired with seed size - k
                assert_eq!(position ^ 1, table[size - 1 - k]);
            }
            if size > 2 {
                let half = seed_positions(size / 2);
                let doubled: Vec<usize> = half.iter().map(|p| p * 2).collect();
                assert_eq!(&table[..size / 2], doubled.as_slice());
            }
        }
    }

    #[test]
    fn test_place_accepts_nine_seeds_in_thirty_two() {
        let list = competitors(32);
        let order: Vec<CompetitorId> = (0..9).map(|i| format!("c{i}")).collect();
        let mut rng = StdRng::seed_from_u64(9);

        let slots = SeedPlacement::default()
            .place(&list, &order, 32, &mut rng)
            .unwrap();

        for (i, &position) in SEED_POSITIONS_32[..9].iter().enumerate() {
            assert_eq!(slots[position].as_ref().map(|c| c.id.clone()), Some(format!("c{i}")));
        }
        let placed = slots.iter().flatten().count();
        assert_eq!(placed, 32);
    }

    #[test]
    fn test_seed_order_sorts_by_rank() {
        let mut list = competitors(4);
        list[3].seed = Some(1);
        list[0].seed = Some(3);
        list[2].seed = Some(2);

        let order = seed_order(&list).unwrap();
        assert_eq!(order, vec!["c3".to_string(), "c2".to_string(), "c0".to_string()]);
    }

    #[test]
    fn test_seed_order_rejects_gaps() {
        let mut list = competitors(4);
        list[0].seed = Some(2);
        list[1].seed = Some(5);
        assert!(matches!(
            seed_order(&list),
            Err(BracketError::NonContiguousSeeds { count: 2, missing: 1 })
        ));

        let mut list = competitors(4);
        list[0].seed = Some(1);
        list[2].seed = Some(3);
        assert!(matches!(
            seed_order(&list),
            Err(BracketError::NonContiguousSeeds { count: 2, missing: 2 })
        ));
    }

    #[test]
    fn test_seed_order_rejects_duplicates_and_zero() {
        let mut list = competitors(3);
        list[0].seed = Some(1);
        list[1].seed = Some(1);
        assert!(matches!(
            seed_order(&list),
            Err(BracketError::DuplicateSeed { rank: 1, .. })
        ));

        let mut list = competitors(2);
        list[1].seed = Some(0);
        assert!(matches!(
            seed_order(&list),
            Err(BracketError::InvalidSeedRank { rank: 0, .. })
        ));
    }

    #[test]
    fn test_place_puts_seeds_on_table_positions() {
        let list = competitors(8);
        let order: Vec<CompetitorId> = (0..8).map(|i| format!("c{i}")).collect();
        let mut rng = StdRng::seed_from_u64(7);

        let slots = SeedPlacement::default()
            .place(&list, &order, 8, &mut rng)
            .unwrap();

        assert_eq!(
            ids(&slots),
            vec![
                Some("c0"),
                Some("c7"),
                Some("c3"),
                Some("c4"),
                Some("c1"),
                Some("c6"),
                Some("c2"),
                Some("c5"),
            ]
        );
    }

    #[test]
    fn test_place_fills_every_competitor_once() {
        let list = competitors(11);
        let mut rng = StdRng::seed_from_u64(42);

        let slots = SeedPlacement::default()
            .place(&list, &["c3".to_string()], 16, &mut rng)
            .unwrap();

        assert_eq!(slots.len(), 16);
        assert_eq!(slots[0].as_ref().map(|c| c.id.as_str()), Some("c3"));
        let placed: HashSet<&str> = slots.iter().flatten().map(|c| c.id.as_str()).collect();
        assert_eq!(placed.len(), 11);
    }

    #[test]
    fn test_place_never_leaves_double_byes() {
        let list = competitors(5);
        for seed in 0..200 {
            let mut rng = StdRng::seed_from_u64(seed);
            let slots = SeedPlacement::default()
                .place(&list, &[], 8, &mut rng)
                .unwrap();
            for pair in slots.chunks(2) {
                assert!(pair.iter().any(Option::is_some), "double BYE with rng seed {seed}");
            }
        }
    }

    #[test]
    fn test_place_rejects_bad_sizes() {
        let list = competitors(5);
        let mut rng = StdRng::seed_from_u64(1);
        let placement = SeedPlacement::default();

        assert!(matches!(
            placement.place(&list, &[], 4, &mut rng),
            Err(BracketError::InvalidBracketSize { size: 4, competitors: 5 })
        ));
        assert!(placement.place(&list, &[], 12, &mut rng).is_err());
    }

    #[test]
    fn test_place_rejects_unknown_and_excess_seeds() {
        let list = competitors(4);
        let mut rng = StdRng::seed_from_u64(1);
        let placement = SeedPlacement::default();

        assert!(matches!(
            placement.place(&list, &["ghost".to_string()], 4, &mut rng),
            Err(BracketError::UnknownSeed(_))
        ));

        let list = competitors(2);
        let order = vec!["c0".to_string(), "c1".to_string(), "c0".to_string()];
        assert!(matches!(
            placement.place(&list, &order, 2, &mut rng),
            Err(BracketError::TooManySeeds { max: 2, .. })
        ));
    }

    #[test]
    fn test_separate_byes_moves_unseeded_competitor() {
        let list = competitors(3);
        let mut slots = vec![
            Some(list[0].clone()),
            Some(list[1].clone()),
            Some(list[2].clone()),
            None,
            None,
            None,
            None,
            None,
        ];
        // Only c1 and c2 are unseeded, and the pairing at slots 0/1 is full.
        let seeded: HashSet<&str> = ["c0"].into_iter().collect();

        let result = SeedPlacement::default().separate_byes(&mut slots, &seeded);

        // Three competitors can cover at most three of the four pairings.
        assert!(matches!(
            result,
            Err(BracketError::UnresolvedDoubleBye { attempts: 100, .. })
        ));
        assert!(slots[0].is_some());
        assert!(slots[4].is_some());
    }
}
