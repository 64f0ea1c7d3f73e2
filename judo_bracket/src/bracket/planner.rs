//! Tournament structure planning and the draw.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use super::builder::{self, round_infos};
use super::errors::{BracketError, BracketResult};
use super::models::{Bracket, Competitor, RoundInfo};
use super::repechage::repechage_match_count;
use super::seeding::{self, SeedPlacement};
use crate::config::{EngineConfig, MAX_SUPPORTED_PLAYERS};

/// Shape of a category before the draw
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TournamentStructure {
    pub player_count: usize,
    /// Smallest power of two holding every competitor
    pub bracket_size: usize,
    pub rounds: Vec<RoundInfo>,
    /// Main-bracket matches plus reserved repechage matches
    pub total_matches: usize,
    pub repechage_enabled: bool,
    pub repechage_matches: usize,
    pub byes: usize,
}

/// Plans bracket sizes and runs the draw for a category
#[derive(Debug, Clone, Default)]
pub struct TournamentStructurePlanner {
    config: EngineConfig,
}

impl TournamentStructurePlanner {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Plan the bracket for `player_count` competitors
    ///
    /// # Errors
    ///
    /// Returns `InvalidPlayerCount` for zero competitors or more than the
    /// configured maximum.
    pub fn plan(&self, player_count: usize) -> BracketResult<TournamentStructure> {
        let max = self.config.max_players.min(MAX_SUPPORTED_PLAYERS);
        if player_count == 0 || player_count > max {
            return Err(BracketError::InvalidPlayerCount {
                count: player_count,
                max,
            });
        }

        let bracket_size = player_count.next_power_of_two().max(2);
        let repechage_enabled = player_count >= self.config.repechage_threshold;
        let repechage_matches = if repechage_enabled {
            repechage_match_count(bracket_size)
        } else {
            0
        };

        Ok(TournamentStructure {
            player_count,
            bracket_size,
            rounds: round_infos(bracket_size),
            total_matches: bracket_size - 1 + repechage_matches,
            repechage_enabled,
            repechage_matches,
            byes: bracket_size - player_count,
        })
    }

    /// Run the draw for a category: seed, place and build the bracket
    ///
    /// # Arguments
    ///
    /// * `category` - Category key written into every match
    /// * `competitors` - Registered competitors, seeds taken from `Competitor::seed`
    /// * `rng` - Source of randomness for unseeded placement
    ///
    /// # Returns
    ///
    /// The bracket with first-round BYEs already resolved. Nothing is persisted.
    pub fn draw<R: Rng + ?Sized>(
        &self,
        category: &str,
        competitors: &[Competitor],
        rng: &mut R,
    ) -> BracketResult<Bracket> {
        let mut seen = HashSet::new();
        for competitor in competitors {
            if !seen.insert(competitor.id.as_str()) {
                return Err(BracketError::DuplicateCompetitor(competitor.id.clone()));
            }
        }

        let structure = self.plan(competitors.len())?;
        let order = seeding::seed_order(competitors)?;
        let slots = SeedPlacement::new(self.config.max_bye_swaps).place(
            competitors,
            &order,
            structure.bracket_size,
            rng,
        )?;
        let bracket = builder::build(&slots, category, structure.repechage_enabled)?;

        log::info!(
            "Drew {} competitors ({} seeded) into a {}-slot bracket for {}",
            structure.player_count,
            order.len(),
            structure.bracket_size,
            category
        );

        Ok(bracket)
    }
}
