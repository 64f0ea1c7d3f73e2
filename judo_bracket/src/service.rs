//! Store-backed bracket service shared by scoring stations.
//!
//! Each call loads the category from the [`DocumentStore`], runs the engine
//! operation on it and writes back only what changed. Locks are claimed with
//! compare-and-swap so two stations can never run the same match.

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::sync::Arc;
use tokio::sync::watch;

use crate::bracket::models::{
    Bracket, BracketIndex, Competitor, LockRecord, Match, MatchId,
};
use crate::bracket::planner::{TournamentStructure, TournamentStructurePlanner};
use crate::bracket::progression::{self, Progression, Reconciliation, StoreWrite};
use crate::bracket::repechage::{self, RepechageOutcome};
use crate::bracket::standings::{self, Standings};
use crate::bracket::{BracketError, BracketResult};
use crate::config::EngineConfig;
use crate::store::{DocumentStore, StorePaths};

/// Typed view of a match document subscription
pub struct MatchSubscription {
    rx: watch::Receiver<Option<Value>>,
}

impl MatchSubscription {
    /// The match as last seen, `None` if the document does not exist
    pub fn current(&mut self) -> BracketResult<Option<Match>> {
        decode(self.rx.borrow_and_update().clone())
    }

    /// Wait for the next change
    ///
    /// Returns `None` once the store has been dropped.
    pub async fn next(&mut self) -> Option<BracketResult<Option<Match>>> {
        self.rx.changed().await.ok()?;
        Some(self.current())
    }
}

fn decode<T: DeserializeOwned>(value: Option<Value>) -> BracketResult<Option<T>> {
    Ok(value.map(serde_json::from_value).transpose()?)
}

/// Bracket service
#[derive(Clone)]
pub struct BracketService {
    store: Arc<dyn DocumentStore>,
    planner: TournamentStructurePlanner,
    paths: StorePaths,
}

impl BracketService {
    /// Create a new bracket service
    pub fn new(store: Arc<dyn DocumentStore>, config: EngineConfig) -> Self {
        let paths = StorePaths::new(config.store_root.clone());
        Self {
            store,
            planner: TournamentStructurePlanner::new(config),
            paths,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        self.planner.config()
    }

    /// Plan a category without drawing it
    pub fn plan(&self, player_count: usize) -> BracketResult<TournamentStructure> {
        self.planner.plan(player_count)
    }

    /// Draw a category and publish its bracket
    ///
    /// Replaces any earlier draw of the same category, including its match
    /// documents and lock records.
    pub async fn create_draw(
        &self,
        category: &str,
        competitors: &[Competitor],
    ) -> BracketResult<Bracket> {
        let bracket = {
            let mut rng = rand::rng();
            self.planner.draw(category, competitors, &mut rng)?
        };

        let index_path = self.paths.bracket(category);
        if let Some(previous) = self.read::<BracketIndex>(&index_path).await? {
            log::info!(
                "Replacing draw {} of {} with {}",
                previous.draw_id,
                category,
                bracket.draw_id
            );
            for id in previous.main.iter().chain(&previous.repechage) {
                self.store
                    .set(&self.paths.match_doc(category, id), Value::Null)
                    .await?;
                self.store
                    .set(&self.paths.lock(category, id), Value::Null)
                    .await?;
            }
        }

        for m in &bracket.main {
            self.put_match(m).await?;
        }
        self.store
            .set(&index_path, serde_json::to_value(bracket.to_index())?)
            .await?;

        Ok(bracket)
    }

    /// Load the current bracket of a category
    pub async fn load_bracket(&self, category: &str) -> BracketResult<Bracket> {
        let index: BracketIndex = self
            .read(&self.paths.bracket(category))
            .await?
            .ok_or_else(|| BracketError::BracketNotFound(category.to_string()))?;

        let main = self.load_matches(category, &index.main).await?;
        let repechage = self.load_matches(category, &index.repechage).await?;
        Ok(Bracket::from_parts(index, main, repechage))
    }

    /// Claim a match for `holder`
    ///
    /// The engine checks run twice: once to reject early without touching
    /// the lock record, and again on a fresh load after the record is
    /// claimed, since the first snapshot may predate another station's whole
    /// lock, declare and release cycle.
    ///
    /// # Errors
    ///
    /// `LockConflict` if another station claimed the match first. The engine
    /// checks of [`progression::lock`] apply as well.
    pub async fn acquire_lock(
        &self,
        category: &str,
        match_id: &MatchId,
        holder: &str,
    ) -> BracketResult<Match> {
        let mut snapshot = self.load_bracket(category).await?;
        progression::lock(&mut snapshot, match_id, holder)?;

        let lock_path = self.paths.lock(category, match_id);
        let record = serde_json::to_value(LockRecord::new(holder))?;
        if !self
            .store
            .compare_and_swap(&lock_path, None, Some(record))
            .await?
        {
            let current = self
                .read::<LockRecord>(&lock_path)
                .await?
                .map(|r| r.holder)
                .unwrap_or_default();
            return Err(BracketError::LockConflict {
                match_id: match_id.clone(),
                holder: current,
            });
        }

        let checked = async {
            let mut bracket = self.load_bracket(category).await?;
            let writes = progression::lock(&mut bracket, match_id, holder)?;
            Ok::<_, BracketError>((bracket, writes))
        }
        .await;

        let (bracket, writes) = match checked {
            Ok(checked) => checked,
            Err(err) => {
                log::info!(
                    "Giving up lock on {} in {} claimed by {}: {}",
                    match_id,
                    category,
                    holder,
                    err
                );
                self.store.set(&lock_path, Value::Null).await?;
                return Err(err);
            }
        };

        self.apply(category, &writes).await?;
        updated(&bracket, match_id)
    }

    /// Start live scoring of a locked match
    pub async fn start_match(
        &self,
        category: &str,
        match_id: &MatchId,
        holder: &str,
    ) -> BracketResult<Match> {
        let mut bracket = self.load_bracket(category).await?;
        let writes = progression::start(&mut bracket, match_id, holder)?;
        self.apply(category, &writes).await?;
        updated(&bracket, match_id)
    }

    /// Declare the winner of a running match and release its lock
    ///
    /// The result and the advancement are written first, then the lock is
    /// released. Repechage creation comes last and never fails the call: a
    /// store error while committing it is reported as
    /// [`RepechageOutcome::Aborted`] and left for [`Self::reconcile`].
    ///
    /// After a semifinal the bracket is reloaded before the repechage check,
    /// so the station that completes the second semifinal creates the
    /// repechage even when both were declared at the same time.
    pub async fn declare_winner(
        &self,
        category: &str,
        match_id: &MatchId,
        winner: &str,
        holder: &str,
    ) -> BracketResult<Progression> {
        let mut bracket = self.load_bracket(category).await?;
        let mut result = progression::declare_winner(&mut bracket, match_id, winner, holder)?;

        let (match_writes, repechage_writes): (Vec<StoreWrite>, Vec<StoreWrite>) = result
            .writes
            .drain(..)
            .partition(|w| !matches!(w, StoreWrite::CreateRepechage(_)));
        self.apply(category, &match_writes).await?;
        self.store
            .set(&self.paths.lock(category, match_id), Value::Null)
            .await?;
        result.writes = match_writes;

        for write in repechage_writes {
            if let StoreWrite::CreateRepechage(set) = write {
                result.repechage = Some(self.publish_repechage(category, set).await);
            }
        }

        if matches!(result.repechage, Some(RepechageOutcome::NotReady)) {
            let outcome = match self.load_bracket(category).await {
                Ok(mut fresh) => match repechage::ensure_repechage(&mut fresh) {
                    RepechageOutcome::Created(set) => self.publish_repechage(category, set).await,
                    other => other,
                },
                Err(err) => {
                    log::warn!("Cannot reload {} for the repechage check: {}", category, err);
                    RepechageOutcome::Aborted(err.to_string())
                }
            };
            result.repechage = Some(outcome);
        }

        if let Some(RepechageOutcome::Created(set)) = &result.repechage {
            result.writes.push(StoreWrite::CreateRepechage(set.clone()));
        }

        Ok(result)
    }

    /// Abandon a match: back to pending, lock released
    pub async fn release_lock(
        &self,
        category: &str,
        match_id: &MatchId,
        holder: &str,
    ) -> BracketResult<Match> {
        let mut bracket = self.load_bracket(category).await?;
        let writes = progression::unlock(&mut bracket, match_id, holder)?;
        self.apply(category, &writes).await?;
        self.store
            .set(&self.paths.lock(category, match_id), Value::Null)
            .await?;
        updated(&bracket, match_id)
    }

    /// Repair a category after an interrupted station
    ///
    /// Runs [`progression::reconcile`], persists its repairs and removes lock
    /// records of matches that are not active.
    pub async fn reconcile(&self, category: &str) -> BracketResult<Reconciliation> {
        let mut bracket = self.load_bracket(category).await?;
        let mut report = progression::reconcile(&mut bracket)?;
        self.apply(category, &report.writes).await?;

        for m in bracket.matches().filter(|m| !m.is_active()) {
            let lock_path = self.paths.lock(category, &m.id);
            if self.store.get(&lock_path).await?.is_some() {
                log::info!("Removing stale lock on {} in {}", m.id, category);
                self.store.set(&lock_path, Value::Null).await?;
                report.released_locks.push(m.id.clone());
            }
        }

        Ok(report)
    }

    /// Current placings of a category
    pub async fn standings(&self, category: &str) -> BracketResult<Standings> {
        let bracket = self.load_bracket(category).await?;
        Ok(standings::standings(&bracket))
    }

    /// Follow changes to one match document
    pub async fn subscribe_match(
        &self,
        category: &str,
        match_id: &MatchId,
    ) -> BracketResult<MatchSubscription> {
        let rx = self
            .store
            .subscribe(&self.paths.match_doc(category, match_id))
            .await?;
        Ok(MatchSubscription { rx })
    }

    async fn read<T: DeserializeOwned>(&self, path: &str) -> BracketResult<Option<T>> {
        decode(self.store.get(path).await?)
    }

    async fn load_matches(&self, category: &str, ids: &[MatchId]) -> BracketResult<Vec<Match>> {
        let mut matches = Vec::with_capacity(ids.len());
        for id in ids {
            let m = self
                .read(&self.paths.match_doc(category, id))
                .await?
                .ok_or_else(|| BracketError::MatchNotFound(id.clone()))?;
            matches.push(m);
        }
        Ok(matches)
    }

    async fn put_match(&self, m: &Match) -> BracketResult<()> {
        self.store
            .set(
                &self.paths.match_doc(&m.category, &m.id),
                serde_json::to_value(m)?,
            )
            .await?;
        Ok(())
    }

    async fn apply(&self, category: &str, writes: &[StoreWrite]) -> BracketResult<()> {
        for write in writes {
            match write {
                StoreWrite::ReplaceMatch(m) => self.put_match(m).await?,
                StoreWrite::FillSlot {
                    match_id,
                    side,
                    slot,
                } => {
                    let mut fields = Map::new();
                    fields.insert(side.field_name().to_string(), serde_json::to_value(slot)?);
                    self.store
                        .update(&self.paths.match_doc(category, match_id), fields)
                        .await?;
                }
                StoreWrite::CreateRepechage(set) => {
                    if !self.commit_repechage(category, set).await? {
                        log::debug!("Repechage of {} was committed by another station", category);
                    }
                }
            }
        }
        Ok(())
    }

    /// Commit a repechage set, reporting rather than returning store errors
    async fn publish_repechage(&self, category: &str, set: Vec<Match>) -> RepechageOutcome {
        match self.commit_repechage(category, &set).await {
            Ok(true) => {
                log::info!("Published repechage of {}", category);
                RepechageOutcome::Created(set)
            }
            Ok(false) => {
                log::debug!("Repechage of {} was committed by another station", category);
                RepechageOutcome::AlreadyExists
            }
            Err(err) => {
                log::warn!("Repechage of {} not committed: {}", category, err);
                RepechageOutcome::Aborted(err.to_string())
            }
        }
    }

    /// Publish a repechage set unless one already exists
    ///
    /// Match documents are created only where absent, then the index is
    /// swapped in one step. Returns `false` if another writer got there first.
    async fn commit_repechage(&self, category: &str, set: &[Match]) -> BracketResult<bool> {
        for m in set {
            self.store
                .compare_and_swap(
                    &self.paths.match_doc(category, &m.id),
                    None,
                    Some(serde_json::to_value(m)?),
                )
                .await?;
        }

        let index_path = self.paths.bracket(category);
        let current = self
            .store
            .get(&index_path)
            .await?
            .ok_or_else(|| BracketError::BracketNotFound(category.to_string()))?;
        let mut index: BracketIndex = serde_json::from_value(current.clone())?;
        if !index.repechage.is_empty() {
            return Ok(false);
        }

        index.repechage = set.iter().map(|m| m.id.clone()).collect();
        let swapped = self
            .store
            .compare_and_swap(&index_path, Some(&current), Some(serde_json::to_value(&index)?))
            .await?;
        if swapped {
            return Ok(true);
        }

        match self.read::<BracketIndex>(&index_path).await? {
            Some(latest) if !latest.repechage.is_empty() => Ok(false),
            _ => Err(BracketError::WriteConflict(index_path)),
        }
    }
}

fn updated(bracket: &Bracket, match_id: &MatchId) -> BracketResult<Match> {
    bracket
        .get(match_id)
        .cloned()
        .ok_or_else(|| BracketError::MatchNotFound(match_id.clone()))
}
