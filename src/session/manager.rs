//! Review session state machine
//!
//! Dashboard -> Active -> Summary, looping back to Dashboard. The queue is
//! snapshotted at start and never grows mid-session; every grade is made
//! durable (store write or offline queue) before the session advances.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use thiserror::Error;

use super::models::{
    DueCounts, GradeOutcome, Persistence, SessionCard, SessionOptions, SessionPhase, SessionStats,
};
use crate::cache::{CacheEntry, LocalCache};
use crate::content::{ContentStore, ItemKind, LearnableItem};
use crate::review::algorithm::{calculate_next_review, Grade, ScheduleError};
use crate::review::models::{ReviewKey, ReviewState};
use crate::review::store::{ReviewStore, StoreError, UpsertOutcome};
use crate::sync::{SyncError, SyncQueue};

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("no cards are due")]
    NothingDue,

    #[error("session is not active")]
    NotActive,

    #[error("operation not allowed in the {0:?} phase")]
    InvalidPhase(SessionPhase),

    #[error(transparent)]
    Schedule(#[from] ScheduleError),

    #[error(transparent)]
    Sync(#[from] SyncError),
}

/// Injected collaborators for a session; no process-wide singletons
#[derive(Clone)]
pub struct SessionContext {
    pub store: Arc<dyn ReviewStore>,
    pub content: Arc<dyn ContentStore>,
    pub cache: Arc<LocalCache>,
    pub queue: Arc<SyncQueue>,
    pub options: SessionOptions,
}

/// One learner's review session
pub struct ReviewSession {
    user_id: String,
    ctx: SessionContext,
    phase: SessionPhase,
    cards: Vec<SessionCard>,
    index: usize,
    flipped: bool,
    stats: SessionStats,
    offline: bool,
}

impl ReviewSession {
    pub fn new(user_id: impl Into<String>, ctx: SessionContext) -> Self {
        Self {
            user_id: user_id.into(),
            ctx,
            phase: SessionPhase::Dashboard,
            cards: Vec::new(),
            index: 0,
            flipped: false,
            stats: SessionStats::default(),
            offline: false,
        }
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    /// Whether the current queue was built from the cache snapshot
    pub fn is_offline(&self) -> bool {
        self.offline
    }

    /// Due totals for the dashboard, per status bucket. Falls back to the
    /// cache snapshot when the store is unreachable.
    pub async fn due_counts(&self, now: DateTime<Utc>) -> DueCounts {
        match self
            .bounded(self.ctx.store.get_due(&self.user_id, now, None))
            .await
        {
            Ok(states) => DueCounts::from_states(&states),
            Err(err) => {
                log::warn!("due count falling back to cache: {}", err);
                let states: Vec<ReviewState> = self
                    .ctx
                    .cache
                    .load(&self.user_id)
                    .into_iter()
                    .map(|e| e.state)
                    .filter(|s| s.is_due(now))
                    .collect();
                DueCounts::from_states(&states)
            }
        }
    }

    /// Snapshot the due set into a frozen queue and go Active.
    ///
    /// Refused (state stays Dashboard) when nothing is due. Returns the
    /// queue length on success.
    pub async fn start(&mut self, now: DateTime<Utc>) -> Result<usize, SessionError> {
        if self.phase != SessionPhase::Dashboard {
            return Err(SessionError::InvalidPhase(self.phase));
        }

        let due = self
            .bounded(
                self.ctx
                    .store
                    .get_due(&self.user_id, now, self.ctx.options.due_limit),
            )
            .await;
        let mut cards = match due {
            Ok(states) => {
                self.offline = false;
                let cards = self.resolve_items(states).await;
                // Refresh the snapshot so a later offline session can run
                let entries: Vec<CacheEntry> = cards
                    .iter()
                    .map(|c| CacheEntry {
                        item: c.item.clone(),
                        state: c.state.clone(),
                    })
                    .collect();
                if let Err(err) = self.ctx.cache.save(&self.user_id, &entries) {
                    log::warn!("failed to refresh cache snapshot: {}", err);
                }
                cards
            }
            Err(err) => {
                log::warn!("building session from cache, store unreachable: {}", err);
                self.offline = true;
                self.cards_from_cache(now)
            }
        };

        if cards.is_empty() {
            return Err(SessionError::NothingDue);
        }

        if let Some(seed) = self.ctx.options.shuffle_seed {
            let mut rng = StdRng::seed_from_u64(seed);
            cards.shuffle(&mut rng);
        }

        log::info!(
            "session started for {}: {} cards{}",
            self.user_id,
            cards.len(),
            if self.offline { " (offline)" } else { "" }
        );

        self.cards = cards;
        self.index = 0;
        self.flipped = false;
        self.stats = SessionStats::default();
        self.phase = SessionPhase::Active;
        Ok(self.cards.len())
    }

    /// Card currently shown, front side up unless flipped
    pub fn current_card(&self) -> Option<&SessionCard> {
        if self.phase != SessionPhase::Active {
            return None;
        }
        self.cards.get(self.index)
    }

    /// Reveal the answer. One-way per card and idempotent.
    pub fn flip(&mut self) -> Result<(), SessionError> {
        if self.phase != SessionPhase::Active {
            return Err(SessionError::NotActive);
        }
        self.flipped = true;
        Ok(())
    }

    pub fn is_flipped(&self) -> bool {
        self.flipped
    }

    /// Grade the current card.
    ///
    /// The scheduler computes the new state, the result is made durable
    /// (store upsert, or offline queue + cache patch when the store is
    /// unreachable), statistics update, and the queue advances. When the
    /// last card is graded the session moves to Summary.
    pub async fn grade(&mut self, grade: Grade) -> Result<GradeOutcome, SessionError> {
        if self.phase != SessionPhase::Active || self.index >= self.cards.len() {
            return Err(SessionError::NotActive);
        }

        let now = Utc::now();
        let mut state = self.cards[self.index].state.clone();
        let update = calculate_next_review(&state, grade, now)?;
        state.apply(&update, grade, now);

        let key = ReviewKey::for_state(&self.user_id, &state);
        let persistence = match self.bounded(self.ctx.store.upsert(&key, &state)).await {
            Ok(UpsertOutcome { .. }) => Persistence::Stored,
            Err(err) => {
                // The grade must be durably queued before we advance; an
                // enqueue failure is the only thing that stops the session.
                log::warn!("store write failed, queueing grade: {}", err);
                self.ctx.queue.enqueue(&self.user_id, grade, &state)?;
                if let Err(cache_err) = self.ctx.cache.apply(&self.user_id, &state) {
                    log::warn!("cache patch after offline grade failed: {}", cache_err);
                }
                Persistence::Queued
            }
        };

        self.cards[self.index].state = state.clone();
        if grade.passed() {
            self.stats.correct += 1;
        } else {
            self.stats.incorrect += 1;
        }
        self.stats.xp += grade.value() as u32 * 10;

        self.index += 1;
        self.flipped = false;
        if self.index == self.cards.len() {
            self.phase = SessionPhase::Summary;
            log::info!(
                "session finished for {}: {}/{} correct, {} xp",
                self.user_id,
                self.stats.correct,
                self.stats.reviewed(),
                self.stats.xp
            );
        }

        Ok(GradeOutcome { persistence, state })
    }

    /// The frozen queue, in presentation order
    pub fn cards(&self) -> &[SessionCard] {
        &self.cards
    }

    /// Cards left to grade in the active queue
    pub fn remaining(&self) -> usize {
        self.cards.len().saturating_sub(self.index)
    }

    pub fn queue_len(&self) -> usize {
        self.cards.len()
    }

    pub fn stats(&self) -> &SessionStats {
        &self.stats
    }

    /// Summary -> Dashboard. The old queue is dropped, not retained.
    pub fn restart(&mut self) -> Result<(), SessionError> {
        if self.phase != SessionPhase::Summary {
            return Err(SessionError::InvalidPhase(self.phase));
        }
        self.cards.clear();
        self.index = 0;
        self.flipped = false;
        self.phase = SessionPhase::Dashboard;
        Ok(())
    }

    /// End an active session early. The queue is discarded immediately;
    /// grades already committed or queued stay durable.
    pub fn abandon(&mut self) -> Result<(), SessionError> {
        if self.phase != SessionPhase::Active {
            return Err(SessionError::NotActive);
        }
        log::info!(
            "session abandoned for {} with {} cards remaining",
            self.user_id,
            self.remaining()
        );
        self.cards.clear();
        self.index = 0;
        self.flipped = false;
        self.phase = SessionPhase::Dashboard;
        Ok(())
    }

    /// Pair due states with their items. The content store is asked first;
    /// a cached item fills in when it fails, and states with no resolvable
    /// item are skipped.
    async fn resolve_items(&self, states: Vec<ReviewState>) -> Vec<SessionCard> {
        let cached: HashMap<(ItemKind, String), LearnableItem> = self
            .ctx
            .cache
            .load(&self.user_id)
            .into_iter()
            .map(|e| ((e.item.kind, e.item.id.clone()), e.item))
            .collect();

        let mut cards = Vec::with_capacity(states.len());
        for state in states {
            let fetched = self
                .bounded(self.ctx.content.get_item(state.item_type, &state.item_id))
                .await;
            let item = match fetched {
                Ok(Some(item)) => Some(item),
                Ok(None) | Err(_) => cached.get(&(state.item_type, state.item_id.clone())).cloned(),
            };
            match item {
                Some(item) => cards.push(SessionCard { item, state }),
                None => log::warn!(
                    "due item {:?}/{} has no resolvable content; skipping",
                    state.item_type,
                    state.item_id
                ),
            }
        }
        cards
    }

    /// Build the queue from the cache snapshot (store unreachable)
    fn cards_from_cache(&self, now: DateTime<Utc>) -> Vec<SessionCard> {
        let mut states: Vec<ReviewState> = Vec::new();
        let mut items: HashMap<(ItemKind, String), LearnableItem> = HashMap::new();
        for entry in self.ctx.cache.load(&self.user_id) {
            if entry.state.is_due(now) {
                items.insert((entry.item.kind, entry.item.id.clone()), entry.item);
                states.push(entry.state);
            }
        }

        self.ctx.options.ordering.sort(&mut states);
        if let Some(limit) = self.ctx.options.due_limit {
            states.truncate(limit);
        }

        states
            .into_iter()
            .filter_map(|state| {
                items
                    .remove(&(state.item_type, state.item_id.clone()))
                    .map(|item| SessionCard { item, state })
            })
            .collect()
    }

    /// Bound a remote call by the configured timeout; elapsing counts as
    /// the store being unreachable.
    async fn bounded<T>(
        &self,
        fut: impl Future<Output = Result<T, StoreError>>,
    ) -> Result<T, StoreError> {
        match tokio::time::timeout(self.ctx.options.store_timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(StoreError::Unreachable(format!(
                "request timed out after {:?}",
                self.ctx.options.store_timeout
            ))),
        }
    }
}
