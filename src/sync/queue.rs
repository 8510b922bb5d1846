//! Offline queue of pending grading actions
//!
//! Grades recorded while the remote store is unreachable are appended here
//! (durable local write) and replayed in FIFO order on reconnect. An action
//! leaves the queue only after the store confirms the write, so delivery is
//! at-least-once; the store's upsert is idempotent per composite key, which
//! makes replays safe.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::SyncError;
use crate::content::ItemKind;
use crate::review::algorithm::Grade;
use crate::review::models::{ReviewKey, ReviewState};
use crate::review::store::ReviewStore;
use crate::storage::KeyValueStore;

/// Storage key for the persisted action list
const QUEUE_KEY: &str = "sync/pending-reviews";

/// A grading event waiting to be replayed against the review store
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingReview {
    pub id: Uuid,
    pub user_id: String,
    pub item_type: ItemKind,
    pub item_id: String,
    pub grade: Grade,
    /// Post-grade state computed by the scheduler at grading time
    pub state: ReviewState,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
}

impl PendingReview {
    pub fn key(&self) -> ReviewKey {
        ReviewKey::new(self.user_id.clone(), self.item_type, self.item_id.clone())
    }
}

/// Result of a flush attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FlushReport {
    pub succeeded: usize,
    pub remaining: usize,
}

/// Persisted FIFO queue of pending grading actions
pub struct SyncQueue {
    kv: Arc<dyn KeyValueStore>,
    items: Mutex<Vec<PendingReview>>,
    /// Single-flight guard: a flush already in progress makes a new flush
    /// request a no-op.
    flushing: tokio::sync::Mutex<()>,
}

impl SyncQueue {
    /// Open the queue, restoring any actions persisted by a previous run.
    /// A corrupt persisted list is logged and treated as empty.
    pub fn open(kv: Arc<dyn KeyValueStore>) -> Self {
        let items = match kv.get(QUEUE_KEY) {
            Ok(Some(raw)) => match serde_json::from_str(&raw) {
                Ok(items) => items,
                Err(err) => {
                    log::error!("discarding corrupt pending-review queue: {}", err);
                    Vec::new()
                }
            },
            Ok(None) => Vec::new(),
            Err(err) => {
                log::error!("failed to read pending-review queue: {}", err);
                Vec::new()
            }
        };

        Self {
            kv,
            items: Mutex::new(items),
            flushing: tokio::sync::Mutex::new(()),
        }
    }

    /// Append a grading action, assigning it a unique id and timestamp.
    /// Returns only after the list is durably persisted; a persistence
    /// failure is a hard error and leaves the queue unchanged.
    pub fn enqueue(
        &self,
        user_id: &str,
        grade: Grade,
        state: &ReviewState,
    ) -> Result<PendingReview, SyncError> {
        let action = PendingReview {
            id: Uuid::new_v4(),
            user_id: user_id.to_string(),
            item_type: state.item_type,
            item_id: state.item_id.clone(),
            grade,
            state: state.clone(),
            created_at: Utc::now(),
        };

        let mut items = self.items.lock().unwrap();
        items.push(action.clone());
        if let Err(err) = self.persist(&items) {
            items.pop();
            return Err(err);
        }
        log::debug!(
            "queued offline grade {} for {:?}/{} ({} pending)",
            action.grade.value(),
            action.item_type,
            action.item_id,
            items.len()
        );
        Ok(action)
    }

    /// Replay queued actions against the store, oldest first. Each action
    /// is removed (and the list re-persisted) only once the store confirms
    /// the write; the first failure stops the pass and leaves the rest
    /// queued for the next attempt.
    pub async fn flush(&self, store: &dyn ReviewStore) -> Result<FlushReport, SyncError> {
        let _gate = match self.flushing.try_lock() {
            Ok(gate) => gate,
            Err(_) => {
                log::debug!("flush already in progress; skipping");
                return Ok(FlushReport {
                    succeeded: 0,
                    remaining: self.len(),
                });
            }
        };

        let mut succeeded = 0;
        loop {
            let next = { self.items.lock().unwrap().first().cloned() };
            let Some(action) = next else { break };

            match store.upsert(&action.key(), &action.state).await {
                Ok(_) => {
                    let mut items = self.items.lock().unwrap();
                    items.retain(|a| a.id != action.id);
                    self.persist(&items)?;
                    succeeded += 1;
                }
                Err(err) => {
                    log::warn!(
                        "flush stopped at {:?}/{}: {}",
                        action.item_type,
                        action.item_id,
                        err
                    );
                    break;
                }
            }
        }

        let remaining = self.len();
        if succeeded > 0 || remaining > 0 {
            log::info!("flush: {} replayed, {} remaining", succeeded, remaining);
        }
        Ok(FlushReport {
            succeeded,
            remaining,
        })
    }

    /// Ordered snapshot of pending actions, for diagnostics
    pub fn pending(&self) -> Vec<PendingReview> {
        self.items.lock().unwrap().clone()
    }

    pub fn len(&self) -> usize {
        self.items.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn persist(&self, items: &[PendingReview]) -> Result<(), SyncError> {
        let json = serde_json::to_string(items).map_err(crate::storage::StorageError::from)?;
        self.kv.set(QUEUE_KEY, &json)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::review::models::ReviewStatus;
    use crate::review::store::MemoryReviewStore;
    use crate::storage::MemoryStore;

    fn graded_state(id: &str, interval: i32) -> ReviewState {
        let mut state = ReviewState::new(id, ItemKind::Sentence);
        state.interval = interval;
        state.status = ReviewStatus::Review;
        state.last_review = Some(Utc::now());
        state
    }

    #[tokio::test]
    async fn offline_round_trip() {
        let kv = Arc::new(MemoryStore::new());
        let queue = SyncQueue::open(kv);
        let store = MemoryReviewStore::new();
        store.set_reachable(false);

        for i in 0..3 {
            let state = graded_state(&format!("s-{}", i), i + 1);
            queue.enqueue("user-1", Grade::GOOD, &state).unwrap();
        }
        assert_eq!(queue.pending().len(), 3);

        // Store still down: nothing leaves the queue
        let report = queue.flush(&store).await.unwrap();
        assert_eq!(report.succeeded, 0);
        assert_eq!(report.remaining, 3);

        store.set_reachable(true);
        let report = queue.flush(&store).await.unwrap();
        assert_eq!(report.succeeded, 3);
        assert_eq!(report.remaining, 0);
        assert!(queue.is_empty());

        // All final states landed under their keys
        for i in 0..3 {
            let key = ReviewKey::new("user-1", ItemKind::Sentence, format!("s-{}", i));
            let stored = store.get(&key).unwrap();
            assert_eq!(stored.interval, i + 1);
        }
    }

    #[tokio::test]
    async fn flush_preserves_fifo_order() {
        let queue = SyncQueue::open(Arc::new(MemoryStore::new()));
        let store = MemoryReviewStore::new();

        // Two grades for the same item: the later one must win
        let first = graded_state("s-1", 1);
        let mut second = graded_state("s-1", 6);
        second.ease_factor = 2.6;
        queue.enqueue("user-1", Grade::GOOD, &first).unwrap();
        queue.enqueue("user-1", Grade::EASY, &second).unwrap();

        queue.flush(&store).await.unwrap();

        let key = ReviewKey::new("user-1", ItemKind::Sentence, "s-1");
        let stored = store.get(&key).unwrap();
        assert_eq!(stored.interval, 6);
        assert_eq!(stored.ease_factor, 2.6);
    }

    #[tokio::test]
    async fn queue_survives_reopen() {
        let kv = Arc::new(MemoryStore::new());
        {
            let queue = SyncQueue::open(Arc::clone(&kv) as Arc<dyn KeyValueStore>);
            queue
                .enqueue("user-1", Grade::AGAIN, &graded_state("s-1", 1))
                .unwrap();
        }
        let reopened = SyncQueue::open(kv);
        assert_eq!(reopened.len(), 1);
        assert_eq!(reopened.pending()[0].item_id, "s-1");
    }

    #[tokio::test]
    async fn corrupt_persisted_queue_is_empty() {
        let kv = Arc::new(MemoryStore::new());
        kv.set(QUEUE_KEY, "not json at all").unwrap();
        let queue = SyncQueue::open(kv);
        assert!(queue.is_empty());
    }

    /// Store that rejects writes for one item id, to fail mid-flush
    struct RejectingStore {
        inner: MemoryReviewStore,
        reject_item: String,
    }

    #[async_trait::async_trait]
    impl ReviewStore for RejectingStore {
        async fn upsert(
            &self,
            key: &ReviewKey,
            state: &ReviewState,
        ) -> Result<crate::review::store::UpsertOutcome, crate::review::store::StoreError> {
            if key.item_id == self.reject_item {
                return Err(crate::review::store::StoreError::Unreachable(
                    "connection reset".to_string(),
                ));
            }
            self.inner.upsert(key, state).await
        }

        async fn get_due(
            &self,
            user_id: &str,
            as_of: DateTime<Utc>,
            limit: Option<usize>,
        ) -> Result<Vec<ReviewState>, crate::review::store::StoreError> {
            self.inner.get_due(user_id, as_of, limit).await
        }
    }

    #[tokio::test]
    async fn flush_stops_at_first_failure() {
        let queue = SyncQueue::open(Arc::new(MemoryStore::new()));
        let store = RejectingStore {
            inner: MemoryReviewStore::new(),
            reject_item: "s-2".to_string(),
        };

        for id in ["s-1", "s-2", "s-3"] {
            queue
                .enqueue("user-1", Grade::GOOD, &graded_state(id, 1))
                .unwrap();
        }

        let report = queue.flush(&store).await.unwrap();
        assert_eq!(report.succeeded, 1);
        assert_eq!(report.remaining, 2);

        // The failed action and everything behind it stay queued, in order
        let ids: Vec<String> = queue.pending().iter().map(|a| a.item_id.clone()).collect();
        assert_eq!(ids, ["s-2", "s-3"]);
        assert!(store
            .inner
            .get(&ReviewKey::new("user-1", ItemKind::Sentence, "s-1"))
            .is_some());
    }
}
