//! Review item store boundary
//!
//! The durable record of per-item scheduling state lives in an external
//! record store; this module defines the trait the core talks to, plus an
//! in-memory reference implementation used by tests and local tooling.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use super::models::{ReviewKey, ReviewState, ReviewStatus};

#[derive(Error, Debug)]
pub enum StoreError {
    /// Network failure or timeout; callers fall back to the local cache
    /// and sync queue.
    #[error("store unreachable: {0}")]
    Unreachable(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Whether an upsert inserted a fresh record or patched an existing one
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum UpsertAction {
    Created,
    Updated,
}

/// Outcome of an upsert: what happened and the record's identity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpsertOutcome {
    pub action: UpsertAction,
    pub id: Uuid,
}

/// Ordering policy for the due queue.
///
/// The struggling-first tie-break is inferred design intent, not a hard
/// invariant, so it stays a policy choice.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DueOrdering {
    /// Most overdue first; ties broken by status priority
    /// (learning > review > new) to surface struggling items.
    #[default]
    StrugglingFirst,
    /// Most overdue first only
    DueDateOnly,
}

impl DueOrdering {
    pub fn sort(&self, records: &mut [ReviewState]) {
        match self {
            DueOrdering::StrugglingFirst => records.sort_by(|a, b| {
                a.next_review
                    .cmp(&b.next_review)
                    .then_with(|| status_priority(a.status).cmp(&status_priority(b.status)))
            }),
            DueOrdering::DueDateOnly => {
                records.sort_by_key(|s| s.next_review);
            }
        }
    }
}

fn status_priority(status: ReviewStatus) -> u8 {
    match status {
        ReviewStatus::Learning => 0,
        ReviewStatus::Review => 1,
        ReviewStatus::New => 2,
        ReviewStatus::Mastered => 3,
    }
}

/// Durable store of review states, keyed by (user, item type, item id)
#[async_trait]
pub trait ReviewStore: Send + Sync {
    /// Insert or patch the record for the composite key. Creation and
    /// patching are idempotent per key: repeating a write leaves one
    /// record with the same identity.
    async fn upsert(&self, key: &ReviewKey, state: &ReviewState)
        -> Result<UpsertOutcome, StoreError>;

    /// All records due at `as_of`, most overdue first.
    async fn get_due(
        &self,
        user_id: &str,
        as_of: DateTime<Utc>,
        limit: Option<usize>,
    ) -> Result<Vec<ReviewState>, StoreError>;
}

struct StoredReview {
    id: Uuid,
    state: ReviewState,
}

/// In-memory review store.
///
/// Reachability can be toggled to exercise the offline fallback paths:
/// while unreachable every call fails with [`StoreError::Unreachable`].
pub struct MemoryReviewStore {
    records: Mutex<HashMap<ReviewKey, StoredReview>>,
    ordering: DueOrdering,
    reachable: AtomicBool,
}

impl Default for MemoryReviewStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryReviewStore {
    pub fn new() -> Self {
        Self::with_ordering(DueOrdering::default())
    }

    pub fn with_ordering(ordering: DueOrdering) -> Self {
        Self {
            records: Mutex::new(HashMap::new()),
            ordering,
            reachable: AtomicBool::new(true),
        }
    }

    pub fn set_reachable(&self, reachable: bool) {
        self.reachable.store(reachable, AtomicOrdering::SeqCst);
    }

    pub fn len(&self) -> usize {
        self.records.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Direct lookup, bypassing the reachability toggle (diagnostics)
    pub fn get(&self, key: &ReviewKey) -> Option<ReviewState> {
        let records = self.records.lock().unwrap();
        records.get(key).map(|r| r.state.clone())
    }

    fn check_reachable(&self) -> Result<(), StoreError> {
        if self.reachable.load(AtomicOrdering::SeqCst) {
            Ok(())
        } else {
            Err(StoreError::Unreachable("store offline".to_string()))
        }
    }
}

#[async_trait]
impl ReviewStore for MemoryReviewStore {
    async fn upsert(
        &self,
        key: &ReviewKey,
        state: &ReviewState,
    ) -> Result<UpsertOutcome, StoreError> {
        self.check_reachable()?;

        let mut records = self.records.lock().unwrap();
        match records.get_mut(key) {
            Some(existing) => {
                existing.state = state.clone();
                Ok(UpsertOutcome {
                    action: UpsertAction::Updated,
                    id: existing.id,
                })
            }
            None => {
                let id = Uuid::new_v4();
                records.insert(
                    key.clone(),
                    StoredReview {
                        id,
                        state: state.clone(),
                    },
                );
                Ok(UpsertOutcome {
                    action: UpsertAction::Created,
                    id,
                })
            }
        }
    }

    async fn get_due(
        &self,
        user_id: &str,
        as_of: DateTime<Utc>,
        limit: Option<usize>,
    ) -> Result<Vec<ReviewState>, StoreError> {
        self.check_reachable()?;

        let records = self.records.lock().unwrap();
        let mut due: Vec<ReviewState> = records
            .iter()
            .filter(|(key, record)| key.user_id == user_id && record.state.is_due(as_of))
            .map(|(_, record)| record.state.clone())
            .collect();
        drop(records);

        self.ordering.sort(&mut due);
        if let Some(limit) = limit {
            due.truncate(limit);
        }
        Ok(due)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::ItemKind;
    use chrono::Duration;

    fn key(user: &str, id: &str) -> ReviewKey {
        ReviewKey::new(user, ItemKind::Sentence, id)
    }

    fn state(id: &str, days_overdue: i64, status: ReviewStatus) -> ReviewState {
        let mut state = ReviewState::new(id, ItemKind::Sentence);
        state.next_review = Utc::now() - Duration::days(days_overdue);
        state.status = status;
        state
    }

    #[tokio::test]
    async fn upsert_is_idempotent_per_key() {
        let store = MemoryReviewStore::new();
        let key = key("user-1", "s-1");
        let state = state("s-1", 0, ReviewStatus::New);

        let first = store.upsert(&key, &state).await.unwrap();
        assert_eq!(first.action, UpsertAction::Created);

        let second = store.upsert(&key, &state).await.unwrap();
        assert_eq!(second.action, UpsertAction::Updated);
        assert_eq!(second.id, first.id);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn get_due_filters_orders_and_limits() {
        let store = MemoryReviewStore::new();
        let now = Utc::now();

        // Same due instant: learning outranks review outranks new
        let mut tied_new = state("tied-new", 0, ReviewStatus::New);
        let mut tied_learning = state("tied-learning", 0, ReviewStatus::Learning);
        let mut tied_review = state("tied-review", 0, ReviewStatus::Review);
        let tie_instant = now - Duration::days(1);
        tied_new.next_review = tie_instant;
        tied_learning.next_review = tie_instant;
        tied_review.next_review = tie_instant;

        let oldest = state("oldest", 5, ReviewStatus::New);
        let future = state("future", -5, ReviewStatus::Review);

        for s in [&tied_new, &tied_learning, &tied_review, &oldest, &future] {
            store.upsert(&key("user-1", &s.item_id), s).await.unwrap();
        }
        // Another user's record never leaks in
        store
            .upsert(&key("user-2", "other"), &oldest)
            .await
            .unwrap();

        let due = store.get_due("user-1", now, None).await.unwrap();
        let ids: Vec<&str> = due.iter().map(|s| s.item_id.as_str()).collect();
        assert_eq!(ids, ["oldest", "tied-learning", "tied-review", "tied-new"]);

        let limited = store.get_due("user-1", now, Some(2)).await.unwrap();
        assert_eq!(limited.len(), 2);
        assert_eq!(limited[0].item_id, "oldest");
    }

    #[tokio::test]
    async fn unreachable_store_fails_recoverably() {
        let store = MemoryReviewStore::new();
        store.set_reachable(false);

        let err = store
            .get_due("user-1", Utc::now(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Unreachable(_)));

        store.set_reachable(true);
        assert!(store.get_due("user-1", Utc::now(), None).await.is_ok());
    }
}
