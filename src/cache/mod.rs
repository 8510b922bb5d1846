//! Read-through local cache of items and review state
//!
//! Feeds the session builder when the remote store is unreachable. The
//! snapshot is best-effort: it may be stale, and a session built from it
//! still routes grading through the offline sync queue.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::content::LearnableItem;
use crate::review::models::ReviewState;
use crate::storage::{KeyValueStore, StorageError};

/// One cached (item, state) pair
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry {
    pub item: LearnableItem,
    pub state: ReviewState,
}

/// Per-user snapshot cache over the key-value boundary
pub struct LocalCache {
    kv: Arc<dyn KeyValueStore>,
}

impl LocalCache {
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        Self { kv }
    }

    fn snapshot_key(user_id: &str) -> String {
        format!("cache/{}", user_id)
    }

    /// Replace the cached snapshot for a user
    pub fn save(&self, user_id: &str, entries: &[CacheEntry]) -> Result<(), StorageError> {
        let json = serde_json::to_string(entries)?;
        self.kv.set(&Self::snapshot_key(user_id), &json)
    }

    /// Last snapshot, or empty. A missing, unreadable, or corrupt snapshot
    /// is treated as empty rather than an error.
    pub fn load(&self, user_id: &str) -> Vec<CacheEntry> {
        let raw = match self.kv.get(&Self::snapshot_key(user_id)) {
            Ok(Some(raw)) => raw,
            Ok(None) => return Vec::new(),
            Err(err) => {
                log::warn!("cache read failed for {}: {}", user_id, err);
                return Vec::new();
            }
        };

        match serde_json::from_str(&raw) {
            Ok(entries) => entries,
            Err(err) => {
                log::warn!("discarding corrupt cache snapshot for {}: {}", user_id, err);
                Vec::new()
            }
        }
    }

    /// Patch the cached state for one item after an offline grade.
    /// Items not present in the snapshot are skipped.
    pub fn apply(&self, user_id: &str, state: &ReviewState) -> Result<(), StorageError> {
        let mut entries = self.load(user_id);
        let Some(entry) = entries
            .iter_mut()
            .find(|e| e.item.kind == state.item_type && e.item.id == state.item_id)
        else {
            log::debug!(
                "offline grade for uncached item {:?}/{}; snapshot unchanged",
                state.item_type,
                state.item_id
            );
            return Ok(());
        };
        entry.state = state.clone();
        self.save(user_id, &entries)
    }

    /// Drop the snapshot for a user
    pub fn clear(&self, user_id: &str) -> Result<(), StorageError> {
        self.kv.remove(&Self::snapshot_key(user_id))
    }
}
