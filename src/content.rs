//! Content boundary: learnable items produced by the generation pipeline.
//!
//! The scheduling core never invokes content generation. It only looks up
//! already-generated items by id and registers fresh items with an initial
//! review state.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::review::models::{ReviewKey, ReviewState};
use crate::review::store::{ReviewStore, StoreError, UpsertOutcome};

/// Kind of learnable item sharing the review table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ItemKind {
    /// A full example sentence
    Sentence,
    /// A grammar point
    Grammar,
    /// A single character
    Character,
}

/// An immutable content unit. The display payload is opaque to the
/// scheduler; only the generation pipeline understands its shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LearnableItem {
    pub id: String,
    pub kind: ItemKind,
    pub payload: serde_json::Value,
}

impl LearnableItem {
    pub fn new(id: impl Into<String>, kind: ItemKind, payload: serde_json::Value) -> Self {
        Self {
            id: id.into(),
            kind,
            payload,
        }
    }
}

/// Read-only lookup of generated items
#[async_trait]
pub trait ContentStore: Send + Sync {
    async fn get_item(
        &self,
        kind: ItemKind,
        item_id: &str,
    ) -> Result<Option<LearnableItem>, StoreError>;
}

/// Register a newly generated item: creates its initial review state
/// (`status = New`, due immediately) via the store's idempotent upsert.
pub async fn register_item(
    store: &dyn ReviewStore,
    user_id: &str,
    item: &LearnableItem,
) -> Result<UpsertOutcome, StoreError> {
    let state = ReviewState::new(item.id.clone(), item.kind);
    let key = ReviewKey::new(user_id, item.kind, &item.id);
    store.upsert(&key, &state).await
}

/// In-memory content store for tests and local use
#[derive(Default)]
pub struct MemoryContentStore {
    items: Mutex<HashMap<(ItemKind, String), LearnableItem>>,
}

impl MemoryContentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, item: LearnableItem) {
        let mut items = self.items.lock().unwrap();
        items.insert((item.kind, item.id.clone()), item);
    }
}

#[async_trait]
impl ContentStore for MemoryContentStore {
    async fn get_item(
        &self,
        kind: ItemKind,
        item_id: &str,
    ) -> Result<Option<LearnableItem>, StoreError> {
        let items = self.items.lock().unwrap();
        Ok(items.get(&(kind, item_id.to_string())).cloned())
    }
}
