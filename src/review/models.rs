//! Data models for per-item review scheduling state

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::algorithm::{Grade, ReviewUpdate};
use crate::content::ItemKind;

/// Status of an item in the spaced repetition lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ReviewStatus {
    /// Never successfully reviewed
    New,
    /// Most recent grade was a failure
    Learning,
    /// Regular spaced review
    Review,
    /// Interval has grown past the long-horizon threshold
    Mastered,
}

impl Default for ReviewStatus {
    fn default() -> Self {
        Self::New
    }
}

/// Composite key scoping every review-state write
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewKey {
    pub user_id: String,
    pub item_type: ItemKind,
    pub item_id: String,
}

impl ReviewKey {
    pub fn new(user_id: impl Into<String>, item_type: ItemKind, item_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            item_type,
            item_id: item_id.into(),
        }
    }

    /// Key for a state record owned by the given user
    pub fn for_state(user_id: &str, state: &ReviewState) -> Self {
        Self::new(user_id, state.item_type, state.item_id.clone())
    }
}

/// One grading event in the audit trail
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewLogEntry {
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub at: DateTime<Utc>,
    pub grade: Grade,
}

/// Current scheduling state for one (user, item) pair
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewState {
    pub item_id: String,
    pub item_type: ItemKind,
    /// Current interval in days (0 = never successfully reviewed)
    #[serde(default)]
    pub interval: i32,
    /// SM-2 ease factor, never below 1.3
    #[serde(default = "default_ease_factor")]
    pub ease_factor: f32,
    /// When the item is next due
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub next_review: DateTime<Utc>,
    #[serde(default)]
    pub status: ReviewStatus,
    /// Most recent grading, absent until first graded
    #[serde(
        default,
        with = "chrono::serde::ts_milliseconds_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub last_review: Option<DateTime<Utc>>,
    /// Append-only grading history
    #[serde(default)]
    pub history: Vec<ReviewLogEntry>,
}

fn default_ease_factor() -> f32 {
    2.5
}

impl ReviewState {
    /// Initial state for a freshly generated item: due immediately,
    /// default ease factor, no history.
    pub fn new(item_id: impl Into<String>, item_type: ItemKind) -> Self {
        Self {
            item_id: item_id.into(),
            item_type,
            interval: 0,
            ease_factor: default_ease_factor(),
            next_review: Utc::now(),
            status: ReviewStatus::New,
            last_review: None,
            history: Vec::new(),
        }
    }

    /// Check whether the item is due at the given instant
    pub fn is_due(&self, as_of: DateTime<Utc>) -> bool {
        self.next_review <= as_of
    }

    /// Fold a computed scheduling update into this state, recording the
    /// grading event in the history.
    pub fn apply(&mut self, update: &ReviewUpdate, grade: Grade, now: DateTime<Utc>) {
        self.interval = update.interval;
        self.ease_factor = update.ease_factor;
        self.next_review = update.next_review;
        self.status = update.status;
        self.last_review = Some(now);
        self.history.push(ReviewLogEntry { at: now, grade });
    }
}
