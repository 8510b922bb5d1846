//! Data models for review sessions

use std::time::Duration;

use serde::Serialize;

use crate::content::LearnableItem;
use crate::review::models::{ReviewState, ReviewStatus};
use crate::review::store::DueOrdering;

/// Lifecycle phase of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SessionPhase {
    /// Idle; due counts are visible, no queue exists
    Dashboard,
    /// Working through a frozen queue of due cards
    Active,
    /// Finished; statistics are read-only until restart
    Summary,
}

/// A due card paired with its scheduling state
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionCard {
    pub item: LearnableItem,
    pub state: ReviewState,
}

/// Per-session statistics, reset at each start
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStats {
    pub correct: usize,
    pub incorrect: usize,
    pub xp: u32,
}

impl SessionStats {
    pub fn reviewed(&self) -> usize {
        self.correct + self.incorrect
    }
}

/// Due totals shown on the dashboard, bucketed by status
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DueCounts {
    pub total: usize,
    pub new: usize,
    pub learning: usize,
    pub review: usize,
    pub mastered: usize,
}

impl DueCounts {
    pub fn from_states(states: &[ReviewState]) -> Self {
        let mut counts = Self {
            total: states.len(),
            ..Self::default()
        };
        for state in states {
            match state.status {
                ReviewStatus::New => counts.new += 1,
                ReviewStatus::Learning => counts.learning += 1,
                ReviewStatus::Review => counts.review += 1,
                ReviewStatus::Mastered => counts.mastered += 1,
            }
        }
        counts
    }
}

/// How the grade was made durable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Persistence {
    /// Written to the review store
    Stored,
    /// Store unreachable; queued for replay and applied to the cache
    Queued,
}

/// Result of grading one card
#[derive(Debug, Clone)]
pub struct GradeOutcome {
    pub persistence: Persistence,
    pub state: ReviewState,
}

/// Session construction policy
#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// Shuffle the queue once at session start, deterministically.
    /// None keeps the due ordering.
    pub shuffle_seed: Option<u64>,
    /// Budget for each remote store/content call; a timeout is treated
    /// as the store being unreachable.
    pub store_timeout: Duration,
    /// Cap on queue length; None takes everything due.
    pub due_limit: Option<usize>,
    /// Ordering applied when building from the cache snapshot.
    pub ordering: DueOrdering,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            shuffle_seed: None,
            store_timeout: Duration::from_secs(10),
            due_limit: None,
            ordering: DueOrdering::default(),
        }
    }
}
