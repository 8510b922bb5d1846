//! mnemo: spaced-repetition scheduling engine and review-session state
//! machine for language learning.
//!
//! The crate covers the scheduling core only. Content generation, the
//! remote record store, and the presentation layer are external
//! collaborators reached through the [`content::ContentStore`],
//! [`review::ReviewStore`], and [`storage::KeyValueStore`] boundaries.
//!
//! Data flow: the content pipeline produces [`content::LearnableItem`]s,
//! each registered with an initial review state; a [`session::ReviewSession`]
//! snapshots the due set into a frozen queue; every grade runs through the
//! SM-2 scheduler and is written to the store, or queued in the
//! [`sync::SyncQueue`] and patched into the [`cache::LocalCache`] when the
//! device is offline; the queue replays on reconnect.

pub mod cache;
pub mod content;
pub mod review;
pub mod session;
pub mod storage;
pub mod sync;

pub use cache::{CacheEntry, LocalCache};
pub use content::{register_item, ContentStore, ItemKind, LearnableItem, MemoryContentStore};
pub use review::{
    calculate_next_review, preview_intervals, DueOrdering, Grade, MemoryReviewStore, ReviewKey,
    ReviewLogEntry, ReviewState, ReviewStatus, ReviewStore, ReviewUpdate, ScheduleError,
    StoreError, UpsertAction, UpsertOutcome,
};
pub use session::{
    DueCounts, GradeOutcome, Persistence, ReviewSession, SessionCard, SessionContext,
    SessionError, SessionOptions, SessionPhase, SessionStats,
};
pub use storage::{FileStore, KeyValueStore, MemoryStore, StorageError};
pub use sync::{FlushReport, PendingReview, SyncError, SyncQueue};
