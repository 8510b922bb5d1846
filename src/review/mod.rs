//! Review scheduling: SM-2 algorithm, state models, and the store boundary

pub mod algorithm;
pub mod models;
pub mod store;

pub use algorithm::{
    calculate_next_review, preview_intervals, Grade, ReviewUpdate, ScheduleError,
};
pub use models::{ReviewKey, ReviewLogEntry, ReviewState, ReviewStatus};
pub use store::{
    DueOrdering, MemoryReviewStore, ReviewStore, StoreError, UpsertAction, UpsertOutcome,
};
