//! Offline sync: durable queue of grading actions replayed on reconnect

pub mod queue;

use thiserror::Error;

pub use queue::{FlushReport, PendingReview, SyncQueue};

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Storage error: {0}")]
    Storage(#[from] crate::storage::StorageError),
}
