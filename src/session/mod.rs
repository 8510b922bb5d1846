//! Review sessions: dashboard counts, the active queue, and the summary

mod manager;
mod models;

pub use manager::{ReviewSession, SessionContext, SessionError};
pub use models::{
    DueCounts, GradeOutcome, Persistence, SessionCard, SessionOptions, SessionPhase, SessionStats,
};
