//! SM-2 spaced repetition scheduling
//!
//! Pure computation of the next review state from a grade and the prior
//! state. The caller supplies the clock; nothing here does I/O.
//!
//! Quality grades (0-5):
//! - 0: complete blackout, no recall
//! - 1: incorrect, but remembered upon seeing the answer
//! - 2: incorrect, but the answer seemed easy to recall
//! - 3: correct with serious difficulty
//! - 4: correct after hesitation
//! - 5: perfect response

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::models::{ReviewState, ReviewStatus};

/// Minimum ease factor allowed
const MIN_EASE_FACTOR: f32 = 1.3;

/// Interval after the first successful review, in days
const FIRST_INTERVAL: i32 = 1;

/// Interval after the second successful review, in days
const SECOND_INTERVAL: i32 = 6;

/// An interval beyond this many days marks the item as mastered
const MASTERED_THRESHOLD_DAYS: i32 = 180;

/// Grades below this value count as failures
const PASSING_GRADE: u8 = 3;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ScheduleError {
    #[error("grade out of range 0-5: {0}")]
    GradeOutOfRange(i64),

    #[error("negative interval in prior state: {0}")]
    NegativeInterval(i32),
}

/// A validated SM-2 quality grade in 0-5.
///
/// Out-of-range values are a caller contract violation and are rejected at
/// construction rather than clamped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Grade(u8);

impl Grade {
    /// UI "Again" button
    pub const AGAIN: Grade = Grade(1);
    /// UI "Hard" button
    pub const HARD: Grade = Grade(2);
    /// UI "Good" button
    pub const GOOD: Grade = Grade(3);
    /// UI "Easy" button
    pub const EASY: Grade = Grade(5);

    pub fn new(value: i64) -> Result<Self, ScheduleError> {
        if (0..=5).contains(&value) {
            Ok(Grade(value as u8))
        } else {
            Err(ScheduleError::GradeOutOfRange(value))
        }
    }

    pub fn value(self) -> u8 {
        self.0
    }

    /// Whether this grade counts as a successful recall
    pub fn passed(self) -> bool {
        self.0 >= PASSING_GRADE
    }
}

impl TryFrom<u8> for Grade {
    type Error = ScheduleError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Grade::new(value as i64)
    }
}

impl From<Grade> for u8 {
    fn from(grade: Grade) -> u8 {
        grade.0
    }
}

/// Result of computing the next review
#[derive(Debug, Clone, PartialEq)]
pub struct ReviewUpdate {
    pub interval: i32,
    pub ease_factor: f32,
    pub next_review: DateTime<Utc>,
    pub status: ReviewStatus,
}

/// Compute the next review state from a grade and the prior state.
///
/// The ease factor moves by the SM-2 formula for every grade, is floored at
/// 1.3 (no ceiling), and is rounded to two decimal places for storage
/// stability; the interval computation uses the rounded value.
pub fn calculate_next_review(
    prev: &ReviewState,
    grade: Grade,
    now: DateTime<Utc>,
) -> Result<ReviewUpdate, ScheduleError> {
    if prev.interval < 0 {
        return Err(ScheduleError::NegativeInterval(prev.interval));
    }

    // EF' = EF + (0.1 - (5-q) * (0.08 + (5-q) * 0.02))
    let missed = (5 - grade.value()) as f32;
    let ease_factor = round2((prev.ease_factor + (0.1 - missed * (0.08 + missed * 0.02)))
        .max(MIN_EASE_FACTOR));

    let (interval, status) = if grade.passed() {
        let interval = match prev.interval {
            0 => FIRST_INTERVAL,
            1 => SECOND_INTERVAL,
            n => (n as f32 * ease_factor).ceil() as i32,
        };
        let status = if interval > MASTERED_THRESHOLD_DAYS {
            ReviewStatus::Mastered
        } else {
            ReviewStatus::Review
        };
        (interval, status)
    } else {
        // Failure resets the interval no matter how long it had grown
        (1, ReviewStatus::Learning)
    };

    Ok(ReviewUpdate {
        interval,
        ease_factor,
        next_review: now + Duration::days(interval as i64),
        status,
    })
}

/// Intervals each UI grade (Again, Hard, Good, Easy) would produce,
/// for rendering button labels.
pub fn preview_intervals(
    prev: &ReviewState,
    now: DateTime<Utc>,
) -> Result<[i32; 4], ScheduleError> {
    Ok([
        calculate_next_review(prev, Grade::AGAIN, now)?.interval,
        calculate_next_review(prev, Grade::HARD, now)?.interval,
        calculate_next_review(prev, Grade::GOOD, now)?.interval,
        calculate_next_review(prev, Grade::EASY, now)?.interval,
    ])
}

fn round2(value: f32) -> f32 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::ItemKind;

    fn state(interval: i32, ease_factor: f32) -> ReviewState {
        let mut state = ReviewState::new("item-1", ItemKind::Sentence);
        state.interval = interval;
        state.ease_factor = ease_factor;
        state
    }

    #[test]
    fn grade_rejects_out_of_range() {
        assert!(Grade::new(-1).is_err());
        assert!(Grade::new(6).is_err());
        for g in 0..=5 {
            assert!(Grade::new(g).is_ok());
        }
    }

    #[test]
    fn negative_interval_rejected() {
        let prev = state(-1, 2.5);
        let err = calculate_next_review(&prev, Grade::GOOD, Utc::now()).unwrap_err();
        assert_eq!(err, ScheduleError::NegativeInterval(-1));
    }

    #[test]
    fn ease_factor_never_below_floor() {
        for g in 0..=5 {
            let grade = Grade::new(g).unwrap();
            for ef in [1.3_f32, 1.5, 2.0, 2.5, 3.0] {
                let prev = state(10, ef);
                let update = calculate_next_review(&prev, grade, Utc::now()).unwrap();
                assert!(
                    update.ease_factor >= 1.3,
                    "grade {} ef {} -> {}",
                    g,
                    ef,
                    update.ease_factor
                );
            }
        }
    }

    #[test]
    fn failing_grades_reset_to_learning() {
        for g in 0..3 {
            let grade = Grade::new(g).unwrap();
            for interval in [0, 1, 6, 100] {
                let prev = state(interval, 2.5);
                let update = calculate_next_review(&prev, grade, Utc::now()).unwrap();
                assert_eq!(update.interval, 1);
                assert_eq!(update.status, ReviewStatus::Learning);
            }
        }
    }

    #[test]
    fn success_ladder() {
        let now = Utc::now();

        // First success: interval 0 -> 1
        let update = calculate_next_review(&state(0, 2.5), Grade::EASY, now).unwrap();
        assert_eq!(update.interval, 1);
        assert_eq!(update.status, ReviewStatus::Review);
        assert!(update.ease_factor > 2.5);

        // Second success: interval 1 -> 6
        let update = calculate_next_review(&state(1, 2.5), Grade::GOOD, now).unwrap();
        assert_eq!(update.interval, 6);

        // Beyond: ceil(interval * ef')
        let update = calculate_next_review(&state(6, 2.5), Grade::GOOD, now).unwrap();
        assert_eq!(update.ease_factor, 2.36);
        assert_eq!(update.interval, 15); // ceil(6 * 2.36) = 15
        assert_eq!(update.status, ReviewStatus::Review);
    }

    #[test]
    fn mastered_only_past_long_horizon() {
        let now = Utc::now();

        // Lands on 180 exactly (ceil(72 * 2.5)): still Review, not Mastered
        let update = calculate_next_review(&state(72, 2.4), Grade::EASY, now).unwrap();
        assert_eq!(update.ease_factor, 2.5);
        assert_eq!(update.interval, 180);
        assert_eq!(update.status, ReviewStatus::Review);

        let update = calculate_next_review(&state(100, 2.5), Grade::EASY, now).unwrap();
        assert_eq!(update.ease_factor, 2.6);
        assert_eq!(update.interval, 260);
        assert_eq!(update.status, ReviewStatus::Mastered);

        // A failure never yields Mastered, whatever the prior interval
        let update = calculate_next_review(&state(500, 2.5), Grade::AGAIN, now).unwrap();
        assert_eq!(update.status, ReviewStatus::Learning);
    }

    #[test]
    fn next_review_is_interval_days_out() {
        let now = Utc::now();
        let update = calculate_next_review(&state(1, 2.5), Grade::GOOD, now).unwrap();
        assert_eq!(update.next_review, now + Duration::days(6));
    }

    #[test]
    fn preview_matches_individual_grades() {
        let now = Utc::now();
        let prev = state(6, 2.5);
        let previews = preview_intervals(&prev, now).unwrap();
        assert_eq!(previews[0], 1); // Again
        assert_eq!(previews[1], 1); // Hard (fails, resets)
        assert_eq!(previews[2], 15); // Good
        assert_eq!(previews[3], 16); // Easy: ceil(6 * 2.6)
    }
}
