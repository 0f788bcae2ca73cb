//! Reading progress record and merge rules
//!
//! One [`ProgressRecord`] exists per (member, article) pair. Every write folds
//! an incoming [`ProgressDelta`] into the stored record:
//!
//! - `progress` = max(stored, incoming), never regresses
//! - `time_spent` = stored + incoming delta, capped at [`MAX_TIME_SPENT`]
//! - `completed` = stored OR progress >= [`COMPLETION_THRESHOLD`], sticky
//!
//! The rules are commutative for progress/completion and associative for
//! time, so updates from several tabs can be applied in any order.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Progress (inclusive) at which an article counts as completed
pub const COMPLETION_THRESHOLD: u8 = 85;

/// Upper bound of the progress percentage
pub const MAX_PROGRESS: u8 = 100;

/// Largest cumulative reading time a record holds (fits a SQLite INTEGER)
pub const MAX_TIME_SPENT: u64 = i64::MAX as u64;

/// Canonical persisted reading progress for one member and one article
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressRecord {
    pub member_id: String,
    pub article_id: String,
    /// Percentage of the article consumed, 0..=100
    pub progress: u8,
    /// Cumulative active reading time in seconds
    pub time_spent: u64,
    pub first_visited_at: DateTime<Utc>,
    pub last_visited_at: DateTime<Utc>,
    pub completed: bool,
}

impl ProgressRecord {
    /// Record created by the first successful sync of a pair
    pub fn first_visit(member_id: &str, delta: &ProgressDelta, now: DateTime<Utc>) -> Self {
        Self {
            member_id: member_id.to_string(),
            article_id: delta.article_id.clone(),
            progress: delta.progress,
            time_spent: delta.time_spent.min(MAX_TIME_SPENT),
            first_visited_at: now,
            last_visited_at: now,
            completed: reaches_completion(delta.progress),
        }
    }

    /// Fold an incoming delta into this record
    pub fn merged(&self, delta: &ProgressDelta, now: DateTime<Utc>) -> Self {
        let progress = self.progress.max(delta.progress);
        Self {
            member_id: self.member_id.clone(),
            article_id: self.article_id.clone(),
            progress,
            time_spent: self
                .time_spent
                .saturating_add(delta.time_spent)
                .min(MAX_TIME_SPENT),
            first_visited_at: self.first_visited_at,
            last_visited_at: now,
            completed: self.completed || reaches_completion(progress),
        }
    }
}

/// Whether a progress value meets the completion threshold
pub fn reaches_completion(progress: u8) -> bool {
    progress >= COMPLETION_THRESHOLD
}

/// Partial update as sent over the wire (`PATCH /read-progress`)
///
/// Numeric fields are kept signed so out-of-range values reach
/// [`ProgressUpdate::validate`] and are reported as such instead of failing
/// deserialization with a less useful message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressUpdate {
    pub article_id: String,
    pub progress: i64,
    /// Seconds of active reading since the client's last confirmed sync
    #[serde(default)]
    pub time_spent: i64,
}

impl ProgressUpdate {
    /// Check ranges and produce the typed delta used by the merge
    pub fn validate(&self) -> Result<ProgressDelta> {
        let article_id = self.article_id.trim();
        if article_id.is_empty() {
            return Err(Error::InvalidInput("articleId must not be empty".to_string()));
        }

        if !(0..=i64::from(MAX_PROGRESS)).contains(&self.progress) {
            return Err(Error::InvalidInput(format!(
                "progress must be between 0 and {} (got {})",
                MAX_PROGRESS, self.progress
            )));
        }

        if self.time_spent < 0 {
            return Err(Error::InvalidInput(format!(
                "timeSpent must not be negative (got {})",
                self.time_spent
            )));
        }

        Ok(ProgressDelta {
            article_id: article_id.to_string(),
            progress: self.progress as u8,
            time_spent: self.time_spent as u64,
        })
    }
}

/// Validated update ready to be merged
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressDelta {
    pub article_id: String,
    pub progress: u8,
    pub time_spent: u64,
}
