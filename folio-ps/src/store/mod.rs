//! Progress persistence
//!
//! The store offers conditional writes only: `insert` fails if the pair
//! already has a row and `update` fails unless the stored revision still
//! matches the one that was read. Both failures are reported as
//! [`StoreError::Conflict`], which is the only error the upsert loop retries.

use async_trait::async_trait;
use folio_common::ProgressRecord;
use thiserror::Error;

mod sqlite;

pub use sqlite::SqliteProgressStore;

/// Storage errors
#[derive(Debug, Error)]
pub enum StoreError {
    /// A concurrent writer committed between our read and our write
    #[error("write conflict: {0}")]
    Conflict(String),

    /// Any other storage failure
    #[error("storage backend error: {0}")]
    Backend(String),
}

impl StoreError {
    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::Conflict(_))
    }
}

/// A record together with the revision it was read at
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredProgress {
    pub record: ProgressRecord,
    pub revision: i64,
}

/// Record store keyed by (member, article)
#[async_trait]
pub trait ProgressStore: Send + Sync {
    /// Fetch the record for a pair, if any
    async fn find(
        &self,
        member_id: &str,
        article_id: &str,
    ) -> Result<Option<StoredProgress>, StoreError>;

    /// Create the first record for a pair
    ///
    /// Returns `Conflict` if a record already exists.
    async fn insert(&self, record: &ProgressRecord) -> Result<StoredProgress, StoreError>;

    /// Replace a record if it is still at `expected_revision`
    ///
    /// Returns `Conflict` if another write advanced the revision.
    async fn update(
        &self,
        record: &ProgressRecord,
        expected_revision: i64,
    ) -> Result<StoredProgress, StoreError>;

    /// All records of one member, most recently visited first
    async fn list_for_member(&self, member_id: &str) -> Result<Vec<ProgressRecord>, StoreError>;
}
