//! Upsert-merge of reading progress
//!
//! Preconditions (validation, article existence) are checked once, before
//! any persistence. The read-merge-write cycle then runs inside
//! [`retry_on_conflict`]: every attempt re-reads the record, so a retry
//! merges on top of whatever the competing writer committed and no update
//! is silently lost.

use std::sync::Arc;

use folio_common::time::now;
use folio_common::{ProgressDelta, ProgressRecord, ProgressUpdate};
use tracing::debug;

use crate::collab::ArticleCatalog;
use crate::error::{ApiError, ApiResult};
use crate::retry::{retry_on_conflict, RetryError, RetryPolicy};
use crate::store::{ProgressStore, StoreError};

/// Result of a successful upsert
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpsertOutcome {
    /// Canonical post-merge record
    pub record: ProgressRecord,
    /// Whether this write created the record
    pub created: bool,
}

/// Reading progress operations for authenticated members
pub struct ProgressService {
    store: Arc<dyn ProgressStore>,
    catalog: Arc<dyn ArticleCatalog>,
    retry: RetryPolicy,
}

impl ProgressService {
    pub fn new(
        store: Arc<dyn ProgressStore>,
        catalog: Arc<dyn ArticleCatalog>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            store,
            catalog,
            retry,
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    /// Validate, check the article, then merge the update into the record
    pub async fn upsert(&self, member_id: &str, update: &ProgressUpdate) -> ApiResult<UpsertOutcome> {
        let delta = update.validate()?;
        self.ensure_article(&delta.article_id).await?;
        self.merge(member_id, &delta).await
    }

    /// Read-merge-write with conflict retries; assumes preconditions hold
    pub async fn merge(&self, member_id: &str, delta: &ProgressDelta) -> ApiResult<UpsertOutcome> {
        let store = &self.store;

        let outcome = retry_on_conflict("progress_upsert", self.retry, |attempt| async move {
            let timestamp = now();

            match store.find(member_id, &delta.article_id).await? {
                Some(existing) => {
                    let merged = existing.record.merged(delta, timestamp);
                    let stored = store.update(&merged, existing.revision).await?;
                    debug!(
                        member_id,
                        article_id = %delta.article_id,
                        attempt,
                        revision = stored.revision,
                        progress = stored.record.progress,
                        "Merged reading progress"
                    );
                    Ok::<_, StoreError>(UpsertOutcome {
                        record: stored.record,
                        created: false,
                    })
                }
                None => {
                    let created = ProgressRecord::first_visit(member_id, delta, timestamp);
                    let stored = store.insert(&created).await?;
                    debug!(
                        member_id,
                        article_id = %delta.article_id,
                        attempt,
                        "Created reading progress"
                    );
                    Ok::<_, StoreError>(UpsertOutcome {
                        record: stored.record,
                        created: true,
                    })
                }
            }
        })
        .await;

        outcome.map_err(|err| match err {
            RetryError::Exhausted { attempts, .. } => ApiError::RetriesExhausted { attempts },
            RetryError::Fatal(err) => ApiError::Persistence(err.to_string()),
        })
    }

    /// The caller's record for one article, or `None` if never synced
    pub async fn get(&self, member_id: &str, article_id: &str) -> ApiResult<Option<ProgressRecord>> {
        self.ensure_article(article_id).await?;
        let stored = self.store.find(member_id, article_id).await?;
        Ok(stored.map(|s| s.record))
    }

    /// All of the caller's records
    pub async fn list(&self, member_id: &str) -> ApiResult<Vec<ProgressRecord>> {
        Ok(self.store.list_for_member(member_id).await?)
    }

    async fn ensure_article(&self, article_id: &str) -> ApiResult<()> {
        if self.catalog.article_exists(article_id).await? {
            Ok(())
        } else {
            Err(ApiError::NotFound(format!("Article not found: {}", article_id)))
        }
    }
}
