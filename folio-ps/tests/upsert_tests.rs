//! Integration tests for the upsert-merge service
//!
//! Tests cover:
//! - First visit, regressive samples and completion crossing
//! - Validation and unknown-article rejection before any write
//! - Conflict retries: recovery after a lost race, exhaustion, fatal errors

mod helpers;

use std::sync::atomic::Ordering;
use std::sync::Arc;

use chrono::Utc;
use folio_common::{ProgressDelta, ProgressRecord, ProgressUpdate, MAX_TIME_SPENT};
use folio_ps::store::{ProgressStore, SqliteProgressStore};
use folio_ps::ApiError;
use helpers::*;

fn update(article_id: &str, progress: i64, time_spent: i64) -> ProgressUpdate {
    ProgressUpdate {
        article_id: article_id.to_string(),
        progress,
        time_spent,
    }
}

fn sqlite_service(pool: &sqlx::SqlitePool) -> folio_ps::upsert::ProgressService {
    service_with_store(pool, Arc::new(SqliteProgressStore::new(pool.clone())))
}

// =============================================================================
// Merge semantics
// =============================================================================

#[tokio::test]
async fn test_first_visit_creates_record() {
    let (_temp, pool) = create_test_db().await;
    let service = sqlite_service(&pool);

    let outcome = service.upsert(ALICE, &update(ARTICLE, 40, 12)).await.unwrap();

    assert!(outcome.created);
    assert_eq!(outcome.record.progress, 40);
    assert_eq!(outcome.record.time_spent, 12);
    assert!(!outcome.record.completed);
    assert_eq!(outcome.record.first_visited_at, outcome.record.last_visited_at);
}

#[tokio::test]
async fn test_regressive_sample_keeps_progress() {
    let (_temp, pool) = create_test_db().await;
    let service = sqlite_service(&pool);

    let first = service.upsert(ALICE, &update(ARTICLE, 60, 100)).await.unwrap();
    let second = service.upsert(ALICE, &update(ARTICLE, 30, 5)).await.unwrap();

    assert!(!second.created);
    assert_eq!(second.record.progress, 60);
    assert_eq!(second.record.time_spent, 105);
    assert!(!second.record.completed);
    assert_eq!(second.record.first_visited_at, first.record.first_visited_at);
    assert!(second.record.last_visited_at >= first.record.last_visited_at);
}

#[tokio::test]
async fn test_crossing_threshold_completes() {
    let (_temp, pool) = create_test_db().await;
    let service = sqlite_service(&pool);

    service.upsert(ALICE, &update(ARTICLE, 70, 0)).await.unwrap();
    let outcome = service.upsert(ALICE, &update(ARTICLE, 90, 3)).await.unwrap();

    assert_eq!(outcome.record.progress, 90);
    assert!(outcome.record.completed);

    // Sticky: a later low sample does not clear it
    let later = service.upsert(ALICE, &update(ARTICLE, 10, 1)).await.unwrap();
    assert!(later.record.completed);
    assert_eq!(later.record.progress, 90);
}

#[tokio::test]
async fn test_huge_time_spent_keeps_record_writable() {
    let (_temp, pool) = create_test_db().await;
    let service = sqlite_service(&pool);

    let first = service.upsert(ALICE, &update(ARTICLE, 10, i64::MAX)).await.unwrap();
    assert_eq!(first.record.time_spent, MAX_TIME_SPENT);

    // Total is capped instead of overflowing the column
    let second = service.upsert(ALICE, &update(ARTICLE, 90, 1)).await.unwrap();
    assert_eq!(second.record.progress, 90);
    assert!(second.record.completed);
    assert_eq!(second.record.time_spent, MAX_TIME_SPENT);

    let stored = SqliteProgressStore::new(pool.clone())
        .find(ALICE, ARTICLE)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.record.progress, 90);
    assert_eq!(stored.record.time_spent, MAX_TIME_SPENT);
}

#[tokio::test]
async fn test_exact_threshold_completes_on_first_visit() {
    let (_temp, pool) = create_test_db().await;
    let service = sqlite_service(&pool);

    let outcome = service.upsert(ALICE, &update(ARTICLE, 85, 0)).await.unwrap();
    assert!(outcome.record.completed);
}

#[tokio::test]
async fn test_records_are_per_member_and_article() {
    let (_temp, pool) = create_test_db().await;
    let service = sqlite_service(&pool);

    service.upsert(ALICE, &update(ARTICLE, 50, 10)).await.unwrap();
    service.upsert(ALICE, &update(OTHER_ARTICLE, 20, 4)).await.unwrap();
    service.upsert(BOB, &update(ARTICLE, 5, 1)).await.unwrap();

    let alice = service.list(ALICE).await.unwrap();
    assert_eq!(alice.len(), 2);

    let bob = service.get(BOB, ARTICLE).await.unwrap().unwrap();
    assert_eq!(bob.progress, 5);
    assert_eq!(bob.time_spent, 1);

    assert!(service.get(BOB, OTHER_ARTICLE).await.unwrap().is_none());
}

// =============================================================================
// Preconditions
// =============================================================================

#[tokio::test]
async fn test_out_of_range_rejected_without_write() {
    let (_temp, pool) = create_test_db().await;
    let service = sqlite_service(&pool);

    for bad in [update(ARTICLE, 101, 0), update(ARTICLE, -1, 0), update(ARTICLE, 50, -5)] {
        let result = service.upsert(ALICE, &bad).await;
        assert!(matches!(result, Err(ApiError::BadRequest(_))), "{:?}", bad);
    }

    assert_eq!(row_count(&pool, ALICE, ARTICLE).await, 0);
}

#[tokio::test]
async fn test_unknown_article_rejected_without_write() {
    let (_temp, pool) = create_test_db().await;
    let service = sqlite_service(&pool);

    let result = service.upsert(ALICE, &update("missing", 10, 1)).await;
    assert!(matches!(result, Err(ApiError::NotFound(_))));
    assert_eq!(row_count(&pool, ALICE, "missing").await, 0);

    let result = service.get(ALICE, "missing").await;
    assert!(matches!(result, Err(ApiError::NotFound(_))));
}

// =============================================================================
// Conflict handling
// =============================================================================

#[tokio::test]
async fn test_lost_create_race_merges_into_winner() {
    let (_temp, pool) = create_test_db().await;

    // Another tab creates the record between our read and our insert
    let competitor = ProgressRecord::first_visit(
        ALICE,
        &ProgressDelta {
            article_id: ARTICLE.to_string(),
            progress: 30,
            time_spent: 10,
        },
        Utc::now(),
    );
    let store = Arc::new(RacingStore::new(&pool, competitor));
    let service = service_with_store(&pool, store.clone());

    let outcome = service.upsert(ALICE, &update(ARTICLE, 20, 5)).await.unwrap();

    assert!(!outcome.created, "retry should update the winner's record");
    assert_eq!(outcome.record.progress, 30);
    assert_eq!(outcome.record.time_spent, 15);
    assert_eq!(store.finds.load(Ordering::SeqCst), 2);
    assert_eq!(row_count(&pool, ALICE, ARTICLE).await, 1);
}

#[tokio::test]
async fn test_lost_update_race_keeps_both_contributions() {
    let (_temp, pool) = create_test_db().await;
    sqlite_service(&pool)
        .upsert(ALICE, &update(ARTICLE, 40, 100))
        .await
        .unwrap();

    let competitor = ProgressRecord::first_visit(
        ALICE,
        &ProgressDelta {
            article_id: ARTICLE.to_string(),
            progress: 88,
            time_spent: 7,
        },
        Utc::now(),
    );
    let store = Arc::new(RacingStore::new(&pool, competitor));
    let service = service_with_store(&pool, store.clone());

    let outcome = service.upsert(ALICE, &update(ARTICLE, 50, 3)).await.unwrap();

    assert_eq!(outcome.record.progress, 88);
    assert_eq!(outcome.record.time_spent, 110);
    assert!(outcome.record.completed);
    assert_eq!(store.finds.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_exhausted_retries_leave_no_write() {
    let (_temp, pool) = create_test_db().await;
    let store = Arc::new(AlwaysConflictStore::new(&pool));
    let service = service_with_store(&pool, store.clone());

    let result = service.upsert(ALICE, &update(ARTICLE, 40, 12)).await;

    assert!(matches!(result, Err(ApiError::RetriesExhausted { attempts: 3 })));
    assert_eq!(store.write_attempts.load(Ordering::SeqCst), 3);
    assert_eq!(row_count(&pool, ALICE, ARTICLE).await, 0);
}

#[tokio::test]
async fn test_exhaustion_preserves_existing_record() {
    let (_temp, pool) = create_test_db().await;
    let before = sqlite_service(&pool)
        .upsert(ALICE, &update(ARTICLE, 40, 12))
        .await
        .unwrap()
        .record;

    let service = service_with_store(&pool, Arc::new(AlwaysConflictStore::new(&pool)));
    let result = service.upsert(ALICE, &update(ARTICLE, 99, 50)).await;
    assert!(matches!(result, Err(ApiError::RetriesExhausted { .. })));

    let after = SqliteProgressStore::new(pool.clone())
        .find(ALICE, ARTICLE)
        .await
        .unwrap()
        .unwrap()
        .record;
    assert_eq!(after, before);
}

#[tokio::test]
async fn test_backend_failure_not_retried() {
    let (_temp, pool) = create_test_db().await;
    let service = service_with_store(&pool, Arc::new(BrokenStore));

    let result = service.upsert(ALICE, &update(ARTICLE, 40, 12)).await;
    assert!(matches!(result, Err(ApiError::Persistence(_))));
}
