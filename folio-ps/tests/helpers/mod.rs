//! Test Helper Utilities
//!
//! Shared fixtures for folio-ps integration tests

#![allow(dead_code)]

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Request},
    Router,
};
use chrono::Duration as ChronoDuration;
use folio_common::db::init::init_database;
use folio_common::time::now;
use folio_common::ProgressRecord;
use folio_ps::collab::directory::{insert_article, insert_member, insert_session, set_member_banned};
use folio_ps::collab::{SqliteArticleCatalog, SqliteIdentityResolver};
use folio_ps::retry::RetryPolicy;
use folio_ps::store::{ProgressStore, SqliteProgressStore, StoreError, StoredProgress};
use folio_ps::upsert::ProgressService;
use folio_ps::{build_router, AppState};
use serde_json::Value;
use sqlx::SqlitePool;
use tempfile::TempDir;

pub const ALICE: &str = "alice";
pub const ALICE_TOKEN: &str = "alice-session-token";
pub const BOB: &str = "bob";
pub const BOB_TOKEN: &str = "bob-session-token";
pub const MALLORY: &str = "mallory";
pub const MALLORY_TOKEN: &str = "mallory-session-token";
pub const EXPIRED_TOKEN: &str = "expired-session-token";

pub const ARTICLE: &str = "a1";
pub const OTHER_ARTICLE: &str = "a2";

/// Retry policy with short delays so tests stay fast
pub fn fast_retry() -> RetryPolicy {
    RetryPolicy::new(3, Duration::from_millis(2))
}

/// Temporary on-disk database with members, sessions and articles
///
/// The TempDir must be kept alive for the duration of the test.
pub async fn create_test_db() -> (TempDir, SqlitePool) {
    let temp_dir = TempDir::new().expect("Should create temp dir");
    let db_path = temp_dir.path().join("folio_test.db");
    let pool = init_database(&db_path)
        .await
        .expect("Should initialize test database");

    insert_member(&pool, ALICE, "Alice").await.unwrap();
    insert_member(&pool, BOB, "Bob").await.unwrap();
    insert_member(&pool, MALLORY, "Mallory").await.unwrap();
    set_member_banned(&pool, MALLORY, true).await.unwrap();

    insert_session(&pool, ALICE, ALICE_TOKEN, None).await.unwrap();
    insert_session(&pool, BOB, BOB_TOKEN, Some(now() + ChronoDuration::hours(1)))
        .await
        .unwrap();
    insert_session(&pool, MALLORY, MALLORY_TOKEN, None).await.unwrap();
    insert_session(&pool, BOB, EXPIRED_TOKEN, Some(now() - ChronoDuration::minutes(1)))
        .await
        .unwrap();

    insert_article(&pool, ARTICLE, "First article").await.unwrap();
    insert_article(&pool, OTHER_ARTICLE, "Second article").await.unwrap();

    (temp_dir, pool)
}

/// Service over the given store with the SQLite catalog
pub fn service_with_store(pool: &SqlitePool, store: Arc<dyn ProgressStore>) -> ProgressService {
    ProgressService::new(store, Arc::new(SqliteArticleCatalog::new(pool.clone())), fast_retry())
}

/// Router wired to the test database
pub fn test_app(pool: &SqlitePool) -> Router {
    build_router(AppState::from_pool(pool.clone(), fast_retry()))
}

/// Router whose service uses a custom store
pub fn test_app_with_store(pool: &SqlitePool, store: Arc<dyn ProgressStore>) -> Router {
    let state = AppState::new(
        Arc::new(service_with_store(pool, store)),
        Arc::new(SqliteIdentityResolver::new(pool.clone())),
    );
    build_router(state)
}

pub fn get_request(uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::empty()).unwrap()
}

pub fn patch_request(token: Option<&str>, body: Value) -> Request<Body> {
    patch_raw(token, body.to_string())
}

pub fn patch_raw(token: Option<&str>, body: String) -> Request<Body> {
    let mut builder = Request::builder()
        .method("PATCH")
        .uri("/read-progress")
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::from(body)).unwrap()
}

/// Extract JSON body from response
pub async fn extract_json(body: Body) -> Value {
    let bytes = axum::body::to_bytes(body, usize::MAX)
        .await
        .expect("Should read body");
    serde_json::from_slice(&bytes).expect("Should parse JSON")
}

/// Number of rows for a pair, straight from the table
pub async fn row_count(pool: &SqlitePool, member_id: &str, article_id: &str) -> i64 {
    sqlx::query_scalar("SELECT COUNT(*) FROM read_progress WHERE member_id = ? AND article_id = ?")
        .bind(member_id)
        .bind(article_id)
        .fetch_one(pool)
        .await
        .unwrap()
}

/// Store whose writes always conflict
///
/// Reads pass through, so the merge logic runs normally on every attempt.
pub struct AlwaysConflictStore {
    inner: SqliteProgressStore,
    pub write_attempts: AtomicU32,
}

impl AlwaysConflictStore {
    pub fn new(pool: &SqlitePool) -> Self {
        Self {
            inner: SqliteProgressStore::new(pool.clone()),
            write_attempts: AtomicU32::new(0),
        }
    }
}

#[async_trait]
impl ProgressStore for AlwaysConflictStore {
    async fn find(
        &self,
        member_id: &str,
        article_id: &str,
    ) -> Result<Option<StoredProgress>, StoreError> {
        self.inner.find(member_id, article_id).await
    }

    async fn insert(&self, _record: &ProgressRecord) -> Result<StoredProgress, StoreError> {
        self.write_attempts.fetch_add(1, Ordering::SeqCst);
        Err(StoreError::Conflict("injected".to_string()))
    }

    async fn update(
        &self,
        _record: &ProgressRecord,
        _expected_revision: i64,
    ) -> Result<StoredProgress, StoreError> {
        self.write_attempts.fetch_add(1, Ordering::SeqCst);
        Err(StoreError::Conflict("injected".to_string()))
    }

    async fn list_for_member(&self, member_id: &str) -> Result<Vec<ProgressRecord>, StoreError> {
        self.inner.list_for_member(member_id).await
    }
}

/// Store that lets a competing writer commit right after our first read
///
/// The first `find` for a pair is followed by a write of `competitor`'s
/// delta through the inner store, so the caller's own write then races a
/// committed change exactly once.
pub struct RacingStore {
    inner: SqliteProgressStore,
    competitor: ProgressRecord,
    raced: std::sync::Mutex<bool>,
    pub finds: AtomicU32,
}

impl RacingStore {
    pub fn new(pool: &SqlitePool, competitor: ProgressRecord) -> Self {
        Self {
            inner: SqliteProgressStore::new(pool.clone()),
            competitor,
            raced: std::sync::Mutex::new(false),
            finds: AtomicU32::new(0),
        }
    }

    fn take_race(&self) -> bool {
        let mut raced = self.raced.lock().unwrap();
        let first = !*raced;
        *raced = true;
        first
    }
}

#[async_trait]
impl ProgressStore for RacingStore {
    async fn find(
        &self,
        member_id: &str,
        article_id: &str,
    ) -> Result<Option<StoredProgress>, StoreError> {
        self.finds.fetch_add(1, Ordering::SeqCst);
        let seen = self.inner.find(member_id, article_id).await?;

        if self.take_race() {
            match &seen {
                Some(current) => {
                    let delta = folio_common::ProgressDelta {
                        article_id: self.competitor.article_id.clone(),
                        progress: self.competitor.progress,
                        time_spent: self.competitor.time_spent,
                    };
                    let merged = current.record.merged(&delta, now());
                    self.inner.update(&merged, current.revision).await?;
                }
                None => {
                    self.inner.insert(&self.competitor).await?;
                }
            }
        }

        Ok(seen)
    }

    async fn insert(&self, record: &ProgressRecord) -> Result<StoredProgress, StoreError> {
        self.inner.insert(record).await
    }

    async fn update(
        &self,
        record: &ProgressRecord,
        expected_revision: i64,
    ) -> Result<StoredProgress, StoreError> {
        self.inner.update(record, expected_revision).await
    }

    async fn list_for_member(&self, member_id: &str) -> Result<Vec<ProgressRecord>, StoreError> {
        self.inner.list_for_member(member_id).await
    }
}

/// Store whose reads fail with a non-conflict error
pub struct BrokenStore;

#[async_trait]
impl ProgressStore for BrokenStore {
    async fn find(&self, _: &str, _: &str) -> Result<Option<StoredProgress>, StoreError> {
        Err(StoreError::Backend("disk I/O error".to_string()))
    }

    async fn insert(&self, _: &ProgressRecord) -> Result<StoredProgress, StoreError> {
        Err(StoreError::Backend("disk I/O error".to_string()))
    }

    async fn update(&self, _: &ProgressRecord, _: i64) -> Result<StoredProgress, StoreError> {
        Err(StoreError::Backend("disk I/O error".to_string()))
    }

    async fn list_for_member(&self, _: &str) -> Result<Vec<ProgressRecord>, StoreError> {
        Err(StoreError::Backend("disk I/O error".to_string()))
    }
}
