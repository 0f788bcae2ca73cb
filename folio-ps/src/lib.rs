//! folio-ps library - Progress Service
//!
//! Persists per-member reading progress. Every write is an upsert-merge:
//! progress never regresses, time spent accumulates, completion is sticky.

use std::sync::Arc;

use axum::Router;
use sqlx::SqlitePool;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub mod api;
pub mod collab;
pub mod config;
pub mod error;
pub mod retry;
pub mod store;
pub mod upsert;

pub use error::{ApiError, ApiResult};

use collab::{IdentityResolver, SqliteArticleCatalog, SqliteIdentityResolver};
use retry::RetryPolicy;
use store::SqliteProgressStore;
use upsert::ProgressService;

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Progress operations (upsert, lookup)
    pub progress: Arc<ProgressService>,
    /// Resolves bearer tokens to members
    pub identity: Arc<dyn IdentityResolver>,
    /// Server start time, reported by /health
    pub startup_time: chrono::DateTime<chrono::Utc>,
}

impl AppState {
    pub fn new(progress: Arc<ProgressService>, identity: Arc<dyn IdentityResolver>) -> Self {
        Self {
            progress,
            identity,
            startup_time: chrono::Utc::now(),
        }
    }

    /// Wire the SQLite-backed store and collaborators onto one pool
    pub fn from_pool(pool: SqlitePool, retry: RetryPolicy) -> Self {
        let progress = ProgressService::new(
            Arc::new(SqliteProgressStore::new(pool.clone())),
            Arc::new(SqliteArticleCatalog::new(pool.clone())),
            retry,
        );
        Self::new(Arc::new(progress), Arc::new(SqliteIdentityResolver::new(pool)))
    }
}

/// Build application router
///
/// `/health` is public; `/read-progress` requires a bearer session token.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::progress_routes())
        .merge(api::health_routes())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
