//! SQLite adapters for the collaborator traits

use async_trait::async_trait;
use folio_common::api::hash_session_token;
use folio_common::time::{now, parse_rfc3339};
use folio_common::Result;
use sqlx::SqlitePool;
use tracing::debug;

use super::{ArticleCatalog, CallerIdentity, IdentityResolver};

/// Looks up `sessions` by token digest and checks the member's ban flag
#[derive(Clone)]
pub struct SqliteIdentityResolver {
    pool: SqlitePool,
}

impl SqliteIdentityResolver {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl IdentityResolver for SqliteIdentityResolver {
    async fn resolve_caller(&self, token: &str) -> Result<CallerIdentity> {
        let row: Option<(String, Option<String>, i64)> = sqlx::query_as(
            r#"
            SELECT s.member_id, s.expires_at, m.banned
            FROM sessions s
            JOIN members m ON m.id = s.member_id
            WHERE s.token_hash = ?
            "#,
        )
        .bind(hash_session_token(token))
        .fetch_optional(&self.pool)
        .await?;

        let Some((member_id, expires_at, banned)) = row else {
            debug!("Session token not recognized");
            return Ok(CallerIdentity::Unauthenticated);
        };

        if let Some(expires_at) = expires_at {
            if parse_rfc3339(&expires_at)? <= now() {
                debug!(member_id = %member_id, "Session expired");
                return Ok(CallerIdentity::Unauthenticated);
            }
        }

        if banned != 0 {
            return Ok(CallerIdentity::Forbidden(member_id));
        }

        Ok(CallerIdentity::Member(member_id))
    }
}

/// Checks the `articles` table
#[derive(Clone)]
pub struct SqliteArticleCatalog {
    pool: SqlitePool,
}

impl SqliteArticleCatalog {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ArticleCatalog for SqliteArticleCatalog {
    async fn article_exists(&self, article_id: &str) -> Result<bool> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM articles WHERE id = ?)")
            .bind(article_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(exists)
    }
}
