//! Maintenance of the mirrored member, session and article tables
//!
//! Used by `folio-seed` and by tests; production deployments fill these
//! tables from the account service and the content store.

use chrono::{DateTime, Utc};
use folio_common::api::hash_session_token;
use folio_common::time::now;
use folio_common::Result;
use sqlx::SqlitePool;

/// Insert or rename a member
pub async fn insert_member(pool: &SqlitePool, id: &str, display_name: &str) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO members (id, display_name, banned, created_at) VALUES (?, ?, 0, ?)
        ON CONFLICT(id) DO UPDATE SET display_name = excluded.display_name
        "#,
    )
    .bind(id)
    .bind(display_name)
    .bind(now().to_rfc3339())
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn set_member_banned(pool: &SqlitePool, id: &str, banned: bool) -> Result<()> {
    let updated = sqlx::query("UPDATE members SET banned = ? WHERE id = ?")
        .bind(banned)
        .bind(id)
        .execute(pool)
        .await?
        .rows_affected();

    if updated == 0 {
        return Err(folio_common::Error::NotFound(format!("Member not found: {}", id)));
    }
    Ok(())
}

/// Register a session token; only its digest is stored
pub async fn insert_session(
    pool: &SqlitePool,
    member_id: &str,
    token: &str,
    expires_at: Option<DateTime<Utc>>,
) -> Result<()> {
    sqlx::query(
        "INSERT OR REPLACE INTO sessions (token_hash, member_id, expires_at, created_at) \
         VALUES (?, ?, ?, ?)",
    )
    .bind(hash_session_token(token))
    .bind(member_id)
    .bind(expires_at.map(|t| t.to_rfc3339()))
    .bind(now().to_rfc3339())
    .execute(pool)
    .await?;
    Ok(())
}

/// Insert or retitle an article
pub async fn insert_article(pool: &SqlitePool, id: &str, title: &str) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO articles (id, title, created_at) VALUES (?, ?, ?)
        ON CONFLICT(id) DO UPDATE SET title = excluded.title
        "#,
    )
    .bind(id)
    .bind(title)
    .bind(now().to_rfc3339())
    .execute(pool)
    .await?;
    Ok(())
}
