//! SQLite-backed progress store

use async_trait::async_trait;
use folio_common::time::parse_rfc3339;
use folio_common::ProgressRecord;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use super::{ProgressStore, StoreError, StoredProgress};

const SELECT_COLUMNS: &str = "member_id, article_id, progress, time_spent, \
     first_visited_at, last_visited_at, completed, revision";

/// Progress store on the `read_progress` table
#[derive(Clone)]
pub struct SqliteProgressStore {
    pool: SqlitePool,
}

impl SqliteProgressStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

/// Lock contention is as transient as a lost CAS race
fn classify(err: sqlx::Error) -> StoreError {
    let message = err.to_string();
    if message.contains("database is locked") || message.contains("database table is locked") {
        StoreError::Conflict(message)
    } else {
        StoreError::Backend(message)
    }
}

fn row_to_stored(row: &SqliteRow) -> Result<StoredProgress, StoreError> {
    let progress: i64 = row.get("progress");
    let progress = u8::try_from(progress)
        .map_err(|_| StoreError::Backend(format!("Stored progress out of range: {}", progress)))?;

    let time_spent: i64 = row.get("time_spent");
    let time_spent = u64::try_from(time_spent)
        .map_err(|_| StoreError::Backend(format!("Stored time_spent negative: {}", time_spent)))?;

    let first_visited_at: String = row.get("first_visited_at");
    let last_visited_at: String = row.get("last_visited_at");

    Ok(StoredProgress {
        record: ProgressRecord {
            member_id: row.get("member_id"),
            article_id: row.get("article_id"),
            progress,
            time_spent,
            first_visited_at: parse_rfc3339(&first_visited_at)
                .map_err(|e| StoreError::Backend(e.to_string()))?,
            last_visited_at: parse_rfc3339(&last_visited_at)
                .map_err(|e| StoreError::Backend(e.to_string()))?,
            completed: row.get::<i64, _>("completed") != 0,
        },
        revision: row.get("revision"),
    })
}

fn time_spent_column(record: &ProgressRecord) -> Result<i64, StoreError> {
    i64::try_from(record.time_spent)
        .map_err(|_| StoreError::Backend(format!("time_spent too large: {}", record.time_spent)))
}

#[async_trait]
impl ProgressStore for SqliteProgressStore {
    async fn find(
        &self,
        member_id: &str,
        article_id: &str,
    ) -> Result<Option<StoredProgress>, StoreError> {
        let sql = format!(
            "SELECT {} FROM read_progress WHERE member_id = ? AND article_id = ?",
            SELECT_COLUMNS
        );
        let row = sqlx::query(&sql)
            .bind(member_id)
            .bind(article_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(classify)?;

        row.as_ref().map(row_to_stored).transpose()
    }

    async fn insert(&self, record: &ProgressRecord) -> Result<StoredProgress, StoreError> {
        let inserted = sqlx::query(
            r#"
            INSERT INTO read_progress (
                member_id, article_id, progress, time_spent,
                first_visited_at, last_visited_at, completed, revision
            ) VALUES (?, ?, ?, ?, ?, ?, ?, 1)
            ON CONFLICT(member_id, article_id) DO NOTHING
            "#,
        )
        .bind(&record.member_id)
        .bind(&record.article_id)
        .bind(i64::from(record.progress))
        .bind(time_spent_column(record)?)
        .bind(record.first_visited_at.to_rfc3339())
        .bind(record.last_visited_at.to_rfc3339())
        .bind(record.completed)
        .execute(&self.pool)
        .await
        .map_err(classify)?
        .rows_affected();

        if inserted == 0 {
            return Err(StoreError::Conflict(format!(
                "record for ({}, {}) created concurrently",
                record.member_id, record.article_id
            )));
        }

        Ok(StoredProgress {
            record: record.clone(),
            revision: 1,
        })
    }

    async fn update(
        &self,
        record: &ProgressRecord,
        expected_revision: i64,
    ) -> Result<StoredProgress, StoreError> {
        let updated = sqlx::query(
            r#"
            UPDATE read_progress
            SET progress = ?, time_spent = ?, last_visited_at = ?, completed = ?,
                revision = revision + 1
            WHERE member_id = ? AND article_id = ? AND revision = ?
            "#,
        )
        .bind(i64::from(record.progress))
        .bind(time_spent_column(record)?)
        .bind(record.last_visited_at.to_rfc3339())
        .bind(record.completed)
        .bind(&record.member_id)
        .bind(&record.article_id)
        .bind(expected_revision)
        .execute(&self.pool)
        .await
        .map_err(classify)?
        .rows_affected();

        if updated == 0 {
            return Err(StoreError::Conflict(format!(
                "record for ({}, {}) moved past revision {}",
                record.member_id, record.article_id, expected_revision
            )));
        }

        Ok(StoredProgress {
            record: record.clone(),
            revision: expected_revision + 1,
        })
    }

    async fn list_for_member(&self, member_id: &str) -> Result<Vec<ProgressRecord>, StoreError> {
        let sql = format!(
            "SELECT {} FROM read_progress WHERE member_id = ? \
             ORDER BY last_visited_at DESC, article_id",
            SELECT_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(member_id)
            .fetch_all(&self.pool)
            .await
            .map_err(classify)?;

        rows.iter()
            .map(|row| row_to_stored(row).map(|stored| stored.record))
            .collect()
    }
}
