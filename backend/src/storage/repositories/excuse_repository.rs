use anyhow::Result;
use chrono::{NaiveDate, NaiveDateTime};
use sqlx::{Row, SqliteConnection};

use crate::storage::db::DbConnection;
use shared::Excuse;

/// Optional filters for listing excuses on the director surface.
#[derive(Debug, Clone, Default)]
pub struct ExcuseFilter {
    pub child_id: Option<String>,
    /// Keep excuses whose from_date falls on or after this date.
    pub start_date: Option<NaiveDate>,
    /// Keep excuses whose from_date falls on or before this date.
    pub end_date: Option<NaiveDate>,
    pub auto_approved: Option<bool>,
}

/// Repository for absence excuses.
#[derive(Clone)]
pub struct ExcuseRepository {
    db: DbConnection,
}

impl ExcuseRepository {
    pub fn new(db: DbConnection) -> Self {
        Self { db }
    }

    pub async fn insert(&self, conn: &mut SqliteConnection, excuse: &Excuse) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO excuses
                (id, child_id, from_date, to_date, reason, submitted_by, submitted_at, auto_approved)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&excuse.id)
        .bind(&excuse.child_id)
        .bind(excuse.from_date)
        .bind(excuse.to_date)
        .bind(&excuse.reason)
        .bind(&excuse.submitted_by)
        .bind(excuse.submitted_at)
        .bind(excuse.auto_approved)
        .execute(&mut *conn)
        .await?;
        Ok(())
    }

    pub async fn update(&self, conn: &mut SqliteConnection, excuse: &Excuse) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE excuses
            SET from_date = ?, to_date = ?, reason = ?, auto_approved = ?
            WHERE id = ?
            "#,
        )
        .bind(excuse.from_date)
        .bind(excuse.to_date)
        .bind(&excuse.reason)
        .bind(excuse.auto_approved)
        .bind(&excuse.id)
        .execute(&mut *conn)
        .await?;
        Ok(())
    }

    pub async fn delete(&self, conn: &mut SqliteConnection, excuse_id: &str) -> Result<()> {
        sqlx::query("DELETE FROM excuses WHERE id = ?")
            .bind(excuse_id)
            .execute(&mut *conn)
            .await?;
        Ok(())
    }

    pub async fn get(&self, excuse_id: &str) -> Result<Option<Excuse>> {
        let row = sqlx::query(
            r#"
            SELECT id, child_id, from_date, to_date, reason, submitted_by, submitted_at, auto_approved
            FROM excuses
            WHERE id = ?
            "#,
        )
        .bind(excuse_id)
        .fetch_optional(self.db.pool())
        .await?;

        row.as_ref().map(row_to_excuse).transpose()
    }

    /// The excuse covering a given child/day, if any. When ranges overlap the
    /// most recently submitted one wins; no merge is attempted.
    pub async fn covering(
        &self,
        conn: &mut SqliteConnection,
        child_id: &str,
        date: NaiveDate,
    ) -> Result<Option<Excuse>> {
        let row = sqlx::query(
            r#"
            SELECT id, child_id, from_date, to_date, reason, submitted_by, submitted_at, auto_approved
            FROM excuses
            WHERE child_id = ? AND from_date <= ? AND to_date >= ?
            ORDER BY submitted_at DESC
            LIMIT 1
            "#,
        )
        .bind(child_id)
        .bind(date)
        .bind(date)
        .fetch_optional(&mut *conn)
        .await?;

        row.as_ref().map(row_to_excuse).transpose()
    }

    /// A child's excuses, newest first.
    pub async fn list_for_child(&self, child_id: &str, limit: u32) -> Result<Vec<Excuse>> {
        let rows = sqlx::query(
            r#"
            SELECT id, child_id, from_date, to_date, reason, submitted_by, submitted_at, auto_approved
            FROM excuses
            WHERE child_id = ?
            ORDER BY submitted_at DESC
            LIMIT ?
            "#,
        )
        .bind(child_id)
        .bind(limit)
        .fetch_all(self.db.pool())
        .await?;

        rows.iter().map(row_to_excuse).collect()
    }

    /// All excuses matching a filter, newest first.
    pub async fn list_filtered(&self, filter: &ExcuseFilter) -> Result<Vec<Excuse>> {
        let rows = sqlx::query(
            r#"
            SELECT id, child_id, from_date, to_date, reason, submitted_by, submitted_at, auto_approved
            FROM excuses
            WHERE (? IS NULL OR child_id = ?)
              AND (? IS NULL OR from_date >= ?)
              AND (? IS NULL OR from_date <= ?)
              AND (? IS NULL OR auto_approved = ?)
            ORDER BY submitted_at DESC
            "#,
        )
        .bind(&filter.child_id)
        .bind(&filter.child_id)
        .bind(filter.start_date)
        .bind(filter.start_date)
        .bind(filter.end_date)
        .bind(filter.end_date)
        .bind(filter.auto_approved)
        .bind(filter.auto_approved)
        .fetch_all(self.db.pool())
        .await?;

        rows.iter().map(row_to_excuse).collect()
    }

    /// Late excuses submitted since a cutoff, newest first. Feeds the
    /// director dashboard's review queue.
    pub async fn pending_since(&self, since: NaiveDateTime, limit: u32) -> Result<Vec<Excuse>> {
        let rows = sqlx::query(
            r#"
            SELECT id, child_id, from_date, to_date, reason, submitted_by, submitted_at, auto_approved
            FROM excuses
            WHERE auto_approved = 0 AND submitted_at >= ?
            ORDER BY submitted_at DESC
            LIMIT ?
            "#,
        )
        .bind(since)
        .bind(limit)
        .fetch_all(self.db.pool())
        .await?;

        rows.iter().map(row_to_excuse).collect()
    }
}

fn row_to_excuse(row: &sqlx::sqlite::SqliteRow) -> Result<Excuse> {
    Ok(Excuse {
        id: row.get("id"),
        child_id: row.get("child_id"),
        from_date: row.get("from_date"),
        to_date: row.get("to_date"),
        reason: row.get("reason"),
        submitted_by: row.get("submitted_by"),
        submitted_at: row.get("submitted_at"),
        auto_approved: row.get("auto_approved"),
    })
}
