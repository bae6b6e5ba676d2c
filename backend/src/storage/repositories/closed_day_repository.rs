use anyhow::Result;
use chrono::NaiveDate;
use sqlx::{Row, SqliteConnection};

use crate::storage::db::DbConnection;
use shared::ClosedDay;

/// Repository for institution-wide closed days.
#[derive(Clone)]
pub struct ClosedDayRepository {
    db: DbConnection,
}

impl ClosedDayRepository {
    pub fn new(db: DbConnection) -> Self {
        Self { db }
    }

    /// Insert a closed day. The date column carries a UNIQUE constraint, so
    /// adding the same date twice surfaces as a store error.
    pub async fn insert(&self, conn: &mut SqliteConnection, closed_day: &ClosedDay) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO closed_days (id, date, description)
            VALUES (?, ?, ?)
            "#,
        )
        .bind(&closed_day.id)
        .bind(closed_day.date)
        .bind(&closed_day.description)
        .execute(&mut *conn)
        .await?;
        Ok(())
    }

    pub async fn delete(&self, conn: &mut SqliteConnection, id: &str) -> Result<()> {
        sqlx::query("DELETE FROM closed_days WHERE id = ?")
            .bind(id)
            .execute(&mut *conn)
            .await?;
        Ok(())
    }

    pub async fn get(&self, id: &str) -> Result<Option<ClosedDay>> {
        let row = sqlx::query(
            r#"
            SELECT id, date, description
            FROM closed_days
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(self.db.pool())
        .await?;

        row.as_ref().map(row_to_closed_day).transpose()
    }

    /// Whether an exact date match exists. Re-read on every query; the
    /// calendar assumes no caching.
    pub async fn exists_on(&self, date: NaiveDate) -> Result<bool> {
        let row = sqlx::query("SELECT 1 FROM closed_days WHERE date = ?")
            .bind(date)
            .fetch_optional(self.db.pool())
            .await?;
        Ok(row.is_some())
    }

    /// All closed dates within an inclusive range.
    pub async fn dates_in_range(&self, start: NaiveDate, end: NaiveDate) -> Result<Vec<NaiveDate>> {
        let rows = sqlx::query(
            r#"
            SELECT date
            FROM closed_days
            WHERE date >= ? AND date <= ?
            ORDER BY date ASC
            "#,
        )
        .bind(start)
        .bind(end)
        .fetch_all(self.db.pool())
        .await?;

        Ok(rows.iter().map(|row| row.get("date")).collect())
    }

    pub async fn list_in_range(&self, start: NaiveDate, end: NaiveDate) -> Result<Vec<ClosedDay>> {
        let rows = sqlx::query(
            r#"
            SELECT id, date, description
            FROM closed_days
            WHERE date >= ? AND date <= ?
            ORDER BY date ASC
            "#,
        )
        .bind(start)
        .bind(end)
        .fetch_all(self.db.pool())
        .await?;

        rows.iter().map(row_to_closed_day).collect()
    }
}

fn row_to_closed_day(row: &sqlx::sqlite::SqliteRow) -> Result<ClosedDay> {
    Ok(ClosedDay {
        id: row.get("id"),
        date: row.get("date"),
        description: row.get("description"),
    })
}
