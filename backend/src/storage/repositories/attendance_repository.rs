use anyhow::Result;
use chrono::NaiveDate;
use sqlx::{Row, SqliteConnection};

use crate::storage::db::DbConnection;
use shared::Attendance;

/// Repository for per-child, per-day attendance records.
///
/// The table enforces one record per (child_id, date); writes that touch the
/// same key overwrite rather than duplicate.
#[derive(Clone)]
pub struct AttendanceRepository {
    db: DbConnection,
}

impl AttendanceRepository {
    pub fn new(db: DbConnection) -> Self {
        Self { db }
    }

    /// Upsert on the (child_id, date) key. The original row id survives an
    /// overwrite so excuse links established under it stay resolvable.
    pub async fn upsert(&self, conn: &mut SqliteConnection, record: &Attendance) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO attendance
                (id, child_id, date, presence, excuse_status, excuse_id, recorded_by, recorded_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(child_id, date) DO UPDATE SET
                presence = excluded.presence,
                excuse_status = excluded.excuse_status,
                excuse_id = excluded.excuse_id,
                recorded_by = excluded.recorded_by,
                recorded_at = excluded.recorded_at
            "#,
        )
        .bind(&record.id)
        .bind(&record.child_id)
        .bind(record.date)
        .bind(record.presence.as_str())
        .bind(record.excuse_status.as_str())
        .bind(&record.excuse_id)
        .bind(&record.recorded_by)
        .bind(record.recorded_at)
        .execute(&mut *conn)
        .await?;
        Ok(())
    }

    /// Link an excuse to an ABSENT record on one day and set its status.
    /// Returns the number of rows touched (0 when no record exists or the
    /// child was present).
    pub async fn link_excuse_for_day(
        &self,
        conn: &mut SqliteConnection,
        child_id: &str,
        date: NaiveDate,
        excuse_id: &str,
        status: shared::ExcuseStatus,
    ) -> Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE attendance
            SET excuse_id = ?, excuse_status = ?
            WHERE child_id = ? AND date = ? AND presence = 'ABSENT'
            "#,
        )
        .bind(excuse_id)
        .bind(status.as_str())
        .bind(child_id)
        .bind(date)
        .execute(&mut *conn)
        .await?;
        Ok(result.rows_affected())
    }

    /// Update the status of every ABSENT record currently linked to an
    /// excuse.
    pub async fn set_status_for_excuse(
        &self,
        conn: &mut SqliteConnection,
        excuse_id: &str,
        status: shared::ExcuseStatus,
    ) -> Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE attendance
            SET excuse_status = ?
            WHERE excuse_id = ? AND presence = 'ABSENT'
            "#,
        )
        .bind(status.as_str())
        .bind(excuse_id)
        .execute(&mut *conn)
        .await?;
        Ok(result.rows_affected())
    }

    /// Same as [`set_status_for_excuse`](Self::set_status_for_excuse) but
    /// constrained to a single day. Used when re-propagating over an edited
    /// date range.
    pub async fn set_status_for_excuse_on_day(
        &self,
        conn: &mut SqliteConnection,
        excuse_id: &str,
        date: NaiveDate,
        status: shared::ExcuseStatus,
    ) -> Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE attendance
            SET excuse_status = ?
            WHERE excuse_id = ? AND date = ? AND presence = 'ABSENT'
            "#,
        )
        .bind(status.as_str())
        .bind(excuse_id)
        .bind(date)
        .execute(&mut *conn)
        .await?;
        Ok(result.rows_affected())
    }

    /// Clear the excuse link on every record referencing an excuse and force
    /// the status to UNEXCUSED. Deleting an excuse never leaves covered days
    /// silently excused.
    pub async fn clear_excuse(&self, conn: &mut SqliteConnection, excuse_id: &str) -> Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE attendance
            SET excuse_id = NULL, excuse_status = 'UNEXCUSED'
            WHERE excuse_id = ?
            "#,
        )
        .bind(excuse_id)
        .execute(&mut *conn)
        .await?;
        Ok(result.rows_affected())
    }

    /// Get one record by its (child_id, date) key.
    pub async fn get(&self, child_id: &str, date: NaiveDate) -> Result<Option<Attendance>> {
        let row = sqlx::query(
            r#"
            SELECT id, child_id, date, presence, excuse_status, excuse_id, recorded_by, recorded_at
            FROM attendance
            WHERE child_id = ? AND date = ?
            "#,
        )
        .bind(child_id)
        .bind(date)
        .fetch_optional(self.db.pool())
        .await?;

        row.as_ref().map(row_to_attendance).transpose()
    }

    /// A child's records over an inclusive range, newest first.
    pub async fn for_child_in_range(
        &self,
        child_id: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<Attendance>> {
        let rows = sqlx::query(
            r#"
            SELECT id, child_id, date, presence, excuse_status, excuse_id, recorded_by, recorded_at
            FROM attendance
            WHERE child_id = ? AND date >= ? AND date <= ?
            ORDER BY date DESC
            "#,
        )
        .bind(child_id)
        .bind(start)
        .bind(end)
        .fetch_all(self.db.pool())
        .await?;

        rows.iter().map(row_to_attendance).collect()
    }

    /// All records for one date.
    pub async fn for_date(&self, date: NaiveDate) -> Result<Vec<Attendance>> {
        let rows = sqlx::query(
            r#"
            SELECT id, child_id, date, presence, excuse_status, excuse_id, recorded_by, recorded_at
            FROM attendance
            WHERE date = ?
            ORDER BY child_id ASC
            "#,
        )
        .bind(date)
        .fetch_all(self.db.pool())
        .await?;

        rows.iter().map(row_to_attendance).collect()
    }

    /// All records in an inclusive date range, across children.
    pub async fn in_range(&self, start: NaiveDate, end: NaiveDate) -> Result<Vec<Attendance>> {
        let rows = sqlx::query(
            r#"
            SELECT id, child_id, date, presence, excuse_status, excuse_id, recorded_by, recorded_at
            FROM attendance
            WHERE date >= ? AND date <= ?
            ORDER BY date ASC, child_id ASC
            "#,
        )
        .bind(start)
        .bind(end)
        .fetch_all(self.db.pool())
        .await?;

        rows.iter().map(row_to_attendance).collect()
    }
}

fn row_to_attendance(row: &sqlx::sqlite::SqliteRow) -> Result<Attendance> {
    let presence: String = row.get("presence");
    let excuse_status: String = row.get("excuse_status");
    Ok(Attendance {
        id: row.get("id"),
        child_id: row.get("child_id"),
        date: row.get("date"),
        presence: presence.parse().map_err(anyhow::Error::msg)?,
        excuse_status: excuse_status.parse().map_err(anyhow::Error::msg)?,
        excuse_id: row.get("excuse_id"),
        recorded_by: row.get("recorded_by"),
        recorded_at: row.get("recorded_at"),
    })
}
