use anyhow::Result;
use sqlx::{Row, SqliteConnection};

use crate::storage::db::DbConnection;
use shared::Child;

/// Repository for child records.
#[derive(Clone)]
pub struct ChildRepository {
    db: DbConnection,
}

impl ChildRepository {
    pub fn new(db: DbConnection) -> Self {
        Self { db }
    }

    /// Insert a new child. Runs on the caller's transaction so the audit
    /// entry commits together with the row.
    pub async fn insert(&self, conn: &mut SqliteConnection, child: &Child) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO children (id, first_name, last_name, active, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&child.id)
        .bind(&child.first_name)
        .bind(&child.last_name)
        .bind(child.active)
        .bind(child.created_at)
        .bind(child.updated_at)
        .execute(&mut *conn)
        .await?;
        Ok(())
    }

    pub async fn update(&self, conn: &mut SqliteConnection, child: &Child) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE children
            SET first_name = ?, last_name = ?, active = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&child.first_name)
        .bind(&child.last_name)
        .bind(child.active)
        .bind(child.updated_at)
        .bind(&child.id)
        .execute(&mut *conn)
        .await?;
        Ok(())
    }

    /// Get a child by ID.
    pub async fn get(&self, child_id: &str) -> Result<Option<Child>> {
        let row = sqlx::query(
            r#"
            SELECT id, first_name, last_name, active, created_at, updated_at
            FROM children
            WHERE id = ?
            "#,
        )
        .bind(child_id)
        .fetch_optional(self.db.pool())
        .await?;

        row.as_ref().map(row_to_child).transpose()
    }

    /// List children ordered by last name, optionally active ones only.
    pub async fn list(&self, active_only: bool) -> Result<Vec<Child>> {
        let sql = if active_only {
            r#"
            SELECT id, first_name, last_name, active, created_at, updated_at
            FROM children
            WHERE active = 1
            ORDER BY last_name ASC, first_name ASC
            "#
        } else {
            r#"
            SELECT id, first_name, last_name, active, created_at, updated_at
            FROM children
            ORDER BY last_name ASC, first_name ASC
            "#
        };

        let rows = sqlx::query(sql).fetch_all(self.db.pool()).await?;
        rows.iter().map(row_to_child).collect()
    }

    pub async fn count_active(&self) -> Result<u32> {
        let row = sqlx::query("SELECT COUNT(*) AS count FROM children WHERE active = 1")
            .fetch_one(self.db.pool())
            .await?;
        let count: i64 = row.get("count");
        Ok(count as u32)
    }
}

fn row_to_child(row: &sqlx::sqlite::SqliteRow) -> Result<Child> {
    Ok(Child {
        id: row.get("id"),
        first_name: row.get("first_name"),
        last_name: row.get("last_name"),
        active: row.get("active"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}
