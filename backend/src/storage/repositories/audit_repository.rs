use anyhow::{Context, Result};
use sqlx::{Row, SqliteConnection};

use crate::storage::db::DbConnection;
use shared::AuditLogEntry;

/// Repository for the append-only audit log.
///
/// The table is insert-only: there is deliberately no update or delete
/// method, and entries referencing deleted entities are kept.
#[derive(Clone)]
pub struct AuditRepository {
    db: DbConnection,
}

impl AuditRepository {
    pub fn new(db: DbConnection) -> Self {
        Self { db }
    }

    /// Append one entry. Runs on the caller's transaction so the entry
    /// commits together with the mutation it describes.
    pub async fn insert(&self, conn: &mut SqliteConnection, entry: &AuditLogEntry) -> Result<()> {
        let previous_value = entry
            .previous_value
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .context("Failed to serialize previous value snapshot")?;
        let new_value = entry
            .new_value
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .context("Failed to serialize new value snapshot")?;

        sqlx::query(
            r#"
            INSERT INTO audit_log
                (id, user_id, action, entity_type, entity_id, previous_value, new_value, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&entry.id)
        .bind(&entry.user_id)
        .bind(entry.action.as_str())
        .bind(&entry.entity_type)
        .bind(&entry.entity_id)
        .bind(previous_value)
        .bind(new_value)
        .bind(entry.created_at)
        .execute(&mut *conn)
        .await?;
        Ok(())
    }

    /// The most recent entries, newest first.
    pub async fn recent(&self, limit: u32) -> Result<Vec<AuditLogEntry>> {
        let rows = sqlx::query(
            r#"
            SELECT id, user_id, action, entity_type, entity_id, previous_value, new_value, created_at
            FROM audit_log
            ORDER BY created_at DESC, rowid DESC
            LIMIT ?
            "#,
        )
        .bind(limit)
        .fetch_all(self.db.pool())
        .await?;

        rows.iter().map(row_to_entry).collect()
    }

    /// All entries for one entity, newest first.
    pub async fn for_entity(&self, entity_type: &str, entity_id: &str) -> Result<Vec<AuditLogEntry>> {
        let rows = sqlx::query(
            r#"
            SELECT id, user_id, action, entity_type, entity_id, previous_value, new_value, created_at
            FROM audit_log
            WHERE entity_type = ? AND entity_id = ?
            ORDER BY created_at DESC, rowid DESC
            "#,
        )
        .bind(entity_type)
        .bind(entity_id)
        .fetch_all(self.db.pool())
        .await?;

        rows.iter().map(row_to_entry).collect()
    }
}

fn row_to_entry(row: &sqlx::sqlite::SqliteRow) -> Result<AuditLogEntry> {
    let action: String = row.get("action");
    let previous_value: Option<String> = row.get("previous_value");
    let new_value: Option<String> = row.get("new_value");

    Ok(AuditLogEntry {
        id: row.get("id"),
        user_id: row.get("user_id"),
        action: action.parse().map_err(anyhow::Error::msg)?,
        entity_type: row.get("entity_type"),
        entity_id: row.get("entity_id"),
        previous_value: previous_value
            .map(|raw| serde_json::from_str(&raw))
            .transpose()
            .context("Malformed previous value snapshot")?,
        new_value: new_value
            .map(|raw| serde_json::from_str(&raw))
            .transpose()
            .context("Malformed new value snapshot")?,
        created_at: row.get("created_at"),
    })
}
