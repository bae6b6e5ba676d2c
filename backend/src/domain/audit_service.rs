//! Append-only audit trail.
//!
//! Every mutating operation of the engine appends exactly one entry with
//! before/after JSON snapshots, on the same transaction as the mutation
//! itself. Entries are immutable once written and survive deletion of the
//! entity they describe.

use anyhow::Result;
use chrono::Local;
use sqlx::SqliteConnection;
use uuid::Uuid;

use crate::storage::repositories::AuditRepository;
use crate::storage::DbConnection;
use shared::{AuditAction, AuditLogEntry};

#[derive(Clone)]
pub struct AuditService {
    audit_repository: AuditRepository,
}

impl AuditService {
    pub fn new(db: DbConnection) -> Self {
        Self {
            audit_repository: AuditRepository::new(db),
        }
    }

    /// Append one entry on the caller's transaction.
    #[allow(clippy::too_many_arguments)]
    pub async fn append(
        &self,
        conn: &mut SqliteConnection,
        acting_user: &str,
        action: AuditAction,
        entity_type: &str,
        entity_id: &str,
        previous_value: Option<serde_json::Value>,
        new_value: Option<serde_json::Value>,
    ) -> Result<AuditLogEntry> {
        let entry = AuditLogEntry {
            id: Uuid::new_v4().to_string(),
            user_id: acting_user.to_string(),
            action,
            entity_type: entity_type.to_string(),
            entity_id: entity_id.to_string(),
            previous_value,
            new_value,
            created_at: Local::now().naive_local(),
        };

        self.audit_repository.insert(conn, &entry).await?;
        Ok(entry)
    }

    /// The most recent entries in reverse-chronological order.
    pub async fn recent_entries(&self, limit: u32) -> Result<Vec<AuditLogEntry>> {
        self.audit_repository.recent(limit).await
    }

    /// The history of one entity, newest first.
    pub async fn entries_for_entity(
        &self,
        entity_type: &str,
        entity_id: &str,
    ) -> Result<Vec<AuditLogEntry>> {
        self.audit_repository.for_entity(entity_type, entity_id).await
    }
}
