//! Child management.
//!
//! Children are owned by the institution. They are soft-deactivated via the
//! `active` flag and never hard-deleted, because historical attendance keeps
//! referencing them.

use anyhow::Result;
use chrono::Local;
use tracing::info;
use uuid::Uuid;

use crate::domain::audit_service::AuditService;
use crate::domain::errors::{DomainError, DomainResult};
use crate::storage::repositories::ChildRepository;
use crate::storage::DbConnection;
use shared::{AuditAction, Child, CreateChildRequest, SetChildActiveRequest, UpdateChildRequest};

#[derive(Clone)]
pub struct ChildService {
    db: DbConnection,
    child_repository: ChildRepository,
    audit: AuditService,
}

impl ChildService {
    pub fn new(db: DbConnection, audit: AuditService) -> Self {
        let child_repository = ChildRepository::new(db.clone());
        Self {
            db,
            child_repository,
            audit,
        }
    }

    pub async fn create_child(&self, request: CreateChildRequest) -> DomainResult<Child> {
        info!(
            "Creating child: {} {}",
            request.first_name, request.last_name
        );

        let first_name = request.first_name.trim();
        let last_name = request.last_name.trim();
        if first_name.is_empty() || last_name.is_empty() {
            return Err(DomainError::Other(anyhow::anyhow!(
                "Child name must not be empty"
            )));
        }

        let now = Local::now().naive_local();
        let child = Child {
            id: Uuid::new_v4().to_string(),
            first_name: first_name.to_string(),
            last_name: last_name.to_string(),
            active: true,
            created_at: now,
            updated_at: now,
        };

        let mut tx = self.db.pool().begin().await?;
        self.child_repository.insert(&mut tx, &child).await?;
        self.audit
            .append(
                &mut tx,
                &request.acting_user,
                AuditAction::Create,
                "Child",
                &child.id,
                None,
                Some(serde_json::json!({
                    "firstName": child.first_name,
                    "lastName": child.last_name,
                })),
            )
            .await?;
        tx.commit().await?;

        Ok(child)
    }

    pub async fn update_child(
        &self,
        child_id: &str,
        request: UpdateChildRequest,
    ) -> DomainResult<Child> {
        let mut child = self.require_child(child_id).await?;
        let previous = serde_json::json!({
            "firstName": child.first_name,
            "lastName": child.last_name,
        });

        if let Some(first_name) = request.first_name {
            child.first_name = first_name.trim().to_string();
        }
        if let Some(last_name) = request.last_name {
            child.last_name = last_name.trim().to_string();
        }
        if child.first_name.is_empty() || child.last_name.is_empty() {
            return Err(DomainError::Other(anyhow::anyhow!(
                "Child name must not be empty"
            )));
        }
        child.updated_at = Local::now().naive_local();

        let mut tx = self.db.pool().begin().await?;
        self.child_repository.update(&mut tx, &child).await?;
        self.audit
            .append(
                &mut tx,
                &request.acting_user,
                AuditAction::Update,
                "Child",
                child_id,
                Some(previous),
                Some(serde_json::json!({
                    "firstName": child.first_name,
                    "lastName": child.last_name,
                })),
            )
            .await?;
        tx.commit().await?;

        Ok(child)
    }

    /// Soft-deactivate or reactivate a child. Deactivated children keep all
    /// historical attendance and excuses.
    pub async fn set_child_active(
        &self,
        child_id: &str,
        request: SetChildActiveRequest,
    ) -> DomainResult<Child> {
        info!("Setting child {} active={}", child_id, request.active);

        let mut child = self.require_child(child_id).await?;
        let previous_active = child.active;
        child.active = request.active;
        child.updated_at = Local::now().naive_local();

        let mut tx = self.db.pool().begin().await?;
        self.child_repository.update(&mut tx, &child).await?;
        self.audit
            .append(
                &mut tx,
                &request.acting_user,
                AuditAction::Update,
                "Child",
                child_id,
                Some(serde_json::json!({ "active": previous_active })),
                Some(serde_json::json!({ "active": child.active })),
            )
            .await?;
        tx.commit().await?;

        Ok(child)
    }

    pub async fn get_child(&self, child_id: &str) -> DomainResult<Child> {
        self.require_child(child_id).await
    }

    /// List children ordered by last name.
    pub async fn list_children(&self, active_only: bool) -> Result<Vec<Child>> {
        self.child_repository.list(active_only).await
    }

    async fn require_child(&self, child_id: &str) -> DomainResult<Child> {
        self.child_repository
            .get(child_id)
            .await?
            .ok_or_else(|| DomainError::not_found("Child", child_id))
    }
}
