//! Excuse lifecycle and reconciliation with the attendance ledger.
//!
//! An excuse moves through Created (auto-approved or needing review), may be
//! overridden or edited by a director, and may be deleted. After creation the
//! `auto_approved` flag never changes on its own; only an explicit override
//! or edit touches it. Every transition propagates onto the ABSENT attendance
//! rows the excuse covers and appends one audit entry, all inside a single
//! transaction.

use chrono::{Local, NaiveDate};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::domain::audit_service::AuditService;
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::excuse_rules;
use crate::domain::notifier::{self, ExcuseNotifier, ExcuseSubmittedEvent};
use crate::domain::school_calendar::SchoolCalendar;
use crate::storage::repositories::excuse_repository::ExcuseFilter;
use crate::storage::repositories::{AttendanceRepository, ChildRepository, ExcuseRepository};
use crate::storage::DbConnection;
use shared::{
    AuditAction, DeadlineInfo, EditExcuseRequest, Excuse, ExcuseStatus, OverrideExcuseRequest,
    SubmitExcuseRequest,
};

fn status_for(auto_approved: bool) -> ExcuseStatus {
    if auto_approved {
        ExcuseStatus::Excused
    } else {
        ExcuseStatus::Unexcused
    }
}

fn excuse_snapshot(excuse: &Excuse) -> serde_json::Value {
    serde_json::json!({
        "childId": excuse.child_id,
        "fromDate": excuse.from_date,
        "toDate": excuse.to_date,
        "reason": excuse.reason,
        "autoApproved": excuse.auto_approved,
    })
}

#[derive(Clone)]
pub struct ExcuseService {
    db: DbConnection,
    excuse_repository: ExcuseRepository,
    attendance_repository: AttendanceRepository,
    child_repository: ChildRepository,
    calendar: SchoolCalendar,
    audit: AuditService,
    notifier: Arc<dyn ExcuseNotifier>,
}

impl ExcuseService {
    pub fn new(
        db: DbConnection,
        calendar: SchoolCalendar,
        audit: AuditService,
        notifier: Arc<dyn ExcuseNotifier>,
    ) -> Self {
        let excuse_repository = ExcuseRepository::new(db.clone());
        let attendance_repository = AttendanceRepository::new(db.clone());
        let child_repository = ChildRepository::new(db.clone());
        Self {
            db,
            excuse_repository,
            attendance_repository,
            child_repository,
            calendar,
            audit,
            notifier,
        }
    }

    /// Submit a new excuse for a child.
    ///
    /// `auto_approved` is decided exactly once here, from the submission
    /// time; re-submitting the same range later does not change an earlier
    /// excuse. Existing ABSENT rows over the range's school days are linked
    /// and re-statused in the same transaction.
    pub async fn submit(&self, request: SubmitExcuseRequest) -> DomainResult<Excuse> {
        excuse_rules::validate_range(request.from_date, request.to_date)?;

        let child = self
            .child_repository
            .get(&request.child_id)
            .await?
            .ok_or_else(|| DomainError::not_found("Child", &request.child_id))?;

        let now = Local::now().naive_local();
        let excuse = Excuse {
            id: Uuid::new_v4().to_string(),
            child_id: request.child_id,
            from_date: request.from_date,
            to_date: request.to_date,
            reason: request.reason,
            submitted_by: request.submitted_by,
            submitted_at: now,
            auto_approved: excuse_rules::is_auto_approved(now, request.from_date),
        };

        info!(
            "Submitting excuse for child {} ({} - {}), auto_approved={}",
            excuse.child_id, excuse.from_date, excuse.to_date, excuse.auto_approved
        );

        let school_days = self
            .calendar
            .school_days_in_range(excuse.from_date, excuse.to_date)
            .await?;
        let status = status_for(excuse.auto_approved);

        let mut tx = self.db.pool().begin().await?;
        self.excuse_repository.insert(&mut tx, &excuse).await?;
        for day in school_days {
            self.attendance_repository
                .link_excuse_for_day(&mut tx, &excuse.child_id, day, &excuse.id, status)
                .await?;
        }
        self.audit
            .append(
                &mut tx,
                &excuse.submitted_by,
                AuditAction::Create,
                "Excuse",
                &excuse.id,
                None,
                Some(excuse_snapshot(&excuse)),
            )
            .await?;
        tx.commit().await?;

        // Fire-and-forget; delivery failures never affect the submission.
        let _ = notifier::dispatch(
            self.notifier.clone(),
            ExcuseSubmittedEvent {
                child_name: child.full_name(),
                from_date: excuse.from_date,
                to_date: excuse.to_date,
                reason: excuse.reason.clone(),
                on_time: excuse.auto_approved,
            },
        );

        Ok(excuse)
    }

    /// Director override of the approval flag. Re-applies the status to
    /// every ABSENT row currently linked to this excuse; days that were
    /// independently reassigned to another excuse are left alone.
    pub async fn override_approval(
        &self,
        excuse_id: &str,
        request: OverrideExcuseRequest,
    ) -> DomainResult<Excuse> {
        let mut excuse = self.require_excuse(excuse_id).await?;

        info!(
            "Overriding excuse {}: auto_approved {} -> {}",
            excuse_id, excuse.auto_approved, request.auto_approved
        );

        let previous = excuse.auto_approved;
        excuse.auto_approved = request.auto_approved;

        let mut tx = self.db.pool().begin().await?;
        self.audit
            .append(
                &mut tx,
                &request.acting_user,
                AuditAction::Update,
                "Excuse",
                excuse_id,
                Some(serde_json::json!({ "autoApproved": previous })),
                Some(serde_json::json!({ "autoApproved": excuse.auto_approved })),
            )
            .await?;
        self.excuse_repository.update(&mut tx, &excuse).await?;
        self.attendance_repository
            .set_status_for_excuse(&mut tx, excuse_id, status_for(excuse.auto_approved))
            .await?;
        tx.commit().await?;

        Ok(excuse)
    }

    /// Director edit of the covered range (optionally also reason and
    /// approval flag). Propagates over the NEW range's school days, touching
    /// only rows still linked to this excuse. A `reason` of `None` keeps the
    /// current one.
    pub async fn edit_dates(
        &self,
        excuse_id: &str,
        request: EditExcuseRequest,
    ) -> DomainResult<Excuse> {
        let mut excuse = self.require_excuse(excuse_id).await?;

        excuse_rules::validate_range(request.from_date, request.to_date)?;
        let previous = excuse_snapshot(&excuse);

        excuse.from_date = request.from_date;
        excuse.to_date = request.to_date;
        if let Some(reason) = request.reason {
            excuse.reason = Some(reason);
        }
        if let Some(auto_approved) = request.auto_approved {
            excuse.auto_approved = auto_approved;
        }

        let school_days = self
            .calendar
            .school_days_in_range(excuse.from_date, excuse.to_date)
            .await?;
        let status = status_for(excuse.auto_approved);

        let mut tx = self.db.pool().begin().await?;
        self.audit
            .append(
                &mut tx,
                &request.acting_user,
                AuditAction::Update,
                "Excuse",
                excuse_id,
                Some(previous),
                Some(excuse_snapshot(&excuse)),
            )
            .await?;
        self.excuse_repository.update(&mut tx, &excuse).await?;
        for day in school_days {
            self.attendance_repository
                .set_status_for_excuse_on_day(&mut tx, excuse_id, day, status)
                .await?;
        }
        tx.commit().await?;

        Ok(excuse)
    }

    /// Delete an excuse. Every row that referenced it loses the link and is
    /// forced to UNEXCUSED: deleting an excuse never marks an absence
    /// present and never leaves it silently excused.
    pub async fn delete(&self, excuse_id: &str, acting_user: &str) -> DomainResult<()> {
        let excuse = self.require_excuse(excuse_id).await?;

        info!("Deleting excuse {}", excuse_id);

        let mut tx = self.db.pool().begin().await?;
        self.audit
            .append(
                &mut tx,
                acting_user,
                AuditAction::Delete,
                "Excuse",
                excuse_id,
                Some(excuse_snapshot(&excuse)),
                None,
            )
            .await?;
        self.attendance_repository
            .clear_excuse(&mut tx, excuse_id)
            .await?;
        self.excuse_repository.delete(&mut tx, excuse_id).await?;
        tx.commit().await?;

        Ok(())
    }

    /// A child's excuses, newest first.
    pub async fn child_excuses(&self, child_id: &str, limit: u32) -> DomainResult<Vec<Excuse>> {
        Ok(self.excuse_repository.list_for_child(child_id, limit).await?)
    }

    /// Excuses matching the director surface's filters, newest first.
    pub async fn list_excuses(&self, filter: ExcuseFilter) -> DomainResult<Vec<Excuse>> {
        Ok(self.excuse_repository.list_filtered(&filter).await?)
    }

    /// Deadline info for the submission surface: when auto-approval closes
    /// for an absence starting on `from_date`, and whether submitting right
    /// now would still make it.
    pub fn deadline_info(&self, from_date: NaiveDate) -> DeadlineInfo {
        let now = Local::now().naive_local();
        DeadlineInfo {
            from_date,
            deadline: excuse_rules::auto_approval_deadline(from_date),
            on_time: excuse_rules::can_still_auto_approve(now, from_date),
        }
    }

    async fn require_excuse(&self, excuse_id: &str) -> DomainResult<Excuse> {
        self.excuse_repository
            .get(excuse_id)
            .await?
            .ok_or_else(|| DomainError::not_found("Excuse", excuse_id))
    }
}
