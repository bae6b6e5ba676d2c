//! School calendar: which dates are teaching days.
//!
//! Teaching days are Monday through Thursday; Friday, Saturday and Sunday
//! are always closed (fixed rule, not configurable). On top of the weekly
//! pattern the director maintains a set of closed days (holidays, trips),
//! unique per date. The closed-day set is re-read from storage on every
//! query.

use anyhow::Result;
use chrono::{Datelike, NaiveDate, Weekday};
use std::collections::HashSet;
use tracing::info;
use uuid::Uuid;

use crate::domain::audit_service::AuditService;
use crate::domain::errors::{DomainError, DomainResult};
use crate::storage::repositories::ClosedDayRepository;
use crate::storage::DbConnection;
use shared::{AddClosedDayRequest, AuditAction, ClosedDay};

/// Whether a date is closed by the fixed weekly pattern (Fri/Sat/Sun).
pub fn is_default_closed_day(date: NaiveDate) -> bool {
    matches!(date.weekday(), Weekday::Fri | Weekday::Sat | Weekday::Sun)
}

/// Whether a date falls on a weekly teaching day (Mon-Thu), ignoring the
/// closed-day set.
pub fn is_weekly_school_day(date: NaiveDate) -> bool {
    !is_default_closed_day(date)
}

/// Calendar service answering teaching-day queries and managing the
/// director's closed-day set.
#[derive(Clone)]
pub struct SchoolCalendar {
    db: DbConnection,
    closed_days: ClosedDayRepository,
    audit: AuditService,
}

impl SchoolCalendar {
    pub fn new(db: DbConnection, audit: AuditService) -> Self {
        let closed_days = ClosedDayRepository::new(db.clone());
        Self {
            db,
            closed_days,
            audit,
        }
    }

    /// Whether attendance may be taught on this date: a weekly school day
    /// with no closed-day entry.
    pub async fn is_teaching_day(&self, date: NaiveDate) -> Result<bool> {
        if is_default_closed_day(date) {
            return Ok(false);
        }
        Ok(!self.closed_days.exists_on(date).await?)
    }

    /// All teaching days in an inclusive range, in ascending order.
    pub async fn school_days_in_range(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<NaiveDate>> {
        let closed: HashSet<NaiveDate> = self
            .closed_days
            .dates_in_range(start, end)
            .await?
            .into_iter()
            .collect();

        let mut days = Vec::new();
        let mut current = start;
        while current <= end {
            if is_weekly_school_day(current) && !closed.contains(&current) {
                days.push(current);
            }
            current = match current.succ_opt() {
                Some(next) => next,
                None => break,
            };
        }

        Ok(days)
    }

    /// The next teaching day strictly after `from`, searching at most 30
    /// days ahead (matching the longest excuse range).
    pub async fn next_school_day(&self, from: NaiveDate) -> Result<Option<NaiveDate>> {
        let mut current = from;
        for _ in 0..30 {
            current = match current.succ_opt() {
                Some(next) => next,
                None => return Ok(None),
            };
            if self.is_teaching_day(current).await? {
                return Ok(Some(current));
            }
        }
        Ok(None)
    }

    /// Closed days within one calendar year, ascending.
    pub async fn closed_days_for_year(&self, year: i32) -> Result<Vec<ClosedDay>> {
        let start = NaiveDate::from_ymd_opt(year, 1, 1)
            .ok_or_else(|| anyhow::anyhow!("Invalid year: {}", year))?;
        let end = NaiveDate::from_ymd_opt(year, 12, 31)
            .ok_or_else(|| anyhow::anyhow!("Invalid year: {}", year))?;
        self.closed_days.list_in_range(start, end).await
    }

    /// Add a closed day. The date is unique; adding a duplicate surfaces the
    /// store's constraint violation unchanged. Audited as CREATE.
    ///
    /// Attendance already recorded for that date is deliberately left
    /// untouched; there is no retroactive recalculation.
    pub async fn add_closed_day(&self, request: AddClosedDayRequest) -> DomainResult<ClosedDay> {
        info!("Adding closed day on {}", request.date);

        let closed_day = ClosedDay {
            id: Uuid::new_v4().to_string(),
            date: request.date,
            description: request.description,
        };

        let mut tx = self.db.pool().begin().await?;
        self.closed_days.insert(&mut tx, &closed_day).await?;
        self.audit
            .append(
                &mut tx,
                &request.acting_user,
                AuditAction::Create,
                "ClosedDay",
                &closed_day.id,
                None,
                Some(serde_json::json!({
                    "date": closed_day.date,
                    "description": closed_day.description,
                })),
            )
            .await?;
        tx.commit().await?;

        Ok(closed_day)
    }

    /// Remove a closed day by id. Audited as DELETE with the prior snapshot.
    pub async fn remove_closed_day(&self, id: &str, acting_user: &str) -> DomainResult<()> {
        info!("Removing closed day {}", id);

        let closed_day = self
            .closed_days
            .get(id)
            .await?
            .ok_or_else(|| DomainError::not_found("ClosedDay", id))?;

        let mut tx = self.db.pool().begin().await?;
        self.audit
            .append(
                &mut tx,
                acting_user,
                AuditAction::Delete,
                "ClosedDay",
                id,
                Some(serde_json::json!({
                    "date": closed_day.date,
                    "description": closed_day.description,
                })),
                None,
            )
            .await?;
        self.closed_days.delete(&mut tx, id).await?;
        tx.commit().await?;

        Ok(())
    }
}
