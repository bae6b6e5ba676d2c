//! Attendance ledger: per-child, per-day presence records.
//!
//! The excuse status of a record is never chosen by a caller. It is derived
//! here from the school calendar, the excuse rules and whatever excuse
//! currently covers the day, and later kept in sync by the excuse service's
//! reconciliation passes.

use anyhow::Result;
use chrono::{Datelike, Duration, Local, NaiveDate};
use sqlx::SqliteConnection;
use tracing::{debug, info};
use uuid::Uuid;

use crate::domain::audit_service::AuditService;
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::school_calendar::SchoolCalendar;
use crate::storage::repositories::{AttendanceRepository, ChildRepository, ExcuseRepository};
use crate::storage::DbConnection;
use shared::{
    Attendance, AttendanceStats, AuditAction, BulkAttendanceRequest, DashboardStats, Excuse,
    ExcuseStatus, Presence, TodayStatus,
};

/// Derive the excuse status and link for a record from its presence and the
/// excuse covering the day, if any.
fn derive_status(presence: Presence, covering: Option<&Excuse>) -> (ExcuseStatus, Option<String>) {
    match presence {
        Presence::Present => (ExcuseStatus::None, None),
        Presence::Absent => match covering {
            Some(excuse) if excuse.auto_approved => {
                (ExcuseStatus::Excused, Some(excuse.id.clone()))
            }
            Some(excuse) => (ExcuseStatus::Unexcused, Some(excuse.id.clone())),
            None => (ExcuseStatus::Unexcused, None),
        },
    }
}

#[derive(Clone)]
pub struct AttendanceService {
    db: DbConnection,
    attendance_repository: AttendanceRepository,
    excuse_repository: ExcuseRepository,
    child_repository: ChildRepository,
    calendar: SchoolCalendar,
    audit: AuditService,
}

impl AttendanceService {
    pub fn new(db: DbConnection, calendar: SchoolCalendar, audit: AuditService) -> Self {
        let attendance_repository = AttendanceRepository::new(db.clone());
        let excuse_repository = ExcuseRepository::new(db.clone());
        let child_repository = ChildRepository::new(db.clone());
        Self {
            db,
            attendance_repository,
            excuse_repository,
            child_repository,
            calendar,
            audit,
        }
    }

    /// Record or overwrite attendance for one child on one day.
    ///
    /// Writes no audit entry of its own; a caller that wraps this in a bulk
    /// operation is responsible for a single summary entry.
    pub async fn record_attendance(
        &self,
        child_id: &str,
        date: NaiveDate,
        presence: Presence,
        recorded_by: &str,
    ) -> DomainResult<Attendance> {
        let mut tx = self.db.pool().begin().await?;
        self.upsert_record(&mut tx, child_id, date, presence, recorded_by)
            .await?;
        tx.commit().await?;

        self.attendance_repository
            .get(child_id, date)
            .await?
            .ok_or_else(|| DomainError::Other(anyhow::anyhow!("Upserted record disappeared")))
    }

    /// Record attendance for a whole group on one date, atomically: either
    /// every entry and the summary audit entry commit, or none do.
    pub async fn record_bulk(&self, request: BulkAttendanceRequest) -> DomainResult<Vec<Attendance>> {
        info!(
            "Recording bulk attendance for {} ({} entries)",
            request.date,
            request.entries.len()
        );

        if !self.can_record_attendance(request.date).await? {
            return Err(DomainError::DateNotRecordable(request.date));
        }

        let present_count = request
            .entries
            .iter()
            .filter(|e| e.presence == Presence::Present)
            .count();

        let mut tx = self.db.pool().begin().await?;
        for entry in &request.entries {
            self.upsert_record(
                &mut tx,
                &entry.child_id,
                request.date,
                entry.presence,
                &request.recorded_by,
            )
            .await?;
        }
        self.audit
            .append(
                &mut tx,
                &request.recorded_by,
                AuditAction::Create,
                "Attendance",
                &format!("bulk-{}", request.date),
                None,
                Some(serde_json::json!({
                    "date": request.date,
                    "recordCount": request.entries.len(),
                    "presentCount": present_count,
                })),
            )
            .await?;
        tx.commit().await?;

        let recorded: Vec<String> = request.entries.iter().map(|e| e.child_id.clone()).collect();
        let rows = self.attendance_repository.for_date(request.date).await?;
        Ok(rows
            .into_iter()
            .filter(|row| recorded.contains(&row.child_id))
            .collect())
    }

    /// Whether attendance may be entered for a date: teaching days only,
    /// today or in the past.
    pub async fn can_record_attendance(&self, date: NaiveDate) -> DomainResult<bool> {
        if date > Local::now().date_naive() {
            return Ok(false);
        }
        Ok(self.calendar.is_teaching_day(date).await?)
    }

    /// Attendance statistics for a child over an inclusive range.
    ///
    /// `total_days` counts school days whether or not anything was recorded;
    /// the other counters only cover stored records falling on school days
    /// within the range. Days without a record are not treated as absences.
    pub async fn stats_for_range(
        &self,
        child_id: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> DomainResult<AttendanceStats> {
        let school_days = self.calendar.school_days_in_range(start, end).await?;
        let records = self
            .attendance_repository
            .for_child_in_range(child_id, start, end)
            .await?;
        let by_date: std::collections::HashMap<NaiveDate, &Attendance> =
            records.iter().map(|r| (r.date, r)).collect();

        let mut present = 0u32;
        let mut absent = 0u32;
        let mut excused = 0u32;
        let mut unexcused = 0u32;

        for day in &school_days {
            if let Some(record) = by_date.get(day) {
                match record.presence {
                    Presence::Present => present += 1,
                    Presence::Absent => {
                        absent += 1;
                        if record.excuse_status == ExcuseStatus::Excused {
                            excused += 1;
                        } else {
                            unexcused += 1;
                        }
                    }
                }
            }
        }

        let total_days = school_days.len() as u32;
        let attendance_rate = if total_days > 0 {
            (f64::from(present) / f64::from(total_days) * 1000.0).round() / 10.0
        } else {
            0.0
        };

        Ok(AttendanceStats {
            total_days,
            present_days: present,
            absent_days: absent,
            excused_days: excused,
            unexcused_days: unexcused,
            attendance_rate,
        })
    }

    /// A child's records over a range, newest first (reporting surface).
    pub async fn child_attendance(
        &self,
        child_id: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> DomainResult<Vec<Attendance>> {
        Ok(self
            .attendance_repository
            .for_child_in_range(child_id, start, end)
            .await?)
    }

    /// Every record for one date.
    pub async fn daily_attendance(&self, date: NaiveDate) -> DomainResult<Vec<Attendance>> {
        Ok(self.attendance_repository.for_date(date).await?)
    }

    /// Today's status for one child (parent dashboard).
    pub async fn today_status(&self, child_id: &str) -> DomainResult<TodayStatus> {
        let today = Local::now().date_naive();
        if !self.calendar.is_teaching_day(today).await? {
            return Ok(TodayStatus {
                is_school_day: false,
                attendance: None,
            });
        }

        Ok(TodayStatus {
            is_school_day: true,
            attendance: self.attendance_repository.get(child_id, today).await?,
        })
    }

    /// Counters for the director dashboard: today's attendance, this month's
    /// totals, and late excuses from the last week awaiting review.
    pub async fn dashboard_stats(&self) -> DomainResult<DashboardStats> {
        let today = Local::now().date_naive();
        let month_start = today.with_day(1).unwrap_or(today);
        let month_end = next_month_start(month_start)
            .and_then(|d| d.pred_opt())
            .unwrap_or(today);

        let today_rows = self.attendance_repository.for_date(today).await?;
        let month_rows = self
            .attendance_repository
            .in_range(month_start, month_end)
            .await?;

        let count = |rows: &[Attendance], presence: Presence| {
            rows.iter().filter(|r| r.presence == presence).count() as u32
        };

        let week_ago = Local::now().naive_local() - Duration::days(7);
        let pending_excuses = self.excuse_repository.pending_since(week_ago, 5).await?;

        debug!(
            "Dashboard: {} records today, {} this month",
            today_rows.len(),
            month_rows.len()
        );

        Ok(DashboardStats {
            today_present: count(&today_rows, Presence::Present),
            today_absent: count(&today_rows, Presence::Absent),
            active_children: self.child_repository.count_active().await?,
            month_present: count(&month_rows, Presence::Present),
            month_absent: count(&month_rows, Presence::Absent),
            month_excused: month_rows
                .iter()
                .filter(|r| r.excuse_status == ExcuseStatus::Excused)
                .count() as u32,
            month_unexcused: month_rows
                .iter()
                .filter(|r| {
                    r.presence == Presence::Absent && r.excuse_status == ExcuseStatus::Unexcused
                })
                .count() as u32,
            pending_excuses,
        })
    }

    /// Build and upsert one record on the caller's transaction, deriving the
    /// excuse status from the excuse covering the day (if any).
    async fn upsert_record(
        &self,
        conn: &mut SqliteConnection,
        child_id: &str,
        date: NaiveDate,
        presence: Presence,
        recorded_by: &str,
    ) -> DomainResult<()> {
        let covering = match presence {
            Presence::Absent => self.excuse_repository.covering(conn, child_id, date).await?,
            Presence::Present => None,
        };
        let (excuse_status, excuse_id) = derive_status(presence, covering.as_ref());

        let record = Attendance {
            id: Uuid::new_v4().to_string(),
            child_id: child_id.to_string(),
            date,
            presence,
            excuse_status,
            excuse_id,
            recorded_by: recorded_by.to_string(),
            recorded_at: Local::now().naive_local(),
        };
        self.attendance_repository.upsert(conn, &record).await?;
        Ok(())
    }
}

fn next_month_start(month_start: NaiveDate) -> Option<NaiveDate> {
    if month_start.month() == 12 {
        NaiveDate::from_ymd_opt(month_start.year() + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(month_start.year(), month_start.month() + 1, 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::AttendanceEntry;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    async fn setup_test() -> AttendanceService {
        let db = DbConnection::init_test()
            .await
            .expect("Failed to create test database");
        let audit = AuditService::new(db.clone());
        let calendar = SchoolCalendar::new(db.clone(), audit.clone());
        AttendanceService::new(db, calendar, audit)
    }

    /// Most recent school day at least one day in the past, so
    /// `can_record_attendance` accepts it regardless of when tests run.
    fn recent_school_day() -> NaiveDate {
        let mut day = Local::now().date_naive();
        loop {
            day = day.pred_opt().expect("date arithmetic");
            if crate::domain::school_calendar::is_weekly_school_day(day) {
                return day;
            }
        }
    }

    #[tokio::test]
    async fn test_absent_without_excuse_is_unexcused() {
        let service = setup_test().await;

        let record = service
            .record_attendance("child-1", date(2024, 1, 15), Presence::Absent, "teacher-1")
            .await
            .expect("Failed to record");
        assert_eq!(record.excuse_status, ExcuseStatus::Unexcused);
        assert_eq!(record.excuse_id, None);
    }

    #[tokio::test]
    async fn test_present_has_status_none_and_no_link() {
        let service = setup_test().await;

        let record = service
            .record_attendance("child-1", date(2024, 1, 15), Presence::Present, "teacher-1")
            .await
            .expect("Failed to record");
        assert_eq!(record.excuse_status, ExcuseStatus::None);
        assert_eq!(record.excuse_id, None);
    }

    #[tokio::test]
    async fn test_recording_twice_overwrites_instead_of_duplicating() {
        let service = setup_test().await;
        let day = date(2024, 1, 15);

        let first = service
            .record_attendance("child-1", day, Presence::Absent, "teacher-1")
            .await
            .expect("Failed to record");
        let second = service
            .record_attendance("child-1", day, Presence::Present, "teacher-2")
            .await
            .expect("Failed to record");

        // Same row, overwritten in place.
        assert_eq!(second.id, first.id);
        assert_eq!(second.presence, Presence::Present);
        assert_eq!(second.excuse_status, ExcuseStatus::None);

        let rows = service.daily_attendance(day).await.expect("query");
        assert_eq!(rows.len(), 1);
    }

    #[tokio::test]
    async fn test_recording_identical_arguments_is_idempotent() {
        let service = setup_test().await;
        let day = date(2024, 1, 15);

        let first = service
            .record_attendance("child-1", day, Presence::Absent, "teacher-1")
            .await
            .expect("Failed to record");
        let second = service
            .record_attendance("child-1", day, Presence::Absent, "teacher-1")
            .await
            .expect("Failed to record");

        assert_eq!(second.id, first.id);
        assert_eq!(second.presence, first.presence);
        assert_eq!(second.excuse_status, first.excuse_status);
        assert_eq!(second.excuse_id, first.excuse_id);
    }

    #[tokio::test]
    async fn test_cannot_record_for_future_or_weekend() {
        let service = setup_test().await;
        let today = Local::now().date_naive();

        let tomorrow = today.succ_opt().expect("date arithmetic");
        assert!(!service
            .can_record_attendance(tomorrow)
            .await
            .expect("query"));

        // A Saturday in the past.
        assert!(!service
            .can_record_attendance(date(2024, 1, 13))
            .await
            .expect("query"));

        assert!(service
            .can_record_attendance(recent_school_day())
            .await
            .expect("query"));
    }

    #[tokio::test]
    async fn test_record_bulk_writes_all_rows_and_one_audit_entry() {
        let service = setup_test().await;
        let day = recent_school_day();

        let rows = service
            .record_bulk(BulkAttendanceRequest {
                date: day,
                recorded_by: "teacher-1".to_string(),
                entries: vec![
                    AttendanceEntry {
                        child_id: "child-1".to_string(),
                        presence: Presence::Present,
                    },
                    AttendanceEntry {
                        child_id: "child-2".to_string(),
                        presence: Presence::Absent,
                    },
                ],
            })
            .await
            .expect("Failed to record bulk");
        assert_eq!(rows.len(), 2);

        let entries = service
            .audit
            .entries_for_entity("Attendance", &format!("bulk-{}", day))
            .await
            .expect("audit query");
        assert_eq!(entries.len(), 1);
        assert_eq!(
            entries[0].new_value.as_ref().and_then(|v| v.get("recordCount")),
            Some(&serde_json::json!(2))
        );
    }

    #[tokio::test]
    async fn test_record_bulk_rejects_unrecordable_date() {
        let service = setup_test().await;
        let tomorrow = Local::now().date_naive().succ_opt().expect("date arithmetic");

        let err = service
            .record_bulk(BulkAttendanceRequest {
                date: tomorrow,
                recorded_by: "teacher-1".to_string(),
                entries: vec![AttendanceEntry {
                    child_id: "child-1".to_string(),
                    presence: Presence::Present,
                }],
            })
            .await
            .expect_err("future date must be rejected");
        assert!(matches!(err, DomainError::DateNotRecordable(_)));
        assert!(service
            .daily_attendance(tomorrow)
            .await
            .expect("query")
            .is_empty());
    }

    #[tokio::test]
    async fn test_stats_count_only_recorded_school_days() {
        let service = setup_test().await;

        // Week of 2024-01-15: Mon-Thu are school days.
        service
            .record_attendance("child-1", date(2024, 1, 15), Presence::Present, "t")
            .await
            .expect("record");
        service
            .record_attendance("child-1", date(2024, 1, 16), Presence::Absent, "t")
            .await
            .expect("record");
        service
            .record_attendance("child-1", date(2024, 1, 17), Presence::Present, "t")
            .await
            .expect("record");
        // Thursday stays unrecorded; Saturday records are ignored by stats.
        service
            .record_attendance("child-1", date(2024, 1, 20), Presence::Absent, "t")
            .await
            .expect("record");

        let stats = service
            .stats_for_range("child-1", date(2024, 1, 15), date(2024, 1, 21))
            .await
            .expect("stats");
        assert_eq!(stats.total_days, 4);
        assert_eq!(stats.present_days, 2);
        assert_eq!(stats.absent_days, 1);
        assert_eq!(stats.unexcused_days, 1);
        assert_eq!(stats.excused_days, 0);
        assert_eq!(stats.attendance_rate, 50.0);
    }

    #[tokio::test]
    async fn test_stats_rate_is_zero_without_school_days() {
        let service = setup_test().await;

        // Saturday-Sunday only.
        let stats = service
            .stats_for_range("child-1", date(2024, 1, 13), date(2024, 1, 14))
            .await
            .expect("stats");
        assert_eq!(stats.total_days, 0);
        assert_eq!(stats.attendance_rate, 0.0);
    }

    #[tokio::test]
    async fn test_stats_rate_rounds_to_one_decimal() {
        let service = setup_test().await;

        // One present day out of three school days: 33.333... -> 33.3.
        service
            .record_attendance("child-1", date(2024, 1, 15), Presence::Present, "t")
            .await
            .expect("record");
        let stats = service
            .stats_for_range("child-1", date(2024, 1, 15), date(2024, 1, 17))
            .await
            .expect("stats");
        assert_eq!(stats.total_days, 3);
        assert_eq!(stats.attendance_rate, 33.3);
    }
}
