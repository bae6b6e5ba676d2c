use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Whether a child was present on a given day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Presence {
    Present,
    Absent,
}

impl Presence {
    pub fn as_str(&self) -> &'static str {
        match self {
            Presence::Present => "PRESENT",
            Presence::Absent => "ABSENT",
        }
    }
}

impl fmt::Display for Presence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Presence {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PRESENT" => Ok(Presence::Present),
            "ABSENT" => Ok(Presence::Absent),
            other => Err(format!("unknown presence value: {other}")),
        }
    }
}

/// Excuse status of an attendance record.
///
/// `None` is only valid together with `Presence::Present`; absent days are
/// always either `Excused` or `Unexcused`. The status is derived by the
/// engine (calendar + excuse rules + reconciliation) and never set directly
/// by a caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ExcuseStatus {
    None,
    Excused,
    Unexcused,
}

impl ExcuseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExcuseStatus::None => "NONE",
            ExcuseStatus::Excused => "EXCUSED",
            ExcuseStatus::Unexcused => "UNEXCUSED",
        }
    }
}

impl fmt::Display for ExcuseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExcuseStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "NONE" => Ok(ExcuseStatus::None),
            "EXCUSED" => Ok(ExcuseStatus::Excused),
            "UNEXCUSED" => Ok(ExcuseStatus::Unexcused),
            other => Err(format!("unknown excuse status value: {other}")),
        }
    }
}

/// Kind of mutation recorded in the audit log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AuditAction {
    Create,
    Update,
    Delete,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::Create => "CREATE",
            AuditAction::Update => "UPDATE",
            AuditAction::Delete => "DELETE",
        }
    }
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AuditAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CREATE" => Ok(AuditAction::Create),
            "UPDATE" => Ok(AuditAction::Update),
            "DELETE" => Ok(AuditAction::Delete),
            other => Err(format!("unknown audit action: {other}")),
        }
    }
}

/// A child enrolled at the institution.
///
/// Children are soft-deactivated via the `active` flag and never hard-deleted
/// while historical attendance references them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Child {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub active: bool,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl Child {
    /// Display name used by reporting and notification surfaces.
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

/// An institution-wide non-teaching day layered on top of the fixed weekly
/// pattern (Fri/Sat/Sun). Unique per date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClosedDay {
    pub id: String,
    pub date: NaiveDate,
    pub description: Option<String>,
}

/// One attendance record per (child, date).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attendance {
    pub id: String,
    pub child_id: String,
    pub date: NaiveDate,
    pub presence: Presence,
    pub excuse_status: ExcuseStatus,
    /// The excuse currently covering this record, if any.
    pub excuse_id: Option<String>,
    pub recorded_by: String,
    pub recorded_at: NaiveDateTime,
}

/// A parent-submitted absence excuse covering an inclusive date range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Excuse {
    pub id: String,
    pub child_id: String,
    pub from_date: NaiveDate,
    pub to_date: NaiveDate,
    pub reason: Option<String>,
    pub submitted_by: String,
    pub submitted_at: NaiveDateTime,
    /// Decided once at submission time (or explicitly overridden by a
    /// director); never re-derived as time passes.
    pub auto_approved: bool,
}

/// One append-only audit log entry with before/after JSON snapshots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditLogEntry {
    pub id: String,
    pub user_id: String,
    pub action: AuditAction,
    pub entity_type: String,
    pub entity_id: String,
    pub previous_value: Option<serde_json::Value>,
    pub new_value: Option<serde_json::Value>,
    pub created_at: NaiveDateTime,
}

/// Attendance statistics for one child over a date range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttendanceStats {
    /// Number of school days in the range, recorded or not.
    pub total_days: u32,
    pub present_days: u32,
    pub absent_days: u32,
    pub excused_days: u32,
    pub unexcused_days: u32,
    /// present / total_days * 100, rounded to one decimal; 0 when the range
    /// contains no school days.
    pub attendance_rate: f64,
}

/// One (child, presence) pair in a bulk attendance submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttendanceEntry {
    pub child_id: String,
    pub presence: Presence,
}

/// Request to record attendance for a whole group on one date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulkAttendanceRequest {
    pub date: NaiveDate,
    pub recorded_by: String,
    pub entries: Vec<AttendanceEntry>,
}

/// Request to submit a new excuse. The submitting user is pre-authorized by
/// the caller; the engine only uses the id for attribution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmitExcuseRequest {
    pub child_id: String,
    pub from_date: NaiveDate,
    pub to_date: NaiveDate,
    pub reason: Option<String>,
    pub submitted_by: String,
}

/// Director override of an excuse's approval flag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverrideExcuseRequest {
    pub auto_approved: bool,
    pub acting_user: String,
}

/// Director edit of an excuse's covered range (and optionally its reason or
/// approval flag).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EditExcuseRequest {
    pub from_date: NaiveDate,
    pub to_date: NaiveDate,
    pub reason: Option<String>,
    pub auto_approved: Option<bool>,
    pub acting_user: String,
}

/// Request to add an institution-wide closed day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddClosedDayRequest {
    pub date: NaiveDate,
    pub description: Option<String>,
    pub acting_user: String,
}

/// Request to create a new child.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateChildRequest {
    pub first_name: String,
    pub last_name: String,
    pub acting_user: String,
}

/// Request to update a child's name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateChildRequest {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub acting_user: String,
}

/// Request to soft-deactivate or reactivate a child.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetChildActiveRequest {
    pub active: bool,
    pub acting_user: String,
}

/// Auto-approval deadline info shown on the excuse submission surface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeadlineInfo {
    pub from_date: NaiveDate,
    pub deadline: NaiveDateTime,
    /// Whether an excuse submitted right now would still be auto-approved.
    pub on_time: bool,
}

/// A child's status for today, shown on the parent dashboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TodayStatus {
    pub is_school_day: bool,
    pub attendance: Option<Attendance>,
}

/// Counters for the director dashboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardStats {
    pub today_present: u32,
    pub today_absent: u32,
    pub active_children: u32,
    pub month_present: u32,
    pub month_absent: u32,
    pub month_excused: u32,
    pub month_unexcused: u32,
    /// Late excuses from the last seven days awaiting director review.
    pub pending_excuses: Vec<Excuse>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn presence_round_trips_through_storage_strings() {
        assert_eq!("PRESENT".parse::<Presence>(), Ok(Presence::Present));
        assert_eq!("ABSENT".parse::<Presence>(), Ok(Presence::Absent));
        assert_eq!(Presence::Present.as_str(), "PRESENT");
        assert!("present".parse::<Presence>().is_err());
    }

    #[test]
    fn excuse_status_round_trips_through_storage_strings() {
        for status in [
            ExcuseStatus::None,
            ExcuseStatus::Excused,
            ExcuseStatus::Unexcused,
        ] {
            assert_eq!(status.as_str().parse::<ExcuseStatus>(), Ok(status));
        }
    }

    #[test]
    fn audit_action_parses_known_values_only() {
        assert_eq!("DELETE".parse::<AuditAction>(), Ok(AuditAction::Delete));
        assert!("PURGE".parse::<AuditAction>().is_err());
    }

    #[test]
    fn child_full_name_joins_first_and_last() {
        let child = Child {
            id: "c1".to_string(),
            first_name: "Anna".to_string(),
            last_name: "Dvořáková".to_string(),
            active: true,
            created_at: NaiveDate::from_ymd_opt(2024, 1, 1)
                .and_then(|d| d.and_hms_opt(8, 0, 0))
                .expect("valid timestamp"),
            updated_at: NaiveDate::from_ymd_opt(2024, 1, 1)
                .and_then(|d| d.and_hms_opt(8, 0, 0))
                .expect("valid timestamp"),
        };
        assert_eq!(child.full_name(), "Anna Dvořáková");
    }
}
