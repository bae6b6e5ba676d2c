//! Excuse deadline and range rules.
//!
//! Core rule: an excuse submitted before 9:00 the day before its first
//! absence day is auto-approved; anything later needs director review. These
//! functions are pure date arithmetic and do not consult the school
//! calendar: the deadline is always calendar-day minus one at 9:00, even
//! when that day is itself non-teaching.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

use crate::domain::errors::{DomainError, DomainResult};

/// Longest range an excuse may cover, inclusive of both endpoints.
pub const MAX_EXCUSE_RANGE_DAYS: i64 = 30;

fn deadline_time() -> NaiveTime {
    NaiveTime::from_hms_opt(9, 0, 0).unwrap_or(NaiveTime::MIN)
}

/// The auto-approval deadline for an absence starting on `from_date`:
/// 9:00:00 on the previous calendar day.
pub fn auto_approval_deadline(from_date: NaiveDate) -> NaiveDateTime {
    let day_before = from_date.pred_opt().unwrap_or(from_date);
    day_before.and_time(deadline_time())
}

/// Whether an excuse submitted at `submitted_at` qualifies for auto-approval.
/// Strictly before the deadline counts; exactly 9:00:00 is already late.
pub fn is_auto_approved(submitted_at: NaiveDateTime, from_date: NaiveDate) -> bool {
    submitted_at < auto_approval_deadline(from_date)
}

/// Whether an excuse submitted right now (`now`) would still be auto-approved.
pub fn can_still_auto_approve(now: NaiveDateTime, from_date: NaiveDate) -> bool {
    is_auto_approved(now, from_date)
}

/// Validate an inclusive excuse date range: the end must not precede the
/// start and the span may cover at most 30 days (exactly 30 is valid).
pub fn validate_range(from_date: NaiveDate, to_date: NaiveDate) -> DomainResult<()> {
    if to_date < from_date {
        return Err(DomainError::InvalidRange(
            "end date must not be before start date".to_string(),
        ));
    }

    if (to_date - from_date).num_days() > MAX_EXCUSE_RANGE_DAYS {
        return Err(DomainError::InvalidRange(
            "an excuse may cover at most 30 days".to_string(),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    fn datetime(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
        date(y, m, d).and_hms_opt(h, min, 0).expect("valid timestamp")
    }

    #[test]
    fn test_deadline_is_nine_am_the_day_before() {
        let deadline = auto_approval_deadline(date(2024, 1, 15));
        assert_eq!(deadline, datetime(2024, 1, 14, 9, 0));
    }

    #[test]
    fn test_deadline_crosses_month_boundary() {
        let deadline = auto_approval_deadline(date(2024, 3, 1));
        assert_eq!(deadline, datetime(2024, 2, 29, 9, 0));
    }

    #[test]
    fn test_auto_approved_when_submitted_two_days_ahead() {
        // Scenario: absence starts Monday 2024-01-15, submitted Saturday 8:00.
        assert!(is_auto_approved(datetime(2024, 1, 13, 8, 0), date(2024, 1, 15)));
    }

    #[test]
    fn test_auto_approved_one_minute_before_deadline() {
        assert!(is_auto_approved(datetime(2024, 1, 14, 8, 59), date(2024, 1, 15)));
    }

    #[test]
    fn test_not_auto_approved_exactly_at_deadline() {
        // 9:00:00 sharp is late, not on time.
        assert!(!is_auto_approved(datetime(2024, 1, 14, 9, 0), date(2024, 1, 15)));
    }

    #[test]
    fn test_not_auto_approved_after_deadline() {
        assert!(!is_auto_approved(datetime(2024, 1, 14, 10, 0), date(2024, 1, 15)));
    }

    #[test]
    fn test_not_auto_approved_same_day() {
        assert!(!is_auto_approved(datetime(2024, 1, 15, 8, 0), date(2024, 1, 15)));
    }

    #[test]
    fn test_not_auto_approved_retroactively() {
        assert!(!is_auto_approved(datetime(2024, 1, 15, 8, 0), date(2024, 1, 10)));
    }

    #[test]
    fn test_validate_range_accepts_ordinary_and_single_day_ranges() {
        assert!(validate_range(date(2024, 1, 15), date(2024, 1, 17)).is_ok());
        assert!(validate_range(date(2024, 1, 15), date(2024, 1, 15)).is_ok());
    }

    #[test]
    fn test_validate_range_rejects_inverted_range() {
        let err = validate_range(date(2024, 1, 17), date(2024, 1, 15))
            .expect_err("inverted range must be rejected");
        assert!(matches!(err, DomainError::InvalidRange(_)));
    }

    #[test]
    fn test_validate_range_thirty_days_is_the_inclusive_limit() {
        // Jan 1 .. Jan 31 spans exactly 30 days and passes.
        assert!(validate_range(date(2024, 1, 1), date(2024, 1, 31)).is_ok());
        // Jan 1 .. Feb 1 spans 31 days and fails.
        assert!(validate_range(date(2024, 1, 1), date(2024, 2, 1)).is_err());
    }

    #[test]
    fn test_validate_range_error_names_the_limit() {
        let err = validate_range(date(2024, 1, 1), date(2024, 2, 15))
            .expect_err("45-day range must be rejected");
        assert!(err.to_string().contains("30"));
    }
}
