//! Domain layer: attendance, excuses, calendar and audit services.
//!
//! Services own the business rules and transaction boundaries; the actual
//! SQL lives in `crate::storage::repositories`. Each service is cheap to
//! clone and shares the underlying connection pool.

pub mod attendance_service;
pub mod audit_service;
pub mod child_service;
pub mod errors;
pub mod excuse_rules;
pub mod excuse_service;
pub mod notifier;
pub mod school_calendar;

pub use attendance_service::AttendanceService;
pub use audit_service::AuditService;
pub use child_service::ChildService;
pub use errors::{DomainError, DomainResult};
pub use excuse_service::ExcuseService;
pub use notifier::{ExcuseNotifier, ExcuseSubmittedEvent, LogNotifier};
pub use school_calendar::SchoolCalendar;
