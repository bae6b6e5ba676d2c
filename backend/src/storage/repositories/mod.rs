pub mod attendance_repository;
pub mod audit_repository;
pub mod child_repository;
pub mod closed_day_repository;
pub mod excuse_repository;

pub use attendance_repository::AttendanceRepository;
pub use audit_repository::AuditRepository;
pub use child_repository::ChildRepository;
pub use closed_day_repository::ClosedDayRepository;
pub use excuse_repository::ExcuseRepository;
