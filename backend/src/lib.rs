//! Attendance and excuse reconciliation backend.
//!
//! Wires the storage layer and domain services together and exposes the
//! REST surface. Binaries construct a [`Backend`] from a database URL and
//! hand it to `rest::router`.

use anyhow::Result;
use std::sync::Arc;

pub mod domain;
pub mod rest;
pub mod storage;

pub use storage::DbConnection;

use domain::notifier::{ExcuseNotifier, LogNotifier};

/// Main backend struct that orchestrates all services.
#[derive(Clone)]
pub struct Backend {
    pub child_service: domain::ChildService,
    pub calendar: domain::SchoolCalendar,
    pub attendance_service: domain::AttendanceService,
    pub excuse_service: domain::ExcuseService,
    pub audit_service: domain::AuditService,
}

impl Backend {
    /// Create a backend against the given SQLite URL, using the default
    /// log-based notifier.
    pub async fn new(database_url: &str) -> Result<Self> {
        let db = DbConnection::new(database_url).await?;
        Ok(Self::with_notifier(db, Arc::new(LogNotifier)))
    }

    /// Create a backend over an existing connection with a custom notifier.
    pub fn with_notifier(db: DbConnection, notifier: Arc<dyn ExcuseNotifier>) -> Self {
        let audit_service = domain::AuditService::new(db.clone());
        let calendar = domain::SchoolCalendar::new(db.clone(), audit_service.clone());
        let child_service = domain::ChildService::new(db.clone(), audit_service.clone());
        let attendance_service =
            domain::AttendanceService::new(db.clone(), calendar.clone(), audit_service.clone());
        let excuse_service = domain::ExcuseService::new(
            db,
            calendar.clone(),
            audit_service.clone(),
            notifier,
        );

        Backend {
            child_service,
            calendar,
            attendance_service,
            excuse_service,
            audit_service,
        }
    }

    /// Backend over a fresh in-memory database, for tests.
    #[cfg(test)]
    pub async fn init_test() -> Result<Self> {
        let db = DbConnection::init_test().await?;
        Ok(Self::with_notifier(db, Arc::new(LogNotifier)))
    }
}
