//! Outbound excuse-submission notifications.
//!
//! The engine only produces the event; delivery (chat webhook, email, ...)
//! is a collaborator behind the [`ExcuseNotifier`] trait. Notifications are
//! fire-and-forget: a failing notifier is logged and never blocks or rolls
//! back the submission that triggered it.

use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use std::sync::Arc;
use tracing::{info, warn};

/// Data handed to the notification surface when an excuse is submitted.
#[derive(Debug, Clone, PartialEq)]
pub struct ExcuseSubmittedEvent {
    pub child_name: String,
    pub from_date: NaiveDate,
    pub to_date: NaiveDate,
    pub reason: Option<String>,
    /// Whether the excuse was submitted before the auto-approval deadline.
    pub on_time: bool,
}

#[async_trait]
pub trait ExcuseNotifier: Send + Sync {
    async fn excuse_submitted(&self, event: &ExcuseSubmittedEvent) -> Result<()>;
}

/// Default notifier: writes the event to the log. Stands in where no chat
/// integration is configured.
pub struct LogNotifier;

#[async_trait]
impl ExcuseNotifier for LogNotifier {
    async fn excuse_submitted(&self, event: &ExcuseSubmittedEvent) -> Result<()> {
        info!(
            "New excuse: {} ({} - {}), {}",
            event.child_name,
            event.from_date,
            event.to_date,
            if event.on_time { "on time" } else { "late" }
        );
        Ok(())
    }
}

/// Dispatch an event without waiting for delivery. Errors are logged and
/// swallowed.
pub fn dispatch(
    notifier: Arc<dyn ExcuseNotifier>,
    event: ExcuseSubmittedEvent,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        if let Err(err) = notifier.excuse_submitted(&event).await {
            warn!("Excuse notification failed: {:#}", err);
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::Mutex;

    struct RecordingNotifier {
        events: Mutex<Vec<ExcuseSubmittedEvent>>,
    }

    struct FailingNotifier;

    #[async_trait]
    impl ExcuseNotifier for RecordingNotifier {
        async fn excuse_submitted(&self, event: &ExcuseSubmittedEvent) -> Result<()> {
            self.events.lock().await.push(event.clone());
            Ok(())
        }
    }

    #[async_trait]
    impl ExcuseNotifier for FailingNotifier {
        async fn excuse_submitted(&self, _event: &ExcuseSubmittedEvent) -> Result<()> {
            anyhow::bail!("webhook unreachable")
        }
    }

    fn sample_event() -> ExcuseSubmittedEvent {
        ExcuseSubmittedEvent {
            child_name: "Anna Dvořáková".to_string(),
            from_date: chrono::NaiveDate::from_ymd_opt(2024, 1, 15).expect("valid date"),
            to_date: chrono::NaiveDate::from_ymd_opt(2024, 1, 16).expect("valid date"),
            reason: Some("Illness".to_string()),
            on_time: true,
        }
    }

    #[tokio::test]
    async fn test_dispatch_delivers_event() {
        let notifier = Arc::new(RecordingNotifier {
            events: Mutex::new(Vec::new()),
        });

        dispatch(notifier.clone(), sample_event())
            .await
            .expect("dispatch task");

        let events = notifier.events.lock().await;
        assert_eq!(events.len(), 1);
        assert!(events[0].on_time);
    }

    #[tokio::test]
    async fn test_dispatch_swallows_notifier_failure() {
        // The task must finish cleanly even when delivery fails.
        dispatch(Arc::new(FailingNotifier), sample_event())
            .await
            .expect("dispatch task");
    }
}
