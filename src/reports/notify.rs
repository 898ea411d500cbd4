use serde::Serialize;
use tracing::info;

use super::domain::{AssignmentId, ReportId, ReportStatus, UserId};

/// Post-transition events the service hands to the notification collaborator.
/// These are explicit calls made after a transition commits, not implicit
/// framework-dispatched hooks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "event")]
pub enum ReportEvent {
    StatusChanged {
        report: ReportId,
        from: ReportStatus,
        to: ReportStatus,
    },
    TechnicianAssigned {
        report: ReportId,
        assignment: AssignmentId,
        technician: UserId,
    },
    ReportDeleted {
        report: ReportId,
    },
}

/// Delivery error for outbound notifications.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("notification transport unavailable: {0}")]
    Transport(String),
}

/// Outbound notification hook (mail, push, or in-app adapters).
pub trait NotificationSink: Send + Sync {
    fn notify(&self, event: &ReportEvent) -> Result<(), NotifyError>;
}

/// Default sink: emits events to the structured log stream.
#[derive(Debug, Default)]
pub struct LogNotifier;

impl NotificationSink for LogNotifier {
    fn notify(&self, event: &ReportEvent) -> Result<(), NotifyError> {
        info!(?event, "report event");
        Ok(())
    }
}
