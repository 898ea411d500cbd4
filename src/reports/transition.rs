use super::domain::{ReportStatus, Role};

/// Error enumeration for refused status moves.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TransitionError {
    #[error("report cannot move from {from} to {to}")]
    InvalidTransition {
        from: ReportStatus,
        to: ReportStatus,
    },
    #[error("actor role may not perform this transition")]
    Unauthorized,
}

/// Gate enforcing the legal status edges and the roles allowed to drive them.
///
/// Allowed edges:
/// - Unhandled -> InProgress (staff/admin, on assignment creation)
/// - InProgress -> AwaitingVerification (technician, on fix feedback)
/// - AwaitingVerification -> Completed (staff/admin, on verification)
/// - any non-cancelled state -> Cancelled (staff/admin)
pub struct TransitionGate;

impl TransitionGate {
    /// Validate the requested edge for the acting role. Invalid edges are
    /// reported before insufficient roles, so callers always learn about an
    /// impossible move even when they also lack permission.
    pub fn check(
        from: ReportStatus,
        to: ReportStatus,
        role: Role,
    ) -> Result<(), TransitionError> {
        let permitted = Self::permitted_roles(from, to)
            .ok_or(TransitionError::InvalidTransition { from, to })?;
        if permitted.contains(&role) {
            Ok(())
        } else {
            Err(TransitionError::Unauthorized)
        }
    }

    fn permitted_roles(from: ReportStatus, to: ReportStatus) -> Option<&'static [Role]> {
        const STAFF: &[Role] = &[Role::Admin, Role::Staff];
        const TECHNICIAN: &[Role] = &[Role::Technician];

        match (from, to) {
            (ReportStatus::Unhandled, ReportStatus::InProgress) => Some(STAFF),
            (ReportStatus::InProgress, ReportStatus::AwaitingVerification) => Some(TECHNICIAN),
            (ReportStatus::AwaitingVerification, ReportStatus::Completed) => Some(STAFF),
            // Cancelling an already-cancelled report is the one dead end.
            (ReportStatus::Cancelled, ReportStatus::Cancelled) => None,
            (_, ReportStatus::Cancelled) => Some(STAFF),
            _ => None,
        }
    }
}
