//! Damage-report lifecycle: intake, co-signing, technician assignment,
//! verification, cancellation, deletion, and the two derived metrics
//! (trending popularity and post-repair satisfaction).

pub mod domain;
pub mod import;
pub mod notify;
pub mod rating;
pub mod repository;
pub mod router;
pub mod service;
pub mod storage;
pub mod transition;
pub mod trending;

#[cfg(test)]
mod tests;

pub use domain::{
    ActorContext, Assignment, AssignmentId, FacilityId, RepairStatus, Report, ReportId,
    ReportStatus, Role, SupporterEntry, TechnicianScore, UserId,
};
pub use notify::{LogNotifier, NotificationSink, NotifyError, ReportEvent};
pub use rating::{summarize, RatingSummary};
pub use repository::{
    AssignmentRow, MemoryReportStore, NewAssignment, NewReport, NewSupporter, ReportRepository,
    ReportWithSupporters, RepositoryError, TrendingRow,
};
pub use router::report_router;
pub use service::{
    AssignmentRequest, FeedbackSubmission, HistoryFilter, RepairDetail, ReportService,
    ReportSubmission, ServiceError,
};
pub use storage::{LocalPhotoStore, PhotoStore, PhotoStoreError, PhotoUpload};
pub use transition::{TransitionError, TransitionGate};
pub use trending::{rank, rank_rows, TrendingEntry, TrendingScore};
