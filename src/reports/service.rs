use std::sync::Arc;

use chrono::{Datelike, NaiveDate, NaiveDateTime};
use serde::Serialize;
use tracing::warn;

use super::domain::{
    ActorContext, Assignment, AssignmentId, FacilityId, RepairStatus, Report, ReportId,
    ReportStatus, Role, SupporterEntry, TechnicianScore, UserId,
};
use super::notify::{NotificationSink, ReportEvent};
use super::rating::{self, RatingSummary};
use super::repository::{
    AssignmentCompletion, AssignmentRow, NewAssignment, NewReport, NewSupporter,
    ReportRepository, ReportWithSupporters, RepositoryError, TransitionChange,
};
use super::storage::{PhotoStore, PhotoStoreError, PhotoUpload};
use super::transition::{TransitionError, TransitionGate};
use super::trending::{self, TrendingEntry};

const MAX_DESCRIPTION_LEN: usize = 255;
const MAX_NOTE_LEN: usize = 500;

const REPORT_PHOTOS: &str = "reports";
const ASSIGNMENT_PHOTOS: &str = "assignments";

/// A reporter's filing: the damaged facility, what happened, and the photo.
#[derive(Debug, Clone)]
pub struct ReportSubmission {
    pub facility: FacilityId,
    pub description: String,
    pub damage_quantity: u32,
    pub photo: PhotoUpload,
}

/// Staff request pairing a report with a technician and a deadline.
#[derive(Debug, Clone)]
pub struct AssignmentRequest {
    pub technician: UserId,
    pub deadline: NaiveDateTime,
}

/// Technician fix feedback: completion note plus documentation photo.
#[derive(Debug, Clone)]
pub struct FeedbackSubmission {
    pub note: String,
    pub documentation: PhotoUpload,
}

/// Optional narrowing of the repair history listing.
#[derive(Debug, Clone, Default)]
pub struct HistoryFilter {
    pub month: Option<u32>,
    pub status: Option<RepairStatus>,
}

/// Repair detail for staff and reporters: the assignment, its report, and the
/// aggregated satisfaction rating.
#[derive(Debug, Clone, Serialize)]
pub struct RepairDetail {
    pub assignment: Assignment,
    pub report: Report,
    pub rating: RatingSummary,
}

/// Error raised by the report service.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("resource not found")]
    NotFound,
    #[error("actor may not perform this operation")]
    Forbidden,
    #[error(transparent)]
    Transition(#[from] TransitionError),
    #[error("{0}")]
    Validation(String),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error(transparent)]
    Photo(#[from] PhotoStoreError),
}

fn validation(message: impl Into<String>) -> ServiceError {
    ServiceError::Validation(message.into())
}

/// Service composing the status gate, the aggregators, the store, and the
/// photo/notification collaborators.
pub struct ReportService<R, P, N> {
    store: Arc<R>,
    photos: Arc<P>,
    notifier: Arc<N>,
}

impl<R, P, N> ReportService<R, P, N>
where
    R: ReportRepository + 'static,
    P: PhotoStore + 'static,
    N: NotificationSink + 'static,
{
    pub fn new(store: Arc<R>, photos: Arc<P>, notifier: Arc<N>) -> Self {
        Self {
            store,
            photos,
            notifier,
        }
    }

    /// File a new damage report. The creator becomes the first supporter and
    /// the report starts unhandled.
    pub fn create_report(
        &self,
        actor: &ActorContext,
        submission: ReportSubmission,
        today: NaiveDate,
    ) -> Result<ReportWithSupporters, ServiceError> {
        if actor.role == Role::Technician {
            return Err(ServiceError::Forbidden);
        }
        let description = submission.description.trim().to_string();
        if description.is_empty() {
            return Err(validation("description must not be empty"));
        }
        if description.chars().count() > MAX_DESCRIPTION_LEN {
            return Err(validation("description exceeds 255 characters"));
        }
        if submission.damage_quantity == 0 {
            return Err(validation("damage quantity must be at least 1"));
        }

        let photo = self.photos.store(REPORT_PHOTOS, submission.photo)?;
        let created = self.store.create_report(
            NewReport {
                facility: submission.facility,
                description: description.clone(),
                damage_quantity: submission.damage_quantity,
                photo,
                reported_on: today,
            },
            NewSupporter {
                user: actor.user,
                role: actor.role,
                extra_description: Some(description),
            },
        )?;
        Ok(created)
    }

    /// Co-sign an existing report. One entry per (user, report).
    pub fn support_report(
        &self,
        actor: &ActorContext,
        report: ReportId,
        extra_description: Option<String>,
    ) -> Result<SupporterEntry, ServiceError> {
        if actor.role == Role::Technician {
            return Err(ServiceError::Forbidden);
        }
        self.fetch_report(report)?;
        let entry = self.store.add_supporter(
            report,
            NewSupporter {
                user: actor.user,
                role: actor.role,
                extra_description,
            },
        )?;
        Ok(entry)
    }

    /// All reports with their supporters, newest first.
    pub fn list_reports(
        &self,
        actor: &ActorContext,
    ) -> Result<Vec<ReportWithSupporters>, ServiceError> {
        if actor.role == Role::Technician {
            return Err(ServiceError::Forbidden);
        }
        Ok(self.store.list_reports()?)
    }

    /// Weighted popularity board over every non-cancelled report.
    pub fn trending(&self, actor: &ActorContext) -> Result<Vec<TrendingEntry>, ServiceError> {
        if actor.role == Role::Technician {
            return Err(ServiceError::Forbidden);
        }
        let rows = self.store.trending_rows()?;
        Ok(trending::rank_rows(rows))
    }

    /// Staff hands a report to a technician. Creates the assignment and moves
    /// the report to in-progress in one store transaction.
    pub fn assign_technician(
        &self,
        actor: &ActorContext,
        report: ReportId,
        request: AssignmentRequest,
    ) -> Result<(Assignment, Report), ServiceError> {
        let current = self.fetch_report(report)?.status;
        TransitionGate::check(current, ReportStatus::InProgress, actor.role)?;
        if let Some(role) = self.store.known_role(request.technician)? {
            if role != Role::Technician {
                return Err(validation("assignee is not a technician"));
            }
        }

        let (assignment, updated) = self.store.create_assignment(NewAssignment {
            report,
            technician: request.technician,
            deadline: request.deadline,
        })?;
        self.emit(ReportEvent::TechnicianAssigned {
            report,
            assignment: assignment.id,
            technician: assignment.technician,
        });
        self.emit(ReportEvent::StatusChanged {
            report,
            from: current,
            to: updated.status,
        });
        Ok((assignment, updated))
    }

    /// The assigned technician submits fix feedback. Stamps the assignment
    /// completion fields and moves the report to awaiting-verification in one
    /// store transaction. Rejected once the deadline has passed.
    pub fn submit_feedback(
        &self,
        actor: &ActorContext,
        assignment: AssignmentId,
        submission: FeedbackSubmission,
        now: NaiveDateTime,
    ) -> Result<Assignment, ServiceError> {
        let row = self
            .store
            .fetch_assignment(assignment)?
            .ok_or(ServiceError::NotFound)?;
        if actor.user != row.assignment.technician {
            return Err(ServiceError::Forbidden);
        }
        TransitionGate::check(
            row.report.status,
            ReportStatus::AwaitingVerification,
            actor.role,
        )?;
        if now > row.assignment.deadline {
            return Err(validation("repair deadline has passed"));
        }
        let note = submission.note.trim().to_string();
        if note.is_empty() {
            return Err(validation("completion note must not be empty"));
        }
        if note.chars().count() > MAX_NOTE_LEN {
            return Err(validation("completion note exceeds 500 characters"));
        }

        let documentation = self
            .photos
            .store(ASSIGNMENT_PHOTOS, submission.documentation)?;

        self.store.apply_transition(
            row.report.id,
            TransitionChange {
                expected_from: ReportStatus::InProgress,
                to: ReportStatus::AwaitingVerification,
                assignment_update: Some(AssignmentCompletion {
                    assignment,
                    note: Some(note),
                    documentation: Some(documentation),
                    repair_status: RepairStatus::Finished,
                    completed_at: now,
                }),
                report_completed_on: None,
            },
        )?;

        // Stale documentation goes away only once the transition commits; an
        // orphaned file is preferable to a record pointing at a deleted one.
        if let Some(previous) = &row.assignment.documentation {
            if let Err(err) = self.photos.remove(previous) {
                warn!(reference = %previous, error = %err, "stale documentation photo not removed");
            }
        }
        self.emit(ReportEvent::StatusChanged {
            report: row.report.id,
            from: ReportStatus::InProgress,
            to: ReportStatus::AwaitingVerification,
        });
        let updated = self
            .store
            .fetch_assignment(assignment)?
            .ok_or(ServiceError::NotFound)?;
        Ok(updated.assignment)
    }

    /// Staff confirms the fix. Stamps the report completion date.
    pub fn verify_completion(
        &self,
        actor: &ActorContext,
        report: ReportId,
        today: NaiveDate,
    ) -> Result<Report, ServiceError> {
        let current = self.fetch_report(report)?.status;
        TransitionGate::check(current, ReportStatus::Completed, actor.role)?;
        let updated = self.store.apply_transition(
            report,
            TransitionChange {
                expected_from: current,
                to: ReportStatus::Completed,
                assignment_update: None,
                report_completed_on: Some(today),
            },
        )?;
        self.emit(ReportEvent::StatusChanged {
            report,
            from: current,
            to: ReportStatus::Completed,
        });
        Ok(updated)
    }

    /// Staff cancels a report from any live state.
    pub fn cancel_report(
        &self,
        actor: &ActorContext,
        report: ReportId,
    ) -> Result<Report, ServiceError> {
        let current = self.fetch_report(report)?.status;
        TransitionGate::check(current, ReportStatus::Cancelled, actor.role)?;
        let updated = self.store.apply_transition(
            report,
            TransitionChange {
                expected_from: current,
                to: ReportStatus::Cancelled,
                assignment_update: None,
                report_completed_on: None,
            },
        )?;
        self.emit(ReportEvent::StatusChanged {
            report,
            from: current,
            to: ReportStatus::Cancelled,
        });
        Ok(updated)
    }

    /// A supporter rates the completed repair on their own entry, once.
    pub fn rate_repair(
        &self,
        actor: &ActorContext,
        report: ReportId,
        rating: u8,
        feedback: Option<String>,
    ) -> Result<SupporterEntry, ServiceError> {
        if !(1..=5).contains(&rating) {
            return Err(validation("rating must be between 1 and 5"));
        }
        let stored = self.fetch_report(report)?;
        if stored.status != ReportStatus::Completed {
            return Err(validation("report is not completed yet"));
        }
        let entry = self
            .store
            .supporter_entry(report, actor.user)?
            .ok_or(ServiceError::Forbidden)?;
        if entry.has_rated() {
            return Err(validation("rating already submitted"));
        }
        let updated = self
            .store
            .set_supporter_rating(report, actor.user, rating, feedback)?;
        Ok(updated)
    }

    /// Remove a report and everything hanging off it. Technicians may not
    /// delete reports; every other role may.
    pub fn delete_report(
        &self,
        actor: &ActorContext,
        report: ReportId,
    ) -> Result<(), ServiceError> {
        if actor.role == Role::Technician {
            return Err(ServiceError::Forbidden);
        }
        let deleted = self.store.delete_report_cascade(report)?;

        // Stored photos are cleaned up best-effort after the delete commits;
        // an orphaned file is preferable to a half-deleted report.
        if let Err(err) = self.photos.remove(&deleted.report.photo) {
            warn!(reference = %deleted.report.photo, error = %err, "report photo not removed");
        }
        if let Some(reference) = deleted
            .assignment
            .as_ref()
            .and_then(|assignment| assignment.documentation.as_deref())
        {
            if let Err(err) = self.photos.remove(reference) {
                warn!(reference = %reference, error = %err, "documentation photo not removed");
            }
        }

        self.emit(ReportEvent::ReportDeleted { report });
        Ok(())
    }

    /// Assignment detail plus the aggregated satisfaction rating.
    pub fn repair_detail(&self, assignment: AssignmentId) -> Result<RepairDetail, ServiceError> {
        let row = self
            .store
            .fetch_assignment(assignment)?
            .ok_or(ServiceError::NotFound)?;
        let supporters = self.store.supporters_of(row.report.id)?;
        Ok(RepairDetail {
            rating: rating::summarize(&supporters),
            assignment: row.assignment,
            report: row.report,
        })
    }

    /// Repairs currently being worked or freshly finished. Technicians only
    /// see their own assignments.
    pub fn active_repairs(
        &self,
        actor: &ActorContext,
    ) -> Result<Vec<AssignmentRow>, ServiceError> {
        let rows = self.store.assignment_rows()?;
        Ok(rows
            .into_iter()
            .filter(|row| row.assignment.repair_status != RepairStatus::Unfinished)
            .filter(|row| self.visible_to(actor, row))
            .collect())
    }

    /// Closed-out repairs: unfinished assignments plus assignments whose
    /// report completed. Optional month (of completion) and repair-status
    /// filters. Technicians only see their own rows.
    pub fn repair_history(
        &self,
        actor: &ActorContext,
        filter: HistoryFilter,
    ) -> Result<Vec<AssignmentRow>, ServiceError> {
        if let Some(month) = filter.month {
            if !(1..=12).contains(&month) {
                return Err(validation("month must be between 1 and 12"));
            }
        }
        let rows = self.store.assignment_rows()?;
        Ok(rows
            .into_iter()
            .filter(|row| {
                row.assignment.repair_status == RepairStatus::Unfinished
                    || row.report.status == ReportStatus::Completed
            })
            .filter(|row| self.visible_to(actor, row))
            .filter(|row| match filter.month {
                Some(month) => row
                    .assignment
                    .completed_at
                    .map(|at| at.month() == month)
                    .unwrap_or(false),
                None => true,
            })
            .filter(|row| match filter.status {
                Some(status) => row.assignment.repair_status == status,
                None => true,
            })
            .collect())
    }

    /// Technician credit scores, worst first.
    pub fn technician_scores(&self) -> Result<Vec<TechnicianScore>, ServiceError> {
        Ok(self.store.technician_scores()?)
    }

    fn fetch_report(&self, report: ReportId) -> Result<Report, ServiceError> {
        self.store
            .fetch_report(report)?
            .ok_or(ServiceError::NotFound)
    }

    fn visible_to(&self, actor: &ActorContext, row: &AssignmentRow) -> bool {
        actor.role != Role::Technician || row.assignment.technician == actor.user
    }

    fn emit(&self, event: ReportEvent) {
        if let Err(err) = self.notifier.notify(&event) {
            warn!(error = %err, "notification not delivered");
        }
    }
}
