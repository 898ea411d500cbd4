use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use axum::response::Response;
use chrono::{NaiveDate, NaiveDateTime};
use serde_json::Value;

use crate::reports::domain::{
    ActorContext, Assignment, AssignmentId, FacilityId, Report, ReportId, Role, TechnicianScore,
    UserId,
};
use crate::reports::notify::{NotificationSink, NotifyError, ReportEvent};
use crate::reports::repository::{
    AssignmentRow, DeletedReport, MemoryReportStore, NewAssignment, NewReport, NewSupporter,
    ReportRepository, ReportWithSupporters, RepositoryError, TransitionChange, TrendingRow,
};
use crate::reports::router::report_router;
use crate::reports::service::{
    AssignmentRequest, FeedbackSubmission, ReportService, ReportSubmission,
};
use crate::reports::storage::{PhotoStore, PhotoStoreError, PhotoUpload};
use crate::reports::SupporterEntry;

pub(super) const TECHNICIAN_ID: u64 = 30;

pub(super) fn admin() -> ActorContext {
    ActorContext::new(UserId(1), Role::Admin)
}

pub(super) fn staff() -> ActorContext {
    ActorContext::new(UserId(2), Role::Staff)
}

pub(super) fn technician(id: u64) -> ActorContext {
    ActorContext::new(UserId(id), Role::Technician)
}

pub(super) fn student(id: u64) -> ActorContext {
    ActorContext::new(UserId(id), Role::Student)
}

pub(super) fn lecturer(id: u64) -> ActorContext {
    ActorContext::new(UserId(id), Role::Lecturer)
}

pub(super) fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 3, 10).expect("valid date")
}

pub(super) fn before_deadline() -> NaiveDateTime {
    today().and_hms_opt(9, 0, 0).expect("valid time")
}

pub(super) fn deadline() -> NaiveDateTime {
    today().and_hms_opt(17, 0, 0).expect("valid time")
}

pub(super) fn photo(name: &str) -> PhotoUpload {
    PhotoUpload {
        file_name: name.to_string(),
        bytes: b"opaque image bytes".to_vec(),
    }
}

pub(super) fn submission(facility: u64) -> ReportSubmission {
    ReportSubmission {
        facility: FacilityId(facility),
        description: "Projector no longer powers on".to_string(),
        damage_quantity: 1,
        photo: photo("projector.jpg"),
    }
}

pub(super) type TestService = ReportService<MemoryReportStore, MemoryPhotoStore, MemoryNotifier>;

pub(super) fn build_service() -> (
    TestService,
    Arc<MemoryReportStore>,
    Arc<MemoryPhotoStore>,
    Arc<MemoryNotifier>,
) {
    let store = Arc::new(MemoryReportStore::new());
    let photos = Arc::new(MemoryPhotoStore::default());
    let notifier = Arc::new(MemoryNotifier::default());
    let service = ReportService::new(store.clone(), photos.clone(), notifier.clone());
    (service, store, photos, notifier)
}

pub(super) fn router_with_service(service: TestService) -> axum::Router {
    report_router(Arc::new(service))
}

/// File a report as the given reporter and return it with its first entry.
pub(super) fn file_report(service: &TestService, reporter: &ActorContext) -> ReportWithSupporters {
    service
        .create_report(reporter, submission(11), today())
        .expect("report files")
}

/// File and hand to the technician fixture. Returns the in-progress pair.
pub(super) fn assigned_report(
    service: &TestService,
    reporter: &ActorContext,
) -> (Report, Assignment) {
    let created = file_report(service, reporter);
    let (assignment, report) = service
        .assign_technician(
            &staff(),
            created.report.id,
            AssignmentRequest {
                technician: UserId(TECHNICIAN_ID),
                deadline: deadline(),
            },
        )
        .expect("assignment created");
    (report, assignment)
}

/// Drive a report through the whole lifecycle to completed.
pub(super) fn completed_report(
    service: &TestService,
    reporter: &ActorContext,
) -> (Report, Assignment) {
    let (report, assignment) = assigned_report(service, reporter);
    service
        .submit_feedback(
            &technician(TECHNICIAN_ID),
            assignment.id,
            FeedbackSubmission {
                note: "Replaced power supply".to_string(),
                documentation: photo("fixed.jpg"),
            },
            before_deadline(),
        )
        .expect("feedback accepted");
    let report = service
        .verify_completion(&staff(), report.id, today())
        .expect("verification accepted");
    let assignment = service
        .repair_detail(assignment.id)
        .expect("detail loads")
        .assignment;
    (report, assignment)
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}

#[derive(Default)]
pub(super) struct MemoryPhotoStore {
    sequence: AtomicU64,
    stored: Mutex<Vec<String>>,
    removed: Mutex<Vec<String>>,
}

impl MemoryPhotoStore {
    pub(super) fn stored(&self) -> Vec<String> {
        self.stored.lock().expect("photo mutex poisoned").clone()
    }

    pub(super) fn removed(&self) -> Vec<String> {
        self.removed.lock().expect("photo mutex poisoned").clone()
    }
}

impl PhotoStore for MemoryPhotoStore {
    fn store(&self, category: &str, upload: PhotoUpload) -> Result<String, PhotoStoreError> {
        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed);
        let reference = format!("{category}/{sequence:06}-{}", upload.file_name);
        self.stored
            .lock()
            .expect("photo mutex poisoned")
            .push(reference.clone());
        Ok(reference)
    }

    fn remove(&self, reference: &str) -> Result<(), PhotoStoreError> {
        self.removed
            .lock()
            .expect("photo mutex poisoned")
            .push(reference.to_string());
        Ok(())
    }
}

#[derive(Default)]
pub(super) struct MemoryNotifier {
    events: Mutex<Vec<ReportEvent>>,
}

impl MemoryNotifier {
    pub(super) fn events(&self) -> Vec<ReportEvent> {
        self.events.lock().expect("notifier mutex poisoned").clone()
    }
}

impl NotificationSink for MemoryNotifier {
    fn notify(&self, event: &ReportEvent) -> Result<(), NotifyError> {
        self.events
            .lock()
            .expect("notifier mutex poisoned")
            .push(event.clone());
        Ok(())
    }
}

fn unavailable() -> RepositoryError {
    RepositoryError::Unavailable("database offline".to_string())
}

/// Store whose transitions fail while everything else works, for checking
/// what the service cleans up around a failed `apply_transition`.
pub(super) struct TransitionUnavailableStore {
    pub(super) inner: MemoryReportStore,
}

impl ReportRepository for TransitionUnavailableStore {
    fn create_report(
        &self,
        report: NewReport,
        creator: NewSupporter,
    ) -> Result<ReportWithSupporters, RepositoryError> {
        self.inner.create_report(report, creator)
    }

    fn fetch_report(&self, id: ReportId) -> Result<Option<Report>, RepositoryError> {
        self.inner.fetch_report(id)
    }

    fn list_reports(&self) -> Result<Vec<ReportWithSupporters>, RepositoryError> {
        self.inner.list_reports()
    }

    fn add_supporter(
        &self,
        report: ReportId,
        supporter: NewSupporter,
    ) -> Result<SupporterEntry, RepositoryError> {
        self.inner.add_supporter(report, supporter)
    }

    fn supporters_of(&self, report: ReportId) -> Result<Vec<SupporterEntry>, RepositoryError> {
        self.inner.supporters_of(report)
    }

    fn supporter_entry(
        &self,
        report: ReportId,
        user: UserId,
    ) -> Result<Option<SupporterEntry>, RepositoryError> {
        self.inner.supporter_entry(report, user)
    }

    fn set_supporter_rating(
        &self,
        report: ReportId,
        user: UserId,
        rating: u8,
        feedback: Option<String>,
    ) -> Result<SupporterEntry, RepositoryError> {
        self.inner.set_supporter_rating(report, user, rating, feedback)
    }

    fn known_role(&self, user: UserId) -> Result<Option<Role>, RepositoryError> {
        self.inner.known_role(user)
    }

    fn create_assignment(
        &self,
        assignment: NewAssignment,
    ) -> Result<(Assignment, Report), RepositoryError> {
        self.inner.create_assignment(assignment)
    }

    fn fetch_assignment(
        &self,
        id: AssignmentId,
    ) -> Result<Option<AssignmentRow>, RepositoryError> {
        self.inner.fetch_assignment(id)
    }

    fn assignment_rows(&self) -> Result<Vec<AssignmentRow>, RepositoryError> {
        self.inner.assignment_rows()
    }

    fn apply_transition(
        &self,
        _report: ReportId,
        _change: TransitionChange,
    ) -> Result<Report, RepositoryError> {
        Err(unavailable())
    }

    fn delete_report_cascade(&self, report: ReportId) -> Result<DeletedReport, RepositoryError> {
        self.inner.delete_report_cascade(report)
    }

    fn trending_rows(&self) -> Result<Vec<TrendingRow>, RepositoryError> {
        self.inner.trending_rows()
    }

    fn technician_scores(&self) -> Result<Vec<TechnicianScore>, RepositoryError> {
        self.inner.technician_scores()
    }

    fn upsert_technician_score(&self, score: TechnicianScore) -> Result<(), RepositoryError> {
        self.inner.upsert_technician_score(score)
    }
}

/// Store stand-in whose every call fails, for storage-failure propagation.
pub(super) struct UnavailableStore;

impl ReportRepository for UnavailableStore {
    fn create_report(
        &self,
        _report: NewReport,
        _creator: NewSupporter,
    ) -> Result<ReportWithSupporters, RepositoryError> {
        Err(unavailable())
    }

    fn fetch_report(&self, _id: ReportId) -> Result<Option<Report>, RepositoryError> {
        Err(unavailable())
    }

    fn list_reports(&self) -> Result<Vec<ReportWithSupporters>, RepositoryError> {
        Err(unavailable())
    }

    fn add_supporter(
        &self,
        _report: ReportId,
        _supporter: NewSupporter,
    ) -> Result<SupporterEntry, RepositoryError> {
        Err(unavailable())
    }

    fn supporters_of(&self, _report: ReportId) -> Result<Vec<SupporterEntry>, RepositoryError> {
        Err(unavailable())
    }

    fn supporter_entry(
        &self,
        _report: ReportId,
        _user: UserId,
    ) -> Result<Option<SupporterEntry>, RepositoryError> {
        Err(unavailable())
    }

    fn set_supporter_rating(
        &self,
        _report: ReportId,
        _user: UserId,
        _rating: u8,
        _feedback: Option<String>,
    ) -> Result<SupporterEntry, RepositoryError> {
        Err(unavailable())
    }

    fn known_role(&self, _user: UserId) -> Result<Option<Role>, RepositoryError> {
        Err(unavailable())
    }

    fn create_assignment(
        &self,
        _assignment: NewAssignment,
    ) -> Result<(Assignment, Report), RepositoryError> {
        Err(unavailable())
    }

    fn fetch_assignment(
        &self,
        _id: AssignmentId,
    ) -> Result<Option<AssignmentRow>, RepositoryError> {
        Err(unavailable())
    }

    fn assignment_rows(&self) -> Result<Vec<AssignmentRow>, RepositoryError> {
        Err(unavailable())
    }

    fn apply_transition(
        &self,
        _report: ReportId,
        _change: TransitionChange,
    ) -> Result<Report, RepositoryError> {
        Err(unavailable())
    }

    fn delete_report_cascade(&self, _report: ReportId) -> Result<DeletedReport, RepositoryError> {
        Err(unavailable())
    }

    fn trending_rows(&self) -> Result<Vec<TrendingRow>, RepositoryError> {
        Err(unavailable())
    }

    fn technician_scores(&self) -> Result<Vec<TechnicianScore>, RepositoryError> {
        Err(unavailable())
    }

    fn upsert_technician_score(&self, _score: TechnicianScore) -> Result<(), RepositoryError> {
        Err(unavailable())
    }
}
