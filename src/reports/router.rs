use std::sync::Arc;

use axum::{
    extract::{FromRequestParts, Path, Query, State},
    http::{request::Parts, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get, post, put},
    Json, Router,
};
use chrono::{Local, NaiveDateTime};
use serde::Deserialize;
use serde_json::json;

use super::domain::{ActorContext, AssignmentId, FacilityId, RepairStatus, ReportId, Role, UserId};
use super::notify::NotificationSink;
use super::repository::{ReportRepository, RepositoryError};
use super::service::{
    AssignmentRequest, FeedbackSubmission, HistoryFilter, ReportService, ReportSubmission,
    ServiceError,
};
use super::storage::{PhotoStore, PhotoStoreError, PhotoUpload};
use super::transition::TransitionError;

const ACTOR_ID_HEADER: &str = "x-actor-id";
const ACTOR_ROLE_HEADER: &str = "x-actor-role";

/// The auth boundary in front of this service resolves the session and
/// forwards the acting user as two headers. Missing or malformed headers
/// reject the request before any handler runs.
#[axum::async_trait]
impl<S: Send + Sync> FromRequestParts<S> for ActorContext {
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user = parse_header::<u64>(parts, ACTOR_ID_HEADER)?;
        let code = parse_header::<u8>(parts, ACTOR_ROLE_HEADER)?;
        let role = Role::from_code(code)
            .ok_or_else(|| unauthorized(format!("unknown role code {code}")))?;
        Ok(ActorContext::new(UserId(user), role))
    }
}

// The role header parses as u8 so an oversized value is rejected here
// instead of wrapping into a valid role code.
fn parse_header<T: std::str::FromStr>(parts: &Parts, name: &str) -> Result<T, Response> {
    parts
        .headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| unauthorized(format!("missing {name} header")))?
        .parse::<T>()
        .map_err(|_| unauthorized(format!("invalid {name} header")))
}

fn unauthorized(message: String) -> Response {
    (StatusCode::UNAUTHORIZED, Json(json!({ "error": message }))).into_response()
}

fn error_response(err: ServiceError) -> Response {
    let status = match &err {
        ServiceError::NotFound | ServiceError::Repository(RepositoryError::NotFound) => {
            StatusCode::NOT_FOUND
        }
        ServiceError::Forbidden | ServiceError::Transition(TransitionError::Unauthorized) => {
            StatusCode::FORBIDDEN
        }
        ServiceError::Transition(TransitionError::InvalidTransition { .. })
        | ServiceError::Repository(RepositoryError::Conflict) => StatusCode::CONFLICT,
        ServiceError::Validation(_) | ServiceError::Photo(PhotoStoreError::UnsupportedName(_)) => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        ServiceError::Repository(RepositoryError::Unavailable(_))
        | ServiceError::Photo(PhotoStoreError::Io(_)) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(json!({ "error": err.to_string() }))).into_response()
}

#[derive(Debug, Deserialize)]
pub(crate) struct CreateReportRequest {
    facility_id: u64,
    description: String,
    damage_quantity: u32,
    photo_name: String,
    /// Raw upload content as forwarded by the gateway. Opaque to the core.
    photo_content: String,
}

#[derive(Debug, Deserialize, Default)]
pub(crate) struct SupportRequest {
    #[serde(default)]
    extra_description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RatingRequest {
    rating: u8,
    #[serde(default)]
    feedback: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct AssignRequest {
    technician_id: u64,
    deadline: NaiveDateTime,
}

#[derive(Debug, Deserialize)]
pub(crate) struct FeedbackRequest {
    note: String,
    photo_name: String,
    photo_content: String,
}

#[derive(Debug, Deserialize, Default)]
pub(crate) struct HistoryQuery {
    #[serde(default)]
    month: Option<u32>,
    #[serde(default)]
    status: Option<String>,
}

/// Router builder exposing the report lifecycle endpoints.
pub fn report_router<R, P, N>(service: Arc<ReportService<R, P, N>>) -> Router
where
    R: ReportRepository + 'static,
    P: PhotoStore + 'static,
    N: NotificationSink + 'static,
{
    Router::new()
        .route(
            "/api/v1/reports",
            get(list_reports_handler::<R, P, N>).post(create_report_handler::<R, P, N>),
        )
        .route("/api/v1/reports/trending", get(trending_handler::<R, P, N>))
        .route(
            "/api/v1/reports/:report_id",
            delete(delete_report_handler::<R, P, N>),
        )
        .route(
            "/api/v1/reports/:report_id/support",
            post(support_handler::<R, P, N>),
        )
        .route(
            "/api/v1/reports/:report_id/rating",
            post(rating_handler::<R, P, N>),
        )
        .route(
            "/api/v1/reports/:report_id/assignments",
            post(assign_handler::<R, P, N>),
        )
        .route(
            "/api/v1/reports/:report_id/verify",
            post(verify_handler::<R, P, N>),
        )
        .route(
            "/api/v1/reports/:report_id/cancel",
            post(cancel_handler::<R, P, N>),
        )
        .route(
            "/api/v1/assignments/:assignment_id/feedback",
            put(feedback_handler::<R, P, N>),
        )
        .route("/api/v1/repairs", get(active_repairs_handler::<R, P, N>))
        .route(
            "/api/v1/repairs/history",
            get(repair_history_handler::<R, P, N>),
        )
        .route(
            "/api/v1/repairs/:assignment_id",
            get(repair_detail_handler::<R, P, N>),
        )
        .route(
            "/api/v1/technicians/scores",
            get(technician_scores_handler::<R, P, N>),
        )
        .with_state(service)
}

pub(crate) async fn create_report_handler<R, P, N>(
    State(service): State<Arc<ReportService<R, P, N>>>,
    actor: ActorContext,
    Json(payload): Json<CreateReportRequest>,
) -> Response
where
    R: ReportRepository + 'static,
    P: PhotoStore + 'static,
    N: NotificationSink + 'static,
{
    let submission = ReportSubmission {
        facility: FacilityId(payload.facility_id),
        description: payload.description,
        damage_quantity: payload.damage_quantity,
        photo: PhotoUpload {
            file_name: payload.photo_name,
            bytes: payload.photo_content.into_bytes(),
        },
    };
    match service.create_report(&actor, submission, Local::now().date_naive()) {
        Ok(created) => (StatusCode::CREATED, Json(created)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn list_reports_handler<R, P, N>(
    State(service): State<Arc<ReportService<R, P, N>>>,
    actor: ActorContext,
) -> Response
where
    R: ReportRepository + 'static,
    P: PhotoStore + 'static,
    N: NotificationSink + 'static,
{
    match service.list_reports(&actor) {
        Ok(rows) => (StatusCode::OK, Json(rows)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn trending_handler<R, P, N>(
    State(service): State<Arc<ReportService<R, P, N>>>,
    actor: ActorContext,
) -> Response
where
    R: ReportRepository + 'static,
    P: PhotoStore + 'static,
    N: NotificationSink + 'static,
{
    match service.trending(&actor) {
        Ok(board) => (StatusCode::OK, Json(board)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn delete_report_handler<R, P, N>(
    State(service): State<Arc<ReportService<R, P, N>>>,
    actor: ActorContext,
    Path(report_id): Path<u64>,
) -> Response
where
    R: ReportRepository + 'static,
    P: PhotoStore + 'static,
    N: NotificationSink + 'static,
{
    match service.delete_report(&actor, ReportId(report_id)) {
        Ok(()) => (StatusCode::OK, Json(json!({ "status": "deleted" }))).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn support_handler<R, P, N>(
    State(service): State<Arc<ReportService<R, P, N>>>,
    actor: ActorContext,
    Path(report_id): Path<u64>,
    Json(payload): Json<SupportRequest>,
) -> Response
where
    R: ReportRepository + 'static,
    P: PhotoStore + 'static,
    N: NotificationSink + 'static,
{
    match service.support_report(&actor, ReportId(report_id), payload.extra_description) {
        Ok(entry) => (StatusCode::CREATED, Json(entry)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn rating_handler<R, P, N>(
    State(service): State<Arc<ReportService<R, P, N>>>,
    actor: ActorContext,
    Path(report_id): Path<u64>,
    Json(payload): Json<RatingRequest>,
) -> Response
where
    R: ReportRepository + 'static,
    P: PhotoStore + 'static,
    N: NotificationSink + 'static,
{
    match service.rate_repair(&actor, ReportId(report_id), payload.rating, payload.feedback) {
        Ok(entry) => (StatusCode::OK, Json(entry)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn assign_handler<R, P, N>(
    State(service): State<Arc<ReportService<R, P, N>>>,
    actor: ActorContext,
    Path(report_id): Path<u64>,
    Json(payload): Json<AssignRequest>,
) -> Response
where
    R: ReportRepository + 'static,
    P: PhotoStore + 'static,
    N: NotificationSink + 'static,
{
    let request = AssignmentRequest {
        technician: UserId(payload.technician_id),
        deadline: payload.deadline,
    };
    match service.assign_technician(&actor, ReportId(report_id), request) {
        Ok((assignment, report)) => (
            StatusCode::CREATED,
            Json(json!({ "assignment": assignment, "report": report })),
        )
            .into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn verify_handler<R, P, N>(
    State(service): State<Arc<ReportService<R, P, N>>>,
    actor: ActorContext,
    Path(report_id): Path<u64>,
) -> Response
where
    R: ReportRepository + 'static,
    P: PhotoStore + 'static,
    N: NotificationSink + 'static,
{
    match service.verify_completion(&actor, ReportId(report_id), Local::now().date_naive()) {
        Ok(report) => (StatusCode::OK, Json(report)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn cancel_handler<R, P, N>(
    State(service): State<Arc<ReportService<R, P, N>>>,
    actor: ActorContext,
    Path(report_id): Path<u64>,
) -> Response
where
    R: ReportRepository + 'static,
    P: PhotoStore + 'static,
    N: NotificationSink + 'static,
{
    match service.cancel_report(&actor, ReportId(report_id)) {
        Ok(report) => (StatusCode::OK, Json(report)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn feedback_handler<R, P, N>(
    State(service): State<Arc<ReportService<R, P, N>>>,
    actor: ActorContext,
    Path(assignment_id): Path<u64>,
    Json(payload): Json<FeedbackRequest>,
) -> Response
where
    R: ReportRepository + 'static,
    P: PhotoStore + 'static,
    N: NotificationSink + 'static,
{
    let submission = FeedbackSubmission {
        note: payload.note,
        documentation: PhotoUpload {
            file_name: payload.photo_name,
            bytes: payload.photo_content.into_bytes(),
        },
    };
    match service.submit_feedback(
        &actor,
        AssignmentId(assignment_id),
        submission,
        Local::now().naive_local(),
    ) {
        Ok(assignment) => (StatusCode::OK, Json(assignment)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn active_repairs_handler<R, P, N>(
    State(service): State<Arc<ReportService<R, P, N>>>,
    actor: ActorContext,
) -> Response
where
    R: ReportRepository + 'static,
    P: PhotoStore + 'static,
    N: NotificationSink + 'static,
{
    match service.active_repairs(&actor) {
        Ok(rows) => (StatusCode::OK, Json(rows)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn repair_history_handler<R, P, N>(
    State(service): State<Arc<ReportService<R, P, N>>>,
    actor: ActorContext,
    Query(query): Query<HistoryQuery>,
) -> Response
where
    R: ReportRepository + 'static,
    P: PhotoStore + 'static,
    N: NotificationSink + 'static,
{
    let status = match query.status.as_deref() {
        None => None,
        Some(raw) => match RepairStatus::from_wire_label(raw) {
            Some(status) => Some(status),
            None => {
                return error_response(ServiceError::Validation(format!(
                    "unknown repair status '{raw}'"
                )))
            }
        },
    };
    let filter = HistoryFilter {
        month: query.month,
        status,
    };
    match service.repair_history(&actor, filter) {
        Ok(rows) => (StatusCode::OK, Json(rows)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn repair_detail_handler<R, P, N>(
    State(service): State<Arc<ReportService<R, P, N>>>,
    _actor: ActorContext,
    Path(assignment_id): Path<u64>,
) -> Response
where
    R: ReportRepository + 'static,
    P: PhotoStore + 'static,
    N: NotificationSink + 'static,
{
    match service.repair_detail(AssignmentId(assignment_id)) {
        Ok(detail) => (StatusCode::OK, Json(detail)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn technician_scores_handler<R, P, N>(
    State(service): State<Arc<ReportService<R, P, N>>>,
    _actor: ActorContext,
) -> Response
where
    R: ReportRepository + 'static,
    P: PhotoStore + 'static,
    N: NotificationSink + 'static,
{
    match service.technician_scores() {
        Ok(scores) => (StatusCode::OK, Json(scores)).into_response(),
        Err(err) => error_response(err),
    }
}
