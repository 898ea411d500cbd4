use std::sync::Arc;

use chrono::NaiveDate;
use maintrack::reports::{
    ActorContext, AssignmentRequest, FacilityId, FeedbackSubmission, LocalPhotoStore, LogNotifier,
    MemoryReportStore, PhotoUpload, RepairStatus, ReportService, ReportStatus, ReportSubmission,
    Role, ServiceError, UserId,
};

type LifecycleService = ReportService<MemoryReportStore, LocalPhotoStore, LogNotifier>;

fn service() -> LifecycleService {
    static SEQUENCE: std::sync::atomic::AtomicU64 = std::sync::atomic::AtomicU64::new(0);
    let unique = SEQUENCE.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
    let root = std::env::temp_dir().join(format!(
        "maintrack-lifecycle-{}-{unique}",
        std::process::id()
    ));
    ReportService::new(
        Arc::new(MemoryReportStore::new()),
        Arc::new(LocalPhotoStore::new(root)),
        Arc::new(LogNotifier),
    )
}

fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 3, d).expect("valid date")
}

fn photo(name: &str) -> PhotoUpload {
    PhotoUpload {
        file_name: name.to_string(),
        bytes: b"image".to_vec(),
    }
}

#[test]
fn report_travels_from_intake_to_rated_completion() {
    let service = service();
    let reporter = ActorContext::new(UserId(10), Role::Student);
    let co_signer = ActorContext::new(UserId(11), Role::Lecturer);
    let staff = ActorContext::new(UserId(2), Role::Staff);
    let technician = ActorContext::new(UserId(30), Role::Technician);

    let created = service
        .create_report(
            &reporter,
            ReportSubmission {
                facility: FacilityId(7),
                description: "Broken window latch in lab 2".to_string(),
                damage_quantity: 2,
                photo: photo("latch.jpg"),
            },
            day(1),
        )
        .expect("report files");
    assert_eq!(created.report.status, ReportStatus::Unhandled);

    service
        .support_report(&co_signer, created.report.id, Some("same latch".into()))
        .expect("co-sign lands");

    let board = service.trending(&staff).expect("board builds");
    assert_eq!(board[0].score, 4);

    let (assignment, report) = service
        .assign_technician(
            &staff,
            created.report.id,
            AssignmentRequest {
                technician: technician.user,
                deadline: day(5).and_hms_opt(17, 0, 0).expect("valid time"),
            },
        )
        .expect("assignment lands");
    assert_eq!(report.status, ReportStatus::InProgress);
    assert_eq!(assignment.repair_status, RepairStatus::InProgress);

    let finished = service
        .submit_feedback(
            &technician,
            assignment.id,
            FeedbackSubmission {
                note: "Latch replaced and tested".to_string(),
                documentation: photo("after.jpg"),
            },
            day(4).and_hms_opt(10, 0, 0).expect("valid time"),
        )
        .expect("feedback lands");
    assert_eq!(finished.repair_status, RepairStatus::Finished);

    let verified = service
        .verify_completion(&staff, created.report.id, day(5))
        .expect("verification lands");
    assert_eq!(verified.status, ReportStatus::Completed);
    assert_eq!(verified.completed_on, Some(day(5)));

    service
        .rate_repair(&reporter, created.report.id, 5, Some("great work".into()))
        .expect("rating lands");
    service
        .rate_repair(&co_signer, created.report.id, 4, None)
        .expect("second rating lands");

    let detail = service.repair_detail(assignment.id).expect("detail loads");
    // S=2, T=9: (9/10)*5 = 4.50
    assert_eq!(detail.rating.supporter_count, 2);
    assert!((detail.rating.score - 4.50).abs() < f64::EPSILON);
    assert_eq!(detail.rating.feedback, vec!["great work".to_string()]);
}

#[test]
fn cancelled_reports_leave_the_board_and_stay_closed() {
    let service = service();
    let reporter = ActorContext::new(UserId(10), Role::Student);
    let staff = ActorContext::new(UserId(2), Role::Staff);

    let created = service
        .create_report(
            &reporter,
            ReportSubmission {
                facility: FacilityId(7),
                description: "Flickering corridor light".to_string(),
                damage_quantity: 1,
                photo: photo("light.png"),
            },
            day(1),
        )
        .expect("report files");

    service
        .cancel_report(&staff, created.report.id)
        .expect("cancellation lands");

    assert!(service.trending(&staff).expect("board builds").is_empty());
    assert!(matches!(
        service.cancel_report(&staff, created.report.id),
        Err(ServiceError::Transition(_))
    ));
}
