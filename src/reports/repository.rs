use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use super::domain::{
    Assignment, AssignmentId, FacilityId, RepairStatus, Report, ReportId, ReportStatus, Role,
    SupporterEntry, TechnicianScore, UserId,
};

/// Fields for a report about to be persisted.
#[derive(Debug, Clone)]
pub struct NewReport {
    pub facility: FacilityId,
    pub description: String,
    pub damage_quantity: u32,
    pub photo: String,
    pub reported_on: NaiveDate,
}

/// Fields for a supporter entry about to be persisted. The role is recorded
/// alongside the entry so aggregation queries never reach back into session
/// state.
#[derive(Debug, Clone)]
pub struct NewSupporter {
    pub user: UserId,
    pub role: Role,
    pub extra_description: Option<String>,
}

/// Fields for a technician assignment about to be persisted.
#[derive(Debug, Clone)]
pub struct NewAssignment {
    pub report: ReportId,
    pub technician: UserId,
    pub deadline: NaiveDateTime,
}

/// Report plus its supporter entries, assembled by the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportWithSupporters {
    pub report: Report,
    pub supporters: Vec<SupporterEntry>,
}

/// Assignment joined with the report it repairs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssignmentRow {
    pub assignment: Assignment,
    pub report: Report,
}

/// One supporter's contribution to the trending board: the supported report
/// plus the supporter's role at filing time.
#[derive(Debug, Clone)]
pub struct TrendingRow {
    pub report: Report,
    pub supporter_role: Role,
}

/// Assignment fields stamped together with a status transition.
#[derive(Debug, Clone)]
pub struct AssignmentCompletion {
    pub assignment: AssignmentId,
    pub note: Option<String>,
    pub documentation: Option<String>,
    pub repair_status: RepairStatus,
    pub completed_at: NaiveDateTime,
}

/// A status move plus the row updates that must land in the same unit.
#[derive(Debug, Clone)]
pub struct TransitionChange {
    pub expected_from: ReportStatus,
    pub to: ReportStatus,
    pub assignment_update: Option<AssignmentCompletion>,
    pub report_completed_on: Option<NaiveDate>,
}

/// Everything removed by a cascade delete, returned so callers can clean up
/// stored photos after the transaction commits.
#[derive(Debug, Clone)]
pub struct DeletedReport {
    pub report: Report,
    pub supporters: Vec<SupporterEntry>,
    pub assignment: Option<Assignment>,
}

/// Error enumeration for store failures.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Storage abstraction over reports, supporter entries, assignments, and
/// technician scores. Multi-step operations (`create_report`,
/// `create_assignment`, `apply_transition`, `delete_report_cascade`) are
/// all-or-nothing: a failure leaves prior state intact.
pub trait ReportRepository: Send + Sync {
    /// Persist a report together with its creator's supporter entry.
    fn create_report(
        &self,
        report: NewReport,
        creator: NewSupporter,
    ) -> Result<ReportWithSupporters, RepositoryError>;

    fn fetch_report(&self, id: ReportId) -> Result<Option<Report>, RepositoryError>;

    /// All reports with their supporters, newest report first.
    fn list_reports(&self) -> Result<Vec<ReportWithSupporters>, RepositoryError>;

    /// Add a co-signer. At most one entry per (user, report).
    fn add_supporter(
        &self,
        report: ReportId,
        supporter: NewSupporter,
    ) -> Result<SupporterEntry, RepositoryError>;

    /// Supporter entries for one report in insertion order.
    fn supporters_of(&self, report: ReportId) -> Result<Vec<SupporterEntry>, RepositoryError>;

    fn supporter_entry(
        &self,
        report: ReportId,
        user: UserId,
    ) -> Result<Option<SupporterEntry>, RepositoryError>;

    fn set_supporter_rating(
        &self,
        report: ReportId,
        user: UserId,
        rating: u8,
        feedback: Option<String>,
    ) -> Result<SupporterEntry, RepositoryError>;

    /// Role last recorded for a user, if the store has seen them.
    fn known_role(&self, user: UserId) -> Result<Option<Role>, RepositoryError>;

    /// Persist an assignment and move its report to in-progress in one unit.
    /// Fails with `Conflict` when the report is not awaiting handling.
    fn create_assignment(
        &self,
        assignment: NewAssignment,
    ) -> Result<(Assignment, Report), RepositoryError>;

    fn fetch_assignment(
        &self,
        id: AssignmentId,
    ) -> Result<Option<AssignmentRow>, RepositoryError>;

    /// All assignments joined with their reports, newest first.
    fn assignment_rows(&self) -> Result<Vec<AssignmentRow>, RepositoryError>;

    /// Apply a validated status transition. Fails with `Conflict` when the
    /// current status no longer matches `expected_from`.
    fn apply_transition(
        &self,
        report: ReportId,
        change: TransitionChange,
    ) -> Result<Report, RepositoryError>;

    /// Remove a report, its supporter entries, and its assignment atomically.
    fn delete_report_cascade(&self, report: ReportId) -> Result<DeletedReport, RepositoryError>;

    /// One row per supporter entry whose report is not cancelled.
    fn trending_rows(&self) -> Result<Vec<TrendingRow>, RepositoryError>;

    /// Technician credit scores ordered ascending (worst first).
    fn technician_scores(&self) -> Result<Vec<TechnicianScore>, RepositoryError>;

    /// Record a technician's credit score. Scores are owned by the user
    /// administration system, which writes them through this seam; the report
    /// service itself only reads them for the staff listing.
    fn upsert_technician_score(&self, score: TechnicianScore) -> Result<(), RepositoryError>;
}

#[derive(Debug, Default)]
struct StoreInner {
    next_report: u64,
    next_supporter: u64,
    next_assignment: u64,
    reports: HashMap<ReportId, Report>,
    // Insertion order is load-bearing: rating summaries expose the first
    // ten feedback strings in the order entries were filed.
    supporters: Vec<SupporterEntry>,
    assignments: HashMap<AssignmentId, Assignment>,
    roles: HashMap<UserId, Role>,
    scores: HashMap<UserId, i32>,
}

/// Single-process store backing the service. One mutex guards the whole
/// dataset, which is what makes the multi-step operations atomic.
#[derive(Debug, Default)]
pub struct MemoryReportStore {
    inner: Mutex<StoreInner>,
}

impl MemoryReportStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, StoreInner>, RepositoryError> {
        self.inner
            .lock()
            .map_err(|_| RepositoryError::Unavailable("store mutex poisoned".to_string()))
    }
}

impl StoreInner {
    fn allocate_report(&mut self) -> ReportId {
        self.next_report += 1;
        ReportId(self.next_report)
    }

    fn allocate_supporter(&mut self) -> u64 {
        self.next_supporter += 1;
        self.next_supporter
    }

    fn allocate_assignment(&mut self) -> AssignmentId {
        self.next_assignment += 1;
        AssignmentId(self.next_assignment)
    }

    fn supporters_of(&self, report: ReportId) -> Vec<SupporterEntry> {
        self.supporters
            .iter()
            .filter(|entry| entry.report == report)
            .cloned()
            .collect()
    }
}

impl ReportRepository for MemoryReportStore {
    fn create_report(
        &self,
        report: NewReport,
        creator: NewSupporter,
    ) -> Result<ReportWithSupporters, RepositoryError> {
        let mut inner = self.lock()?;
        let id = inner.allocate_report();
        let stored = Report {
            id,
            facility: report.facility,
            description: report.description,
            damage_quantity: report.damage_quantity,
            photo: report.photo,
            reported_on: report.reported_on,
            completed_on: None,
            status: ReportStatus::Unhandled,
        };
        let entry = SupporterEntry {
            id: inner.allocate_supporter(),
            report: id,
            user: creator.user,
            extra_description: creator.extra_description,
            rating: None,
            feedback: None,
        };
        inner.reports.insert(id, stored.clone());
        inner.supporters.push(entry.clone());
        inner.roles.insert(creator.user, creator.role);
        Ok(ReportWithSupporters {
            report: stored,
            supporters: vec![entry],
        })
    }

    fn fetch_report(&self, id: ReportId) -> Result<Option<Report>, RepositoryError> {
        Ok(self.lock()?.reports.get(&id).cloned())
    }

    fn list_reports(&self) -> Result<Vec<ReportWithSupporters>, RepositoryError> {
        let inner = self.lock()?;
        let mut rows: Vec<ReportWithSupporters> = inner
            .reports
            .values()
            .map(|report| ReportWithSupporters {
                report: report.clone(),
                supporters: inner.supporters_of(report.id),
            })
            .collect();
        rows.sort_by(|a, b| b.report.id.cmp(&a.report.id));
        Ok(rows)
    }

    fn add_supporter(
        &self,
        report: ReportId,
        supporter: NewSupporter,
    ) -> Result<SupporterEntry, RepositoryError> {
        let mut inner = self.lock()?;
        if !inner.reports.contains_key(&report) {
            return Err(RepositoryError::NotFound);
        }
        let duplicate = inner
            .supporters
            .iter()
            .any(|entry| entry.report == report && entry.user == supporter.user);
        if duplicate {
            return Err(RepositoryError::Conflict);
        }
        let entry = SupporterEntry {
            id: inner.allocate_supporter(),
            report,
            user: supporter.user,
            extra_description: supporter.extra_description,
            rating: None,
            feedback: None,
        };
        inner.supporters.push(entry.clone());
        inner.roles.insert(supporter.user, supporter.role);
        Ok(entry)
    }

    fn supporters_of(&self, report: ReportId) -> Result<Vec<SupporterEntry>, RepositoryError> {
        Ok(self.lock()?.supporters_of(report))
    }

    fn supporter_entry(
        &self,
        report: ReportId,
        user: UserId,
    ) -> Result<Option<SupporterEntry>, RepositoryError> {
        Ok(self
            .lock()?
            .supporters
            .iter()
            .find(|entry| entry.report == report && entry.user == user)
            .cloned())
    }

    fn set_supporter_rating(
        &self,
        report: ReportId,
        user: UserId,
        rating: u8,
        feedback: Option<String>,
    ) -> Result<SupporterEntry, RepositoryError> {
        let mut inner = self.lock()?;
        let entry = inner
            .supporters
            .iter_mut()
            .find(|entry| entry.report == report && entry.user == user)
            .ok_or(RepositoryError::NotFound)?;
        entry.rating = Some(rating);
        entry.feedback = feedback;
        Ok(entry.clone())
    }

    fn known_role(&self, user: UserId) -> Result<Option<Role>, RepositoryError> {
        Ok(self.lock()?.roles.get(&user).copied())
    }

    fn create_assignment(
        &self,
        assignment: NewAssignment,
    ) -> Result<(Assignment, Report), RepositoryError> {
        let mut inner = self.lock()?;
        let status = inner
            .reports
            .get(&assignment.report)
            .map(|report| report.status)
            .ok_or(RepositoryError::NotFound)?;
        if status != ReportStatus::Unhandled {
            return Err(RepositoryError::Conflict);
        }
        let id = inner.allocate_assignment();
        let stored = Assignment {
            id,
            report: assignment.report,
            technician: assignment.technician,
            deadline: assignment.deadline,
            note: None,
            documentation: None,
            repair_status: RepairStatus::InProgress,
            completed_at: None,
        };
        inner.assignments.insert(id, stored.clone());
        inner.roles.insert(assignment.technician, Role::Technician);
        let report = inner
            .reports
            .get_mut(&assignment.report)
            .ok_or(RepositoryError::NotFound)?;
        report.status = ReportStatus::InProgress;
        Ok((stored, report.clone()))
    }

    fn fetch_assignment(
        &self,
        id: AssignmentId,
    ) -> Result<Option<AssignmentRow>, RepositoryError> {
        let inner = self.lock()?;
        let Some(assignment) = inner.assignments.get(&id).cloned() else {
            return Ok(None);
        };
        let report = inner
            .reports
            .get(&assignment.report)
            .cloned()
            .ok_or(RepositoryError::NotFound)?;
        Ok(Some(AssignmentRow { assignment, report }))
    }

    fn assignment_rows(&self) -> Result<Vec<AssignmentRow>, RepositoryError> {
        let inner = self.lock()?;
        let mut rows = Vec::new();
        for assignment in inner.assignments.values() {
            let report = inner
                .reports
                .get(&assignment.report)
                .cloned()
                .ok_or(RepositoryError::NotFound)?;
            rows.push(AssignmentRow {
                assignment: assignment.clone(),
                report,
            });
        }
        rows.sort_by(|a, b| b.assignment.id.cmp(&a.assignment.id));
        Ok(rows)
    }

    fn apply_transition(
        &self,
        report: ReportId,
        change: TransitionChange,
    ) -> Result<Report, RepositoryError> {
        let mut inner = self.lock()?;
        let current = inner
            .reports
            .get(&report)
            .map(|row| row.status)
            .ok_or(RepositoryError::NotFound)?;
        if current != change.expected_from {
            return Err(RepositoryError::Conflict);
        }
        if let Some(update) = &change.assignment_update {
            let assignment = inner
                .assignments
                .get_mut(&update.assignment)
                .ok_or(RepositoryError::NotFound)?;
            assignment.note = update.note.clone();
            if update.documentation.is_some() {
                assignment.documentation = update.documentation.clone();
            }
            assignment.repair_status = update.repair_status;
            assignment.completed_at = Some(update.completed_at);
        }
        let row = inner
            .reports
            .get_mut(&report)
            .ok_or(RepositoryError::NotFound)?;
        row.status = change.to;
        if change.report_completed_on.is_some() {
            row.completed_on = change.report_completed_on;
        }
        Ok(row.clone())
    }

    fn delete_report_cascade(&self, report: ReportId) -> Result<DeletedReport, RepositoryError> {
        let mut inner = self.lock()?;
        let removed = inner
            .reports
            .remove(&report)
            .ok_or(RepositoryError::NotFound)?;
        let mut supporters = Vec::new();
        inner.supporters.retain(|entry| {
            if entry.report == report {
                supporters.push(entry.clone());
                false
            } else {
                true
            }
        });
        let assignment_id = inner
            .assignments
            .values()
            .find(|assignment| assignment.report == report)
            .map(|assignment| assignment.id);
        let assignment = assignment_id.and_then(|id| inner.assignments.remove(&id));
        Ok(DeletedReport {
            report: removed,
            supporters,
            assignment,
        })
    }

    fn trending_rows(&self) -> Result<Vec<TrendingRow>, RepositoryError> {
        let inner = self.lock()?;
        let mut rows = Vec::new();
        for entry in &inner.supporters {
            let Some(report) = inner.reports.get(&entry.report) else {
                continue;
            };
            if report.status == ReportStatus::Cancelled {
                continue;
            }
            let role = inner
                .roles
                .get(&entry.user)
                .copied()
                .ok_or(RepositoryError::NotFound)?;
            rows.push(TrendingRow {
                report: report.clone(),
                supporter_role: role,
            });
        }
        Ok(rows)
    }

    fn technician_scores(&self) -> Result<Vec<TechnicianScore>, RepositoryError> {
        let inner = self.lock()?;
        let mut scores: Vec<TechnicianScore> = inner
            .scores
            .iter()
            .map(|(technician, credit_score)| TechnicianScore {
                technician: *technician,
                credit_score: *credit_score,
            })
            .collect();
        scores.sort_by(|a, b| {
            a.credit_score
                .cmp(&b.credit_score)
                .then(a.technician.cmp(&b.technician))
        });
        Ok(scores)
    }

    fn upsert_technician_score(&self, score: TechnicianScore) -> Result<(), RepositoryError> {
        self.lock()?
            .scores
            .insert(score.technician, score.credit_score);
        Ok(())
    }
}
