use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier wrapper for damage reports.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct ReportId(pub u64);

/// Identifier wrapper for user accounts supplied by the auth boundary.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct UserId(pub u64);

/// Identifier wrapper for technician assignments.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct AssignmentId(pub u64);

/// Identifier wrapper for catalog facilities (rooms and buildings live behind it).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct FacilityId(pub u64);

impl fmt::Display for ReportId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for AssignmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Account roles recognized by the reporting workflow.
///
/// The numeric codes are the legacy level ids carried by the auth boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    Staff,
    Technician,
    Student,
    Lecturer,
}

impl Role {
    pub const fn code(self) -> u8 {
        match self {
            Role::Admin => 1,
            Role::Staff => 2,
            Role::Technician => 3,
            Role::Student => 4,
            Role::Lecturer => 5,
        }
    }

    pub const fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(Role::Admin),
            2 => Some(Role::Staff),
            3 => Some(Role::Technician),
            4 => Some(Role::Student),
            5 => Some(Role::Lecturer),
            _ => None,
        }
    }

    /// Trending contribution per supporter. Roles outside the recognized
    /// set contribute nothing to a report's score.
    pub const fn trending_weight(self) -> u32 {
        match self {
            Role::Student => 1,
            Role::Technician => 2,
            Role::Lecturer => 3,
            Role::Admin => 3,
            Role::Staff => 0,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Staff => "staff",
            Role::Technician => "technician",
            Role::Student => "student",
            Role::Lecturer => "lecturer",
        }
    }

    pub const fn is_staff(self) -> bool {
        matches!(self, Role::Admin | Role::Staff)
    }
}

/// Lifecycle state of a damage report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportStatus {
    Unhandled,
    InProgress,
    AwaitingVerification,
    Completed,
    Cancelled,
}

impl ReportStatus {
    pub const fn code(self) -> u8 {
        match self {
            ReportStatus::Unhandled => 1,
            ReportStatus::InProgress => 2,
            ReportStatus::AwaitingVerification => 3,
            ReportStatus::Completed => 4,
            ReportStatus::Cancelled => 5,
        }
    }

    pub const fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(ReportStatus::Unhandled),
            2 => Some(ReportStatus::InProgress),
            3 => Some(ReportStatus::AwaitingVerification),
            4 => Some(ReportStatus::Completed),
            5 => Some(ReportStatus::Cancelled),
            _ => None,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            ReportStatus::Unhandled => "unhandled",
            ReportStatus::InProgress => "in_progress",
            ReportStatus::AwaitingVerification => "awaiting_verification",
            ReportStatus::Completed => "completed",
            ReportStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for ReportStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Progress marker on a technician assignment. Serialized with the wire
/// strings the legacy clients expect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RepairStatus {
    #[serde(rename = "Sedang Dikerjakan")]
    InProgress,
    #[serde(rename = "Selesai")]
    Finished,
    #[serde(rename = "Tidak Selesai")]
    Unfinished,
}

impl RepairStatus {
    pub const fn wire_label(self) -> &'static str {
        match self {
            RepairStatus::InProgress => "Sedang Dikerjakan",
            RepairStatus::Finished => "Selesai",
            RepairStatus::Unfinished => "Tidak Selesai",
        }
    }

    pub fn from_wire_label(value: &str) -> Option<Self> {
        match value {
            "Sedang Dikerjakan" => Some(RepairStatus::InProgress),
            "Selesai" => Some(RepairStatus::Finished),
            "Tidak Selesai" => Some(RepairStatus::Unfinished),
            _ => None,
        }
    }
}

/// A filed damage record for one facility.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub id: ReportId,
    pub facility: FacilityId,
    pub description: String,
    pub damage_quantity: u32,
    pub photo: String,
    pub reported_on: NaiveDate,
    pub completed_on: Option<NaiveDate>,
    pub status: ReportStatus,
}

/// One user's stake in a report: the original filer or a co-signer, plus the
/// rating fields that become meaningful once the repair completes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupporterEntry {
    pub id: u64,
    pub report: ReportId,
    pub user: UserId,
    pub extra_description: Option<String>,
    pub rating: Option<u8>,
    pub feedback: Option<String>,
}

impl SupporterEntry {
    pub fn has_rated(&self) -> bool {
        self.rating.is_some()
    }
}

/// Linkage of a report to the technician working it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assignment {
    pub id: AssignmentId,
    pub report: ReportId,
    pub technician: UserId,
    pub deadline: NaiveDateTime,
    pub note: Option<String>,
    pub documentation: Option<String>,
    pub repair_status: RepairStatus,
    pub completed_at: Option<NaiveDateTime>,
}

/// Standing credit score per technician, maintained outside the report
/// lifecycle and listed worst-first for staff review.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TechnicianScore {
    pub technician: UserId,
    pub credit_score: i32,
}

/// The acting user for an operation, resolved by the auth boundary and
/// threaded explicitly instead of read from ambient session state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActorContext {
    pub user: UserId,
    pub role: Role,
}

impl ActorContext {
    pub const fn new(user: UserId, role: Role) -> Self {
        Self { user, role }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_codes_round_trip() {
        for role in [
            Role::Admin,
            Role::Staff,
            Role::Technician,
            Role::Student,
            Role::Lecturer,
        ] {
            assert_eq!(Role::from_code(role.code()), Some(role));
        }
        assert_eq!(Role::from_code(0), None);
        assert_eq!(Role::from_code(9), None);
    }

    #[test]
    fn trending_weights_match_role_table() {
        assert_eq!(Role::Student.trending_weight(), 1);
        assert_eq!(Role::Technician.trending_weight(), 2);
        assert_eq!(Role::Lecturer.trending_weight(), 3);
        assert_eq!(Role::Admin.trending_weight(), 3);
        assert_eq!(Role::Staff.trending_weight(), 0);
    }

    #[test]
    fn status_codes_round_trip() {
        for status in [
            ReportStatus::Unhandled,
            ReportStatus::InProgress,
            ReportStatus::AwaitingVerification,
            ReportStatus::Completed,
            ReportStatus::Cancelled,
        ] {
            assert_eq!(ReportStatus::from_code(status.code()), Some(status));
        }
        assert_eq!(ReportStatus::from_code(0), None);
    }

    #[test]
    fn repair_status_uses_legacy_wire_labels() {
        let json = serde_json::to_string(&RepairStatus::Finished).expect("serializes");
        assert_eq!(json, "\"Selesai\"");
        assert_eq!(
            RepairStatus::from_wire_label("Tidak Selesai"),
            Some(RepairStatus::Unfinished)
        );
        assert_eq!(RepairStatus::from_wire_label("Done"), None);
    }
}
