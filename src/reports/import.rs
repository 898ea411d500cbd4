use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use serde::{Deserialize, Deserializer};

use super::domain::{ReportId, ReportStatus, Role, SupporterEntry, UserId};
use super::rating::{self, RatingSummary};
use super::trending::{self, TrendingScore};

/// Error enumeration for snapshot loading.
#[derive(Debug, thiserror::Error)]
pub enum SnapshotImportError {
    #[error("failed to read snapshot: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse snapshot row: {0}")]
    Csv(#[from] csv::Error),
    #[error("row {row}: unknown status code {code}")]
    UnknownStatus { row: usize, code: u8 },
    #[error("row {row}: unknown role code {code}")]
    UnknownRole { row: usize, code: u8 },
    #[error("row {row}: rating {rating} outside 1-5")]
    RatingOutOfRange { row: usize, rating: u8 },
}

/// One supporter entry exported from the production database, flattened with
/// the columns the aggregators need.
#[derive(Debug, Clone)]
pub struct SnapshotEntry {
    pub report: ReportId,
    pub description: String,
    pub status: ReportStatus,
    pub role: Role,
    pub rating: Option<u8>,
    pub feedback: Option<String>,
}

/// An offline export of supporter entries, used to run the aggregators from
/// the command line without a live service.
#[derive(Debug, Default)]
pub struct ReportSnapshot {
    entries: Vec<SnapshotEntry>,
}

impl ReportSnapshot {
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, SnapshotImportError> {
        Self::from_reader(File::open(path)?)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self, SnapshotImportError> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);

        let mut entries = Vec::new();
        for (index, record) in csv_reader.deserialize::<SnapshotRow>().enumerate() {
            let row = record?;
            // Header is line 1, first data row is line 2.
            let line = index + 2;
            let status = ReportStatus::from_code(row.status_code).ok_or(
                SnapshotImportError::UnknownStatus {
                    row: line,
                    code: row.status_code,
                },
            )?;
            let role =
                Role::from_code(row.role_code).ok_or(SnapshotImportError::UnknownRole {
                    row: line,
                    code: row.role_code,
                })?;
            if let Some(rating) = row.rating {
                if !(1..=5).contains(&rating) {
                    return Err(SnapshotImportError::RatingOutOfRange { row: line, rating });
                }
            }
            entries.push(SnapshotEntry {
                report: ReportId(row.report_id),
                description: row.description,
                status,
                role,
                rating: row.rating,
                feedback: row.feedback,
            });
        }

        Ok(Self { entries })
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Trending board over the snapshot's non-cancelled reports.
    pub fn trending(&self) -> Vec<TrendingScore> {
        trending::rank(
            self.entries
                .iter()
                .filter(|entry| entry.status != ReportStatus::Cancelled)
                .map(|entry| (entry.report, entry.role)),
        )
    }

    /// Satisfaction summary for one report in the snapshot, if present.
    pub fn rating_summary(&self, report: ReportId) -> Option<RatingSummary> {
        let supporters: Vec<SupporterEntry> = self
            .entries
            .iter()
            .filter(|entry| entry.report == report)
            .enumerate()
            .map(|(index, entry)| SupporterEntry {
                id: index as u64 + 1,
                report: entry.report,
                user: UserId(index as u64 + 1),
                extra_description: None,
                rating: entry.rating,
                feedback: entry.feedback.clone(),
            })
            .collect();
        if supporters.is_empty() {
            return None;
        }
        Some(rating::summarize(&supporters))
    }

    /// Report descriptions keyed by id, for rendering the board.
    pub fn descriptions(&self) -> HashMap<ReportId, &str> {
        let mut map = HashMap::new();
        for entry in &self.entries {
            map.entry(entry.report).or_insert(entry.description.as_str());
        }
        map
    }
}

#[derive(Debug, Deserialize)]
struct SnapshotRow {
    #[serde(rename = "Report ID")]
    report_id: u64,
    #[serde(rename = "Report Description", default)]
    description: String,
    #[serde(rename = "Status Code")]
    status_code: u8,
    #[serde(rename = "Role Code")]
    role_code: u8,
    #[serde(rename = "Rating", default, deserialize_with = "empty_as_none_u8")]
    rating: Option<u8>,
    #[serde(rename = "Feedback", default, deserialize_with = "empty_as_none")]
    feedback: Option<String>,
}

fn empty_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let opt = Option::<String>::deserialize(deserializer)?;
    Ok(opt.filter(|value| !value.trim().is_empty()))
}

fn empty_as_none_u8<'de, D>(deserializer: D) -> Result<Option<u8>, D::Error>
where
    D: Deserializer<'de>,
{
    let opt = Option::<String>::deserialize(deserializer)?;
    match opt.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(raw) => raw
            .parse::<u8>()
            .map(Some)
            .map_err(serde::de::Error::custom),
    }
}
