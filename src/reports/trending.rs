use std::collections::HashMap;

use serde::Serialize;

use super::domain::{Report, ReportId, Role};
use super::repository::TrendingRow;

/// Weighted popularity of one open report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendingScore {
    pub report: ReportId,
    pub score: u32,
    pub supporter_count: usize,
}

/// Trending score joined with the full report for API consumers.
#[derive(Debug, Clone, Serialize)]
pub struct TrendingEntry {
    pub report: Report,
    pub score: u32,
    pub supporter_count: usize,
}

/// Sum role weights per report over (report, supporter role) pairs.
///
/// Result is sorted by descending score; equal scores fall back to ascending
/// report id so the board order is stable across runs.
pub fn rank<I>(pairs: I) -> Vec<TrendingScore>
where
    I: IntoIterator<Item = (ReportId, Role)>,
{
    let mut scores: HashMap<ReportId, TrendingScore> = HashMap::new();
    for (report, role) in pairs {
        let entry = scores.entry(report).or_insert(TrendingScore {
            report,
            score: 0,
            supporter_count: 0,
        });
        entry.score += role.trending_weight();
        entry.supporter_count += 1;
    }

    let mut ranked: Vec<TrendingScore> = scores.into_values().collect();
    ranked.sort_by(|a, b| b.score.cmp(&a.score).then(a.report.cmp(&b.report)));
    ranked
}

/// Rank repository rows and reattach each report to its score.
pub fn rank_rows(rows: Vec<TrendingRow>) -> Vec<TrendingEntry> {
    let mut reports: HashMap<ReportId, Report> = HashMap::new();
    let pairs: Vec<(ReportId, Role)> = rows
        .into_iter()
        .map(|row| {
            let pair = (row.report.id, row.supporter_role);
            reports.entry(row.report.id).or_insert(row.report);
            pair
        })
        .collect();

    rank(pairs)
        .into_iter()
        .filter_map(|score| {
            reports.remove(&score.report).map(|report| TrendingEntry {
                report,
                score: score.score,
                supporter_count: score.supporter_count,
            })
        })
        .collect()
}
