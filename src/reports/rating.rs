use serde::Serialize;

use super::domain::SupporterEntry;

/// How many feedback strings a summary exposes.
const FEEDBACK_LIMIT: usize = 10;

/// Normalized satisfaction score for a completed repair.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RatingSummary {
    pub supporter_count: usize,
    pub rating_count: usize,
    pub score: f64,
    pub feedback: Vec<String>,
}

/// Summarize supporter ratings for one report.
///
/// With S supporters and rating sum T, the score is `(T / (5 * S)) * 5`
/// rounded to two decimals. The divisor is the full supporter count, not the
/// respondent count: a report whose supporters mostly stayed silent scores
/// lower than one with the same average but full response.
pub fn summarize(entries: &[SupporterEntry]) -> RatingSummary {
    let supporter_count = entries.len();
    let mut rating_count = 0usize;
    let mut total = 0u32;
    for entry in entries {
        if let Some(rating) = entry.rating {
            rating_count += 1;
            total += u32::from(rating);
        }
    }

    let score = if supporter_count > 0 {
        let normalized = (f64::from(total) / (5.0 * supporter_count as f64)) * 5.0;
        round_two(normalized)
    } else {
        0.0
    };

    let feedback = entries
        .iter()
        .filter_map(|entry| entry.feedback.clone())
        .take(FEEDBACK_LIMIT)
        .collect();

    RatingSummary {
        supporter_count,
        rating_count,
        score,
        feedback,
    }
}

fn round_two(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
