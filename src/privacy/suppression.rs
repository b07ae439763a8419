use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::table::{CountsTable, Period};
use crate::types::{Denominator, RedactionSummary};

/// Reason a counts cell was replaced with the sentinel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuppressionReason {
    /// Value at or below the disclosure threshold
    BelowThreshold,
    /// Whole category group totals at or below the threshold
    GroupTotal,
    /// Pulled in so the hidden mass of the group exceeds the threshold
    Cascade,
    /// Only redaction in its group; a second one blocks subtraction from the total
    Completion,
    /// Another cell of the same period was redacted
    Propagated,
}

impl fmt::Display for SuppressionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            SuppressionReason::BelowThreshold => "count at or below disclosure threshold",
            SuppressionReason::GroupTotal => "group total at or below disclosure threshold",
            SuppressionReason::Cascade => "smallest remaining count in a group with small counts",
            SuppressionReason::Completion => "single redaction in group would be recoverable",
            SuppressionReason::Propagated => "another count in the period was redacted",
        };
        f.write_str(text)
    }
}

/// Audit record of one redaction. Never carries the true value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Redaction {
    pub period: Period,
    pub category: Option<String>,
    pub reason: SuppressionReason,
}

/// Turn (row, reason) decisions into audit records, logging each one
pub(crate) fn record(
    table: &CountsTable,
    decisions: Vec<(usize, SuppressionReason)>,
) -> Vec<Redaction> {
    decisions
        .into_iter()
        .map(|(idx, reason)| {
            let period = table.rows[idx].period;
            let category = table.category(idx);
            debug!(
                %period,
                category = category.unwrap_or("-"),
                %reason,
                "redacted"
            );
            Redaction {
                period,
                category: category.map(str::to_string),
                reason,
            }
        })
        .collect()
}

/// Count redactions by reason
pub fn summarize(redactions: &[Redaction]) -> RedactionSummary {
    let mut summary = RedactionSummary::default();
    for r in redactions {
        match r.reason {
            SuppressionReason::BelowThreshold => summary.below_threshold += 1,
            SuppressionReason::GroupTotal => summary.group_total += 1,
            SuppressionReason::Cascade => summary.cascade += 1,
            SuppressionReason::Completion => summary.completion += 1,
            SuppressionReason::Propagated => summary.propagated += 1,
        }
    }
    summary
}

/// Replace a numeric denominator below `floor` with the floor label
pub fn floor_denominator(denominator: Denominator, floor: u64) -> Denominator {
    match denominator {
        Denominator::Count(v) if v < floor => Denominator::BelowFloor(floor),
        other => other,
    }
}

/// Apply the denominator floor to every row, returning how many were replaced
pub fn apply_denominator_floor(table: &mut CountsTable, floor: u64) -> u64 {
    let mut replaced = 0;
    for row in table.rows.iter_mut() {
        let floored = floor_denominator(row.denominators, floor);
        if floored != row.denominators {
            replaced += 1;
            row.denominators = floored;
        }
    }
    replaced
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::CountRow;
    use crate::types::Cell;
    use chrono::NaiveDate;

    fn period() -> Period {
        NaiveDate::from_ymd_opt(2021, 2, 1).unwrap()
    }

    #[test]
    fn test_floor_below() {
        assert_eq!(
            floor_denominator(Denominator::Count(84), 100),
            Denominator::BelowFloor(100)
        );
    }

    #[test]
    fn test_floor_at_floor_is_kept() {
        assert_eq!(
            floor_denominator(Denominator::Count(100), 100),
            Denominator::Count(100)
        );
    }

    #[test]
    fn test_floor_passes_non_numeric() {
        assert_eq!(
            floor_denominator(Denominator::Missing, 100),
            Denominator::Missing
        );
        assert_eq!(
            floor_denominator(Denominator::BelowFloor(100), 100),
            Denominator::BelowFloor(100)
        );
    }

    #[test]
    fn test_apply_denominator_floor_counts_replacements() {
        let mut table = CountsTable::from_rows(vec![
            CountRow::new(period(), None, Cell::Count(30)).with_denominator(Denominator::Count(84)),
            CountRow::new(period(), None, Cell::Count(30)).with_denominator(Denominator::Count(400)),
        ]);

        assert_eq!(apply_denominator_floor(&mut table, 100), 1);
        assert_eq!(table.rows[0].denominators.to_string(), "Less than 100");
        assert_eq!(table.rows[1].denominators, Denominator::Count(400));
    }

    #[test]
    fn test_record_and_summarize() {
        let table = CountsTable::from_rows(vec![
            CountRow::new(period(), Some("Male".to_string()), Cell::Redacted),
            CountRow::new(period(), Some("Female".to_string()), Cell::Redacted),
        ]);

        let redactions = record(
            &table,
            vec![
                (0, SuppressionReason::BelowThreshold),
                (1, SuppressionReason::Cascade),
            ],
        );

        assert_eq!(redactions[1].category.as_deref(), Some("Female"));
        let summary = summarize(&redactions);
        assert_eq!(summary.below_threshold, 1);
        assert_eq!(summary.cascade, 1);
        assert_eq!(summary.total(), 2);
    }

    #[test]
    fn test_reason_display() {
        assert_eq!(
            SuppressionReason::Propagated.to_string(),
            "another count in the period was redacted"
        );
    }
}
