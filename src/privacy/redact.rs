use crate::inference::{parse_numeric, whole_count};
use crate::table::CountsTable;
use crate::types::{Cell, SdcConfig, REDACTED};

use super::suppression::{record, Redaction, SuppressionReason};

/// Round a value up to the nearest multiple of `base`, saturating at `u64::MAX`
pub fn round_up(value: u64, base: u64) -> u64 {
    value.div_ceil(base).saturating_mul(base)
}

/// Redact a value at or below the threshold, otherwise round it up.
/// Non-numeric cells are returned unchanged.
pub fn redact_and_round(cell: Cell, threshold: u64, base: u64) -> Cell {
    match cell {
        Cell::Count(v) if v <= threshold => Cell::Redacted,
        Cell::Count(v) => Cell::Count(round_up(v, base)),
        other => other,
    }
}

/// Apply [`redact_and_round`] to every counts cell of a table
pub fn redact_and_round_column(table: &mut CountsTable, config: &SdcConfig) -> Vec<Redaction> {
    let mut decisions = Vec::new();
    for (idx, row) in table.rows.iter_mut().enumerate() {
        let before = row.counts;
        row.counts = redact_and_round(before, config.threshold, config.rounding_base);
        if row.counts.is_redacted() && !before.is_redacted() {
            decisions.push((idx, SuppressionReason::BelowThreshold));
        }
    }
    record(table, decisions)
}

/// Redact and round every numeric field of a raw record, skipping key columns.
///
/// Text fields pass through. Numbers too large to count are left empty.
/// Returns the new fields and how many were redacted.
pub fn redact_and_round_record(
    fields: &[String],
    key_columns: &[usize],
    config: &SdcConfig,
) -> (Vec<String>, usize) {
    let mut redacted = 0;
    let out = fields
        .iter()
        .enumerate()
        .map(|(idx, field)| {
            if key_columns.contains(&idx) {
                return field.clone();
            }
            match parse_numeric(field).filter(|v| v.is_finite()) {
                Some(v) if v <= config.threshold as f64 => {
                    redacted += 1;
                    REDACTED.to_string()
                }
                Some(v) => whole_count(v)
                    .map(|n| round_up(n, config.rounding_base).to_string())
                    .unwrap_or_default(),
                None => field.clone(),
            }
        })
        .collect();
    (out, redacted)
}
