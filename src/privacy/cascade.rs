//! Cascading small-number redaction.
//!
//! Hiding only the cells at or below the threshold is not enough: a hidden
//! cell can be recovered by subtracting the disclosed cells from a disclosed
//! total. Within each period the smallest remaining cells are therefore
//! pulled in, in ascending order, until the hidden mass itself exceeds the
//! threshold.

use crate::table::{CountsTable, WorkingSet};
use crate::types::{Cell, SdcConfig};

use super::redact::round_up;
use super::suppression::{record, Redaction, SuppressionReason};

/// Run the cascade over one period's group
pub fn cascade_group(set: &mut WorkingSet, threshold: u64) -> Vec<(usize, SuppressionReason)> {
    let mut decisions = Vec::new();
    // Nothing numeric left to disclose
    if set.smallest_numeric().is_none() {
        return decisions;
    }

    // The total itself is disclosive: hide the whole group
    if set.numeric_sum() <= threshold {
        for (row, cell) in set.cells.iter_mut() {
            if cell.redact() {
                decisions.push((*row, SuppressionReason::GroupTotal));
            }
        }
        return decisions;
    }

    let mut hidden_mass: u64 = 0;
    for (row, cell) in set.cells.iter_mut() {
        if let Cell::Count(v) = *cell {
            if v <= threshold {
                cell.redact();
                hidden_mass += v;
                decisions.push((*row, SuppressionReason::BelowThreshold));
            }
        }
    }
    if decisions.is_empty() {
        return decisions;
    }

    while hidden_mass <= threshold {
        let Some(pos) = set.smallest_numeric() else {
            break;
        };
        let (row, cell) = &mut set.cells[pos];
        hidden_mass += cell.value().unwrap_or(0);
        cell.redact();
        decisions.push((*row, SuppressionReason::Cascade));
    }

    decisions
}

/// Run the cascade over every period of a table. Survivors are not rounded.
pub fn apply_cascade(table: &mut CountsTable, threshold: u64) -> Vec<Redaction> {
    let mut decisions = Vec::new();
    table.for_each_period(|set| decisions.extend(cascade_group(set, threshold)));
    record(table, decisions)
}

/// Round every numeric counts cell up to a multiple of `base`
pub fn round_survivors(table: &mut CountsTable, base: u64) {
    for row in table.rows.iter_mut() {
        if let Cell::Count(v) = row.counts {
            row.counts = Cell::Count(round_up(v, base));
        }
    }
}

/// Cascade redaction followed by rounding of the survivors
pub fn redact_to_threshold_and_round(table: &mut CountsTable, config: &SdcConfig) -> Vec<Redaction> {
    let redactions = apply_cascade(table, config.threshold);
    round_survivors(table, config.rounding_base);
    redactions
}
