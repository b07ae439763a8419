use crate::table::{CountsTable, WorkingSet};

use super::suppression::{record, Redaction, SuppressionReason};

/// Redact every cell of a group that already holds a redacted cell.
///
/// For fine-grained groupings a partially published period leaks the hidden
/// cells by elimination, so a period is published whole or not at all.
pub fn propagate_group(set: &mut WorkingSet) -> Vec<(usize, SuppressionReason)> {
    if set.redacted_count() == 0 {
        return Vec::new();
    }
    set.cells
        .iter_mut()
        .filter_map(|(row, cell)| cell.redact().then_some((*row, SuppressionReason::Propagated)))
        .collect()
}

pub fn apply_propagation(table: &mut CountsTable) -> Vec<Redaction> {
    let mut decisions = Vec::new();
    table.for_each_period(|set| decisions.extend(propagate_group(set)));
    record(table, decisions)
}
