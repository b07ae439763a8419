use crate::table::{CountsTable, WorkingSet};

use super::suppression::{record, Redaction, SuppressionReason};

/// Hide the smallest numeric cell of a group that has exactly one redacted cell.
///
/// A lone redaction can be recovered by subtracting the other cells from a
/// known total. Groups with no redaction or with two or more are left alone.
pub fn complete_group(set: &mut WorkingSet) -> Option<(usize, SuppressionReason)> {
    if set.redacted_count() != 1 {
        return None;
    }
    let pos = set.smallest_numeric()?;
    let (row, cell) = &mut set.cells[pos];
    cell.redact();
    Some((*row, SuppressionReason::Completion))
}

pub fn apply_completion(table: &mut CountsTable) -> Vec<Redaction> {
    let mut decisions = Vec::new();
    table.for_each_period(|set| decisions.extend(complete_group(set)));
    record(table, decisions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::CountRow;
    use crate::types::Cell;
    use chrono::NaiveDate;

    fn table_of(cells: &[Cell]) -> CountsTable {
        let period = NaiveDate::from_ymd_opt(2021, 5, 3).unwrap();
        CountsTable::from_rows(
            cells
                .iter()
                .enumerate()
                .map(|(i, c)| CountRow::new(period, Some(format!("region{}", i)), *c))
                .collect(),
        )
    }

    fn counts(table: &CountsTable) -> Vec<Cell> {
        table.rows.iter().map(|r| r.counts).collect()
    }

    #[test]
    fn test_single_redaction_gets_a_partner() {
        let mut table = table_of(&[Cell::Redacted, Cell::Count(40), Cell::Count(15), Cell::Count(90)]);

        let redactions = apply_completion(&mut table);

        assert_eq!(
            counts(&table),
            vec![Cell::Redacted, Cell::Count(40), Cell::Redacted, Cell::Count(90)]
        );
        assert_eq!(redactions.len(), 1);
        assert_eq!(redactions[0].reason, SuppressionReason::Completion);
        assert_eq!(redactions[0].category.as_deref(), Some("region2"));
    }

    #[test]
    fn test_no_redaction_is_untouched() {
        let cells = [Cell::Count(40), Cell::Count(15)];
        let mut table = table_of(&cells);

        assert!(apply_completion(&mut table).is_empty());
        assert_eq!(counts(&table), cells.to_vec());
    }

    #[test]
    fn test_two_redactions_are_untouched() {
        let cells = [Cell::Redacted, Cell::Redacted, Cell::Count(15)];
        let mut table = table_of(&cells);

        assert!(apply_completion(&mut table).is_empty());
        assert_eq!(counts(&table), cells.to_vec());
    }

    #[test]
    fn test_nothing_numeric_to_pair_with() {
        let cells = [Cell::Redacted, Cell::Missing];
        let mut table = table_of(&cells);

        assert!(apply_completion(&mut table).is_empty());
        assert_eq!(counts(&table), cells.to_vec());
    }

    #[test]
    fn test_completion_is_idempotent() {
        let mut table = table_of(&[Cell::Redacted, Cell::Count(40), Cell::Count(15)]);
        apply_completion(&mut table);
        let once = table.clone();

        assert!(apply_completion(&mut table).is_empty());
        assert_eq!(table, once);
    }
}
